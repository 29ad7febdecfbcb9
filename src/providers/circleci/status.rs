//! Lifecycle classification shared by the cache freshness policy and the renderers.
//!
//! No match here has a wildcard arm: a new status variant must be classified
//! before the crate compiles.

use super::types::{JobStatus, V1JobLifecycle, WorkflowStatus};

impl WorkflowStatus {
    /// Whether the workflow reached a terminal state.
    pub fn is_finished(self) -> bool {
        match self {
            Self::Success | Self::Failed | Self::Error | Self::Canceled | Self::Unauthorized => {
                true
            }
            Self::Running | Self::NotRun | Self::Failing | Self::OnHold => false,
        }
    }
}

impl JobStatus {
    /// Whether the job reached a terminal state.
    ///
    /// `not_run` counts as finished: such a job was skipped because an upstream
    /// dependency failed and will never start in this workflow run.
    pub fn is_finished(self) -> bool {
        match self {
            Self::Success | Self::Failed | Self::Canceled | Self::Unauthorized | Self::NotRun => {
                true
            }
            Self::Running
            | Self::Retried
            | Self::Queued
            | Self::NotRunning
            | Self::InfrastructureFail
            | Self::Timedout
            | Self::OnHold
            | Self::TerminatedUnknown
            | Self::Blocked => false,
        }
    }

    /// Sort key for listings: failures first, then active jobs, then successes.
    pub fn display_priority(self) -> u8 {
        match self {
            Self::Failed | Self::InfrastructureFail | Self::Timedout | Self::Unauthorized => 0,
            Self::Running | Self::Queued => 1,
            Self::Success => 2,
            Self::NotRun
            | Self::Retried
            | Self::NotRunning
            | Self::OnHold
            | Self::TerminatedUnknown
            | Self::Blocked
            | Self::Canceled => 3,
        }
    }
}

impl V1JobLifecycle {
    pub fn is_finished(self) -> bool {
        match self {
            Self::Finished => true,
            Self::Queued | Self::Scheduled | Self::NotRun | Self::NotRunning | Self::Running => {
                false
            }
        }
    }
}
