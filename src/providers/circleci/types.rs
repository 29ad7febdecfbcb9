//! CircleCI API value objects.
//!
//! Every type here is deserialized straight from an upstream response and never
//! mutated afterwards. Unknown fields are ignored so additions to the API do not
//! break decoding. Status enums decode strictly: a value outside the known set is
//! a decode error rather than a silently misclassified entity.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Returned when a string does not name a variant of a status enum.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} '{value}', expected one of: {}", .expected.join(", "))]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
    pub expected: &'static [&'static str],
}

/// Declares a fieldless enum whose wire form is a fixed string per variant.
///
/// Generates `ALL`, `as_str`, `Display`, `FromStr` and string-based serde impls,
/// so every status set is enumerable in tests and usable as a JSON map key.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident => $value:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $($variant,)+
        }

        impl $name {
            #[cfg(test)]
            pub const ALL: &'static [Self] = &[$(Self::$variant,)+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $value,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s {
                    $($value => Ok(Self::$variant),)+
                    _ => Err(UnknownVariant {
                        kind: stringify!($name),
                        value: s.to_string(),
                        expected: &[$($value,)+],
                    }),
                }
            }
        }

        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let value = String::deserialize(deserializer)?;
                value
                    .parse()
                    .map_err(|_| serde::de::Error::unknown_variant(&value, &[$($value,)+]))
            }
        }
    };
}

string_enum! {
    /// Pipeline creation state. Says nothing about whether its workflows finished.
    pub enum PipelineState {
        Created => "created",
        Errored => "errored",
        SetupPending => "setup-pending",
        Setup => "setup",
        Pending => "pending",
    }
}

string_enum! {
    pub enum PipelineTriggerType {
        ScheduledPipeline => "scheduled_pipeline",
        Explicit => "explicit",
        Api => "api",
        Webhook => "webhook",
    }
}

string_enum! {
    pub enum PipelineErrorType {
        Config => "config",
        InvalidTriggerSetup => "invalid-trigger-setup",
        ConfigFetch => "config-fetch",
        Timeout => "timeout",
        Permission => "permission",
        Other => "other",
        TriggerRule => "trigger-rule",
        Plan => "plan",
    }
}

string_enum! {
    pub enum WorkflowStatus {
        Success => "success",
        Running => "running",
        NotRun => "not_run",
        Failed => "failed",
        Error => "error",
        Failing => "failing",
        OnHold => "on_hold",
        Canceled => "canceled",
        Unauthorized => "unauthorized",
    }
}

string_enum! {
    pub enum JobStatus {
        Success => "success",
        Running => "running",
        NotRun => "not_run",
        Failed => "failed",
        Retried => "retried",
        Queued => "queued",
        NotRunning => "not_running",
        InfrastructureFail => "infrastructure_fail",
        Timedout => "timedout",
        OnHold => "on_hold",
        TerminatedUnknown => "terminated-unknown",
        Blocked => "blocked",
        Canceled => "canceled",
        Unauthorized => "unauthorized",
    }
}

string_enum! {
    pub enum JobType {
        Build => "build",
        Approval => "approval",
    }
}

string_enum! {
    /// Job lifecycle as reported by the v1.1 API.
    pub enum V1JobLifecycle {
        Queued => "queued",
        Scheduled => "scheduled",
        NotRun => "not_run",
        NotRunning => "not_running",
        Running => "running",
        Finished => "finished",
    }
}

string_enum! {
    pub enum JobTestResult {
        Success => "success",
        Failure => "failure",
        Skipped => "skipped",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: String,
    pub number: u64,
    pub project_slug: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub errors: Vec<PipelineError>,
    pub state: PipelineState,
    pub updated_at: Option<DateTime<Utc>>,
    pub vcs: Option<Vcs>,
    pub trigger: PipelineTrigger,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineError {
    #[serde(rename = "type")]
    pub kind: PipelineErrorType,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineTrigger {
    #[serde(rename = "type")]
    pub kind: PipelineTriggerType,
    pub received_at: DateTime<Utc>,
    pub actor: Actor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub login: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vcs {
    pub provider_name: String,
    pub origin_repository_url: String,
    pub target_repository_url: String,
    pub revision: String,
    pub commit: Option<VcsCommit>,
    pub branch: Option<String>,
    pub tag: Option<String>,
    pub review_id: Option<String>,
    pub review_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VcsCommit {
    pub subject: Option<String>,
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub name: String,
    pub status: WorkflowStatus,
    pub created_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub pipeline_id: String,
    pub pipeline_number: u64,
    pub project_slug: String,
    pub started_by: String,
    pub canceled_by: Option<String>,
    pub errored_by: Option<String>,
    pub tag: Option<String>,
    pub auto_rerun_number: Option<u32>,
    pub max_auto_reruns: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    pub project_slug: String,
    pub status: JobStatus,
    #[serde(rename = "type")]
    pub kind: JobType,
    /// Assigned once the job is scheduled.
    pub job_number: Option<u64>,
    pub started_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub canceled_by: Option<String>,
    pub approved_by: Option<String>,
    pub approval_request_id: Option<String>,
    pub requires: Option<BTreeMap<String, Vec<String>>>,
}

/// Job details from the v2 API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDetails {
    pub web_url: String,
    pub project: JobProject,
    #[serde(default)]
    pub parallel_runs: Vec<ParallelRun>,
    pub started_at: Option<DateTime<Utc>>,
    pub latest_workflow: LatestWorkflow,
    pub name: String,
    pub executor: Executor,
    pub parallelism: u32,
    pub status: JobStatus,
    pub number: u64,
    pub pipeline: JobPipeline,
    /// Milliseconds.
    pub duration: Option<u64>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub messages: Vec<JobMessage>,
    #[serde(default)]
    pub contexts: Vec<JobContext>,
    pub organization: JobOrganization,
    pub queued_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobProject {
    pub id: Option<String>,
    pub slug: String,
    pub name: String,
    pub external_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelRun {
    pub index: u32,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestWorkflow {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Executor {
    pub resource_class: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPipeline {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobContext {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOrganization {
    pub name: String,
}

/// Job details from the legacy v1.1 API, the only source of per-step output URLs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct V1JobDetails {
    pub status: String,
    pub lifecycle: V1JobLifecycle,
    #[serde(default)]
    pub steps: Vec<V1JobStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct V1JobStep {
    pub name: String,
    #[serde(default)]
    pub actions: Vec<V1JobAction>,
}

/// One parallel run of a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct V1JobAction {
    pub index: u32,
    pub status: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub run_time_millis: Option<u64>,
    /// Signed and short-lived; never cache it.
    pub output_url: Option<String>,
    pub exit_code: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOutputMessage {
    pub message: String,
    pub time: DateTime<Utc>,
    #[serde(default)]
    pub truncated: bool,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobTestMetadata {
    pub message: Option<String>,
    pub source: String,
    pub run_time: f64,
    pub file: Option<String>,
    pub result: JobTestResult,
    pub name: String,
    pub classname: String,
}

/// One page of a cursor-paginated v2 list endpoint.
#[derive(Debug, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_page_token: Option<String>,
}
