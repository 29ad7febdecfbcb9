mod failed_tests;
mod jobs;
mod pipelines;

use std::collections::BTreeMap;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;

use super::cache_manager::CacheManager;
use super::client::CircleApi;
use super::types::{Job, JobDetails, JobStatus, Pipeline, V1JobAction, Workflow};
use crate::error::{CircleError, Result};
use crate::git;

pub const CURRENT_BRANCH: &str = "@current";
pub const ANY_BRANCH: &str = "@any";

/// Which pipelines a branch argument selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchSelector {
    /// The branch checked out in the working directory.
    Current,
    /// The caller's own pipelines on any branch.
    Any,
    Named(String),
}

impl BranchSelector {
    pub fn parse(branch: Option<&str>) -> Self {
        match branch {
            None | Some(CURRENT_BRANCH) => Self::Current,
            Some(ANY_BRANCH) => Self::Any,
            Some(name) => Self::Named(name.to_string()),
        }
    }
}

/// A pipeline given either by its opaque ID or by its per-project number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineRef {
    Id(String),
    Number(u64),
}

impl PipelineRef {
    pub fn parse(value: &str) -> Self {
        match value.parse() {
            Ok(number) => Self::Number(number),
            Err(_) => Self::Id(value.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineWithWorkflows {
    pub pipeline: Pipeline,
    pub workflows: Vec<Workflow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowWithJobs {
    pub workflow: Workflow,
    /// Jobs left after status filtering.
    pub jobs: Vec<Job>,
    /// Counts over every job of the workflow, ignoring the status filter.
    pub job_counts_by_status: BTreeMap<JobStatus, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepAction {
    pub step_index: usize,
    pub step_name: String,
    pub action: V1JobAction,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobDetailsWithSteps {
    pub details: JobDetails,
    /// Steps of each parallel run, in execution order.
    pub steps_by_action_index: BTreeMap<u32, Vec<StepAction>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedTestJobInfo {
    pub job_number: u64,
    pub job_name: String,
}

/// file -> classname -> test name -> jobs where it failed, in encounter order.
pub type FailedTests = IndexMap<String, IndexMap<String, IndexMap<String, Vec<FailedTestJobInfo>>>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowFailedTests {
    pub workflow: Workflow,
    pub failed_tests: FailedTests,
}

/// Read-side service over the CircleCI API for one project.
///
/// Every lookup goes through the cache manager first and only calls the API on
/// a miss. Independent sub-fetches run concurrently and the first error aborts
/// the whole operation.
pub struct CircleCIProvider {
    project_slug: String,
    api: Arc<dyn CircleApi>,
    cache: CacheManager,
    branch_resolver: fn() -> Option<String>,
}

impl CircleCIProvider {
    pub fn new(
        project_slug: impl Into<String>,
        api: Arc<dyn CircleApi>,
        cache: CacheManager,
    ) -> Self {
        Self {
            project_slug: project_slug.into(),
            api,
            cache,
            branch_resolver: git::current_branch,
        }
    }

    /// Replaces how the current branch is determined.
    #[cfg(test)]
    pub fn with_branch_resolver(mut self, branch_resolver: fn() -> Option<String>) -> Self {
        self.branch_resolver = branch_resolver;
        self
    }

    /// Persists everything cached so far.
    pub fn flush_cache(&self) {
        self.cache.flush();
    }

    fn current_branch(&self) -> Result<String> {
        (self.branch_resolver)()
            .ok_or_else(|| CircleError::app("Current branch could not be determined"))
    }

    /// `None` stands for [`BranchSelector::Any`].
    fn resolve_branch(&self, branch: &BranchSelector) -> Result<Option<String>> {
        match branch {
            BranchSelector::Current => self.current_branch().map(Some),
            BranchSelector::Any => Ok(None),
            BranchSelector::Named(name) => Ok(Some(name.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::circleci::testing::{create_test_provider, FakeApi};

    #[test]
    fn test_branch_selector_sentinels() {
        assert_eq!(BranchSelector::parse(None), BranchSelector::Current);
        assert_eq!(
            BranchSelector::parse(Some("@current")),
            BranchSelector::Current
        );
        assert_eq!(BranchSelector::parse(Some("@any")), BranchSelector::Any);
        assert_eq!(
            BranchSelector::parse(Some("feature/x")),
            BranchSelector::Named("feature/x".to_string())
        );
    }

    #[test]
    fn test_pipeline_ref_numbers_and_ids() {
        assert_eq!(PipelineRef::parse("42"), PipelineRef::Number(42));
        assert_eq!(
            PipelineRef::parse("5034460f-c7c4-4c43-9457-de07e2029e7b"),
            PipelineRef::Id("5034460f-c7c4-4c43-9457-de07e2029e7b".to_string())
        );
    }

    #[test]
    fn test_flush_cache_reaches_the_store() {
        let (_, cache, provider) = create_test_provider(FakeApi::default());
        assert_eq!(cache.flush_count(), 0);

        provider.flush_cache();
        assert_eq!(cache.flush_count(), 1);
    }
}
