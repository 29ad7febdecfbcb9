use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::warn;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::cache::Cache;
use super::types::{
    Job, JobDetails, JobOutputMessage, JobStatus, JobTestMetadata, Pipeline, V1JobDetails,
    V1JobLifecycle, Workflow,
};

/// How long after the last workflow stopped a pipeline's workflow list is still
/// treated as in progress. Covers workflows that start late in the same pipeline.
pub const GRACE_WINDOW: Duration = Duration::from_secs(60);

pub const DEFAULT_IN_PROGRESS_TTL: Duration = Duration::from_secs(5);
pub const DEFAULT_FINISHED_TTL: Duration = Duration::from_secs(14 * 24 * 60 * 60);

/// TTLs handed to the cache store. `finished: None` keeps finished entries forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    pub in_progress: Duration,
    pub finished: Option<Duration>,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            in_progress: DEFAULT_IN_PROGRESS_TTL,
            finished: Some(DEFAULT_FINISHED_TTL),
        }
    }
}

impl TtlPolicy {
    pub fn for_finished(&self, finished: bool) -> Option<Duration> {
        if finished {
            self.finished
        } else {
            Some(self.in_progress)
        }
    }
}

/// Whether a pipeline's workflow list can no longer change.
///
/// Pipelines carry no completion flag, so this requires a non-empty list where
/// every workflow is finished and stopped strictly longer than [`GRACE_WINDOW`]
/// before `now`.
pub fn pipeline_workflows_finished(workflows: &[Workflow], now: DateTime<Utc>) -> bool {
    let Ok(grace) = chrono::Duration::from_std(GRACE_WINDOW) else {
        return false;
    };

    !workflows.is_empty()
        && workflows.iter().all(|workflow| {
            workflow.status.is_finished()
                && workflow
                    .stopped_at
                    .is_some_and(|stopped_at| now - stopped_at > grace)
        })
}

/// Typed access to the cache: builds keys and picks a TTL from entity status.
pub struct CacheManager {
    cache: Arc<dyn Cache>,
    policy: TtlPolicy,
}

impl CacheManager {
    pub fn new(cache: Arc<dyn Cache>, policy: TtlPolicy) -> Self {
        Self { cache, policy }
    }

    fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.cache.get(key)?;
        match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!("Ignoring undecodable cache entry {key}: {e}");
                None
            }
        }
    }

    fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Option<Duration>) {
        match serde_json::to_value(value) {
            Ok(encoded) => self.cache.set(key, encoded, ttl),
            Err(e) => warn!("Skipping cache write for {key}: {e}"),
        }
    }

    pub fn flush(&self) {
        self.cache.flush();
    }

    fn in_progress(&self) -> Option<Duration> {
        self.policy.for_finished(false)
    }

    pub fn get_my_latest_pipelines(&self, n: usize) -> Option<Vec<Pipeline>> {
        self.get(&format!("latest_pipelines:mine:{n}"))
    }

    pub fn set_my_latest_pipelines(&self, n: usize, pipelines: &[Pipeline]) {
        self.set(
            &format!("latest_pipelines:mine:{n}"),
            pipelines,
            self.in_progress(),
        );
    }

    pub fn get_latest_pipeline_for_branch(&self, branch: &str) -> Option<Pipeline> {
        self.get(&format!("latest_pipeline:branch:{branch}"))
    }

    pub fn set_latest_pipeline_for_branch(&self, branch: &str, pipeline: &Pipeline) {
        self.set(
            &format!("latest_pipeline:branch:{branch}"),
            pipeline,
            self.in_progress(),
        );
    }

    pub fn get_latest_pipelines_for_branch(&self, branch: &str, n: usize) -> Option<Vec<Pipeline>> {
        self.get(&format!("latest_pipelines:branch:{branch}:{n}"))
    }

    pub fn set_latest_pipelines_for_branch(&self, branch: &str, n: usize, pipelines: &[Pipeline]) {
        self.set(
            &format!("latest_pipelines:branch:{branch}:{n}"),
            pipelines,
            self.in_progress(),
        );
        if let Some(latest) = pipelines.first() {
            self.set_latest_pipeline_for_branch(branch, latest);
        }
    }

    pub fn get_pipeline_id_by_number(&self, number: u64) -> Option<String> {
        self.get(&format!("pipeline_id_by_number:{number}"))
    }

    /// Pipeline numbers never move, so the mapping always gets the finished TTL.
    pub fn set_pipeline_id_by_number(&self, number: u64, pipeline_id: &str) {
        self.set(
            &format!("pipeline_id_by_number:{number}"),
            pipeline_id,
            self.policy.for_finished(true),
        );
    }

    pub fn get_pipeline(&self, pipeline_id: &str) -> Option<Pipeline> {
        self.get(&format!("pipeline:{pipeline_id}"))
    }

    pub fn set_pipeline(&self, pipeline: &Pipeline) {
        self.set(
            &format!("pipeline:{}", pipeline.id),
            pipeline,
            self.in_progress(),
        );
    }

    pub fn get_workflow(&self, workflow_id: &str) -> Option<Workflow> {
        self.get(&format!("workflow:{workflow_id}"))
    }

    pub fn set_workflow(&self, workflow: &Workflow) {
        self.set(
            &format!("workflow:{}", workflow.id),
            workflow,
            self.policy.for_finished(workflow.status.is_finished()),
        );
    }

    pub fn get_pipeline_workflows(&self, pipeline_id: &str) -> Option<Vec<Workflow>> {
        self.get(&format!("pipeline:{pipeline_id}:workflows"))
    }

    /// Stores the list and each workflow on its own key.
    pub fn set_pipeline_workflows(&self, pipeline_id: &str, workflows: &[Workflow]) {
        self.set_pipeline_workflows_at(pipeline_id, workflows, Utc::now());
    }

    fn set_pipeline_workflows_at(
        &self,
        pipeline_id: &str,
        workflows: &[Workflow],
        now: DateTime<Utc>,
    ) {
        self.set(
            &format!("pipeline:{pipeline_id}:workflows"),
            workflows,
            self.policy
                .for_finished(pipeline_workflows_finished(workflows, now)),
        );
        for workflow in workflows {
            self.set_workflow(workflow);
        }
    }

    pub fn get_workflow_jobs(&self, workflow_id: &str) -> Option<Vec<Job>> {
        self.get(&format!("workflow:{workflow_id}:jobs"))
    }

    /// Jobs can only change while their workflow is still running.
    pub fn set_workflow_jobs(&self, workflow: &Workflow, jobs: &[Job]) {
        self.set(
            &format!("workflow:{}:jobs", workflow.id),
            jobs,
            self.policy.for_finished(workflow.status.is_finished()),
        );
    }

    pub fn get_job_details(&self, job_number: u64) -> Option<JobDetails> {
        self.get(&format!("job_details:{job_number}"))
    }

    pub fn set_job_details(&self, details: &JobDetails) {
        self.set(
            &format!("job_details:{}", details.number),
            details,
            self.policy.for_finished(details.status.is_finished()),
        );
    }

    pub fn get_v1_job_details(&self, job_number: u64) -> Option<V1JobDetails> {
        self.get(&format!("v1_job_details:{job_number}"))
    }

    pub fn set_v1_job_details(&self, job_number: u64, details: &V1JobDetails) {
        self.set(
            &format!("v1_job_details:{job_number}"),
            details,
            self.policy.for_finished(details.lifecycle.is_finished()),
        );
    }

    pub fn get_job_output(
        &self,
        job_number: u64,
        step: usize,
        parallel_index: u32,
    ) -> Option<Vec<JobOutputMessage>> {
        self.get(&format!("job_output:{job_number}:{step}:{parallel_index}"))
    }

    pub fn set_job_output(
        &self,
        job_number: u64,
        step: usize,
        parallel_index: u32,
        lifecycle: V1JobLifecycle,
        output: &[JobOutputMessage],
    ) {
        self.set(
            &format!("job_output:{job_number}:{step}:{parallel_index}"),
            output,
            self.policy.for_finished(lifecycle.is_finished()),
        );
    }

    pub fn get_job_tests(&self, job_number: u64) -> Option<Vec<JobTestMetadata>> {
        self.get(&format!("job_tests:{job_number}"))
    }

    pub fn set_job_tests(&self, job_number: u64, job_status: JobStatus, tests: &[JobTestMetadata]) {
        self.set(
            &format!("job_tests:{job_number}"),
            tests,
            self.policy.for_finished(job_status.is_finished()),
        );
    }
}
