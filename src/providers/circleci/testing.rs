//! Shared fixtures for provider and cache tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use super::cache::Cache;
use super::cache_manager::{CacheManager, TtlPolicy};
use super::client::CircleApi;
use super::provider::CircleCIProvider;
use super::types::{
    Actor, Executor, Job, JobDetails, JobOrganization, JobOutputMessage, JobPipeline, JobProject,
    JobStatus, JobTestMetadata, JobTestResult, JobType, LatestWorkflow, Pipeline, PipelineState,
    PipelineTrigger, PipelineTriggerType, V1JobAction, V1JobDetails, V1JobLifecycle, V1JobStep,
    Vcs, Workflow, WorkflowStatus,
};
use crate::error::{CircleError, Result};

pub const TEST_SLUG: &str = "gh/org/repo";

fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

pub fn create_test_pipeline(id: &str, number: u64) -> Pipeline {
    Pipeline {
        id: id.to_string(),
        number,
        project_slug: TEST_SLUG.to_string(),
        created_at: fixed_time(),
        errors: vec![],
        state: PipelineState::Created,
        updated_at: Some(fixed_time()),
        vcs: Some(Vcs {
            provider_name: "GitHub".to_string(),
            origin_repository_url: "https://github.com/org/repo".to_string(),
            target_repository_url: "https://github.com/org/repo".to_string(),
            revision: "0123456789abcdef".to_string(),
            commit: None,
            branch: Some("main".to_string()),
            tag: None,
            review_id: None,
            review_url: None,
        }),
        trigger: PipelineTrigger {
            kind: PipelineTriggerType::Webhook,
            received_at: fixed_time(),
            actor: Actor {
                login: "octocat".to_string(),
                avatar_url: None,
            },
        },
    }
}

pub fn create_test_workflow(
    id: &str,
    pipeline_id: &str,
    status: WorkflowStatus,
    stopped_at: Option<DateTime<Utc>>,
) -> Workflow {
    Workflow {
        id: id.to_string(),
        name: format!("workflow-{id}"),
        status,
        created_at: fixed_time(),
        stopped_at,
        pipeline_id: pipeline_id.to_string(),
        pipeline_number: 1,
        project_slug: TEST_SLUG.to_string(),
        started_by: "user-1".to_string(),
        canceled_by: None,
        errored_by: None,
        tag: None,
        auto_rerun_number: None,
        max_auto_reruns: None,
    }
}

pub fn create_test_job(name: &str, job_number: Option<u64>, status: JobStatus) -> Job {
    Job {
        id: format!("job-{name}"),
        name: name.to_string(),
        dependencies: vec![],
        project_slug: TEST_SLUG.to_string(),
        status,
        kind: JobType::Build,
        job_number,
        started_at: None,
        stopped_at: None,
        canceled_by: None,
        approved_by: None,
        approval_request_id: None,
        requires: None,
    }
}

pub fn create_test_job_details(number: u64, status: JobStatus, parallelism: u32) -> JobDetails {
    JobDetails {
        web_url: format!("https://circleci.com/gh/org/repo/{number}"),
        project: JobProject {
            id: None,
            slug: TEST_SLUG.to_string(),
            name: "repo".to_string(),
            external_url: "https://github.com/org/repo".to_string(),
        },
        parallel_runs: vec![],
        started_at: Some(fixed_time()),
        latest_workflow: LatestWorkflow {
            id: "wf-1".to_string(),
            name: "build".to_string(),
        },
        name: format!("job-{number}"),
        executor: Executor {
            resource_class: Some("medium".to_string()),
            kind: Some("docker".to_string()),
        },
        parallelism,
        status,
        number,
        pipeline: JobPipeline {
            id: "pipe-1".to_string(),
        },
        duration: Some(1_000),
        created_at: fixed_time(),
        messages: vec![],
        contexts: vec![],
        organization: JobOrganization {
            name: "org".to_string(),
        },
        queued_at: None,
        stopped_at: None,
    }
}

pub fn create_test_action(index: u32, status: &str, output_url: Option<&str>) -> V1JobAction {
    V1JobAction {
        index,
        status: status.to_string(),
        start_time: None,
        end_time: None,
        run_time_millis: Some(100),
        output_url: output_url.map(ToString::to_string),
        exit_code: Some(0),
    }
}

pub fn create_test_step(name: &str, actions: Vec<V1JobAction>) -> V1JobStep {
    V1JobStep {
        name: name.to_string(),
        actions,
    }
}

pub fn create_test_v1_details(lifecycle: V1JobLifecycle, steps: Vec<V1JobStep>) -> V1JobDetails {
    V1JobDetails {
        status: "success".to_string(),
        lifecycle,
        steps,
    }
}

pub fn create_test_output(message: &str) -> JobOutputMessage {
    JobOutputMessage {
        message: message.to_string(),
        time: fixed_time(),
        truncated: false,
        kind: "out".to_string(),
    }
}

pub fn create_test_test_result(
    file: &str,
    classname: &str,
    name: &str,
    result: JobTestResult,
) -> JobTestMetadata {
    JobTestMetadata {
        message: None,
        source: "pytest".to_string(),
        run_time: 0.5,
        file: Some(file.to_string()),
        result,
        name: name.to_string(),
        classname: classname.to_string(),
    }
}

/// Provider over `api` with a recording cache and `main` as the current branch.
pub fn create_test_provider(
    api: FakeApi,
) -> (Arc<FakeApi>, Arc<RecordingCache>, CircleCIProvider) {
    let api = Arc::new(api);
    let cache = Arc::new(RecordingCache::default());
    let provider = CircleCIProvider::new(
        TEST_SLUG,
        api.clone(),
        CacheManager::new(cache.clone(), TtlPolicy::default()),
    )
    .with_branch_resolver(|| Some("main".to_string()));
    (api, cache, provider)
}

/// In-memory cache that remembers the TTL of every write.
#[derive(Default)]
pub struct RecordingCache {
    entries: Mutex<HashMap<String, Value>>,
    writes: Mutex<Vec<(String, Option<Duration>)>>,
    flushes: AtomicUsize,
}

impl RecordingCache {
    /// TTL of the most recent write to `key`; `None` if it was never written.
    pub fn ttl_for(&self, key: &str) -> Option<Option<Duration>> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(written, _)| written == key)
            .map(|(_, ttl)| *ttl)
    }

    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }
}

impl Cache for RecordingCache {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: Value, ttl: Option<Duration>) {
        self.writes.lock().unwrap().push((key.to_string(), ttl));
        self.entries.lock().unwrap().insert(key.to_string(), value);
    }

    fn flush(&self) {
        self.flushes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Canned upstream responses plus a log of every call made.
#[derive(Default)]
pub struct FakeApi {
    pub pipelines: Vec<Pipeline>,
    pub pipelines_by_branch: HashMap<String, Vec<Pipeline>>,
    pub my_pipelines: Vec<Pipeline>,
    pub pipeline_workflows: HashMap<String, Vec<Workflow>>,
    pub workflow_jobs: HashMap<String, Vec<Job>>,
    pub failing_workflows: HashSet<String>,
    pub job_details: HashMap<u64, JobDetails>,
    pub v1_job_details: HashMap<u64, V1JobDetails>,
    pub job_output: HashMap<String, Vec<JobOutputMessage>>,
    pub job_tests: HashMap<u64, Vec<JobTestMetadata>>,
    calls: Mutex<Vec<String>>,
}

impl FakeApi {
    pub fn with_pipeline(mut self, pipeline: Pipeline, workflows: Vec<Workflow>) -> Self {
        self.pipeline_workflows
            .insert(pipeline.id.clone(), workflows);
        self.pipelines.push(pipeline);
        self
    }

    pub fn with_workflow_jobs(mut self, workflow_id: &str, jobs: Vec<Job>) -> Self {
        self.workflow_jobs.insert(workflow_id.to_string(), jobs);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.split(':').next() == Some(method))
            .count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn not_found(what: String) -> CircleError {
        CircleError::Api {
            url: what,
            status: 404,
            message: "Not found.".to_string(),
        }
    }
}

#[async_trait]
impl CircleApi for FakeApi {
    async fn get_pipeline_by_id(&self, pipeline_id: &str) -> Result<Pipeline> {
        self.record(format!("get_pipeline_by_id:{pipeline_id}"));
        self.pipelines
            .iter()
            .find(|pipeline| pipeline.id == pipeline_id)
            .cloned()
            .ok_or_else(|| Self::not_found(format!("pipeline/{pipeline_id}")))
    }

    async fn get_pipeline_by_number(&self, _project_slug: &str, number: u64) -> Result<Pipeline> {
        self.record(format!("get_pipeline_by_number:{number}"));
        self.pipelines
            .iter()
            .find(|pipeline| pipeline.number == number)
            .cloned()
            .ok_or_else(|| Self::not_found(format!("pipeline/{number}")))
    }

    async fn get_latest_pipelines_for_branch(
        &self,
        _project_slug: &str,
        branch: &str,
        limit: usize,
    ) -> Result<Vec<Pipeline>> {
        self.record(format!("get_latest_pipelines_for_branch:{branch}"));
        Ok(self
            .pipelines_by_branch
            .get(branch)
            .map(|pipelines| pipelines.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn get_my_latest_pipelines(
        &self,
        _project_slug: &str,
        limit: usize,
    ) -> Result<Vec<Pipeline>> {
        self.record("get_my_latest_pipelines".to_string());
        Ok(self.my_pipelines.iter().take(limit).cloned().collect())
    }

    async fn get_pipeline_workflows(&self, pipeline_id: &str) -> Result<Vec<Workflow>> {
        self.record(format!("get_pipeline_workflows:{pipeline_id}"));
        Ok(self
            .pipeline_workflows
            .get(pipeline_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_workflow(&self, workflow_id: &str) -> Result<Workflow> {
        self.record(format!("get_workflow:{workflow_id}"));
        self.pipeline_workflows
            .values()
            .flatten()
            .find(|workflow| workflow.id == workflow_id)
            .cloned()
            .ok_or_else(|| Self::not_found(format!("workflow/{workflow_id}")))
    }

    async fn get_workflow_jobs(&self, workflow_id: &str) -> Result<Vec<Job>> {
        self.record(format!("get_workflow_jobs:{workflow_id}"));
        if self.failing_workflows.contains(workflow_id) {
            return Err(CircleError::Api {
                url: format!("workflow/{workflow_id}/job"),
                status: 500,
                message: "Internal server error".to_string(),
            });
        }
        Ok(self
            .workflow_jobs
            .get(workflow_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_job_details(&self, _project_slug: &str, job_number: u64) -> Result<JobDetails> {
        self.record(format!("get_job_details:{job_number}"));
        self.job_details
            .get(&job_number)
            .cloned()
            .ok_or_else(|| Self::not_found(format!("job/{job_number}")))
    }

    async fn get_v1_job_details(
        &self,
        _project_slug: &str,
        job_number: u64,
    ) -> Result<V1JobDetails> {
        self.record(format!("get_v1_job_details:{job_number}"));
        self.v1_job_details
            .get(&job_number)
            .cloned()
            .ok_or_else(|| Self::not_found(format!("v1.1/{job_number}")))
    }

    async fn get_job_output(&self, output_url: &str) -> Result<Vec<JobOutputMessage>> {
        self.record(format!("get_job_output:{output_url}"));
        self.job_output
            .get(output_url)
            .cloned()
            .ok_or_else(|| Self::not_found(output_url.to_string()))
    }

    async fn get_job_tests(
        &self,
        _project_slug: &str,
        job_number: u64,
    ) -> Result<Vec<JobTestMetadata>> {
        self.record(format!("get_job_tests:{job_number}"));
        Ok(self.job_tests.get(&job_number).cloned().unwrap_or_default())
    }
}
