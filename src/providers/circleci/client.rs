mod core;
mod jobs;
mod pipelines;

use async_trait::async_trait;

pub use self::core::{CircleCIClient, DEFAULT_BASE_URL};
use super::types::{
    Job, JobDetails, JobOutputMessage, JobTestMetadata, Pipeline, V1JobDetails, Workflow,
};
use crate::error::Result;

/// Upstream CircleCI API, one method per call the provider makes.
///
/// List methods follow pagination internally. Nothing here is cached or retried.
#[async_trait]
pub trait CircleApi: Send + Sync {
    async fn get_pipeline_by_id(&self, pipeline_id: &str) -> Result<Pipeline>;

    async fn get_pipeline_by_number(&self, project_slug: &str, number: u64) -> Result<Pipeline>;

    async fn get_latest_pipelines_for_branch(
        &self,
        project_slug: &str,
        branch: &str,
        limit: usize,
    ) -> Result<Vec<Pipeline>>;

    /// Pipelines triggered by the owner of the token, across all branches.
    async fn get_my_latest_pipelines(
        &self,
        project_slug: &str,
        limit: usize,
    ) -> Result<Vec<Pipeline>>;

    async fn get_pipeline_workflows(&self, pipeline_id: &str) -> Result<Vec<Workflow>>;

    async fn get_workflow(&self, workflow_id: &str) -> Result<Workflow>;

    async fn get_workflow_jobs(&self, workflow_id: &str) -> Result<Vec<Job>>;

    async fn get_job_details(&self, project_slug: &str, job_number: u64) -> Result<JobDetails>;

    async fn get_v1_job_details(
        &self,
        project_slug: &str,
        job_number: u64,
    ) -> Result<V1JobDetails>;

    /// `output_url` is the signed URL from a v1 step action.
    async fn get_job_output(&self, output_url: &str) -> Result<Vec<JobOutputMessage>>;

    async fn get_job_tests(
        &self,
        project_slug: &str,
        job_number: u64,
    ) -> Result<Vec<JobTestMetadata>>;
}

#[async_trait]
impl CircleApi for CircleCIClient {
    async fn get_pipeline_by_id(&self, pipeline_id: &str) -> Result<Pipeline> {
        self.fetch_pipeline_by_id(pipeline_id).await
    }

    async fn get_pipeline_by_number(&self, project_slug: &str, number: u64) -> Result<Pipeline> {
        self.fetch_pipeline_by_number(project_slug, number).await
    }

    async fn get_latest_pipelines_for_branch(
        &self,
        project_slug: &str,
        branch: &str,
        limit: usize,
    ) -> Result<Vec<Pipeline>> {
        self.fetch_latest_pipelines_for_branch(project_slug, branch, limit)
            .await
    }

    async fn get_my_latest_pipelines(
        &self,
        project_slug: &str,
        limit: usize,
    ) -> Result<Vec<Pipeline>> {
        self.fetch_my_latest_pipelines(project_slug, limit).await
    }

    async fn get_pipeline_workflows(&self, pipeline_id: &str) -> Result<Vec<Workflow>> {
        self.fetch_pipeline_workflows(pipeline_id).await
    }

    async fn get_workflow(&self, workflow_id: &str) -> Result<Workflow> {
        self.fetch_workflow(workflow_id).await
    }

    async fn get_workflow_jobs(&self, workflow_id: &str) -> Result<Vec<Job>> {
        self.fetch_workflow_jobs(workflow_id).await
    }

    async fn get_job_details(&self, project_slug: &str, job_number: u64) -> Result<JobDetails> {
        self.fetch_job_details(project_slug, job_number).await
    }

    async fn get_v1_job_details(
        &self,
        project_slug: &str,
        job_number: u64,
    ) -> Result<V1JobDetails> {
        self.fetch_v1_job_details(project_slug, job_number).await
    }

    async fn get_job_output(&self, output_url: &str) -> Result<Vec<JobOutputMessage>> {
        self.fetch_job_output(output_url).await
    }

    async fn get_job_tests(
        &self,
        project_slug: &str,
        job_number: u64,
    ) -> Result<Vec<JobTestMetadata>> {
        self.fetch_job_tests(project_slug, job_number).await
    }
}
