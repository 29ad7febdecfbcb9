use super::core::CircleCIClient;
use crate::error::Result;
use crate::providers::circleci::types::{Job, Pipeline, Workflow};

impl CircleCIClient {
    pub(super) async fn fetch_pipeline_by_id(&self, pipeline_id: &str) -> Result<Pipeline> {
        let url = self.v2(&format!("pipeline/{pipeline_id}"))?;
        self.get_json(url).await
    }

    pub(super) async fn fetch_pipeline_by_number(
        &self,
        project_slug: &str,
        number: u64,
    ) -> Result<Pipeline> {
        let url = self.v2(&format!("project/{project_slug}/pipeline/{number}"))?;
        self.get_json(url).await
    }

    pub(super) async fn fetch_latest_pipelines_for_branch(
        &self,
        project_slug: &str,
        branch: &str,
        limit: usize,
    ) -> Result<Vec<Pipeline>> {
        let url = self.v2(&format!("project/{project_slug}/pipeline"))?;
        self.get_paginated(url, &[("branch", branch)], Some(limit))
            .await
    }

    pub(super) async fn fetch_my_latest_pipelines(
        &self,
        project_slug: &str,
        limit: usize,
    ) -> Result<Vec<Pipeline>> {
        let url = self.v2(&format!("project/{project_slug}/pipeline/mine"))?;
        self.get_paginated(url, &[], Some(limit)).await
    }

    pub(super) async fn fetch_pipeline_workflows(&self, pipeline_id: &str) -> Result<Vec<Workflow>> {
        let url = self.v2(&format!("pipeline/{pipeline_id}/workflow"))?;
        self.get_paginated(url, &[], None).await
    }

    pub(super) async fn fetch_workflow(&self, workflow_id: &str) -> Result<Workflow> {
        let url = self.v2(&format!("workflow/{workflow_id}"))?;
        self.get_json(url).await
    }

    pub(super) async fn fetch_workflow_jobs(&self, workflow_id: &str) -> Result<Vec<Job>> {
        let url = self.v2(&format!("workflow/{workflow_id}/job"))?;
        self.get_paginated(url, &[], None).await
    }
}
