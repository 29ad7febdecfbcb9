use super::core::CircleCIClient;
use crate::error::Result;
use crate::providers::circleci::types::{
    JobDetails, JobOutputMessage, JobTestMetadata, V1JobDetails,
};

impl CircleCIClient {
    pub(super) async fn fetch_job_details(
        &self,
        project_slug: &str,
        job_number: u64,
    ) -> Result<JobDetails> {
        let url = self.v2(&format!("project/{project_slug}/job/{job_number}"))?;
        self.get_json(url).await
    }

    pub(super) async fn fetch_v1_job_details(
        &self,
        project_slug: &str,
        job_number: u64,
    ) -> Result<V1JobDetails> {
        let url = self.v1(&format!("project/{project_slug}/{job_number}"))?;
        self.get_json(url).await
    }

    pub(super) async fn fetch_job_output(&self, output_url: &str) -> Result<Vec<JobOutputMessage>> {
        self.get_signed_json(output_url).await
    }

    pub(super) async fn fetch_job_tests(
        &self,
        project_slug: &str,
        job_number: u64,
    ) -> Result<Vec<JobTestMetadata>> {
        let url = self.v2(&format!("project/{project_slug}/{job_number}/tests"))?;
        self.get_paginated(url, &[], None).await
    }
}
