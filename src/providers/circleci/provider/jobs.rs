use std::collections::BTreeMap;

use log::debug;

use super::{CircleCIProvider, JobDetailsWithSteps, StepAction};
use crate::error::{CircleError, Result};
use crate::providers::circleci::types::{
    JobDetails, JobOutputMessage, JobTestMetadata, JobTestResult, V1JobDetails,
};
use crate::status_filter::StatusFilter;

impl CircleCIProvider {
    /// Job details with its steps grouped by parallel run.
    ///
    /// `step_statuses` filters steps on their action status; every parallel run
    /// keeps its entry even when all of its steps are filtered out.
    pub async fn get_job_details(
        &self,
        job_number: u64,
        step_statuses: Option<&StatusFilter<String>>,
    ) -> Result<JobDetailsWithSteps> {
        let (details, v1_details) = futures::try_join!(
            self.job_details(job_number),
            self.v1_job_details(job_number)
        )?;

        let mut steps_by_action_index: BTreeMap<u32, Vec<StepAction>> = BTreeMap::new();
        for (step_index, step) in v1_details.steps.iter().enumerate() {
            for action in &step.actions {
                let steps = steps_by_action_index.entry(action.index).or_default();
                if step_statuses.map_or(true, |filter| filter.matches(&action.status)) {
                    steps.push(StepAction {
                        step_index,
                        step_name: step.name.clone(),
                        action: action.clone(),
                    });
                }
            }
        }

        Ok(JobDetailsWithSteps {
            details,
            steps_by_action_index,
        })
    }

    /// Console output of one step of one parallel run.
    ///
    /// Without `parallel_index` the job must not be parallel; run 0 is used.
    pub async fn get_job_output(
        &self,
        job_number: u64,
        step: usize,
        parallel_index: Option<u32>,
    ) -> Result<Vec<JobOutputMessage>> {
        let parallel_index = match parallel_index {
            Some(index) => index,
            None => {
                if self.job_details(job_number).await?.parallelism > 1 {
                    return Err(CircleError::app("parallel index is required for parallel jobs"));
                }
                0
            }
        };

        if let Some(output) = self.cache.get_job_output(job_number, step, parallel_index) {
            return Ok(output);
        }

        // Output URLs are signed and expire, so these details are never cached.
        let v1_details = self
            .api
            .get_v1_job_details(&self.project_slug, job_number)
            .await?;

        let action = v1_details
            .steps
            .get(step)
            .ok_or_else(|| CircleError::app(format!("No steps matching filter (step={step})")))?
            .actions
            .iter()
            .find(|action| action.index == parallel_index)
            .ok_or_else(|| {
                CircleError::app(format!(
                    "No steps matching filter (parallel_index={parallel_index})"
                ))
            })?;

        let output_url = action
            .output_url
            .as_deref()
            .ok_or_else(|| CircleError::app("Output URL not found"))?;

        debug!("Fetching output for job {job_number} step {step} run {parallel_index}");
        let output = self.api.get_job_output(output_url).await?;
        self.cache.set_job_output(
            job_number,
            step,
            parallel_index,
            v1_details.lifecycle,
            &output,
        );

        Ok(output)
    }

    pub async fn get_job_tests(
        &self,
        job_number: u64,
        statuses: Option<&StatusFilter<JobTestResult>>,
        file_suffix: Option<&str>,
    ) -> Result<Vec<JobTestMetadata>> {
        let tests = self.job_tests(job_number).await?;

        Ok(tests
            .into_iter()
            .filter(|test| statuses.map_or(true, |filter| filter.matches(&test.result)))
            .filter(|test| {
                file_suffix.map_or(true, |suffix| {
                    matches!(test.file.as_deref(), Some(file) if file.ends_with(suffix))
                })
            })
            .collect())
    }

    pub(super) async fn job_details(&self, job_number: u64) -> Result<JobDetails> {
        if let Some(details) = self.cache.get_job_details(job_number) {
            return Ok(details);
        }

        let details = self
            .api
            .get_job_details(&self.project_slug, job_number)
            .await?;
        self.cache.set_job_details(&details);
        Ok(details)
    }

    async fn v1_job_details(&self, job_number: u64) -> Result<V1JobDetails> {
        if let Some(details) = self.cache.get_v1_job_details(job_number) {
            return Ok(details);
        }

        let details = self
            .api
            .get_v1_job_details(&self.project_slug, job_number)
            .await?;
        self.cache.set_v1_job_details(job_number, &details);
        Ok(details)
    }

    /// Test results, cached for as long as the job's own status allows.
    pub(super) async fn job_tests(&self, job_number: u64) -> Result<Vec<JobTestMetadata>> {
        if let Some(tests) = self.cache.get_job_tests(job_number) {
            return Ok(tests);
        }

        let (details, tests) = futures::try_join!(
            self.job_details(job_number),
            self.api.get_job_tests(&self.project_slug, job_number)
        )?;
        self.cache.set_job_tests(job_number, details.status, &tests);
        Ok(tests)
    }
}
