use std::collections::BTreeMap;

use futures::future::try_join_all;
use log::{debug, info};

use super::{
    BranchSelector, CircleCIProvider, PipelineRef, PipelineWithWorkflows, WorkflowWithJobs,
};
use crate::error::{CircleError, Result};
use crate::providers::circleci::types::{Job, JobStatus, Pipeline, Workflow};
use crate::status_filter::StatusFilter;

impl CircleCIProvider {
    /// Fetches a pipeline and its workflows concurrently.
    pub async fn get_pipeline(&self, pipeline: &PipelineRef) -> Result<PipelineWithWorkflows> {
        let pipeline_id = self.resolve_pipeline_id(pipeline).await?;

        let (pipeline, workflows) = futures::try_join!(
            self.pipeline(&pipeline_id),
            self.pipeline_workflows(&pipeline_id)
        )?;

        Ok(PipelineWithWorkflows {
            pipeline,
            workflows,
        })
    }

    pub async fn get_latest_pipeline(&self, branch: &BranchSelector) -> Result<Option<Pipeline>> {
        let Some(branch) = self.resolve_branch(branch)? else {
            return Ok(self.my_latest_pipelines(1).await?.into_iter().next());
        };

        if let Some(pipeline) = self.cache.get_latest_pipeline_for_branch(&branch) {
            return Ok(Some(pipeline));
        }

        let pipeline = self
            .api
            .get_latest_pipelines_for_branch(&self.project_slug, &branch, 1)
            .await?
            .into_iter()
            .next();

        if let Some(pipeline) = &pipeline {
            self.cache.set_latest_pipeline_for_branch(&branch, pipeline);
        }

        Ok(pipeline)
    }

    /// The `n` most recent pipelines, each with its workflows.
    pub async fn get_latest_pipelines(
        &self,
        branch: &BranchSelector,
        n: usize,
    ) -> Result<Vec<PipelineWithWorkflows>> {
        let pipelines = match self.resolve_branch(branch)? {
            None => self.my_latest_pipelines(n).await?,
            Some(branch) => self.latest_pipelines_for_branch(&branch, n).await?,
        };

        info!("Fetching workflows for {} pipelines...", pipelines.len());

        let workflows = try_join_all(
            pipelines
                .iter()
                .map(|pipeline| self.pipeline_workflows(&pipeline.id)),
        )
        .await?;

        Ok(pipelines
            .into_iter()
            .zip(workflows)
            .map(|(pipeline, workflows)| PipelineWithWorkflows {
                pipeline,
                workflows,
            })
            .collect())
    }

    /// Workflows of `pipeline`, or of the current branch's latest pipeline.
    pub async fn get_pipeline_workflows(
        &self,
        pipeline: Option<&PipelineRef>,
    ) -> Result<Vec<Workflow>> {
        let pipeline_id = match pipeline {
            Some(pipeline) => self.resolve_pipeline_id(pipeline).await?,
            None => self.latest_pipeline_for_current_branch().await?.id,
        };

        self.pipeline_workflows(&pipeline_id).await
    }

    /// Jobs per workflow.
    ///
    /// Explicit `workflow_ids` take precedence and are checked against
    /// `pipeline` when both are given. Without either, the current branch's
    /// latest pipeline is used. `statuses` filters the returned jobs but not
    /// the per-status counts.
    pub async fn get_workflow_jobs(
        &self,
        pipeline: Option<&PipelineRef>,
        workflow_ids: &[String],
        statuses: Option<&StatusFilter<JobStatus>>,
    ) -> Result<Vec<WorkflowWithJobs>> {
        let pipeline_id = match pipeline {
            Some(pipeline) => Some(self.resolve_pipeline_id(pipeline).await?),
            None => None,
        };

        let workflows = if workflow_ids.is_empty() {
            let pipeline_id = match &pipeline_id {
                Some(pipeline_id) => pipeline_id.clone(),
                None => self.latest_pipeline_for_current_branch().await?.id,
            };
            self.pipeline_workflows(&pipeline_id).await?
        } else {
            try_join_all(workflow_ids.iter().map(|id| self.workflow(id)))
                .await?
        };

        if let Some(pipeline_id) = &pipeline_id {
            if let Some(stray) = workflows.iter().find(|w| &w.pipeline_id != pipeline_id) {
                return Err(CircleError::app(format!(
                    "Workflow {} does not belong to pipeline {pipeline_id}",
                    stray.id
                )));
            }
        }

        info!("Fetching jobs for {} workflows...", workflows.len());

        let jobs = try_join_all(
            workflows
                .iter()
                .map(|workflow| self.workflow_jobs(workflow)),
        )
        .await?;

        Ok(workflows
            .into_iter()
            .zip(jobs)
            .map(|(workflow, jobs)| {
                let job_counts_by_status = count_by_status(&jobs);
                let jobs = match statuses {
                    Some(filter) => jobs
                        .into_iter()
                        .filter(|job| filter.matches(&job.status))
                        .collect(),
                    None => jobs,
                };
                WorkflowWithJobs {
                    workflow,
                    jobs,
                    job_counts_by_status,
                }
            })
            .collect())
    }

    pub(super) async fn resolve_pipeline_id(&self, pipeline: &PipelineRef) -> Result<String> {
        let number = match pipeline {
            PipelineRef::Id(id) => return Ok(id.clone()),
            PipelineRef::Number(number) => *number,
        };

        if let Some(pipeline_id) = self.cache.get_pipeline_id_by_number(number) {
            return Ok(pipeline_id);
        }

        debug!("Resolving pipeline number {number}");
        let pipeline = self
            .api
            .get_pipeline_by_number(&self.project_slug, number)
            .await?;
        self.cache.set_pipeline(&pipeline);
        self.cache.set_pipeline_id_by_number(number, &pipeline.id);

        Ok(pipeline.id)
    }

    async fn latest_pipeline_for_current_branch(&self) -> Result<Pipeline> {
        let branch = self.current_branch()?;
        self.get_latest_pipeline(&BranchSelector::Named(branch.clone()))
            .await?
            .ok_or_else(|| CircleError::app(format!("No pipelines found (branch '{branch}')")))
    }

    async fn my_latest_pipelines(&self, n: usize) -> Result<Vec<Pipeline>> {
        if let Some(pipelines) = self.cache.get_my_latest_pipelines(n) {
            return Ok(pipelines);
        }

        let pipelines = self
            .api
            .get_my_latest_pipelines(&self.project_slug, n)
            .await?;
        self.cache.set_my_latest_pipelines(n, &pipelines);
        Ok(pipelines)
    }

    async fn latest_pipelines_for_branch(&self, branch: &str, n: usize) -> Result<Vec<Pipeline>> {
        if let Some(pipelines) = self.cache.get_latest_pipelines_for_branch(branch, n) {
            return Ok(pipelines);
        }

        let pipelines = self
            .api
            .get_latest_pipelines_for_branch(&self.project_slug, branch, n)
            .await?;
        self.cache
            .set_latest_pipelines_for_branch(branch, n, &pipelines);
        Ok(pipelines)
    }

    async fn pipeline(&self, pipeline_id: &str) -> Result<Pipeline> {
        if let Some(pipeline) = self.cache.get_pipeline(pipeline_id) {
            return Ok(pipeline);
        }

        let pipeline = self.api.get_pipeline_by_id(pipeline_id).await?;
        self.cache.set_pipeline(&pipeline);
        Ok(pipeline)
    }

    async fn pipeline_workflows(&self, pipeline_id: &str) -> Result<Vec<Workflow>> {
        if let Some(workflows) = self.cache.get_pipeline_workflows(pipeline_id) {
            return Ok(workflows);
        }

        let workflows = self.api.get_pipeline_workflows(pipeline_id).await?;
        self.cache.set_pipeline_workflows(pipeline_id, &workflows);
        Ok(workflows)
    }

    async fn workflow(&self, workflow_id: &str) -> Result<Workflow> {
        if let Some(workflow) = self.cache.get_workflow(workflow_id) {
            return Ok(workflow);
        }

        let workflow = self.api.get_workflow(workflow_id).await?;
        self.cache.set_workflow(&workflow);
        Ok(workflow)
    }

    async fn workflow_jobs(&self, workflow: &Workflow) -> Result<Vec<Job>> {
        if let Some(jobs) = self.cache.get_workflow_jobs(&workflow.id) {
            return Ok(jobs);
        }

        let jobs = self.api.get_workflow_jobs(&workflow.id).await?;
        self.cache.set_workflow_jobs(workflow, &jobs);
        Ok(jobs)
    }
}

fn count_by_status(jobs: &[Job]) -> BTreeMap<JobStatus, usize> {
    let mut counts = BTreeMap::new();
    for job in jobs {
        *counts.entry(job.status).or_insert(0) += 1;
    }
    counts
}
