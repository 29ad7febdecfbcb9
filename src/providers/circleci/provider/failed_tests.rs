use futures::future::try_join_all;
use log::info;

use super::{
    CircleCIProvider, FailedTestJobInfo, FailedTests, PipelineRef, WorkflowFailedTests,
    WorkflowWithJobs,
};
use crate::error::Result;
use crate::providers::circleci::types::{Job, JobStatus, JobTestMetadata, JobTestResult};
use crate::status_filter::StatusFilter;

impl CircleCIProvider {
    /// Failed tests of every failed job, grouped per workflow by file,
    /// classname and test name.
    pub async fn get_failed_tests(
        &self,
        pipeline: Option<&PipelineRef>,
        workflow_ids: &[String],
    ) -> Result<Vec<WorkflowFailedTests>> {
        let failed_jobs = StatusFilter::only([JobStatus::Failed]);
        let workflows = self
            .get_workflow_jobs(pipeline, workflow_ids, Some(&failed_jobs))
            .await?;

        try_join_all(
            workflows
                .into_iter()
                .map(|workflow| self.workflow_failed_tests(workflow)),
        )
        .await
    }

    async fn workflow_failed_tests(
        &self,
        workflow: WorkflowWithJobs,
    ) -> Result<WorkflowFailedTests> {
        info!(
            "Fetching tests for {} failed jobs in workflow {}...",
            workflow.jobs.len(),
            workflow.workflow.name
        );

        let per_job = try_join_all(workflow.jobs.iter().filter_map(|job| {
            let job_number = job.job_number?;
            Some(async move {
                self.job_tests(job_number)
                    .await
                    .map(|tests| (job, job_number, tests))
            })
        }))
        .await?;

        Ok(WorkflowFailedTests {
            failed_tests: group_failed_tests(per_job),
            workflow: workflow.workflow,
        })
    }
}

fn group_failed_tests(per_job: Vec<(&Job, u64, Vec<JobTestMetadata>)>) -> FailedTests {
    let mut grouped = FailedTests::new();

    for (job, job_number, tests) in per_job {
        for test in tests
            .into_iter()
            .filter(|test| test.result == JobTestResult::Failure)
        {
            grouped
                .entry(test.file.unwrap_or_default())
                .or_default()
                .entry(test.classname)
                .or_default()
                .entry(test.name)
                .or_default()
                .push(FailedTestJobInfo {
                    job_number,
                    job_name: job.name.clone(),
                });
        }
    }

    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::circleci::testing::{
        create_test_job, create_test_job_details, create_test_pipeline, create_test_provider,
        create_test_test_result, create_test_workflow, FakeApi,
    };
    use crate::providers::circleci::types::WorkflowStatus;

    fn failing_workflow_api(
        tests_10: Vec<JobTestMetadata>,
        tests_11: Vec<JobTestMetadata>,
    ) -> FakeApi {
        let mut api = FakeApi::default()
            .with_pipeline(
                create_test_pipeline("pipe-1", 1),
                vec![create_test_workflow(
                    "wf-1",
                    "pipe-1",
                    WorkflowStatus::Failed,
                    None,
                )],
            )
            .with_workflow_jobs(
                "wf-1",
                vec![
                    create_test_job("test-a", Some(10), JobStatus::Failed),
                    create_test_job("test-b", Some(11), JobStatus::Failed),
                    create_test_job("lint", Some(12), JobStatus::Success),
                ],
            );
        for number in [10, 11, 12] {
            let details = create_test_job_details(number, JobStatus::Failed, 1);
            api.job_details.insert(number, details);
        }
        api.job_tests.insert(10, tests_10);
        api.job_tests.insert(11, tests_11);
        api
    }

    fn failure(file: &str, classname: &str, name: &str) -> JobTestMetadata {
        create_test_test_result(file, classname, name, JobTestResult::Failure)
    }

    fn job_info(job_number: u64, job_name: &str) -> FailedTestJobInfo {
        FailedTestJobInfo {
            job_number,
            job_name: job_name.to_string(),
        }
    }

    #[tokio::test]
    async fn test_collects_failed_tests_across_jobs() {
        let api = failing_workflow_api(
            vec![
                failure("tests/test_foo.py", "tests.test_foo", "test_x"),
                create_test_test_result(
                    "tests/test_foo.py",
                    "tests.test_foo",
                    "test_z",
                    JobTestResult::Success,
                ),
            ],
            vec![failure("tests/test_bar.py", "tests.test_bar", "test_y")],
        );
        let (api, _, provider) = create_test_provider(api);

        let results = provider
            .get_failed_tests(None, &["wf-1".to_string()])
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].workflow.id, "wf-1");
        let failed = &results[0].failed_tests;
        assert_eq!(
            failed.keys().collect::<Vec<_>>(),
            vec!["tests/test_foo.py", "tests/test_bar.py"]
        );
        assert_eq!(
            failed["tests/test_foo.py"]["tests.test_foo"]["test_x"],
            vec![job_info(10, "test-a")]
        );
        assert_eq!(
            failed["tests/test_bar.py"]["tests.test_bar"]["test_y"],
            vec![job_info(11, "test-b")]
        );
        assert!(!failed["tests/test_foo.py"]["tests.test_foo"].contains_key("test_z"));
        // Only failed jobs are asked for their tests.
        assert_eq!(api.call_count("get_job_tests"), 2);
    }

    #[tokio::test]
    async fn test_same_test_failing_in_multiple_jobs() {
        let shared = failure("tests/test_foo.py", "tests.test_foo", "test_x");
        let api = failing_workflow_api(vec![shared.clone()], vec![shared]);
        let (_, _, provider) = create_test_provider(api);

        let results = provider
            .get_failed_tests(None, &["wf-1".to_string()])
            .await
            .unwrap();

        let failed = &results[0].failed_tests;
        assert_eq!(failed.len(), 1);
        assert_eq!(
            failed["tests/test_foo.py"]["tests.test_foo"]["test_x"],
            vec![job_info(10, "test-a"), job_info(11, "test-b")]
        );
    }

    #[tokio::test]
    async fn test_no_failed_tests() {
        let api = failing_workflow_api(vec![], vec![]);
        let (_, _, provider) = create_test_provider(api);

        let results = provider
            .get_failed_tests(Some(&PipelineRef::Id("pipe-1".into())), &[])
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert!(results[0].failed_tests.is_empty());
    }

    #[tokio::test]
    async fn test_unscheduled_failed_job_is_skipped() {
        let mut api = failing_workflow_api(vec![], vec![]);
        api.workflow_jobs.insert(
            "wf-1".to_string(),
            vec![create_test_job("never-ran", None, JobStatus::Failed)],
        );
        let (api, _, provider) = create_test_provider(api);

        let results = provider
            .get_failed_tests(None, &["wf-1".to_string()])
            .await
            .unwrap();

        assert!(results[0].failed_tests.is_empty());
        assert_eq!(api.call_count("get_job_tests"), 0);
    }
}
