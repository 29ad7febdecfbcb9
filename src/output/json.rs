use serde::Serialize;

use super::common::prepare_messages;
use super::{FailedTestsView, Render};
use crate::error::Result;
use crate::providers::circleci::types::{JobOutputMessage, JobTestMetadata, Workflow};
use crate::providers::circleci::{
    JobDetailsWithSteps, PipelineWithWorkflows, WorkflowFailedTests, WorkflowWithJobs,
};

/// Serializes the fetched data as-is. Presentation options that only reorder
/// or collapse the text views are ignored.
pub struct JsonRenderer;

fn to_json(value: &impl Serialize) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

impl Render for JsonRenderer {
    fn pipelines(&self, pipelines: &[PipelineWithWorkflows]) -> Result<String> {
        to_json(&pipelines)
    }

    fn pipeline(&self, pipeline: &PipelineWithWorkflows) -> Result<String> {
        to_json(pipeline)
    }

    fn workflows(&self, workflows: &[Workflow]) -> Result<String> {
        to_json(&workflows)
    }

    fn jobs(&self, workflows: &[WorkflowWithJobs]) -> Result<String> {
        to_json(&workflows)
    }

    fn job_details(&self, details: &JobDetailsWithSteps) -> Result<String> {
        to_json(details)
    }

    fn job_output(&self, messages: &[JobOutputMessage], extract_summary: bool) -> Result<String> {
        if !extract_summary {
            return to_json(&messages);
        }

        let summarized: Vec<_> = prepare_messages(messages, true)
            .into_iter()
            .map(|prepared| JobOutputMessage {
                message: prepared.text,
                ..prepared.message.clone()
            })
            .collect();
        to_json(&summarized)
    }

    fn job_tests(&self, tests: &[JobTestMetadata], include_messages: bool) -> Result<String> {
        if include_messages {
            return to_json(&tests);
        }

        let without_messages: Vec<_> = tests
            .iter()
            .map(|test| JobTestMetadata {
                message: None,
                ..test.clone()
            })
            .collect();
        to_json(&without_messages)
    }

    fn failed_tests(
        &self,
        workflows: &[WorkflowFailedTests],
        _view: FailedTestsView,
    ) -> Result<String> {
        to_json(&workflows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::test_data::*;
    use crate::providers::circleci::types::JobTestResult;

    #[test]
    fn test_job_counts_keyed_by_status() {
        let rendered = JsonRenderer
            .jobs(&[create_test_workflow_with_jobs()])
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();

        assert_eq!(value[0]["job_counts_by_status"]["failed"], 1);
        assert_eq!(value[0]["jobs"][1]["type"], "build");
    }

    #[test]
    fn test_failed_tests_preserve_grouping() {
        let rendered = JsonRenderer
            .failed_tests(&[create_test_failed_tests()], FailedTestsView::default())
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();

        let jobs = &value[0]["failed_tests"]["tests/test_api.py"]["TestApi"]["test_get"];
        assert_eq!(jobs[1]["job_number"], 103);
        assert_eq!(jobs[1]["job_name"], "unit");
    }

    #[test]
    fn test_job_tests_drop_messages_unless_requested() {
        let tests = vec![create_test_result(
            Some("a.py"),
            "A",
            "test_a",
            JobTestResult::Failure,
        )];

        let without: serde_json::Value =
            serde_json::from_str(&JsonRenderer.job_tests(&tests, false).unwrap()).unwrap();
        let with: serde_json::Value =
            serde_json::from_str(&JsonRenderer.job_tests(&tests, true).unwrap()).unwrap();

        assert!(without[0]["message"].is_null());
        assert_eq!(with[0]["message"], "test_a broke");
    }

    #[test]
    fn test_job_output_summary_replaces_message() {
        let output = "===== short test summary info =====\nFAILED test_a\n===== 1 failed in 1.00s =====\ntrailing";
        let messages = vec![create_test_output("out", output, 1)];

        let value: serde_json::Value =
            serde_json::from_str(&JsonRenderer.job_output(&messages, true).unwrap()).unwrap();

        assert_eq!(
            value[0]["message"],
            "===== short test summary info =====\nFAILED test_a\n===== 1 failed in 1.00s ====="
        );
    }
}
