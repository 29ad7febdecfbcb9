//! Markdown output, meant for pasting into issues or handing to coding agents.

use chrono::{DateTime, Utc};
use console::strip_ansi_codes;

use super::common::{
    branch, commit_subject, duration, duration_ms, failed_test_count, file_label, format_jobs,
    group_tests, is_failure, job_summary, parallel_run_duration, prepare_messages, short_revision,
    sorted_jobs, sorted_pipelines, timestamp, unique_jobs, workflow_statuses,
};
use super::tables::create_markdown_table;
use super::{FailedTestsView, Render, UniqueLevel};
use crate::error::Result;
use crate::providers::circleci::links;
use crate::providers::circleci::types::{JobOutputMessage, JobTestMetadata, Workflow};
use crate::providers::circleci::{
    JobDetailsWithSteps, PipelineWithWorkflows, WorkflowFailedTests, WorkflowWithJobs,
};

pub struct MarkdownRenderer {
    now: DateTime<Utc>,
}

impl MarkdownRenderer {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now }
    }

    fn pipeline_section(&self, lines: &mut Vec<String>, p: &PipelineWithWorkflows) {
        let pipeline = &p.pipeline;

        lines.push(format!("\n## Pipeline {} ({})", pipeline.number, pipeline.state));
        lines.push(format!("- **ID:** {}", pipeline.id));
        lines.push(format!("- **Created:** {}", timestamp(&pipeline.created_at)));
        lines.push(format!("- **Branch:** {}", branch(pipeline)));
        lines.push(format!(
            "- **Commit:** {} {}",
            short_revision(pipeline),
            commit_subject(pipeline)
        ));
        lines.push(format!(
            "- **Triggered by:** {}",
            pipeline.trigger.actor.login
        ));
        lines.push(format!("- **Workflows:** {}", workflow_statuses(p)));
        lines.push(format!(
            "- **Link:** {}",
            links::pipeline_url(&pipeline.project_slug, pipeline.number)
        ));

        if !pipeline.errors.is_empty() {
            lines.push("- **Errors:**".to_string());
            for error in &pipeline.errors {
                lines.push(format!("  - {}: {}", error.kind, error.message));
            }
        }
        lines.push(String::new());
    }
}

impl Render for MarkdownRenderer {
    fn pipelines(&self, pipelines: &[PipelineWithWorkflows]) -> Result<String> {
        if pipelines.is_empty() {
            return Ok("No pipelines found".to_string());
        }

        let mut lines = Vec::new();
        for pipeline in sorted_pipelines(pipelines) {
            self.pipeline_section(&mut lines, pipeline);
        }
        Ok(lines.join("\n"))
    }

    fn pipeline(&self, pipeline: &PipelineWithWorkflows) -> Result<String> {
        let mut lines = Vec::new();
        self.pipeline_section(&mut lines, pipeline);
        Ok(lines.join("\n"))
    }

    fn workflows(&self, workflows: &[Workflow]) -> Result<String> {
        if workflows.is_empty() {
            return Ok("No workflows found".to_string());
        }

        let mut sorted: Vec<_> = workflows.iter().collect();
        sorted.sort_by_key(|w| w.created_at);

        let mut lines = vec![format!("\n## Pipeline {}\n", sorted[0].pipeline_number)];
        for workflow in sorted {
            lines.push(format!("### {} ({})", workflow.name, workflow.id));
            lines.push(format!("- **Status:** {}", workflow.status));
            lines.push(format!("- **Created:** {}", timestamp(&workflow.created_at)));
            lines.push(format!(
                "- **Duration:** {}",
                duration(Some(workflow.created_at), workflow.stopped_at, self.now)
            ));
            lines.push(format!(
                "- **Link:** {}",
                links::workflow_url(
                    &workflow.project_slug,
                    workflow.pipeline_number,
                    &workflow.id,
                )
            ));
            lines.push(String::new());
        }
        Ok(lines.join("\n"))
    }

    fn jobs(&self, workflows: &[WorkflowWithJobs]) -> Result<String> {
        if workflows.is_empty() {
            return Ok("No jobs found".to_string());
        }

        let mut sorted: Vec<_> = workflows.iter().collect();
        sorted.sort_by_key(|w| w.workflow.created_at);

        let mut lines = Vec::new();
        for WorkflowWithJobs {
            workflow,
            jobs,
            job_counts_by_status,
        } in sorted
        {
            lines.push(format!("\n## Workflow: {} ({})", workflow.name, workflow.id));
            lines.push(format!("Jobs: {}\n", job_summary(job_counts_by_status)));

            if jobs.is_empty() {
                lines.push("No jobs matching filter".to_string());
            } else {
                let mut table = create_markdown_table();
                table.set_header(vec!["Number", "Name", "Status", "Started", "Duration", "Link"]);
                for job in sorted_jobs(jobs) {
                    let link = job
                        .job_number
                        .map(|number| {
                            links::job_url(
                                &job.project_slug,
                                workflow.pipeline_number,
                                &workflow.id,
                                number,
                            )
                        })
                        .unwrap_or_default();
                    table.add_row(vec![
                        job.job_number.map(|n| n.to_string()).unwrap_or_default(),
                        job.name.clone(),
                        job.status.to_string(),
                        job.started_at.as_ref().map(timestamp).unwrap_or_default(),
                        duration(job.started_at, job.stopped_at, self.now),
                        link,
                    ]);
                }
                lines.push(table.to_string());
            }
            lines.push(String::new());
        }
        Ok(lines.join("\n"))
    }

    fn job_details(&self, job: &JobDetailsWithSteps) -> Result<String> {
        let details = &job.details;
        let started = details.started_at.as_ref().map(timestamp);

        let mut lines = vec![
            format!("\n## Job {}", details.number),
            format!("- **Name:** {}", details.name),
            format!("- **Status:** {}", details.status),
            format!("- **Started:** {}", started.unwrap_or_default()),
            format!("- **Duration:** {}", duration_ms(details.duration)),
            format!("- **Parallelism:** {}", details.parallelism),
            format!("- **Link:** {}", details.web_url),
        ];

        for (action_index, step_actions) in &job.steps_by_action_index {
            if details.parallelism > 1 {
                let run_duration =
                    parallel_run_duration(step_actions.iter().map(|sa| &sa.action), self.now);
                lines.push(format!("\n### Parallel Run {action_index} ({run_duration})\n"));
            } else {
                lines.push("\n### Steps\n".to_string());
            }

            if step_actions.is_empty() {
                lines.push("No steps matching filter".to_string());
                continue;
            }

            let mut table = create_markdown_table();
            table.set_header(vec!["Step", "Name", "Status", "Duration"]);
            for step_action in step_actions {
                let action = &step_action.action;
                table.add_row(vec![
                    step_action.step_index.to_string(),
                    step_action.step_name.clone(),
                    action.status.clone(),
                    duration(action.start_time, action.end_time, self.now),
                ]);
            }
            lines.push(table.to_string());
        }
        lines.push(String::new());
        Ok(lines.join("\n"))
    }

    fn job_output(&self, messages: &[JobOutputMessage], extract_summary: bool) -> Result<String> {
        if messages.is_empty() {
            return Ok("No output found".to_string());
        }

        let mut lines = Vec::new();
        for prepared in prepare_messages(messages, extract_summary) {
            lines.push(format!("\n## {}\n", prepared.title()));
            lines.push(strip_ansi_codes(prepared.text.trim()).into_owned());
            lines.push(String::new());
        }
        Ok(lines.join("\n"))
    }

    fn job_tests(&self, tests: &[JobTestMetadata], include_messages: bool) -> Result<String> {
        if tests.is_empty() {
            return Ok("No tests found".to_string());
        }

        let mut lines = Vec::new();
        for (file, by_classname) in group_tests(tests) {
            let mut failed = Vec::new();
            lines.push(format!("\n## File: {file}\n"));

            for (classname, class_tests) in by_classname {
                failed.extend(class_tests.iter().copied().filter(|t| is_failure(t)));
                lines.push(format!("### {classname}\n"));

                let mut table = create_markdown_table();
                table.set_header(vec!["Result", "Name", "Duration"]);
                for test in class_tests {
                    table.add_row(vec![
                        test.result.to_string(),
                        test.name.clone(),
                        format!("{:.2}s", test.run_time),
                    ]);
                }
                lines.push(table.to_string());
                lines.push(String::new());
            }

            if include_messages && !failed.is_empty() {
                lines.push("### Failure Messages\n".to_string());
                for test in failed {
                    lines.push(format!("**{}**", test.name));
                    lines.push(
                        test.message
                            .clone()
                            .unwrap_or_else(|| "(no message)".to_string()),
                    );
                    lines.push(String::new());
                }
            }
        }
        Ok(lines.join("\n"))
    }

    fn failed_tests(
        &self,
        workflows: &[WorkflowFailedTests],
        view: FailedTestsView,
    ) -> Result<String> {
        let mut lines = Vec::new();

        for WorkflowFailedTests {
            workflow,
            failed_tests,
        } in workflows
        {
            if failed_tests.is_empty() {
                lines.push(format!("No failed tests found in workflow {}", workflow.name));
                continue;
            }

            lines.push(format!("\n## Workflow: {} ({})", workflow.name, workflow.id));
            lines.push(format!("- **Status:** {}", workflow.status));
            lines.push(format!(
                "- **Failed tests:** {}",
                failed_test_count(failed_tests)
            ));
            lines.push(format!(
                "- **Link:** {}",
                links::workflow_url(
                    &workflow.project_slug,
                    workflow.pipeline_number,
                    &workflow.id,
                )
            ));
            lines.push(String::new());

            for (file, by_classname) in failed_tests {
                let file_count: usize = by_classname.values().map(|by_name| by_name.len()).sum();
                lines.push(format!("- {} [{file_count} fails]", file_label(file)));

                if view.unique == Some(UniqueLevel::File) {
                    if view.include_jobs {
                        let jobs = unique_jobs(by_classname.values().flatten().flat_map(|(_, j)| j));
                        lines.push(format!("  - Jobs: {}", format_jobs(jobs)));
                    }
                    continue;
                }

                for (classname, by_name) in by_classname {
                    lines.push(format!("  - {classname} [{} fails]", by_name.len()));

                    if view.unique == Some(UniqueLevel::Classname) {
                        if view.include_jobs {
                            let jobs = unique_jobs(by_name.values().flatten());
                            lines.push(format!("    - Jobs: {}", format_jobs(jobs)));
                        }
                        continue;
                    }

                    for (name, jobs) in by_name {
                        lines.push(format!("    - {name}"));
                        if view.include_jobs {
                            lines.push(format!("      - Jobs: {}", format_jobs(jobs)));
                        }
                    }
                }
            }
        }

        if lines.is_empty() {
            return Ok("No failed tests found".to_string());
        }
        Ok(lines.join("\n"))
    }
}
