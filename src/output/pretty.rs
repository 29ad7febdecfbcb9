use chrono::{DateTime, Utc};
use comfy_table::Cell;

use super::common::{
    branch, commit_subject, duration, duration_ms, failed_test_count, file_label, format_jobs,
    group_tests, is_failure, job_summary, parallel_run_duration, prepare_messages, short_revision,
    sorted_jobs, sorted_pipelines, timestamp, unique_jobs,
};
use super::styling::{bold, bright_red, cyan, dim, status};
use super::tables::{create_table, link_cell, status_cell};
use super::{FailedTestsView, Render, UniqueLevel};
use crate::error::Result;
use crate::providers::circleci::links;
use crate::providers::circleci::types::{JobOutputMessage, JobTestMetadata, Workflow};
use crate::providers::circleci::{
    JobDetailsWithSteps, PipelineWithWorkflows, WorkflowFailedTests, WorkflowWithJobs,
};

pub struct PrettyRenderer {
    now: DateTime<Utc>,
}

impl PrettyRenderer {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now }
    }

    fn workflow_table<'a>(&self, workflows: impl IntoIterator<Item = &'a Workflow>) -> String {
        let mut table = create_table();
        table.set_header(vec!["Workflow", "Status", "Created", "Duration", "Link"]);
        for workflow in workflows {
            table.add_row(vec![
                Cell::new(&workflow.name),
                status_cell(workflow.status),
                Cell::new(timestamp(&workflow.created_at)),
                Cell::new(duration(Some(workflow.created_at), workflow.stopped_at, self.now)),
                link_cell(&links::workflow_url(
                    &workflow.project_slug,
                    workflow.pipeline_number,
                    &workflow.id,
                )),
            ]);
        }
        table.to_string()
    }
}

fn field(label: &str, value: impl std::fmt::Display) -> String {
    format!("  {} {value}", dim(format!("{label}:")))
}

impl Render for PrettyRenderer {
    fn pipelines(&self, pipelines: &[PipelineWithWorkflows]) -> Result<String> {
        if pipelines.is_empty() {
            return Ok(dim("No pipelines found").to_string());
        }

        let mut table = create_table();
        table.set_header(vec![
            "Pipeline", "State", "Created", "Branch", "Commit", "Workflows", "Link",
        ]);

        for PipelineWithWorkflows {
            pipeline,
            workflows,
        } in sorted_pipelines(pipelines)
        {
            let mut workflows: Vec<_> = workflows.iter().collect();
            workflows.sort_by_key(|w| w.created_at);
            let workflow_statuses = workflows
                .iter()
                .map(|w| format!("{} {}", w.name, status(w.status)))
                .collect::<Vec<_>>()
                .join("\n");

            table.add_row(vec![
                Cell::new(pipeline.number),
                status_cell(pipeline.state),
                Cell::new(timestamp(&pipeline.created_at)),
                Cell::new(branch(pipeline)),
                Cell::new(format!(
                    "{} {}",
                    short_revision(pipeline),
                    commit_subject(pipeline)
                )),
                Cell::new(workflow_statuses),
                link_cell(&links::pipeline_url(&pipeline.project_slug, pipeline.number)),
            ]);
        }

        Ok(table.to_string())
    }

    fn pipeline(&self, p: &PipelineWithWorkflows) -> Result<String> {
        let pipeline = &p.pipeline;

        let mut lines = vec![
            format!(
                "{} {}",
                bold(format!("Pipeline {}", pipeline.number)),
                status(pipeline.state)
            ),
            field("ID", &pipeline.id),
            field("Created", timestamp(&pipeline.created_at)),
            field("Branch", branch(pipeline)),
            field(
                "Commit",
                format!("{} {}", short_revision(pipeline), commit_subject(pipeline)),
            ),
            field("Triggered by", &pipeline.trigger.actor.login),
            field(
                "Link",
                cyan(links::pipeline_url(&pipeline.project_slug, pipeline.number)),
            ),
        ];

        for error in &pipeline.errors {
            let message = format!("{}: {}", error.kind, error.message);
            lines.push(field("Error", bright_red(message)));
        }

        let mut workflows: Vec<_> = p.workflows.iter().collect();
        workflows.sort_by_key(|w| w.created_at);
        if !workflows.is_empty() {
            lines.push(String::new());
            lines.push(self.workflow_table(workflows));
        }

        Ok(lines.join("\n"))
    }

    fn workflows(&self, workflows: &[Workflow]) -> Result<String> {
        if workflows.is_empty() {
            return Ok(dim("No workflows found").to_string());
        }

        let mut sorted: Vec<_> = workflows.iter().collect();
        sorted.sort_by_key(|w| w.created_at);
        Ok(self.workflow_table(sorted))
    }

    fn jobs(&self, workflows: &[WorkflowWithJobs]) -> Result<String> {
        if workflows.is_empty() {
            return Ok(dim("No jobs found").to_string());
        }

        let mut sorted: Vec<_> = workflows.iter().collect();
        sorted.sort_by_key(|w| w.workflow.created_at);

        let mut sections = Vec::new();
        for WorkflowWithJobs {
            workflow,
            jobs,
            job_counts_by_status,
        } in sorted
        {
            let header = format!(
                "{} {} {}\n{}",
                bold(&workflow.name),
                status(workflow.status),
                dim(format!("({})", job_summary(job_counts_by_status))),
                dim(&workflow.id)
            );

            if jobs.is_empty() {
                sections.push(format!("{header}\n{}", dim("No jobs matching filter")));
                continue;
            }

            let mut table = create_table();
            table.set_header(vec!["Job", "Name", "Status", "Started", "Duration", "Link"]);
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
                    Cell::new(job.job_number.map(|n| n.to_string()).unwrap_or_default()),
                    Cell::new(&job.name),
                    status_cell(job.status),
                    Cell::new(job.started_at.as_ref().map(timestamp).unwrap_or_default()),
                    Cell::new(duration(job.started_at, job.stopped_at, self.now)),
                    link_cell(&link),
                ]);
            }
            sections.push(format!("{header}\n{table}"));
        }

        Ok(sections.join("\n\n"))
    }

    fn job_details(&self, job: &JobDetailsWithSteps) -> Result<String> {
        let details = &job.details;
        let started = details.started_at.as_ref().map(timestamp);

        let mut lines = vec![
            format!(
                "{} {} {}",
                bold(format!("Job {}", details.number)),
                &details.name,
                status(details.status)
            ),
            field("Started", started.unwrap_or_default()),
            field("Duration", duration_ms(details.duration)),
            field("Parallelism", details.parallelism),
            field("Workflow", &details.latest_workflow.name),
            field("Link", cyan(&details.web_url)),
        ];

        for (action_index, step_actions) in &job.steps_by_action_index {
            lines.push(String::new());
            if details.parallelism > 1 {
                let run_duration =
                    parallel_run_duration(step_actions.iter().map(|sa| &sa.action), self.now);
                let header = format!("Parallel run {action_index} ({run_duration})");
                lines.push(bold(header).to_string());
            }

            if step_actions.is_empty() {
                lines.push(dim("No steps matching filter").to_string());
                continue;
            }

            let mut table = create_table();
            table.set_header(vec!["Step", "Name", "Status", "Duration"]);
            for step_action in step_actions {
                let action = &step_action.action;
                table.add_row(vec![
                    Cell::new(step_action.step_index),
                    Cell::new(&step_action.step_name),
                    status_cell(&action.status),
                    Cell::new(duration(action.start_time, action.end_time, self.now)),
                ]);
            }
            lines.push(table.to_string());
        }

        Ok(lines.join("\n"))
    }

    fn job_output(&self, messages: &[JobOutputMessage], extract_summary: bool) -> Result<String> {
        if messages.is_empty() {
            return Ok(dim("No output found").to_string());
        }

        Ok(prepare_messages(messages, extract_summary)
            .into_iter()
            .map(|prepared| format!("{}\n{}", bold(prepared.title()), prepared.text.trim_end()))
            .collect::<Vec<_>>()
            .join("\n\n"))
    }

    fn job_tests(&self, tests: &[JobTestMetadata], include_messages: bool) -> Result<String> {
        if tests.is_empty() {
            return Ok(dim("No tests found").to_string());
        }

        let mut sections = Vec::new();
        for (file, by_classname) in group_tests(tests) {
            let mut table = create_table();
            table.set_header(vec!["Class", "Name", "Result", "Duration"]);

            let mut failed = Vec::new();
            for (classname, class_tests) in by_classname {
                for test in class_tests {
                    if is_failure(test) {
                        failed.push(test);
                    }
                    table.add_row(vec![
                        Cell::new(classname),
                        Cell::new(&test.name),
                        status_cell(test.result),
                        Cell::new(format!("{:.2}s", test.run_time)),
                    ]);
                }
            }

            let mut section = format!("{}\n{table}", bold(file_label(file)));
            if include_messages {
                for test in failed {
                    section.push_str(&format!(
                        "\n{}\n{}",
                        bright_red(&test.name),
                        test.message.as_deref().unwrap_or("(no message)")
                    ));
                }
            }
            sections.push(section);
        }

        Ok(sections.join("\n\n"))
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
            if !lines.is_empty() {
                lines.push(String::new());
            }
            lines.push(format!(
                "{} {} {}",
                bold(&workflow.name),
                status(workflow.status),
                dim(format!("({} failed tests)", failed_test_count(failed_tests)))
            ));
            lines.push(format!(
                "  {}",
                cyan(links::workflow_url(
                    &workflow.project_slug,
                    workflow.pipeline_number,
                    &workflow.id,
                ))
            ));

            for (file, by_classname) in failed_tests {
                let file_count: usize = by_classname.values().map(|by_name| by_name.len()).sum();
                lines.push(format!(
                    "  {} {}",
                    file_label(file),
                    dim(format!("[{file_count}]"))
                ));

                if view.unique == Some(UniqueLevel::File) {
                    if view.include_jobs {
                        let jobs = unique_jobs(by_classname.values().flatten().flat_map(|(_, j)| j));
                        lines.push(format!("    {}", dim(format_jobs(jobs))));
                    }
                    continue;
                }

                for (classname, by_name) in by_classname {
                    lines.push(format!("    {classname} {}", dim(format!("[{}]", by_name.len()))));

                    if view.unique == Some(UniqueLevel::Classname) {
                        if view.include_jobs {
                            let jobs = unique_jobs(by_name.values().flatten());
                            lines.push(format!("      {}", dim(format_jobs(jobs))));
                        }
                        continue;
                    }

                    for (name, jobs) in by_name {
                        lines.push(format!("      {}", bright_red(name)));
                        if view.include_jobs {
                            lines.push(format!("        {}", dim(format_jobs(jobs))));
                        }
                    }
                }
            }
        }

        if lines.is_empty() {
            return Ok(dim("No failed tests found").to_string());
        }
        Ok(lines.join("\n"))
    }
}
