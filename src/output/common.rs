//! Formatting shared by the pretty and markdown renderers.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::providers::circleci::types::{
    Job, JobOutputMessage, JobStatus, JobTestMetadata, JobTestResult, Pipeline, V1JobAction,
};
use crate::providers::circleci::{FailedTestJobInfo, FailedTests, PipelineWithWorkflows};
use crate::summary::try_extract_summary;

pub fn timestamp(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Whole seconds between `start` and `stop`; an open interval is measured up to `now`.
pub fn duration(
    start: Option<DateTime<Utc>>,
    stop: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> String {
    let Some(start) = start else {
        return String::new();
    };
    match stop {
        Some(stop) => format!("{}s", (stop - start).num_seconds()),
        None => format!("{}s (running)", (now - start).num_seconds()),
    }
}

pub fn duration_ms(duration_ms: Option<u64>) -> String {
    duration_ms
        .map(|ms| format!("{}s", ms / 1000))
        .unwrap_or_default()
}

/// Wall time of a parallel run: earliest start to latest end, still running if any action is.
pub fn parallel_run_duration<'a>(
    actions: impl IntoIterator<Item = &'a V1JobAction>,
    now: DateTime<Utc>,
) -> String {
    let actions: Vec<_> = actions.into_iter().collect();
    let Some(earliest_start) = actions.iter().filter_map(|a| a.start_time).min() else {
        return String::new();
    };

    let latest_end = if actions.iter().any(|a| a.end_time.is_none()) {
        None
    } else {
        actions.iter().filter_map(|a| a.end_time).max()
    };

    duration(Some(earliest_start), latest_end, now)
}

/// e.g. "2 running, 5 success, 1 failed, 3 other".
pub fn job_summary(counts: &BTreeMap<JobStatus, usize>) -> String {
    let total: usize = counts.values().sum();
    if total == 0 {
        return "no jobs".to_string();
    }

    let count = |status| counts.get(&status).copied().unwrap_or(0);
    let running = count(JobStatus::Running);
    let success = count(JobStatus::Success);
    let failed = count(JobStatus::Failed);
    let other = total - running - success - failed;

    [
        (running, "running"),
        (success, "success"),
        (failed, "failed"),
        (other, "other"),
    ]
    .into_iter()
    .filter(|(n, _)| *n > 0)
    .map(|(n, label)| format!("{n} {label}"))
    .collect::<Vec<_>>()
    .join(", ")
}

pub fn commit_subject(pipeline: &Pipeline) -> &str {
    pipeline
        .vcs
        .as_ref()
        .and_then(|vcs| vcs.commit.as_ref())
        .and_then(|commit| commit.subject.as_deref())
        .unwrap_or_default()
}

pub fn short_revision(pipeline: &Pipeline) -> &str {
    pipeline
        .vcs
        .as_ref()
        .map(|vcs| vcs.revision.get(..7).unwrap_or(vcs.revision.as_str()))
        .unwrap_or("unknown")
}

pub fn branch(pipeline: &Pipeline) -> &str {
    pipeline
        .vcs
        .as_ref()
        .and_then(|vcs| vcs.branch.as_deref().or(vcs.tag.as_deref()))
        .unwrap_or("unknown")
}

/// "build: success, deploy: on_hold" in creation order.
pub fn workflow_statuses(pipeline: &PipelineWithWorkflows) -> String {
    let mut workflows: Vec<_> = pipeline.workflows.iter().collect();
    workflows.sort_by_key(|w| w.created_at);
    workflows
        .iter()
        .map(|w| format!("{}: {}", w.name, w.status))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Newest first.
pub fn sorted_pipelines(pipelines: &[PipelineWithWorkflows]) -> Vec<&PipelineWithWorkflows> {
    let mut sorted: Vec<_> = pipelines.iter().collect();
    sorted.sort_by(|a, b| b.pipeline.created_at.cmp(&a.pipeline.created_at));
    sorted
}

/// Failures first, then active jobs, then successes; stable within a group.
pub fn sorted_jobs(jobs: &[Job]) -> Vec<&Job> {
    let mut sorted: Vec<_> = jobs.iter().collect();
    sorted.sort_by_key(|job| job.status.display_priority());
    sorted
}

pub type TestsByFile<'a> = BTreeMap<&'a str, BTreeMap<&'a str, Vec<&'a JobTestMetadata>>>;

/// Tests grouped by file and classname, each group sorted by test name.
pub fn group_tests(tests: &[JobTestMetadata]) -> TestsByFile<'_> {
    let mut grouped = TestsByFile::new();
    for test in tests {
        grouped
            .entry(test.file.as_deref().unwrap_or_default())
            .or_default()
            .entry(test.classname.as_str())
            .or_default()
            .push(test);
    }
    for by_classname in grouped.values_mut() {
        for tests in by_classname.values_mut() {
            tests.sort_by(|a, b| a.name.cmp(&b.name));
        }
    }
    grouped
}

pub fn is_failure(test: &JobTestMetadata) -> bool {
    test.result == JobTestResult::Failure
}

/// A job output message ready for display, with line endings normalised and,
/// when requested, reduced to its pytest summary.
pub struct PreparedMessage<'a> {
    pub message: &'a JobOutputMessage,
    pub text: String,
    pub is_summary: bool,
}

impl PreparedMessage<'_> {
    pub fn title(&self) -> String {
        let mut title = self.message.kind.clone();
        if self.message.truncated {
            title.push_str(" (truncated)");
        }
        if self.is_summary {
            title.push_str(" (summary)");
        }
        title
    }
}

/// Messages in time order.
pub fn prepare_messages(
    messages: &[JobOutputMessage],
    extract_summary: bool,
) -> Vec<PreparedMessage<'_>> {
    let mut sorted: Vec<_> = messages.iter().collect();
    sorted.sort_by_key(|message| message.time);

    sorted
        .into_iter()
        .map(|message| {
            let text = message
                .message
                .replace("\r\r\n", "\n")
                .replace("\r\n", "\n");
            let summary = extract_summary.then(|| try_extract_summary(&text));
            match summary.flatten() {
                Some(summary) => PreparedMessage {
                    message,
                    text: summary,
                    is_summary: true,
                },
                None => PreparedMessage {
                    message,
                    text,
                    is_summary: false,
                },
            }
        })
        .collect()
}

pub fn failed_test_count(failed_tests: &FailedTests) -> usize {
    failed_tests
        .values()
        .flat_map(|by_classname| by_classname.values())
        .map(|by_name| by_name.len())
        .sum()
}

/// Distinct jobs by number, first occurrence wins.
pub fn unique_jobs<'a>(
    jobs: impl IntoIterator<Item = &'a FailedTestJobInfo>,
) -> Vec<&'a FailedTestJobInfo> {
    let mut seen = std::collections::HashSet::new();
    jobs.into_iter()
        .filter(|job| seen.insert(job.job_number))
        .collect()
}

pub fn format_jobs<'a>(jobs: impl IntoIterator<Item = &'a FailedTestJobInfo>) -> String {
    jobs.into_iter()
        .map(|job| format!("{} (#{})", job.job_name, job.job_number))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn file_label(file: &str) -> &str {
    if file.is_empty() {
        "(no file)"
    } else {
        file
    }
}
