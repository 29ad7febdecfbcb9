mod common;
mod json;
mod markdown;
mod pretty;
mod progress;
mod styling;
mod tables;

use chrono::Utc;

use crate::error::Result;
use crate::providers::circleci::types::{JobOutputMessage, JobTestMetadata, Workflow};
use crate::providers::circleci::{
    JobDetailsWithSteps, PipelineWithWorkflows, WorkflowFailedTests, WorkflowWithJobs,
};

pub use progress::Spinner;
use styling::{dim, magenta_bold};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Coloured tables for a terminal
    #[default]
    Pretty,
    /// Plain markdown, suitable for pasting or for coding agents
    Markdown,
    /// The fetched data as JSON
    Json,
}

/// How far failed tests are collapsed before listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum UniqueLevel {
    File,
    Classname,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FailedTestsView {
    pub unique: Option<UniqueLevel>,
    pub include_jobs: bool,
}

/// One implementation per [`OutputFormat`]. Renderers return the full text
/// rather than printing so that callers decide where it goes.
pub trait Render {
    fn pipelines(&self, pipelines: &[PipelineWithWorkflows]) -> Result<String>;

    fn pipeline(&self, pipeline: &PipelineWithWorkflows) -> Result<String>;

    fn workflows(&self, workflows: &[Workflow]) -> Result<String>;

    fn jobs(&self, workflows: &[WorkflowWithJobs]) -> Result<String>;

    fn job_details(&self, details: &JobDetailsWithSteps) -> Result<String>;

    fn job_output(&self, messages: &[JobOutputMessage], extract_summary: bool) -> Result<String>;

    fn job_tests(&self, tests: &[JobTestMetadata], include_messages: bool) -> Result<String>;

    fn failed_tests(
        &self,
        workflows: &[WorkflowFailedTests],
        view: FailedTestsView,
    ) -> Result<String>;
}

pub fn renderer(format: OutputFormat) -> Box<dyn Render> {
    let now = Utc::now();
    match format {
        OutputFormat::Pretty => Box::new(pretty::PrettyRenderer::new(now)),
        OutputFormat::Markdown => Box::new(markdown::MarkdownRenderer::new(now)),
        OutputFormat::Json => Box::new(json::JsonRenderer),
    }
}

/// Prints the `circle` banner to stderr.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("⭕ circle"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("CircleCI pipelines, workflows and jobs")
    );
}
