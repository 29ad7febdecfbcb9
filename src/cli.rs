use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{info, warn, LevelFilter};

use crate::config::{AppConfig, ConfigOverrides, FileConfig, Vcs};
use crate::output::{self, FailedTestsView, OutputFormat, Render, Spinner, UniqueLevel};
use crate::providers::circleci::types::{JobStatus, JobTestResult};
use crate::providers::circleci::{
    BranchSelector, Cache, CacheManager, CircleCIClient, CircleCIProvider, DiskCache, NullCache,
    PipelineRef,
};
use crate::status_filter::{StatusFilter, TEST_RESULT_ALIASES};

#[derive(Parser)]
#[command(name = "circle")]
#[command(author, version, about = "CircleCI CLI for viewing pipelines, workflows and jobs", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    project: ProjectArgs,

    /// Bypass the local response cache
    #[arg(long, global = true, default_value_t = false)]
    no_cache: bool,

    #[arg(short = 'f', long, global = true, value_enum, default_value_t = OutputFormat::Pretty)]
    output_format: OutputFormat,

    /// Log level; RUST_LOG takes precedence
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Warn)]
    log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Self::Error,
            LogLevel::Warn => Self::Warn,
            LogLevel::Info => Self::Info,
            LogLevel::Debug => Self::Debug,
            LogLevel::Trace => Self::Trace,
        }
    }
}

#[derive(Args)]
struct ProjectArgs {
    /// CircleCI personal API token
    #[arg(long, global = true, env = "CIRCLE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[arg(long, global = true, env = "CIRCLE_VCS", value_enum)]
    vcs: Option<Vcs>,

    /// Organization (GitHub org or Bitbucket workspace)
    #[arg(long, global = true, env = "CIRCLE_ORG")]
    org: Option<String>,

    #[arg(long, global = true, env = "CIRCLE_REPO")]
    repo: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show pipelines
    #[command(subcommand)]
    Pipelines(PipelineCommands),

    /// Show workflows
    #[command(subcommand)]
    Workflows(WorkflowCommands),

    /// Show jobs, their steps, output and test results
    #[command(subcommand)]
    Jobs(JobCommands),

    /// Show test results across jobs
    #[command(subcommand)]
    Tests(TestCommands),

    /// Inspect or clean the local response cache
    #[command(subcommand)]
    Cache(CacheCommands),
}

#[derive(Subcommand)]
enum PipelineCommands {
    /// Show recent pipelines for a branch
    List {
        /// Branch name, `@current` for the checked out branch or `@any` for your own pipelines
        #[arg(short, long)]
        branch: Option<String>,

        /// Number of pipelines to show
        #[arg(short = 'n', long = "number", default_value_t = 3)]
        n: usize,
    },

    /// Show the latest pipeline for a branch
    Latest {
        #[arg(short, long)]
        branch: Option<String>,
    },

    /// Show a pipeline by ID or number
    Show { pipeline: String },
}

#[derive(Subcommand)]
enum WorkflowCommands {
    /// Show workflows for a pipeline
    List {
        /// Pipeline ID or number; defaults to the latest pipeline of the current branch
        #[arg(short, long)]
        pipeline: Option<String>,
    },
}

#[derive(Subcommand)]
enum JobCommands {
    /// Show jobs for workflows
    List {
        #[arg(short, long)]
        pipeline: Option<String>,

        /// Workflow ID(s); can be repeated
        #[arg(short, long = "workflow")]
        workflows: Vec<String>,

        /// Job status to include, or `not:<status>` to exclude; can be repeated
        #[arg(short, long = "status")]
        statuses: Vec<String>,
    },

    /// Show a job and its steps
    Show {
        job_number: u64,

        /// Step status to include, or `not:<status>` to exclude; can be repeated
        #[arg(short, long = "step-status")]
        step_statuses: Vec<String>,
    },

    /// Show the output of one step
    Output {
        job_number: u64,

        /// Step index as listed by `jobs show`
        #[arg(long)]
        step: usize,

        /// Parallel run index; required for parallel jobs
        #[arg(long)]
        parallel_index: Option<u32>,

        /// Reduce output to the pytest short test summary when present
        #[arg(long, default_value_t = false)]
        summary: bool,
    },

    /// Show test results of a job
    Tests {
        job_number: u64,

        /// Test result (`success`, `failed`, `skipped`) or `not:<result>`; can be repeated
        #[arg(short, long = "status")]
        statuses: Vec<String>,

        /// Only tests whose file ends with this suffix
        #[arg(long)]
        file_suffix: Option<String>,

        /// Include failure messages
        #[arg(short, long, default_value_t = false)]
        messages: bool,
    },
}

#[derive(Subcommand)]
enum TestCommands {
    /// Show failed tests of the failed jobs in a pipeline
    Failed {
        #[arg(short, long)]
        pipeline: Option<String>,

        #[arg(short, long = "workflow")]
        workflows: Vec<String>,

        /// Collapse the listing to files or classnames
        #[arg(short, long, value_enum)]
        unique: Option<UniqueLevel>,

        /// List the jobs each test failed in
        #[arg(short, long, default_value_t = false)]
        jobs: bool,
    },
}

#[derive(Subcommand)]
enum CacheCommands {
    /// Show the size of the project cache
    Size,
    /// Remove expired entries
    Prune,
    /// Remove every entry
    Clear,
}

impl Cli {
    pub fn log_level(&self) -> LevelFilter {
        self.log_level.into()
    }

    pub fn output_format(&self) -> OutputFormat {
        self.output_format
    }

    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            token: self.project.token.clone(),
            vcs: self.project.vcs,
            org: self.project.org.clone(),
            repo: self.project.repo.clone(),
        }
    }

    fn build_provider(&self, config: &AppConfig) -> Result<CircleCIProvider> {
        let project_slug = config.project_slug();
        let client = CircleCIClient::new(&config.base_url, config.token()?)
            .context("Failed to create CircleCI client")?;

        let cache: Arc<dyn Cache> = if self.no_cache {
            info!("Cache disabled");
            Arc::new(NullCache)
        } else {
            match DiskCache::new(&project_slug, config.cache_size_limit_mb) {
                Ok(cache) => Arc::new(cache),
                Err(e) => {
                    warn!("Cache unavailable, continuing without it: {e}");
                    Arc::new(NullCache)
                }
            }
        };

        Ok(CircleCIProvider::new(
            project_slug,
            Arc::new(client),
            CacheManager::new(cache, config.ttl_policy),
        ))
    }

    pub async fn execute(&self) -> Result<()> {
        let cwd = std::env::current_dir().context("Failed to determine working directory")?;
        let config = AppConfig::resolve(self.overrides(), FileConfig::load(&cwd)?)?;

        if let Commands::Cache(command) = &self.command {
            return execute_cache(command, &config);
        }

        let provider = self.build_provider(&config)?;
        let renderer = output::renderer(self.output_format);

        let spinner = Spinner::start("Fetching from CircleCI");
        let rendered = self.render(&provider, renderer.as_ref()).await;
        spinner.finish();
        provider.flush_cache();

        println!("{}", rendered?);
        Ok(())
    }

    async fn render(&self, provider: &CircleCIProvider, renderer: &dyn Render) -> Result<String> {
        let rendered = match &self.command {
            Commands::Pipelines(command) => match command {
                PipelineCommands::List { branch, n } => {
                    let branch = BranchSelector::parse(branch.as_deref());
                    renderer.pipelines(&provider.get_latest_pipelines(&branch, *n).await?)?
                }
                PipelineCommands::Latest { branch } => {
                    let branch = BranchSelector::parse(branch.as_deref());
                    match provider.get_latest_pipeline(&branch).await? {
                        Some(pipeline) => {
                            let pipeline = PipelineRef::Id(pipeline.id);
                            renderer.pipeline(&provider.get_pipeline(&pipeline).await?)?
                        }
                        None => renderer.pipelines(&[])?,
                    }
                }
                PipelineCommands::Show { pipeline } => {
                    renderer.pipeline(&provider.get_pipeline(&PipelineRef::parse(pipeline)).await?)?
                }
            },
            Commands::Workflows(WorkflowCommands::List { pipeline }) => {
                let pipeline = pipeline.as_deref().map(PipelineRef::parse);
                renderer.workflows(&provider.get_pipeline_workflows(pipeline.as_ref()).await?)?
            }
            Commands::Jobs(command) => self.render_jobs(command, provider, renderer).await?,
            Commands::Tests(TestCommands::Failed {
                pipeline,
                workflows,
                unique,
                jobs,
            }) => {
                let pipeline = pipeline.as_deref().map(PipelineRef::parse);
                let failed_tests = provider
                    .get_failed_tests(pipeline.as_ref(), workflows)
                    .await?;
                renderer.failed_tests(
                    &failed_tests,
                    FailedTestsView {
                        unique: *unique,
                        include_jobs: *jobs,
                    },
                )?
            }
            Commands::Cache(_) => anyhow::bail!("cache commands do not query the API"),
        };

        Ok(rendered)
    }

    async fn render_jobs(
        &self,
        command: &JobCommands,
        provider: &CircleCIProvider,
        renderer: &dyn Render,
    ) -> Result<String> {
        let rendered = match command {
            JobCommands::List {
                pipeline,
                workflows,
                statuses,
            } => {
                let pipeline = pipeline.as_deref().map(PipelineRef::parse);
                let statuses = parse_filter::<JobStatus>(statuses, &[])?;
                let jobs = provider
                    .get_workflow_jobs(pipeline.as_ref(), workflows, statuses.as_ref())
                    .await?;
                renderer.jobs(&jobs)?
            }
            JobCommands::Show {
                job_number,
                step_statuses,
            } => {
                let step_statuses = parse_filter::<String>(step_statuses, &[])?;
                let details = provider
                    .get_job_details(*job_number, step_statuses.as_ref())
                    .await?;
                renderer.job_details(&details)?
            }
            JobCommands::Output {
                job_number,
                step,
                parallel_index,
                summary,
            } => {
                let output = provider
                    .get_job_output(*job_number, *step, *parallel_index)
                    .await?;
                renderer.job_output(&output, *summary)?
            }
            JobCommands::Tests {
                job_number,
                statuses,
                file_suffix,
                messages,
            } => {
                let statuses = parse_filter::<JobTestResult>(statuses, TEST_RESULT_ALIASES)?;
                let tests = provider
                    .get_job_tests(*job_number, statuses.as_ref(), file_suffix.as_deref())
                    .await?;
                renderer.job_tests(&tests, *messages)?
            }
        };

        Ok(rendered)
    }
}

/// `None` when no values were given, so that an absent filter is distinguishable from an empty one.
fn parse_filter<T>(
    values: &[String],
    aliases: &[(&str, &str)],
) -> crate::error::Result<Option<StatusFilter<T>>>
where
    T: Eq + std::hash::Hash + std::str::FromStr,
    T::Err: std::fmt::Display,
{
    if values.is_empty() {
        return Ok(None);
    }
    StatusFilter::parse(values, aliases).map(Some)
}

fn execute_cache(command: &CacheCommands, config: &AppConfig) -> Result<()> {
    let cache = DiskCache::new(&config.project_slug(), config.cache_size_limit_mb)
        .context("Failed to open cache")?;

    match command {
        CacheCommands::Size => {
            let bytes = cache.size();
            println!(
                "{} bytes ({:.2} MB) in {}",
                bytes,
                bytes as f64 / (1024.0 * 1024.0),
                cache.path().display()
            );
        }
        CacheCommands::Prune => {
            let removed = cache.prune();
            println!("Removed {removed} expired entries");
        }
        CacheCommands::Clear => {
            cache.clear();
            println!("Cache cleared");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_command_tree_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "circle",
            "jobs",
            "list",
            "--org",
            "acme",
            "--repo",
            "widgets",
            "-w",
            "wf-1",
            "-w",
            "wf-2",
            "--status",
            "not:success",
            "--output-format",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.output_format(), OutputFormat::Json);
        let overrides = cli.overrides();
        assert_eq!(overrides.org.as_deref(), Some("acme"));
        match cli.command {
            Commands::Jobs(JobCommands::List {
                workflows,
                statuses,
                ..
            }) => {
                assert_eq!(workflows, vec!["wf-1", "wf-2"]);
                assert_eq!(statuses, vec!["not:success"]);
            }
            _ => panic!("expected jobs list"),
        }
    }

    #[test]
    fn test_pipelines_list_defaults() {
        let cli = Cli::try_parse_from(["circle", "pipelines", "list"]).unwrap();

        assert_eq!(cli.log_level(), LevelFilter::Warn);
        assert!(!cli.no_cache);
        match cli.command {
            Commands::Pipelines(PipelineCommands::List { branch, n }) => {
                assert_eq!(branch, None);
                assert_eq!(n, 3);
            }
            _ => panic!("expected pipelines list"),
        }
    }

    #[test]
    fn test_jobs_output_requires_step() {
        assert!(Cli::try_parse_from(["circle", "jobs", "output", "12"]).is_err());
    }

    #[test]
    fn test_parse_filter() {
        assert_eq!(parse_filter::<JobStatus>(&[], &[]).unwrap(), None);

        let filter = parse_filter::<JobTestResult>(&["failed".to_string()], TEST_RESULT_ALIASES)
            .unwrap()
            .unwrap();
        assert!(filter.matches(&JobTestResult::Failure));
        assert!(!filter.matches(&JobTestResult::Success));

        assert!(parse_filter::<JobStatus>(&["exploded".to_string()], &[]).is_err());
    }
}
