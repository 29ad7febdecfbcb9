use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::CircleError;
use crate::providers::circleci::{TtlPolicy, DEFAULT_BASE_URL};

/// Config file names, in lookup order within a directory.
const CONFIG_FILE_NAMES: [&str; 4] = [
    ".circle-cli.toml",
    ".circle-cli.json",
    ".circle-cli.yaml",
    ".circle-cli.yml",
];

const DEFAULT_CACHE_SIZE_LIMIT_MB: u64 = 100;
const DEFAULT_IN_PROGRESS_TTL_SECONDS: u64 = 5;
const DEFAULT_FINISHED_TTL_DAYS: u64 = 14;

/// Version control provider hosting the project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Vcs {
    /// GitHub
    #[default]
    #[serde(alias = "github")]
    Gh,
    /// Bitbucket
    #[serde(alias = "bitbucket")]
    Bb,
}

impl Vcs {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gh => "gh",
            Self::Bb => "bb",
        }
    }
}

/// Contents of a `.circle-cli.*` file. Every field is optional so that a
/// project file can override only part of the home file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FileConfig {
    pub token: Option<String>,
    pub vcs: Option<Vcs>,
    pub org: Option<String>,
    pub repo: Option<String>,
    pub base_url: Option<String>,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CacheConfig {
    pub size_limit_mb: Option<u64>,
    pub in_progress_ttl_seconds: Option<u64>,
    /// `0` keeps finished entries until they are evicted.
    pub finished_ttl_days: Option<u64>,
}

impl FileConfig {
    /// Loads the home config, then the nearest project config above `cwd`,
    /// with project values taking precedence.
    pub fn load(cwd: &Path) -> Result<Self> {
        let home = dirs::home_dir()
            .and_then(|home| find_in_dir(&home))
            .map(|path| Self::load_from_path(&path))
            .transpose()?
            .unwrap_or_default();

        let project = find_project_config(cwd)
            .map(|path| Self::load_from_path(&path))
            .transpose()?
            .unwrap_or_default();

        Ok(home.merge(project))
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
        }
    }

    /// Field-wise merge; values set in `other` win.
    fn merge(self, other: Self) -> Self {
        Self {
            token: other.token.or(self.token),
            vcs: other.vcs.or(self.vcs),
            org: other.org.or(self.org),
            repo: other.repo.or(self.repo),
            base_url: other.base_url.or(self.base_url),
            cache: CacheConfig {
                size_limit_mb: other.cache.size_limit_mb.or(self.cache.size_limit_mb),
                in_progress_ttl_seconds: other
                    .cache
                    .in_progress_ttl_seconds
                    .or(self.cache.in_progress_ttl_seconds),
                finished_ttl_days: other
                    .cache
                    .finished_ttl_days
                    .or(self.cache.finished_ttl_days),
            },
        }
    }
}

fn find_in_dir(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILE_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

/// Searches `start` and its parents, stopping at the first git repository root.
pub fn find_project_config(start: &Path) -> Option<PathBuf> {
    for dir in start.ancestors() {
        if let Some(path) = find_in_dir(dir) {
            return Some(path);
        }
        if dir.join(".git").exists() {
            break;
        }
    }
    None
}

/// Values given on the command line or through `CIRCLE_*` environment variables.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub token: Option<String>,
    pub vcs: Option<Vcs>,
    pub org: Option<String>,
    pub repo: Option<String>,
}

/// Fully resolved settings for one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    token: Option<String>,
    pub vcs: Vcs,
    pub org: String,
    pub repo: String,
    pub base_url: String,
    pub cache_size_limit_mb: u64,
    pub ttl_policy: TtlPolicy,
}

impl AppConfig {
    /// Applies `overrides` on top of `file`.
    ///
    /// # Errors
    ///
    /// Returns [`CircleError::Config`] when the organization or repository is missing,
    /// or when the in-progress TTL is zero.
    pub fn resolve(overrides: ConfigOverrides, file: FileConfig) -> Result<Self> {
        let org = overrides.org.or(file.org).ok_or_else(|| {
            CircleError::Config(
                "organization is not set; use --org, CIRCLE_ORG or `org` in .circle-cli.toml"
                    .into(),
            )
        })?;
        let repo = overrides.repo.or(file.repo).ok_or_else(|| {
            CircleError::Config(
                "repository is not set; use --repo, CIRCLE_REPO or `repo` in .circle-cli.toml"
                    .into(),
            )
        })?;

        let finished_ttl_days = file
            .cache
            .finished_ttl_days
            .unwrap_or(DEFAULT_FINISHED_TTL_DAYS);
        let in_progress_ttl_seconds = file
            .cache
            .in_progress_ttl_seconds
            .unwrap_or(DEFAULT_IN_PROGRESS_TTL_SECONDS);
        if in_progress_ttl_seconds == 0 {
            let message = "cache.in-progress-ttl-seconds must be positive".to_string();
            return Err(CircleError::Config(message).into());
        }

        Ok(Self {
            token: overrides.token.or(file.token),
            vcs: overrides.vcs.or(file.vcs).unwrap_or_default(),
            org,
            repo,
            base_url: file
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            cache_size_limit_mb: file
                .cache
                .size_limit_mb
                .unwrap_or(DEFAULT_CACHE_SIZE_LIMIT_MB),
            ttl_policy: TtlPolicy {
                in_progress: Duration::from_secs(in_progress_ttl_seconds),
                finished: (finished_ttl_days > 0)
                    .then(|| Duration::from_secs(finished_ttl_days * 24 * 60 * 60)),
            },
        })
    }

    /// The CircleCI project slug, e.g. `gh/org/repo`.
    pub fn project_slug(&self) -> String {
        format!("{}/{}/{}", self.vcs.as_str(), self.org, self.repo)
    }

    /// The API token; only commands that reach the API need it.
    ///
    /// # Errors
    ///
    /// Returns [`CircleError::Config`] when no token is configured.
    pub fn token(&self) -> crate::error::Result<&str> {
        self.token.as_deref().ok_or_else(|| {
            CircleError::Config(
                "API token is not set; use --token, CIRCLE_TOKEN or `token` in .circle-cli.toml"
                    .into(),
            )
        })
    }
}
