use thiserror::Error;

#[derive(Error, Debug)]
pub enum CircleError {
    #[error("CircleCI API request to {url} failed with status {status}: {message}")]
    Api {
        url: String,
        status: u16,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("{0}")]
    App(String),

    #[error("Cache error: {0}")]
    Cache(String),
}

impl CircleError {
    pub fn app(message: impl Into<String>) -> Self {
        Self::App(message.into())
    }
}

pub type Result<T> = std::result::Result<T, CircleError>;
