use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading error: {0}")]
    Load(String),
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("Unknown theme: {0}")]
    UnknownTheme(String),
    #[error("Word catalogue is empty")]
    EmptyCatalogue,
    #[error("Failed to read word file {path}: {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to fetch word list from {url}: {source}")]
    HttpFetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Failed to parse word list: {0}")]
    Parse(String),
    #[error("Word source configuration error: {0}")]
    Config(String),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Word content error: {0}")]
    Content(#[from] ContentError),
    #[error("Storage error: {0}")]
    Store(#[from] crate::store::StoreError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
