use thiserror::Error;

pub type TuneResult<T> = std::result::Result<T, TuneError>;

#[derive(Debug, Error)]
pub enum TuneError {
    #[error("invalid fine-tune request: {0}")]
    InvalidSpec(String),

    #[error("unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    #[error("missing required setting: {0}")]
    MissingConfig(String),

    #[error("config file error: {0}")]
    Config(String),

    #[error("run manifest error: {0}")]
    Manifest(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
