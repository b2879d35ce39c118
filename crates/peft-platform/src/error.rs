use peft_training::TuneError;
use thiserror::Error;

pub type PlatformResult<T> = std::result::Result<T, PlatformError>;

/// Errors surfaced by control-plane calls.
///
/// Remote failures carry the platform's own status and message unmodified;
/// nothing here is retried.
#[derive(Error, Debug)]
pub enum PlatformError {
    /// The request never produced a response (DNS, TLS, connection reset).
    #[error("Request Error: {0}")]
    RequestError(String),

    /// The platform answered with a non-success status.
    #[error("API Error ({status}): {message}")]
    Api { status: u16, message: String },

    /// A response body did not match the expected shape.
    #[error("Serialization Error: {0}")]
    SerializationError(String),

    /// A training job reached a terminal state other than success.
    #[error("job {job} ended in {state}{}", message.as_ref().map(|m| format!(": {m}")).unwrap_or_default())]
    JobFailed { job: String, state: String, message: Option<String> },

    /// A long-running operation finished with an error.
    #[error("operation {name} failed: {message}")]
    OperationFailed { name: String, message: String },

    #[error("timed out after {seconds}s waiting for {what}")]
    Timeout { what: String, seconds: u64 },

    /// The call was rejected locally before reaching the platform.
    #[error("Invalid Request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Config(#[from] TuneError),
}

impl PlatformError {
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { status: 404, .. })
    }
}
