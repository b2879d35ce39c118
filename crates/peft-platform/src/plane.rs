//! The control-plane seam.
//!
//! Every remote side effect of a run goes through [`ControlPlane`]. Calls are
//! issued one at a time and awaited before the next; the platform owns all
//! job and endpoint lifecycle state.

use crate::error::{PlatformError, PlatformResult};
use async_trait::async_trait;
use peft_training::{HardwareAllocation, ServingContainer};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Platform job states, named as the REST API reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    #[serde(rename = "JOB_STATE_UNSPECIFIED")]
    Unspecified,
    #[serde(rename = "JOB_STATE_QUEUED")]
    Queued,
    #[serde(rename = "JOB_STATE_PENDING")]
    Pending,
    #[serde(rename = "JOB_STATE_RUNNING")]
    Running,
    #[serde(rename = "JOB_STATE_SUCCEEDED")]
    Succeeded,
    #[serde(rename = "JOB_STATE_FAILED")]
    Failed,
    #[serde(rename = "JOB_STATE_CANCELLING")]
    Cancelling,
    #[serde(rename = "JOB_STATE_CANCELLED")]
    Cancelled,
    #[serde(rename = "JOB_STATE_PAUSED")]
    Paused,
    #[serde(rename = "JOB_STATE_EXPIRED")]
    Expired,
    #[serde(rename = "JOB_STATE_UPDATING")]
    Updating,
    #[serde(rename = "JOB_STATE_PARTIALLY_SUCCEEDED")]
    PartiallySucceeded,
}

impl JobState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::Cancelled | Self::Expired | Self::PartiallySucceeded
        )
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unspecified => "JOB_STATE_UNSPECIFIED",
            Self::Queued => "JOB_STATE_QUEUED",
            Self::Pending => "JOB_STATE_PENDING",
            Self::Running => "JOB_STATE_RUNNING",
            Self::Succeeded => "JOB_STATE_SUCCEEDED",
            Self::Failed => "JOB_STATE_FAILED",
            Self::Cancelling => "JOB_STATE_CANCELLING",
            Self::Cancelled => "JOB_STATE_CANCELLED",
            Self::Paused => "JOB_STATE_PAUSED",
            Self::Expired => "JOB_STATE_EXPIRED",
            Self::Updating => "JOB_STATE_UPDATING",
            Self::PartiallySucceeded => "JOB_STATE_PARTIALLY_SUCCEEDED",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a training job as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStatus {
    pub name: String,
    pub state: JobState,
    pub error: Option<String>,
}

/// A custom training job ready for submission.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomJobSpec {
    pub display_name: String,
    pub image_uri: String,
    pub args: Vec<String>,
    pub allocation: HardwareAllocation,
    pub base_output_dir: String,
}

/// Outcome of a delete call. Deleting something that no longer exists is
/// not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deletion {
    Deleted,
    AlreadyGone,
}

/// Sampling parameters forwarded verbatim to the inference server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub top_k: u32,
    pub raw_response: bool,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self { max_tokens: 50, temperature: Some(1.0), top_p: Some(1.0), top_k: 1, raw_response: false }
    }
}

/// One element of a predict request's `instances` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictInstance {
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub raw_response: bool,
}

impl SamplingParams {
    /// Pair the parameters with a prompt. Temperature and top_p must be
    /// present; no range checks are applied.
    pub fn instance(&self, prompt: &str) -> PlatformResult<PredictInstance> {
        let temperature = self
            .temperature
            .ok_or_else(|| PlatformError::InvalidRequest("temperature is required".to_string()))?;
        let top_p = self
            .top_p
            .ok_or_else(|| PlatformError::InvalidRequest("top_p is required".to_string()))?;
        Ok(PredictInstance {
            prompt: prompt.to_string(),
            max_tokens: self.max_tokens,
            temperature,
            top_p,
            top_k: self.top_k,
            raw_response: self.raw_response,
        })
    }
}

/// A managed ML control plane.
///
/// Implementations must propagate platform errors unchanged and must not
/// retry. Long-running operations are awaited inside the call.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    fn id(&self) -> &'static str;

    /// Create a custom job and return its resource name.
    async fn create_custom_job(&self, job: &CustomJobSpec) -> PlatformResult<String>;

    async fn get_job(&self, name: &str) -> PlatformResult<JobStatus>;

    /// Register a model backed by `container` and return the model resource name.
    async fn upload_model(&self, display_name: &str, container: &ServingContainer) -> PlatformResult<String>;

    /// Create an empty endpoint and return its resource name.
    async fn create_endpoint(&self, display_name: &str) -> PlatformResult<String>;

    /// Deploy `model` to `endpoint` with all traffic; returns the deployed model id.
    async fn deploy_model(
        &self,
        endpoint: &str,
        model: &str,
        display_name: &str,
        allocation: &HardwareAllocation,
    ) -> PlatformResult<String>;

    /// Single request/response round trip; returns the first prediction.
    async fn predict(&self, endpoint: &str, instance: &PredictInstance) -> PlatformResult<String>;

    async fn delete_job(&self, name: &str) -> PlatformResult<Deletion>;

    async fn delete_model(&self, name: &str) -> PlatformResult<Deletion>;

    /// Undeploy every deployed model, then delete the endpoint.
    async fn delete_endpoint(&self, name: &str) -> PlatformResult<Deletion>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_state_wire_names() {
        let state: JobState = serde_json::from_str("\"JOB_STATE_SUCCEEDED\"").unwrap();
        assert_eq!(state, JobState::Succeeded);
        assert!(state.is_terminal());
        assert!(!JobState::Running.is_terminal());
        assert_eq!(JobState::Pending.to_string(), "JOB_STATE_PENDING");
    }

    #[test]
    fn test_sampling_params_require_temperature_and_top_p() {
        let params = SamplingParams { temperature: None, ..SamplingParams::default() };
        assert!(matches!(params.instance("hi"), Err(PlatformError::InvalidRequest(_))));

        let params = SamplingParams { top_p: None, ..SamplingParams::default() };
        assert!(params.instance("hi").is_err());

        let params = SamplingParams { temperature: Some(7.5), top_p: Some(2.0), ..SamplingParams::default() };
        let instance = params.instance("hi").unwrap();
        assert!((instance.temperature - 7.5).abs() < f32::EPSILON);
        assert_eq!(instance.prompt, "hi");
    }

    #[test]
    fn test_predict_instance_wire_shape() {
        let instance = SamplingParams::default().instance("What is a car?").unwrap();
        let json = serde_json::to_value(&instance).unwrap();
        assert_eq!(json["prompt"], "What is a car?");
        assert_eq!(json["max_tokens"], 50);
        assert_eq!(json["top_k"], 1);
        assert_eq!(json["raw_response"], false);
    }
}
