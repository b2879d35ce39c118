//! Sequential orchestration of a fine-tune, deploy, predict, cleanup run.

use crate::error::{PlatformError, PlatformResult};
use crate::plane::{ControlPlane, CustomJobSpec, Deletion, JobState, SamplingParams};
use chrono::Utc;
use peft_training::{
    job_output_dir, redact_args, serving_container, training_args, Artifact, BaseModel, FineTuneRequest,
    HardwareAllocation, ProgressEvent, ProgressSink, RunConfig, RunManifest, ServingOptions,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct DispatchOptions {
    /// Delay between job status polls.
    pub job_poll_interval: Duration,
    /// Upper bound on the deploy call; `None` waits for the platform.
    pub deploy_timeout: Option<Duration>,
    pub serving: ServingOptions,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self { job_poll_interval: Duration::from_secs(60), deploy_timeout: None, serving: ServingOptions::default() }
    }
}

/// A submitted training job and the locations it will write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingJob {
    pub name: String,
    pub display_name: String,
    pub artifact: Artifact,
}

/// Handle to a serving endpoint with its deployed model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub endpoint_name: String,
    pub model_name: String,
    pub deployed_model_id: String,
}

impl Endpoint {
    /// Rebuild the handle from a run manifest, if the run has a live endpoint.
    #[must_use]
    pub fn from_manifest(manifest: &RunManifest) -> Option<Self> {
        Some(Self {
            endpoint_name: manifest.endpoint_name.clone()?,
            model_name: manifest.model_name.clone().unwrap_or_default(),
            deployed_model_id: manifest.deployed_model_id.clone().unwrap_or_default(),
        })
    }
}

/// What a cleanup pass did, by resource name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub deleted: Vec<String>,
    pub already_gone: Vec<String>,
}

impl CleanupReport {
    fn record(&mut self, name: String, outcome: Deletion) {
        match outcome {
            Deletion::Deleted => self.deleted.push(name),
            Deletion::AlreadyGone => self.already_gone.push(name),
        }
    }
}

/// `peft-<model>-<timestamp>`, unique per second.
#[must_use]
pub fn display_name(prefix: &str, model: BaseModel) -> String {
    format!("{prefix}-{}-{}", model.slug(), Utc::now().format("%Y%m%d_%H%M%S"))
}

/// Drives a [`ControlPlane`] through one run.
///
/// Every call is awaited before the next is issued. Nothing is retried; the
/// first platform error is returned to the caller as-is.
pub struct JobDispatcher<'a> {
    plane: &'a dyn ControlPlane,
    config: &'a RunConfig,
    progress: &'a dyn ProgressSink,
    options: DispatchOptions,
}

impl<'a> JobDispatcher<'a> {
    #[must_use]
    pub fn new(plane: &'a dyn ControlPlane, config: &'a RunConfig, progress: &'a dyn ProgressSink) -> Self {
        Self { plane, config, progress, options: DispatchOptions::default() }
    }

    #[must_use]
    pub fn with_options(mut self, options: DispatchOptions) -> Self {
        self.options = options;
        self
    }

    /// Validate, allocate artifact locations, and submit the training job.
    ///
    /// All local checks run before the first remote call.
    pub async fn start_training(
        &self,
        request: &FineTuneRequest,
        allocation: &HardwareAllocation,
    ) -> PlatformResult<TrainingJob> {
        request.validate()?;
        let hf_token = self.config.require_hf_token()?;

        let display_name = display_name("peft", request.base_model);
        let artifact = Artifact::allocate(&self.config.bucket_uri, &display_name)?;
        let args = training_args(request, &artifact, allocation, hf_token);
        debug!(args = ?redact_args(&args), "Training container arguments");

        let spec = CustomJobSpec {
            display_name: display_name.clone(),
            image_uri: self.config.training_image.clone(),
            args,
            allocation: allocation.clone(),
            base_output_dir: job_output_dir(&self.config.bucket_uri, &display_name)?,
        };

        info!(
            control_plane = self.plane.id(),
            display_name = %display_name,
            model = %request.base_model,
            allocation = %allocation,
            "Submitting training job"
        );
        let name = self.plane.create_custom_job(&spec).await?;
        self.progress.on_event(ProgressEvent::Submitted { resource: name.clone() });

        Ok(TrainingJob { name, display_name, artifact })
    }

    /// Poll the job until it reaches a terminal state.
    pub async fn await_training(&self, job: &TrainingJob) -> PlatformResult<Artifact> {
        let mut last_state = None;
        loop {
            let status = self.plane.get_job(&job.name).await?;
            if last_state != Some(status.state) {
                self.progress.on_event(ProgressEvent::State {
                    resource: job.name.clone(),
                    state: status.state.to_string(),
                });
                last_state = Some(status.state);
            }

            match status.state {
                JobState::Succeeded => {
                    self.progress.on_event(ProgressEvent::Finished { resource: job.name.clone() });
                    info!(job = %job.name, merged_model = %job.artifact.merged_model_dir, "Training job succeeded");
                    return Ok(job.artifact.clone());
                }
                state if state.is_terminal() => {
                    warn!(job = %job.name, state = %state, "Training job did not succeed");
                    return Err(PlatformError::JobFailed {
                        job: job.name.clone(),
                        state: state.to_string(),
                        message: status.error,
                    });
                }
                _ => tokio::time::sleep(self.options.job_poll_interval).await,
            }
        }
    }

    pub async fn submit_training(
        &self,
        request: &FineTuneRequest,
        allocation: &HardwareAllocation,
    ) -> PlatformResult<Artifact> {
        let job = self.start_training(request, allocation).await?;
        self.await_training(&job).await
    }

    /// Register the merged model with the inference-server container.
    pub async fn upload_model(
        &self,
        model: BaseModel,
        artifact: &Artifact,
        allocation: &HardwareAllocation,
    ) -> PlatformResult<String> {
        let container = serving_container(&self.config.serving_image, artifact, allocation, &self.options.serving);
        let name = display_name("peft-serve", model);
        self.plane.upload_model(&name, &container).await
    }

    pub async fn create_endpoint(&self, model: BaseModel) -> PlatformResult<String> {
        self.plane.create_endpoint(&format!("{}-endpoint", display_name("peft", model))).await
    }

    /// Deploy an uploaded model, bounded by the configured deploy timeout.
    pub async fn deploy_to_endpoint(
        &self,
        model: BaseModel,
        endpoint_name: &str,
        model_name: &str,
        allocation: &HardwareAllocation,
    ) -> PlatformResult<String> {
        let name = display_name("peft-serve", model);
        let deploy = self.plane.deploy_model(endpoint_name, model_name, &name, allocation);
        let deployed_id = match self.options.deploy_timeout {
            Some(limit) => tokio::time::timeout(limit, deploy).await.map_err(|_| PlatformError::Timeout {
                what: format!("deployment to {endpoint_name}"),
                seconds: limit.as_secs(),
            })??,
            None => deploy.await?,
        };
        self.progress.on_event(ProgressEvent::Message {
            resource: endpoint_name.to_string(),
            message: format!("serving deployed model {deployed_id}"),
        });
        Ok(deployed_id)
    }

    /// Upload, create an endpoint, and deploy with all traffic.
    pub async fn deploy(
        &self,
        model: BaseModel,
        artifact: &Artifact,
        allocation: &HardwareAllocation,
    ) -> PlatformResult<Endpoint> {
        let model_name = self.upload_model(model, artifact, allocation).await?;
        let endpoint_name = self.create_endpoint(model).await?;
        let deployed_model_id = self.deploy_to_endpoint(model, &endpoint_name, &model_name, allocation).await?;
        Ok(Endpoint { endpoint_name, model_name, deployed_model_id })
    }

    /// One request/response round trip; the text comes back unmodified.
    pub async fn predict(&self, endpoint: &Endpoint, prompt: &str, params: &SamplingParams) -> PlatformResult<String> {
        let instance = params.instance(prompt)?;
        self.plane.predict(&endpoint.endpoint_name, &instance).await
    }

    /// Delete the endpoint, model, and job recorded in `manifest`.
    ///
    /// Each field is cleared as soon as its resource is confirmed gone, so a
    /// failure part-way leaves the manifest listing exactly what remains.
    /// Running cleanup again on a clean manifest is a no-op.
    pub async fn cleanup(&self, manifest: &mut RunManifest) -> PlatformResult<CleanupReport> {
        let mut report = CleanupReport::default();

        if let Some(endpoint) = manifest.endpoint_name.clone() {
            let outcome = self.plane.delete_endpoint(&endpoint).await?;
            manifest.endpoint_name = None;
            manifest.deployed_model_id = None;
            report.record(endpoint, outcome);
        }
        if let Some(model) = manifest.model_name.clone() {
            let outcome = self.plane.delete_model(&model).await?;
            manifest.model_name = None;
            report.record(model, outcome);
        }
        if let Some(job) = manifest.job_name.clone() {
            let outcome = self.plane.delete_job(&job).await?;
            manifest.job_name = None;
            report.record(job, outcome);
        }

        info!(deleted = report.deleted.len(), already_gone = report.already_gone.len(), "Cleanup finished");
        Ok(report)
    }
}
