//! In-memory control plane for tests and dry runs.

use crate::error::{PlatformError, PlatformResult};
use crate::plane::{ControlPlane, CustomJobSpec, Deletion, JobState, JobStatus, PredictInstance};
use async_trait::async_trait;
use peft_training::{HardwareAllocation, RunManifest, ServingContainer};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

const PARENT: &str = "projects/mock/locations/mock";

#[derive(Debug, Default)]
struct MockState {
    next_id: u64,
    jobs: HashMap<String, MockJob>,
    /// Uploaded models; `None` for models seeded from a run manifest.
    models: HashMap<String, Option<ServingContainer>>,
    endpoints: HashMap<String, Vec<String>>,
    submitted: Vec<CustomJobSpec>,
    predictions: Vec<PredictInstance>,
}

#[derive(Debug)]
struct MockJob {
    /// States still to report; the last one sticks.
    script: VecDeque<JobState>,
    error: Option<String>,
}

impl MockState {
    fn next(&mut self, collection: &str) -> String {
        self.next_id += 1;
        format!("{PARENT}/{collection}/{}", self.next_id)
    }

    /// Keep generated ids above any numeric id already in use.
    fn reserve(&mut self, name: &str) {
        if let Some(id) = name.rsplit('/').next().and_then(|id| id.parse::<u64>().ok()) {
            self.next_id = self.next_id.max(id);
        }
    }
}

/// A scripted, in-memory [`ControlPlane`].
///
/// Jobs walk through the configured state script one state per poll.
/// Predictions return the canned text unmodified.
#[derive(Debug)]
pub struct MockControlPlane {
    job_script: Vec<JobState>,
    job_error: Option<String>,
    canned_prediction: String,
    deploy_delay: Option<Duration>,
    state: Mutex<MockState>,
}

impl Default for MockControlPlane {
    fn default() -> Self {
        Self::new()
    }
}

impl MockControlPlane {
    #[must_use]
    pub fn new() -> Self {
        Self {
            job_script: vec![JobState::Pending, JobState::Running, JobState::Succeeded],
            job_error: None,
            canned_prediction: "Mock prediction".to_string(),
            deploy_delay: None,
            state: Mutex::new(MockState::default()),
        }
    }

    /// States each new job reports on successive polls. An empty script
    /// means jobs succeed on the first poll.
    #[must_use]
    pub fn with_job_states(mut self, states: Vec<JobState>) -> Self {
        self.job_script = if states.is_empty() { vec![JobState::Succeeded] } else { states };
        self
    }

    /// Error message reported by jobs once they reach a terminal state.
    #[must_use]
    pub fn with_job_error(mut self, message: impl Into<String>) -> Self {
        self.job_error = Some(message.into());
        self
    }

    #[must_use]
    pub fn with_prediction(mut self, text: impl Into<String>) -> Self {
        self.canned_prediction = text.into();
        self
    }

    /// Make every `deploy_model` call take this long before it answers.
    #[must_use]
    pub fn with_deploy_delay(mut self, delay: Duration) -> Self {
        self.deploy_delay = Some(delay);
        self
    }

    /// Treat the resources recorded in `manifest` as live.
    ///
    /// The job keeps its recorded state, or succeeds when none was recorded.
    /// The endpoint holds the recorded deployed model, if any.
    #[must_use]
    pub fn with_manifest(self, manifest: &RunManifest) -> Self {
        if let Ok(mut state) = self.state.lock() {
            if let Some(job) = &manifest.job_name {
                let recorded = manifest
                    .job_state
                    .as_ref()
                    .and_then(|s| serde_json::from_value::<JobState>(serde_json::Value::String(s.clone())).ok())
                    .unwrap_or(JobState::Succeeded);
                state.reserve(job);
                state.jobs.insert(job.clone(), MockJob { script: VecDeque::from([recorded]), error: None });
            }
            if let Some(model) = &manifest.model_name {
                state.reserve(model);
                state.models.insert(model.clone(), None);
            }
            if let Some(endpoint) = &manifest.endpoint_name {
                state.reserve(endpoint);
                let deployed: Vec<String> = manifest.deployed_model_id.iter().cloned().collect();
                for id in &deployed {
                    state.reserve(id);
                }
                state.endpoints.insert(endpoint.clone(), deployed);
            }
        }
        self
    }

    fn lock(&self) -> PlatformResult<std::sync::MutexGuard<'_, MockState>> {
        self.state.lock().map_err(|_| PlatformError::RequestError("mock state poisoned".to_string()))
    }

    fn not_found(name: &str) -> PlatformError {
        PlatformError::Api { status: 404, message: format!("{name} not found") }
    }

    /// Jobs submitted so far, in order.
    pub fn submitted_jobs(&self) -> Vec<CustomJobSpec> {
        self.lock().map(|s| s.submitted.clone()).unwrap_or_default()
    }

    /// Predict instances received so far, in order.
    pub fn received_predictions(&self) -> Vec<PredictInstance> {
        self.lock().map(|s| s.predictions.clone()).unwrap_or_default()
    }

    /// Number of resources (jobs, models, endpoints) that currently exist.
    pub fn live_resources(&self) -> usize {
        self.lock().map(|s| s.jobs.len() + s.models.len() + s.endpoints.len()).unwrap_or_default()
    }
}

#[async_trait]
impl ControlPlane for MockControlPlane {
    fn id(&self) -> &'static str {
        "mock"
    }

    async fn create_custom_job(&self, job: &CustomJobSpec) -> PlatformResult<String> {
        let mut state = self.lock()?;
        let name = state.next("customJobs");
        debug!(job = %name, display_name = %job.display_name, "MockControlPlane creating job");
        state.jobs.insert(
            name.clone(),
            MockJob { script: self.job_script.iter().copied().collect(), error: self.job_error.clone() },
        );
        state.submitted.push(job.clone());
        Ok(name)
    }

    async fn get_job(&self, name: &str) -> PlatformResult<JobStatus> {
        let mut state = self.lock()?;
        let job = state.jobs.get_mut(name).ok_or_else(|| Self::not_found(name))?;
        let current = if job.script.len() > 1 {
            job.script.pop_front().unwrap_or(JobState::Unspecified)
        } else {
            job.script.front().copied().unwrap_or(JobState::Unspecified)
        };
        let error = if current.is_terminal() && current != JobState::Succeeded { job.error.clone() } else { None };
        Ok(JobStatus { name: name.to_string(), state: current, error })
    }

    async fn upload_model(&self, display_name: &str, container: &ServingContainer) -> PlatformResult<String> {
        let mut state = self.lock()?;
        let name = state.next("models");
        debug!(model = %name, display_name, "MockControlPlane uploading model");
        state.models.insert(name.clone(), Some(container.clone()));
        Ok(name)
    }

    async fn create_endpoint(&self, display_name: &str) -> PlatformResult<String> {
        let mut state = self.lock()?;
        let name = state.next("endpoints");
        debug!(endpoint = %name, display_name, "MockControlPlane creating endpoint");
        state.endpoints.insert(name.clone(), Vec::new());
        Ok(name)
    }

    async fn deploy_model(
        &self,
        endpoint: &str,
        model: &str,
        _display_name: &str,
        _allocation: &HardwareAllocation,
    ) -> PlatformResult<String> {
        if let Some(delay) = self.deploy_delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.lock()?;
        if !state.models.contains_key(model) {
            return Err(Self::not_found(model));
        }
        state.next_id += 1;
        let deployed_id = state.next_id.to_string();
        state
            .endpoints
            .get_mut(endpoint)
            .ok_or_else(|| Self::not_found(endpoint))?
            .push(deployed_id.clone());
        Ok(deployed_id)
    }

    async fn predict(&self, endpoint: &str, instance: &PredictInstance) -> PlatformResult<String> {
        let mut state = self.lock()?;
        let deployed = state.endpoints.get(endpoint).ok_or_else(|| Self::not_found(endpoint))?;
        if deployed.is_empty() {
            return Err(PlatformError::Api {
                status: 400,
                message: format!("endpoint {endpoint} has no deployed models"),
            });
        }
        state.predictions.push(instance.clone());
        Ok(self.canned_prediction.clone())
    }

    async fn delete_job(&self, name: &str) -> PlatformResult<Deletion> {
        let mut state = self.lock()?;
        Ok(if state.jobs.remove(name).is_some() { Deletion::Deleted } else { Deletion::AlreadyGone })
    }

    async fn delete_model(&self, name: &str) -> PlatformResult<Deletion> {
        let mut state = self.lock()?;
        Ok(if state.models.remove(name).is_some() { Deletion::Deleted } else { Deletion::AlreadyGone })
    }

    async fn delete_endpoint(&self, name: &str) -> PlatformResult<Deletion> {
        let mut state = self.lock()?;
        Ok(if state.endpoints.remove(name).is_some() { Deletion::Deleted } else { Deletion::AlreadyGone })
    }
}
