//! REST implementation of [`ControlPlane`] for the Vertex AI v1 API.

use crate::error::{PlatformError, PlatformResult};
use crate::plane::{ControlPlane, CustomJobSpec, Deletion, JobState, JobStatus, PredictInstance};
use async_trait::async_trait;
use peft_training::{HardwareAllocation, RunConfig, ServingContainer};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error, info};

/// Vertex AI control plane.
#[derive(Debug, Clone)]
pub struct VertexControlPlane {
    /// API root, e.g. `https://us-central1-aiplatform.googleapis.com/v1`.
    base_url: String,
    /// `projects/<project>/locations/<region>`.
    parent: String,
    /// OAuth bearer token.
    access_token: String,
    /// Identity jobs and deployed models run as.
    service_account: Option<String>,
    /// Delay between polls of a long-running operation.
    operation_poll: Duration,
    /// HTTP client for making requests.
    client: Client,
}

impl VertexControlPlane {
    /// Creates a control plane from the checked run configuration.
    ///
    /// # Errors
    /// Returns a configuration error if no access token is configured.
    pub fn new(config: &RunConfig) -> PlatformResult<Self> {
        let token = config.require_access_token()?.to_string();
        Ok(Self::with_base_url(config.api_base_url.clone(), config.parent(), token)
            .with_service_account(config.service_account.clone()))
    }

    #[must_use]
    pub fn with_base_url(base_url: String, parent: String, access_token: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            parent,
            access_token,
            service_account: None,
            operation_poll: Duration::from_secs(10),
            client: Client::new(),
        }
    }

    #[must_use]
    pub fn with_service_account(mut self, service_account: Option<String>) -> Self {
        self.service_account = service_account;
        self
    }

    #[must_use]
    pub fn with_operation_poll(mut self, interval: Duration) -> Self {
        self.operation_poll = interval;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.url(path)).bearer_auth(&self.access_token)
    }

    /// Send a request and decode a success body; non-success statuses are
    /// surfaced with the platform's own message.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> PlatformResult<T> {
        let response = request.send().await.map_err(|e| {
            error!(error = %e, "Failed to send request to Vertex AI");
            PlatformError::RequestError(format!("Network error: {e}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            let message = api_error_message(&body);
            if status.as_u16() == 404 {
                debug!(status = %status, error = %message, "Vertex AI resource not found");
            } else {
                error!(status = %status, error = %message, "Vertex AI returned error status");
            }
            return Err(PlatformError::Api { status: status.as_u16(), message });
        }

        response.json::<T>().await.map_err(|e| {
            error!(error = %e, "Failed to parse Vertex AI response");
            PlatformError::SerializationError(format!("Failed to parse response: {e}"))
        })
    }

    /// Poll an operation until `done`, returning its `response` payload.
    async fn wait_operation(&self, mut operation: Operation) -> PlatformResult<Value> {
        loop {
            if operation.done {
                if let Some(status) = operation.error {
                    return Err(PlatformError::OperationFailed {
                        name: operation.name,
                        message: status.message.unwrap_or_else(|| format!("code {}", status.code.unwrap_or_default())),
                    });
                }
                return Ok(operation.response.unwrap_or(Value::Null));
            }
            debug!(operation = %operation.name, "Waiting for operation");
            tokio::time::sleep(self.operation_poll).await;
            operation = self.send(self.request(Method::GET, &operation.name)).await?;
        }
    }

    async fn delete_resource(&self, name: &str) -> PlatformResult<Deletion> {
        match self.send::<Operation>(self.request(Method::DELETE, name)).await {
            Ok(op) => {
                self.wait_operation(op).await?;
                info!(resource = %name, "Deleted");
                Ok(Deletion::Deleted)
            }
            Err(e) if e.is_not_found() => {
                info!(resource = %name, "Already deleted");
                Ok(Deletion::AlreadyGone)
            }
            Err(e) => Err(e),
        }
    }
}

fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|b| b.error.message)
        .unwrap_or_else(|| body.to_string())
}

fn machine_spec(allocation: &HardwareAllocation) -> Value {
    json!({
        "machineType": allocation.machine_type,
        "acceleratorType": allocation.accelerator_type.as_str(),
        "acceleratorCount": allocation.accelerator_count,
    })
}

#[async_trait]
impl ControlPlane for VertexControlPlane {
    fn id(&self) -> &'static str {
        "vertex"
    }

    async fn create_custom_job(&self, job: &CustomJobSpec) -> PlatformResult<String> {
        debug!(display_name = %job.display_name, allocation = %job.allocation, "Creating custom job");

        let mut job_spec = json!({
            "workerPoolSpecs": [{
                "machineSpec": machine_spec(&job.allocation),
                "replicaCount": job.allocation.replica_count,
                "containerSpec": {
                    "imageUri": job.image_uri,
                    "args": job.args,
                },
            }],
            "baseOutputDirectory": { "outputUriPrefix": job.base_output_dir },
        });
        if let Some(sa) = &self.service_account {
            job_spec["serviceAccount"] = json!(sa);
        }
        let body = json!({ "displayName": job.display_name, "jobSpec": job_spec });

        let created: CustomJobResource = self
            .send(self.request(Method::POST, &format!("{}/customJobs", self.parent)).json(&body))
            .await?;
        info!(job = %created.name, "Custom job created");
        Ok(created.name)
    }

    async fn get_job(&self, name: &str) -> PlatformResult<JobStatus> {
        let job: CustomJobResource = self.send(self.request(Method::GET, name)).await?;
        Ok(JobStatus {
            name: job.name,
            state: job.state.unwrap_or(JobState::Unspecified),
            error: job.error.and_then(|e| e.message),
        })
    }

    async fn upload_model(&self, display_name: &str, container: &ServingContainer) -> PlatformResult<String> {
        debug!(display_name, image = %container.image_uri, "Uploading model");

        let env: Vec<Value> = container.env.iter().map(|(k, v)| json!({ "name": k, "value": v })).collect();
        let body = json!({
            "model": {
                "displayName": display_name,
                "containerSpec": {
                    "imageUri": container.image_uri,
                    "args": container.args,
                    "env": env,
                    "ports": [{ "containerPort": container.port }],
                    "predictRoute": container.predict_route,
                    "healthRoute": container.health_route,
                },
            },
        });

        let op: Operation = self
            .send(self.request(Method::POST, &format!("{}/models:upload", self.parent)).json(&body))
            .await?;
        let response = self.wait_operation(op).await?;
        let model = response
            .get("model")
            .and_then(Value::as_str)
            .ok_or_else(|| PlatformError::SerializationError("upload response has no model name".to_string()))?
            .to_string();
        info!(model = %model, "Model uploaded");
        Ok(model)
    }

    async fn create_endpoint(&self, display_name: &str) -> PlatformResult<String> {
        let body = json!({ "displayName": display_name });
        let op: Operation = self
            .send(self.request(Method::POST, &format!("{}/endpoints", self.parent)).json(&body))
            .await?;
        let op_name = op.name.clone();
        let response = self.wait_operation(op).await?;

        // The operation is named `<endpoint>/operations/<id>` when the
        // response omits the endpoint resource.
        let endpoint = response
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| op_name.split_once("/operations/").map(|(endpoint, _)| endpoint.to_string()))
            .ok_or_else(|| PlatformError::SerializationError("create endpoint response has no name".to_string()))?;
        info!(endpoint = %endpoint, "Endpoint created");
        Ok(endpoint)
    }

    async fn deploy_model(
        &self,
        endpoint: &str,
        model: &str,
        display_name: &str,
        allocation: &HardwareAllocation,
    ) -> PlatformResult<String> {
        debug!(endpoint, model, allocation = %allocation, "Deploying model");

        let mut deployed = json!({
            "model": model,
            "displayName": display_name,
            "dedicatedResources": {
                "machineSpec": machine_spec(allocation),
                "minReplicaCount": allocation.replica_count,
                "maxReplicaCount": allocation.replica_count,
            },
        });
        if let Some(sa) = &self.service_account {
            deployed["serviceAccount"] = json!(sa);
        }
        let body = json!({ "deployedModel": deployed, "trafficSplit": { "0": 100 } });

        let op: Operation =
            self.send(self.request(Method::POST, &format!("{endpoint}:deployModel")).json(&body)).await?;
        let response = self.wait_operation(op).await?;
        let id = response
            .pointer("/deployedModel/id")
            .and_then(Value::as_str)
            .ok_or_else(|| PlatformError::SerializationError("deploy response has no deployed model id".to_string()))?
            .to_string();
        info!(endpoint, deployed_model_id = %id, "Model deployed");
        Ok(id)
    }

    async fn predict(&self, endpoint: &str, instance: &PredictInstance) -> PlatformResult<String> {
        debug!(endpoint, prompt_len = instance.prompt.len(), "Sending predict request");

        let body = json!({ "instances": [instance] });
        let response: PredictResponse =
            self.send(self.request(Method::POST, &format!("{endpoint}:predict")).json(&body)).await?;
        let first = response
            .predictions
            .into_iter()
            .next()
            .ok_or_else(|| PlatformError::SerializationError("predict response has no predictions".to_string()))?;
        Ok(match first {
            Value::String(text) => text,
            other => other.to_string(),
        })
    }

    async fn delete_job(&self, name: &str) -> PlatformResult<Deletion> {
        self.delete_resource(name).await
    }

    async fn delete_model(&self, name: &str) -> PlatformResult<Deletion> {
        self.delete_resource(name).await
    }

    async fn delete_endpoint(&self, name: &str) -> PlatformResult<Deletion> {
        let endpoint: EndpointResource = match self.send(self.request(Method::GET, name)).await {
            Ok(e) => e,
            Err(e) if e.is_not_found() => {
                info!(resource = %name, "Already deleted");
                return Ok(Deletion::AlreadyGone);
            }
            Err(e) => return Err(e),
        };

        for deployed in endpoint.deployed_models {
            debug!(endpoint = %name, deployed_model_id = %deployed.id, "Undeploying model");
            let body = json!({ "deployedModelId": deployed.id });
            let op: Operation =
                self.send(self.request(Method::POST, &format!("{name}:undeployModel")).json(&body)).await?;
            self.wait_operation(op).await?;
        }

        self.delete_resource(name).await
    }
}

// Vertex AI API request/response structures

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RpcStatus {
    code: Option<i32>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Operation {
    name: String,
    #[serde(default)]
    done: bool,
    error: Option<RpcStatus>,
    response: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct CustomJobResource {
    name: String,
    state: Option<JobState>,
    error: Option<RpcStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EndpointResource {
    #[serde(default)]
    deployed_models: Vec<DeployedModelRef>,
}

#[derive(Debug, Deserialize)]
struct DeployedModelRef {
    id: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Value>,
}
