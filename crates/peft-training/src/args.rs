//! Flat argument lists for the training and inference-server containers.
//!
//! Values are forwarded verbatim; both containers parse their own flags.

use crate::artifacts::{to_fuse_path, Artifact};
use crate::hardware::HardwareAllocation;
use crate::request::{DatasetRef, FineTuneRequest};
use serde::{Deserialize, Serialize};

const HF_TOKEN_FLAG: &str = "--huggingface_access_token=";

pub const SERVING_PORT: u16 = 7080;
pub const PREDICT_ROUTE: &str = "/generate";
pub const HEALTH_ROUTE: &str = "/ping";

/// Build the training container's argument list.
///
/// Output locations and object-storage datasets are passed in their mounted
/// form since the container writes through the storage FUSE mount.
#[must_use]
pub fn training_args(
    request: &FineTuneRequest,
    artifact: &Artifact,
    allocation: &HardwareAllocation,
    hf_token: &str,
) -> Vec<String> {
    let dataset = match &request.dataset {
        DatasetRef::Named { name } => name.clone(),
        DatasetRef::Uri { uri } => to_fuse_path(uri),
    };
    let adapter = &request.adapter;
    let hp = &request.hyperparams;

    let mut args = Vec::with_capacity(20);
    if allocation.accelerator_count > 1 {
        args.push(format!(
            "--config_file=vertex_vision_model_garden_peft/deepspeed_zero2_{}gpu.yaml",
            allocation.accelerator_count
        ));
    }
    args.extend([
        "--task=instruct-lora".to_string(),
        format!("--pretrained_model_id={}", request.base_model.id()),
        format!("--dataset_name={dataset}"),
        format!("--instruct_column_in_dataset={}", request.text_column),
        format!("--output_dir={}", to_fuse_path(&artifact.adapter_dir)),
        format!("--merge_base_and_lora_output_dir={}", to_fuse_path(&artifact.merged_model_dir)),
        format!("--per_device_train_batch_size={}", hp.per_device_batch_size),
        format!("--gradient_accumulation_steps={}", hp.gradient_accumulation_steps),
        format!("--lora_rank={}", adapter.rank),
        format!("--lora_alpha={}", adapter.alpha),
        format!("--lora_dropout={}", adapter.dropout),
        format!("--max_steps={}", hp.max_steps),
        format!("--max_seq_length={}", hp.max_seq_length),
        format!("--learning_rate={}", hp.learning_rate),
        format!("--lr_scheduler_type={}", hp.lr_scheduler.as_str()),
        format!("--precision_mode={}", request.precision_mode),
    ]);
    if let Some(template) = &request.template {
        args.push(format!("--template={template}"));
    }
    args.push(format!("{HF_TOKEN_FLAG}{hf_token}"));
    args
}

/// Copy of `args` that is safe to log or print.
#[must_use]
pub fn redact_args(args: &[String]) -> Vec<String> {
    args.iter()
        .map(|a| if a.starts_with(HF_TOKEN_FLAG) { format!("{HF_TOKEN_FLAG}***") } else { a.clone() })
        .collect()
}

/// Tunables for the inference server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServingOptions {
    pub gpu_memory_utilization: f32,
    pub max_model_len: u32,
    pub swap_space_gb: u32,
}

impl Default for ServingOptions {
    fn default() -> Self {
        Self { gpu_memory_utilization: 0.9, max_model_len: 4096, swap_space_gb: 16 }
    }
}

/// Container description uploaded alongside the merged model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServingContainer {
    pub image_uri: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub port: u16,
    pub predict_route: String,
    pub health_route: String,
}

#[must_use]
pub fn serving_container(
    image_uri: &str,
    artifact: &Artifact,
    allocation: &HardwareAllocation,
    options: &ServingOptions,
) -> ServingContainer {
    let model = &artifact.merged_model_dir;
    ServingContainer {
        image_uri: image_uri.to_string(),
        args: vec![
            "--host=0.0.0.0".to_string(),
            format!("--port={SERVING_PORT}"),
            format!("--model={model}"),
            format!("--tensor-parallel-size={}", allocation.accelerator_count),
            format!("--swap-space={}", options.swap_space_gb),
            format!("--gpu-memory-utilization={}", options.gpu_memory_utilization),
            format!("--max-model-len={}", options.max_model_len),
            "--disable-log-stats".to_string(),
        ],
        env: vec![
            ("MODEL_ID".to_string(), model.clone()),
            ("DEPLOY_SOURCE".to_string(), "cli".to_string()),
        ],
        port: SERVING_PORT,
        predict_route: PREDICT_ROUTE.to_string(),
        health_route: HEALTH_ROUTE.to_string(),
    }
}
