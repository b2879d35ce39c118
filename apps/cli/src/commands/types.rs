//! Command type definitions shared between main.rs and the command modules.

use clap::{Args, Subcommand};

/// Flags that override config files and environment for one invocation.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Cloud project id (overrides PEFT_PROJECT_ID)
    #[arg(long, global = true)]
    pub project: Option<String>,

    /// Region (overrides PEFT_REGION)
    #[arg(long, global = true)]
    pub region: Option<String>,

    /// Staging bucket, gs://... (overrides PEFT_BUCKET_URI)
    #[arg(long, global = true)]
    pub bucket: Option<String>,

    /// Service account jobs and endpoints run as
    #[arg(long, global = true)]
    pub service_account: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ResolveArgs {
    /// Base model id, e.g. meta-llama/Meta-Llama-3-8B
    #[arg(long)]
    pub model: String,

    /// Training accelerator (NVIDIA_L4, NVIDIA_A100_80GB, NVIDIA_H100_80GB)
    #[arg(long, default_value = "NVIDIA_A100_80GB")]
    pub accelerator: String,

    /// Precision mode (4bit, 8bit, float16)
    #[arg(long, default_value = "4bit")]
    pub precision: String,

    /// Serving accelerator
    #[arg(long, default_value = "NVIDIA_L4")]
    pub serving_accelerator: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct TrainArgs {
    /// Base model id
    #[arg(long, default_value = "meta-llama/Meta-Llama-3-8B")]
    pub model: String,

    /// Named dataset or gs:// URI to JSONL records
    #[arg(long, default_value = peft_training::request::DEFAULT_DATASET)]
    pub dataset: String,

    /// Column holding the training text
    #[arg(long, default_value = "text")]
    pub text_column: String,

    /// Prompt template name
    #[arg(long, default_value = peft_training::request::DEFAULT_TEMPLATE)]
    pub template: String,

    /// Do not pass a template to the training container
    #[arg(long, conflicts_with = "template")]
    pub no_template: bool,

    #[arg(long, default_value_t = 16)]
    pub lora_rank: u32,

    #[arg(long, default_value_t = 32)]
    pub lora_alpha: u32,

    #[arg(long, default_value_t = 0.05)]
    pub lora_dropout: f64,

    #[arg(long, default_value_t = 4096)]
    pub max_seq_length: u32,

    /// Per-device train batch size
    #[arg(long, default_value_t = 1)]
    pub batch_size: u32,

    #[arg(long, default_value_t = 4)]
    pub gradient_accumulation_steps: u32,

    #[arg(long, default_value_t = 10)]
    pub max_steps: u32,

    #[arg(long, default_value_t = 5e-5)]
    pub learning_rate: f64,

    /// Learning-rate scheduler (cosine, linear, constant)
    #[arg(long, default_value = "cosine")]
    pub lr_scheduler: String,

    /// Precision mode (4bit, 8bit, float16)
    #[arg(long, default_value = "4bit")]
    pub precision: String,

    /// Training accelerator
    #[arg(long, default_value = "NVIDIA_A100_80GB")]
    pub accelerator: String,

    /// Seconds between job status polls
    #[arg(long, default_value_t = 60)]
    pub poll_interval: u64,

    /// Submit the job and return without waiting for it
    #[arg(long)]
    pub detach: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct DeployArgs {
    /// Run id (defaults to the most recent run)
    #[arg(long)]
    pub run: Option<String>,

    /// Serving accelerator
    #[arg(long, default_value = "NVIDIA_L4")]
    pub accelerator: String,

    #[arg(long, default_value_t = 0.9)]
    pub gpu_memory_utilization: f32,

    #[arg(long, default_value_t = 4096)]
    pub max_model_len: u32,

    /// Give up on the deploy call after this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SamplingArgs {
    #[arg(long, default_value_t = 50)]
    pub max_tokens: u32,

    /// Sampling temperature (required)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Nucleus probability mass (required)
    #[arg(long)]
    pub top_p: Option<f32>,

    #[arg(long, default_value_t = 1)]
    pub top_k: u32,

    /// Return the raw model output without the prompt echo
    #[arg(long)]
    pub raw_response: bool,
}

#[derive(Args, Debug, Clone)]
pub struct PredictArgs {
    /// Run id (defaults to the most recent run)
    #[arg(long)]
    pub run: Option<String>,

    /// Prompt text
    pub prompt: String,

    #[command(flatten)]
    pub sampling: SamplingArgs,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub train: TrainArgs,

    /// Serving accelerator
    #[arg(long, default_value = "NVIDIA_L4")]
    pub serving_accelerator: String,

    /// Give up on the deploy call after this many seconds
    #[arg(long)]
    pub deploy_timeout: Option<u64>,

    /// Prompt sent once the endpoint is up
    #[arg(long, default_value = "What is a car?")]
    pub prompt: String,

    #[command(flatten)]
    pub sampling: SamplingArgs,

    /// Leave the job, model, and endpoint in place
    #[arg(long)]
    pub keep: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    /// Show the merged configuration (secrets redacted)
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
