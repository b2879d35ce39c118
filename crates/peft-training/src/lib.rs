//! PEFT Training
//!
//! Platform-agnostic pieces of a LoRA fine-tuning run:
//! - Describing the run (`FineTuneRequest`)
//! - Sizing training and serving hardware (`resolve`, `resolve_serving`)
//! - Allocating artifact locations and building container arguments
//! - Recording remote resources in a local run manifest

pub mod args;
pub mod artifacts;
pub mod config;
pub mod error;
pub mod hardware;
pub mod layout;
pub mod manifest;
pub mod model;
pub mod progress;
pub mod request;

pub use args::{redact_args, serving_container, training_args, ServingContainer, ServingOptions};
pub use artifacts::{job_output_dir, to_fuse_path, Artifact};
pub use config::{ConfigLayer, RunConfig};
pub use error::{TuneError, TuneResult};
pub use hardware::{resolve, resolve_serving, AcceleratorType, HardwareAllocation, PrecisionMode};
pub use layout::RunLayout;
pub use manifest::{list_runs, load_run, RunId, RunManifest};
pub use model::{BaseModel, SizeClass};
pub use progress::{NullProgressSink, ProgressEvent, ProgressSink, StdoutProgressSink};
pub use request::{AdapterParams, DatasetRef, FineTuneRequest, LrScheduler, TrainingHyperParams};
