//! Control-plane access for PEFT runs.
//!
//! This crate submits training jobs, deploys merged models behind endpoints,
//! sends prediction requests, and deletes what a run created.
//!
//! # Control planes
//!
//! - **Vertex**: the Vertex AI v1 REST API (bearer token required)
//! - **Mock**: in-memory, scripted job states and canned predictions

pub mod dispatcher;
pub mod error;
pub mod mock;
pub mod plane;
pub mod vertex;

pub use dispatcher::{display_name, CleanupReport, DispatchOptions, Endpoint, JobDispatcher, TrainingJob};
pub use error::{PlatformError, PlatformResult};
pub use mock::MockControlPlane;
pub use plane::{ControlPlane, CustomJobSpec, Deletion, JobState, JobStatus, PredictInstance, SamplingParams};
pub use vertex::VertexControlPlane;
