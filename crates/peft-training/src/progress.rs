use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Submitted { resource: String },
    State { resource: String, state: String },
    Message { resource: String, message: String },
    Finished { resource: String },
}

pub trait ProgressSink: Send + Sync {
    fn on_event(&self, event: ProgressEvent);
}

/// Last path segment of a resource name, e.g. the numeric job id.
fn short(resource: &str) -> &str {
    resource.rsplit('/').next().unwrap_or(resource)
}

#[derive(Debug, Default)]
pub struct StdoutProgressSink;

impl ProgressSink for StdoutProgressSink {
    fn on_event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Submitted { resource } => println!("[{}] submitted", short(&resource)),
            ProgressEvent::State { resource, state } => println!("[{}] {state}", short(&resource)),
            ProgressEvent::Message { resource, message } => println!("[{}] {message}", short(&resource)),
            ProgressEvent::Finished { resource } => println!("[{}] finished", short(&resource)),
        }
    }
}

/// Sink that drops every event.
#[derive(Debug, Default)]
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn on_event(&self, _event: ProgressEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_resource_name() {
        assert_eq!(short("projects/p/locations/r/customJobs/42"), "42");
        assert_eq!(short("plain"), "plain");
    }
}
