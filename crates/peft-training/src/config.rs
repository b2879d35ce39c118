//! Platform identity and container settings.
//!
//! Settings are layered: global file, local file, environment, then CLI flags.
//! The merged [`ConfigLayer`] is checked once by [`RunConfig::from_layer`] and
//! the resulting [`RunConfig`] is never mutated afterwards.

use crate::error::{TuneError, TuneResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_REGION: &str = "us-central1";
pub const DEFAULT_TRAINING_IMAGE: &str =
    "us-docker.pkg.dev/vertex-ai/vertex-vision-model-garden-dockers/pytorch-peft-train:20240724_0936_RC00";
pub const DEFAULT_SERVING_IMAGE: &str =
    "us-docker.pkg.dev/vertex-ai/vertex-vision-model-garden-dockers/pytorch-vllm-serve:20240721_0916_RC00";

/// One layer of optional settings, as read from a file or the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigLayer {
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub bucket_uri: Option<String>,
    #[serde(default)]
    pub service_account: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub hf_token: Option<String>,
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub training_image: Option<String>,
    #[serde(default)]
    pub serving_image: Option<String>,
}

impl ConfigLayer {
    pub fn load_from_file(path: &Path) -> TuneResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TuneError::Config(format!("{}: {e}", path.display())))?;
        toml::from_str(&content).map_err(|e| TuneError::Config(format!("{}: {e}", path.display())))
    }

    /// Read the `PEFT_*` variables plus `HF_TOKEN` through `lookup`.
    pub fn from_env_with(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            project_id: get("PEFT_PROJECT_ID"),
            region: get("PEFT_REGION"),
            bucket_uri: get("PEFT_BUCKET_URI"),
            service_account: get("PEFT_SERVICE_ACCOUNT"),
            access_token: get("PEFT_ACCESS_TOKEN"),
            hf_token: get("HF_TOKEN"),
            api_base_url: get("PEFT_API_BASE_URL"),
            training_image: get("PEFT_TRAINING_IMAGE"),
            serving_image: get("PEFT_SERVING_IMAGE"),
        }
    }

    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Values from `other` override values in `self` when present.
    pub fn merge(&mut self, other: &Self) {
        fn take(dst: &mut Option<String>, src: &Option<String>) {
            if src.is_some() {
                dst.clone_from(src);
            }
        }
        take(&mut self.project_id, &other.project_id);
        take(&mut self.region, &other.region);
        take(&mut self.bucket_uri, &other.bucket_uri);
        take(&mut self.service_account, &other.service_account);
        take(&mut self.access_token, &other.access_token);
        take(&mut self.hf_token, &other.hf_token);
        take(&mut self.api_base_url, &other.api_base_url);
        take(&mut self.training_image, &other.training_image);
        take(&mut self.serving_image, &other.serving_image);
    }

    #[must_use]
    pub fn default_global_path() -> PathBuf {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(".peft")
            .join("config.toml")
    }

    #[must_use]
    pub fn default_local_path() -> PathBuf {
        PathBuf::from(".peftrc")
    }

    /// Global file, then local file, then environment. Missing files are skipped.
    pub fn discover_and_load() -> TuneResult<Self> {
        let mut layer = Self::default();
        for path in [Self::default_global_path(), Self::default_local_path()] {
            if path.exists() {
                layer.merge(&Self::load_from_file(&path)?);
            }
        }
        layer.merge(&Self::from_env());
        Ok(layer)
    }
}

/// Checked, immutable settings threaded through every stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunConfig {
    pub project_id: String,
    pub region: String,
    pub bucket_uri: String,
    pub service_account: Option<String>,
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    #[serde(skip_serializing)]
    pub hf_token: Option<String>,
    pub api_base_url: String,
    pub training_image: String,
    pub serving_image: String,
}

fn required(value: Option<&String>, name: &str) -> TuneResult<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| TuneError::MissingConfig(name.to_string()))
}

impl RunConfig {
    pub fn from_layer(layer: &ConfigLayer) -> TuneResult<Self> {
        let project_id = required(layer.project_id.as_ref(), "project_id")?;
        let region = layer.region.clone().unwrap_or_else(|| DEFAULT_REGION.to_string());
        let bucket_uri = required(layer.bucket_uri.as_ref(), "bucket_uri")?;
        if !bucket_uri.starts_with("gs://") {
            return Err(TuneError::Config(format!("bucket_uri must start with gs://, got '{bucket_uri}'")));
        }
        let api_base_url = layer
            .api_base_url
            .clone()
            .unwrap_or_else(|| format!("https://{region}-aiplatform.googleapis.com/v1"));

        Ok(Self {
            project_id,
            region,
            bucket_uri: bucket_uri.trim_end_matches('/').to_string(),
            service_account: layer.service_account.clone().filter(|s| !s.trim().is_empty()),
            access_token: layer.access_token.clone(),
            hf_token: layer.hf_token.clone(),
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            training_image: layer.training_image.clone().unwrap_or_else(|| DEFAULT_TRAINING_IMAGE.to_string()),
            serving_image: layer.serving_image.clone().unwrap_or_else(|| DEFAULT_SERVING_IMAGE.to_string()),
        })
    }

    /// `projects/<project>/locations/<region>`.
    #[must_use]
    pub fn parent(&self) -> String {
        format!("projects/{}/locations/{}", self.project_id, self.region)
    }

    pub fn require_access_token(&self) -> TuneResult<&str> {
        self.access_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| TuneError::MissingConfig("access_token (PEFT_ACCESS_TOKEN)".to_string()))
    }

    pub fn require_hf_token(&self) -> TuneResult<&str> {
        self.hf_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| TuneError::MissingConfig("hf_token (HF_TOKEN)".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn layer() -> ConfigLayer {
        ConfigLayer {
            project_id: Some("my-project".to_string()),
            bucket_uri: Some("gs://my-bucket/".to_string()),
            ..ConfigLayer::default()
        }
    }

    #[test]
    fn test_load_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
project_id = "p1"
region = "europe-west4"
bucket_uri = "gs://b1"
service_account = "sa@p1.iam.gserviceaccount.com"
"#,
        )
        .unwrap();

        let layer = ConfigLayer::load_from_file(&path).unwrap();
        assert_eq!(layer.project_id.as_deref(), Some("p1"));
        assert_eq!(layer.region.as_deref(), Some("europe-west4"));
        assert!(layer.access_token.is_none());
    }

    #[test]
    fn test_load_from_file_reports_parse_errors() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "project_id = [").unwrap();
        assert!(matches!(ConfigLayer::load_from_file(&path), Err(TuneError::Config(_))));
    }

    #[test]
    fn test_merge_prefers_later_layer() {
        let mut base = layer();
        let env = ConfigLayer { region: Some("asia-east1".to_string()), ..ConfigLayer::default() };
        base.merge(&env);
        assert_eq!(base.region.as_deref(), Some("asia-east1"));
        assert_eq!(base.project_id.as_deref(), Some("my-project"));
    }

    #[test]
    fn test_from_env_with_ignores_blank_values() {
        let vars: HashMap<&str, &str> = HashMap::from([("PEFT_PROJECT_ID", "env-project"), ("HF_TOKEN", " ")]);
        let layer = ConfigLayer::from_env_with(|k| vars.get(k).map(|v| (*v).to_string()));
        assert_eq!(layer.project_id.as_deref(), Some("env-project"));
        assert!(layer.hf_token.is_none());
    }

    #[test]
    fn test_run_config_defaults() {
        let config = RunConfig::from_layer(&layer()).unwrap();
        assert_eq!(config.region, DEFAULT_REGION);
        assert_eq!(config.bucket_uri, "gs://my-bucket");
        assert_eq!(config.api_base_url, "https://us-central1-aiplatform.googleapis.com/v1");
        assert_eq!(config.parent(), "projects/my-project/locations/us-central1");
        assert_eq!(config.training_image, DEFAULT_TRAINING_IMAGE);
    }

    #[test]
    fn test_run_config_presence_checks() {
        let mut missing = layer();
        missing.project_id = Some("  ".to_string());
        assert!(matches!(RunConfig::from_layer(&missing), Err(TuneError::MissingConfig(_))));

        let mut bad_bucket = layer();
        bad_bucket.bucket_uri = Some("s3://nope".to_string());
        assert!(matches!(RunConfig::from_layer(&bad_bucket), Err(TuneError::Config(_))));

        let config = RunConfig::from_layer(&layer()).unwrap();
        assert!(matches!(config.require_hf_token(), Err(TuneError::MissingConfig(_))));
        assert!(matches!(config.require_access_token(), Err(TuneError::MissingConfig(_))));
    }

    #[test]
    fn test_secrets_are_not_serialized() {
        let mut l = layer();
        l.access_token = Some("ya29.secret".to_string());
        l.hf_token = Some("hf_secret".to_string());
        let json = serde_json::to_string(&RunConfig::from_layer(&l).unwrap()).unwrap();
        assert!(!json.contains("secret"));
    }
}
