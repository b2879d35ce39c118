use crate::artifacts::Artifact;
use crate::error::{TuneError, TuneResult};
use crate::hardware::{HardwareAllocation, PrecisionMode};
use crate::layout::RunLayout;
use crate::model::BaseModel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

/// Identifier for one end-to-end run (train, deploy, predict, cleanup).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Accept a user-supplied id. Ids name a single directory under the
    /// runs root, so path separators and `.`/`..` are rejected.
    pub fn parse(id: &str) -> TuneResult<Self> {
        let id = id.trim();
        if id.is_empty() || id == "." || id == ".." || id.contains(['/', '\\']) {
            return Err(TuneError::Manifest(format!("invalid run id '{id}'")));
        }
        Ok(Self(id.to_string()))
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Remote resource identifiers created during a run.
///
/// Every field holding a resource name is cleared once cleanup has deleted
/// that resource, so the manifest always lists what still exists remotely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: RunId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub base_model: BaseModel,
    pub precision_mode: PrecisionMode,
    #[serde(default)]
    pub training_allocation: Option<HardwareAllocation>,
    #[serde(default)]
    pub job_name: Option<String>,
    #[serde(default)]
    pub job_state: Option<String>,
    #[serde(default)]
    pub artifact: Option<Artifact>,
    #[serde(default)]
    pub serving_allocation: Option<HardwareAllocation>,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub endpoint_name: Option<String>,
    #[serde(default)]
    pub deployed_model_id: Option<String>,
}

impl RunManifest {
    #[must_use]
    pub fn new(base_model: BaseModel, precision_mode: PrecisionMode) -> Self {
        let now = Utc::now();
        Self {
            run_id: RunId::new(),
            created_at: now,
            updated_at: now,
            base_model,
            precision_mode,
            training_allocation: None,
            job_name: None,
            job_state: None,
            artifact: None,
            serving_allocation: None,
            model_name: None,
            endpoint_name: None,
            deployed_model_id: None,
        }
    }

    /// True when no remote resource recorded here is left to delete.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.job_name.is_none() && self.model_name.is_none() && self.endpoint_name.is_none()
    }

    pub fn save(&mut self, layout: &RunLayout) -> TuneResult<()> {
        layout.ensure_run_dir(&self.run_id)?;
        self.updated_at = Utc::now();
        let path = layout.manifest_path(&self.run_id);
        std::fs::write(&path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }

    pub fn load(layout: &RunLayout, run_id: &RunId) -> TuneResult<Self> {
        RunId::parse(&run_id.0)?;
        let path = layout.manifest_path(run_id);
        if !path.exists() {
            return Err(TuneError::Manifest(format!("no run manifest for run {run_id} at {}", path.display())));
        }
        let bytes = std::fs::read(&path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// All manifests under the layout root, oldest first.
pub fn list_runs(layout: &RunLayout) -> TuneResult<Vec<RunManifest>> {
    let mut out = Vec::new();

    let dir = match std::fs::read_dir(layout.root()) {
        Ok(d) => d,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
        Err(e) => return Err(e.into()),
    };

    for entry in dir {
        let entry = entry?;
        let manifest_path = entry.path().join("run_manifest.json");
        if !manifest_path.exists() {
            continue;
        }
        let bytes = std::fs::read(&manifest_path)?;
        match serde_json::from_slice::<RunManifest>(&bytes) {
            Ok(manifest) => out.push(manifest),
            Err(e) => warn!(path = %manifest_path.display(), error = %e, "Skipping unreadable run manifest"),
        }
    }

    out.sort_by_key(|m| m.created_at);
    Ok(out)
}

/// Load a run by id, or the most recently created one when `run_id` is `None`.
pub fn load_run(layout: &RunLayout, run_id: Option<&RunId>) -> TuneResult<RunManifest> {
    if let Some(id) = run_id {
        return RunManifest::load(layout, id);
    }
    list_runs(layout)?
        .pop()
        .ok_or_else(|| TuneError::Manifest(format!("no runs found under {}", layout.root().display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load_roundtrip_fields() {
        let temp = TempDir::new().unwrap();
        let layout = RunLayout::for_workspace_root(temp.path());

        let mut manifest = RunManifest::new(BaseModel::Llama3_8B, PrecisionMode::FourBit);
        manifest.job_name = Some("projects/p/locations/r/customJobs/1".to_string());
        manifest.save(&layout).unwrap();

        let loaded = RunManifest::load(&layout, &manifest.run_id).unwrap();
        assert_eq!(loaded.job_name, manifest.job_name);
        assert!(!loaded.is_clean());
    }

    #[test]
    fn test_load_run_picks_latest() {
        let temp = TempDir::new().unwrap();
        let layout = RunLayout::for_workspace_root(temp.path());

        let mut first = RunManifest::new(BaseModel::Llama3_8B, PrecisionMode::FourBit);
        first.created_at = Utc::now() - chrono::Duration::hours(1);
        first.save(&layout).unwrap();
        let mut second = RunManifest::new(BaseModel::Llama3_70B, PrecisionMode::Float16);
        second.save(&layout).unwrap();

        let latest = load_run(&layout, None).unwrap();
        assert_eq!(latest.run_id, second.run_id);
        let explicit = load_run(&layout, Some(&first.run_id)).unwrap();
        assert_eq!(explicit.base_model, BaseModel::Llama3_8B);
    }

    #[test]
    fn test_load_run_without_runs_errors() {
        let temp = TempDir::new().unwrap();
        let layout = RunLayout::for_workspace_root(temp.path());
        assert!(list_runs(&layout).unwrap().is_empty());
        assert!(matches!(load_run(&layout, None), Err(TuneError::Manifest(_))));
    }

    #[test]
    fn test_list_runs_skips_corrupt_manifest() {
        let temp = TempDir::new().unwrap();
        let layout = RunLayout::for_workspace_root(temp.path());

        let mut good = RunManifest::new(BaseModel::Llama3_8B, PrecisionMode::FourBit);
        good.save(&layout).unwrap();
        let broken = RunId("broken".to_string());
        layout.ensure_run_dir(&broken).unwrap();
        std::fs::write(layout.manifest_path(&broken), "{ not json").unwrap();

        let runs = list_runs(&layout).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(load_run(&layout, None).unwrap().run_id, good.run_id);
    }

    #[test]
    fn test_run_id_rejects_paths() {
        for bad in ["", "..", ".", "../..", "a/b", "a\\b"] {
            assert!(matches!(RunId::parse(bad), Err(TuneError::Manifest(_))), "accepted {bad:?}");
        }
        assert_eq!(RunId::parse(" run-1 ").unwrap(), RunId("run-1".to_string()));

        let temp = TempDir::new().unwrap();
        let layout = RunLayout::for_workspace_root(temp.path());
        let escaped = RunId("../..".to_string());
        assert!(matches!(load_run(&layout, Some(&escaped)), Err(TuneError::Manifest(_))));
    }
}
