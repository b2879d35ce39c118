use crate::error::TuneResult;
use crate::manifest::RunId;
use std::path::{Path, PathBuf};

/// Filesystem layout for local run state.
///
/// Default layout is under `<workspace>/.peft/runs/<run_id>/...`
#[derive(Debug, Clone)]
pub struct RunLayout {
    root: PathBuf,
}

impl RunLayout {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn for_workspace_root(workspace_root: &Path) -> Self {
        Self::new(workspace_root.join(".peft").join("runs"))
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn run_dir(&self, run_id: &RunId) -> PathBuf {
        self.root.join(run_id.0.as_str())
    }

    #[must_use]
    pub fn manifest_path(&self, run_id: &RunId) -> PathBuf {
        self.run_dir(run_id).join("run_manifest.json")
    }

    pub fn ensure_run_dir(&self, run_id: &RunId) -> TuneResult<()> {
        std::fs::create_dir_all(self.run_dir(run_id))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_layout_paths() {
        let temp = TempDir::new().unwrap();
        let layout = RunLayout::for_workspace_root(temp.path());
        let id = RunId("run-1".to_string());

        assert!(layout.root().ends_with(".peft/runs"));
        assert!(layout.manifest_path(&id).ends_with("run-1/run_manifest.json"));

        layout.ensure_run_dir(&id).unwrap();
        assert!(layout.run_dir(&id).is_dir());
    }
}
