//! Per-invocation state shared by the commands.

use crate::commands::types::ConfigOverrides;
use crate::config;
use anyhow::{Context, Result};
use peft_platform::{ControlPlane, DispatchOptions, JobDispatcher, MockControlPlane, VertexControlPlane};
use peft_training::{load_run, ProgressSink, RunConfig, RunId, RunLayout, RunManifest};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

const DRY_RUN_PREDICTION: &str = "(dry run) no model was called";

/// Global flags that apply to every command.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    pub workspace: PathBuf,
    pub dry_run: bool,
    pub overrides: ConfigOverrides,
}

/// Checked configuration, run layout, and the control plane for one invocation.
pub struct Session {
    pub config: RunConfig,
    pub layout: RunLayout,
    plane: Box<dyn ControlPlane>,
    dry_run: bool,
}

impl Session {
    /// Load configuration and pick the control plane.
    ///
    /// Dry runs use the in-memory control plane and need no access token.
    pub fn open(ctx: &GlobalContext) -> Result<Self> {
        let config = config::load_config(&ctx.overrides)?;
        let plane: Box<dyn ControlPlane> = if ctx.dry_run {
            Box::new(MockControlPlane::new().with_prediction(DRY_RUN_PREDICTION))
        } else {
            Box::new(VertexControlPlane::new(&config).context("Cannot reach the control plane")?)
        };
        info!(control_plane = plane.id(), project = %config.project_id, region = %config.region, "Session opened");

        Ok(Self::new(config, RunLayout::for_workspace_root(&ctx.workspace), plane, ctx.dry_run))
    }

    pub fn new(config: RunConfig, layout: RunLayout, plane: Box<dyn ControlPlane>, dry_run: bool) -> Self {
        Self { config, layout, plane, dry_run }
    }

    pub fn plane(&self) -> &dyn ControlPlane {
        self.plane.as_ref()
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn dispatcher<'a>(&'a self, progress: &'a dyn ProgressSink, mut options: DispatchOptions) -> JobDispatcher<'a> {
        if self.dry_run {
            options.job_poll_interval = Duration::ZERO;
        }
        JobDispatcher::new(self.plane(), &self.config, progress).with_options(options)
    }

    /// Load the given run, or the most recent one.
    ///
    /// On a dry run the in-memory control plane is reseeded with the
    /// resources the run recorded, so later stages find them.
    pub fn load_run(&mut self, run: Option<&str>) -> Result<RunManifest> {
        let id = run.map(RunId::parse).transpose()?;
        let manifest =
            load_run(&self.layout, id.as_ref()).context("Failed to load run manifest. Run `peft train` first.")?;
        if self.dry_run {
            self.plane = Box::new(MockControlPlane::new().with_prediction(DRY_RUN_PREDICTION).with_manifest(&manifest));
        }
        Ok(manifest)
    }

    pub fn save_run(&self, manifest: &mut RunManifest) -> Result<()> {
        manifest
            .save(&self.layout)
            .with_context(|| format!("Failed to save run manifest for {}", manifest.run_id))
    }
}
