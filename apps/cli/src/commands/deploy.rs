//! Deploy command implementation.

use crate::commands::types::DeployArgs;
use crate::session::{GlobalContext, Session};
use anyhow::{bail, Context, Result};
use colored::Colorize;
use peft_platform::{DispatchOptions, JobDispatcher, JobState};
use peft_training::{
    resolve_serving, AcceleratorType, NullProgressSink, ProgressSink, RunManifest, ServingOptions, StdoutProgressSink,
};
use std::time::Duration;

pub async fn execute(ctx: &GlobalContext, args: DeployArgs) -> Result<()> {
    let accelerator: AcceleratorType = args.accelerator.parse()?;
    let mut session = Session::open(ctx)?;
    let mut manifest = session.load_run(args.run.as_deref())?;

    let progress: Box<dyn ProgressSink> =
        if args.json { Box::new(NullProgressSink) } else { Box::new(StdoutProgressSink) };
    let options = DispatchOptions {
        deploy_timeout: args.timeout.map(Duration::from_secs),
        serving: ServingOptions {
            gpu_memory_utilization: args.gpu_memory_utilization,
            max_model_len: args.max_model_len,
            ..ServingOptions::default()
        },
        ..DispatchOptions::default()
    };
    let dispatcher = session.dispatcher(progress.as_ref(), options);

    ensure_trained(&session, &mut manifest).await?;
    deploy_stage(&session, &dispatcher, &mut manifest, accelerator).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&manifest)?);
        return Ok(());
    }

    println!();
    println!("{}", "Model deployed".bold().green());
    println!("  Run: {}", manifest.run_id.to_string().cyan());
    if let Some(endpoint) = &manifest.endpoint_name {
        println!("  Endpoint: {}", endpoint.dimmed());
    }
    if let Some(allocation) = &manifest.serving_allocation {
        println!("  Hardware: {}", allocation.to_string().dimmed());
    }
    println!("  Next: {}", "peft predict \"<prompt>\" --temperature 1.0 --top-p 1.0".dimmed());
    println!();
    Ok(())
}

/// Make sure the run's training job finished successfully, asking the
/// platform when the manifest does not already say so.
pub async fn ensure_trained(session: &Session, manifest: &mut RunManifest) -> Result<()> {
    if manifest.job_state.as_deref() == Some(JobState::Succeeded.as_str()) {
        return Ok(());
    }
    let Some(job) = manifest.job_name.clone() else {
        bail!("Run {} has no training job", manifest.run_id);
    };

    let status = session.plane().get_job(&job).await.with_context(|| format!("Failed to query job {job}"))?;
    manifest.job_state = Some(status.state.to_string());
    session.save_run(manifest)?;

    if status.state != JobState::Succeeded {
        bail!("Training job {job} is {}; deploy needs a succeeded job", status.state);
    }
    Ok(())
}

/// Upload, create the endpoint, and deploy, saving the manifest after each
/// resource appears.
pub async fn deploy_stage(
    session: &Session,
    dispatcher: &JobDispatcher<'_>,
    manifest: &mut RunManifest,
    accelerator: AcceleratorType,
) -> Result<()> {
    if manifest.endpoint_name.is_some() {
        bail!("Run {} already has an endpoint; run `peft cleanup` first", manifest.run_id);
    }
    let artifact = manifest.artifact.clone().context("Run has no trained artifact")?;
    let model = manifest.base_model;
    let allocation = resolve_serving(model.id(), accelerator)?;
    manifest.serving_allocation = Some(allocation.clone());

    let model_name = match manifest.model_name.clone() {
        Some(existing) => existing,
        None => {
            let name = dispatcher
                .upload_model(model, &artifact, &allocation)
                .await
                .context("Failed to upload model")?;
            manifest.model_name = Some(name.clone());
            session.save_run(manifest)?;
            name
        }
    };

    let endpoint_name = dispatcher.create_endpoint(model).await.context("Failed to create endpoint")?;
    manifest.endpoint_name = Some(endpoint_name.clone());
    session.save_run(manifest)?;

    let deployed_model_id = dispatcher
        .deploy_to_endpoint(model, &endpoint_name, &model_name, &allocation)
        .await
        .context("Failed to deploy model")?;
    manifest.deployed_model_id = Some(deployed_model_id);
    session.save_run(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use peft_platform::{MockControlPlane, PlatformError};
    use peft_training::{Artifact, BaseModel, ConfigLayer, PrecisionMode, RunConfig, RunLayout};
    use tempfile::TempDir;

    fn session(temp: &TempDir, plane: MockControlPlane) -> Session {
        let config = RunConfig::from_layer(&ConfigLayer {
            project_id: Some("p".to_string()),
            bucket_uri: Some("gs://bucket".to_string()),
            ..ConfigLayer::default()
        })
        .unwrap();
        Session::new(config, RunLayout::for_workspace_root(temp.path()), Box::new(plane), false)
    }

    fn trained_run() -> RunManifest {
        let mut manifest = RunManifest::new(BaseModel::Llama3_8B, PrecisionMode::FourBit);
        manifest.job_name = Some("projects/mock/locations/mock/customJobs/1".to_string());
        manifest.job_state = Some(JobState::Succeeded.to_string());
        manifest.artifact = Some(Artifact::allocate("gs://bucket", "job").unwrap());
        manifest
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_deploy_leaves_endpoint_recorded() {
        let temp = TempDir::new().unwrap();
        let session = session(&temp, MockControlPlane::new().with_deploy_delay(Duration::from_secs(3600)));
        let progress = NullProgressSink;
        let options = DispatchOptions { deploy_timeout: Some(Duration::from_secs(60)), ..DispatchOptions::default() };
        let dispatcher = session.dispatcher(&progress, options);

        let mut manifest = trained_run();
        let err = deploy_stage(&session, &dispatcher, &mut manifest, AcceleratorType::NvidiaL4).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<PlatformError>(), Some(PlatformError::Timeout { seconds: 60, .. })));

        let saved = RunManifest::load(&session.layout, &manifest.run_id).unwrap();
        let endpoint = saved.endpoint_name.clone().unwrap();
        assert!(saved.model_name.is_some());
        assert!(saved.deployed_model_id.is_none());

        let mut saved = saved;
        let report = dispatcher.cleanup(&mut saved).await.unwrap();
        assert!(report.deleted.contains(&endpoint));
        assert!(saved.is_clean());
    }

    #[tokio::test]
    async fn test_deploy_stage_records_every_resource() {
        let temp = TempDir::new().unwrap();
        let session = session(&temp, MockControlPlane::new());
        let progress = NullProgressSink;
        let dispatcher = session.dispatcher(&progress, DispatchOptions::default());

        let mut manifest = trained_run();
        deploy_stage(&session, &dispatcher, &mut manifest, AcceleratorType::NvidiaA100_80Gb).await.unwrap();

        let saved = RunManifest::load(&session.layout, &manifest.run_id).unwrap();
        assert!(saved.endpoint_name.is_some());
        assert!(saved.deployed_model_id.is_some());
        assert_eq!(saved.serving_allocation.unwrap().machine_type, "a2-ultragpu-1g");

        let again = deploy_stage(&session, &dispatcher, &mut manifest, AcceleratorType::NvidiaL4).await;
        assert!(again.unwrap_err().to_string().contains("already has an endpoint"));
    }
}
