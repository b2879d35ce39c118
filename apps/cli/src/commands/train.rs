//! Training command implementation.

use crate::commands::types::TrainArgs;
use crate::session::{GlobalContext, Session};
use anyhow::{Context, Result};
use colored::Colorize;
use peft_platform::{DispatchOptions, JobDispatcher, PlatformError};
use peft_training::{
    resolve, AcceleratorType, AdapterParams, BaseModel, DatasetRef, FineTuneRequest, LrScheduler,
    NullProgressSink, PrecisionMode, ProgressSink, RunManifest, StdoutProgressSink, TrainingHyperParams,
};
use std::time::Duration;

pub async fn execute(ctx: &GlobalContext, args: TrainArgs) -> Result<()> {
    let request = build_request(&args)?;
    let accelerator: AcceleratorType = args.accelerator.parse()?;
    let allocation = resolve(request.base_model.id(), accelerator, request.precision_mode)?;

    let session = Session::open(ctx)?;
    let progress: Box<dyn ProgressSink> =
        if args.json { Box::new(NullProgressSink) } else { Box::new(StdoutProgressSink) };
    let dispatcher = session.dispatcher(progress.as_ref(), options(&args));

    let mut manifest = RunManifest::new(request.base_model, request.precision_mode);
    manifest.training_allocation = Some(allocation);
    train_stage(&session, &dispatcher, &request, &mut manifest, args.detach).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&manifest)?);
        return Ok(());
    }

    println!();
    if args.detach {
        println!("{}", "Training job submitted".bold().green());
    } else {
        println!("{}", "Training complete".bold().green());
    }
    if session.is_dry_run() {
        println!("{}", "Dry run: nothing was created on the platform".yellow());
    }
    println!("  Run: {}", manifest.run_id.to_string().cyan());
    if let Some(job) = &manifest.job_name {
        println!("  Job: {}", job.dimmed());
    }
    if let Some(artifact) = &manifest.artifact {
        println!("  Adapter: {}", artifact.adapter_dir.dimmed());
        println!("  Merged model: {}", artifact.merged_model_dir.dimmed());
    }
    println!("  Next: {}", "peft deploy".dimmed());
    println!();
    Ok(())
}

pub fn options(args: &TrainArgs) -> DispatchOptions {
    DispatchOptions { job_poll_interval: Duration::from_secs(args.poll_interval), ..DispatchOptions::default() }
}

pub fn build_request(args: &TrainArgs) -> Result<FineTuneRequest> {
    let model: BaseModel = args.model.parse()?;
    let precision: PrecisionMode = args.precision.parse()?;
    let lr_scheduler: LrScheduler = args.lr_scheduler.parse()?;
    let template = if args.no_template { None } else { Some(args.template.clone()) };

    let request = FineTuneRequest::new(model, DatasetRef::parse(&args.dataset)?)
        .with_text_column(args.text_column.clone())
        .with_template(template)
        .with_precision(precision)
        .with_adapter(AdapterParams { rank: args.lora_rank, alpha: args.lora_alpha, dropout: args.lora_dropout })
        .with_hyperparams(TrainingHyperParams {
            max_seq_length: args.max_seq_length,
            per_device_batch_size: args.batch_size,
            gradient_accumulation_steps: args.gradient_accumulation_steps,
            max_steps: args.max_steps,
            learning_rate: args.learning_rate,
            lr_scheduler,
        });
    request.validate()?;
    Ok(request)
}

/// Submit the job, record it, and (unless detached) wait for it.
///
/// The manifest is saved as soon as the job exists so a failed or
/// interrupted wait still leaves it cleanable.
pub async fn train_stage(
    session: &Session,
    dispatcher: &JobDispatcher<'_>,
    request: &FineTuneRequest,
    manifest: &mut RunManifest,
    detach: bool,
) -> Result<()> {
    let allocation = manifest.training_allocation.clone().context("run has no training allocation")?;
    let job = dispatcher.start_training(request, &allocation).await.context("Failed to submit training job")?;
    manifest.job_name = Some(job.name.clone());
    manifest.artifact = Some(job.artifact.clone());
    session.save_run(manifest)?;

    if detach {
        return Ok(());
    }

    match dispatcher.await_training(&job).await {
        Ok(_) => {
            manifest.job_state = Some(peft_platform::JobState::Succeeded.to_string());
            session.save_run(manifest)
        }
        Err(e) => {
            if let PlatformError::JobFailed { state, .. } = &e {
                manifest.job_state = Some(state.clone());
            }
            session.save_run(manifest)?;
            Err(e).context(format!("Training job {} did not complete", job.name))
        }
    }
}
