//! End-to-end command: train, deploy, predict once, then clean up.

use crate::commands::types::RunArgs;
use crate::commands::{cleanup, deploy, predict, train};
use crate::session::{GlobalContext, Session};
use anyhow::{bail, Result};
use colored::Colorize;
use peft_platform::{DispatchOptions, Endpoint, JobDispatcher};
use peft_training::{resolve, resolve_serving, AcceleratorType, FineTuneRequest, RunManifest, StdoutProgressSink};
use std::time::Duration;
use tracing::warn;

pub async fn execute(ctx: &GlobalContext, args: RunArgs) -> Result<()> {
    if args.train.detach {
        bail!("--detach cannot be used with `peft run`; use `peft train --detach`");
    }

    // All local checks happen before anything is created remotely.
    let request = train::build_request(&args.train)?;
    let accelerator: AcceleratorType = args.train.accelerator.parse()?;
    let serving_accelerator: AcceleratorType = args.serving_accelerator.parse()?;
    let training_allocation = resolve(request.base_model.id(), accelerator, request.precision_mode)?;
    resolve_serving(request.base_model.id(), serving_accelerator)?;
    predict::sampling_params(&args.sampling).instance(&args.prompt)?;

    let session = Session::open(ctx)?;
    let progress = StdoutProgressSink;
    let options = DispatchOptions {
        deploy_timeout: args.deploy_timeout.map(Duration::from_secs),
        ..train::options(&args.train)
    };
    let dispatcher = session.dispatcher(&progress, options);

    let mut manifest = RunManifest::new(request.base_model, request.precision_mode);
    manifest.training_allocation = Some(training_allocation);
    println!("{}", format!("Run {}", manifest.run_id).bold().cyan());
    if session.is_dry_run() {
        println!("{}", "Dry run: nothing is created on the platform".yellow());
    }

    let outcome = pipeline(&session, &dispatcher, &request, &mut manifest, &args, serving_accelerator).await;

    if let Ok(text) = &outcome {
        predict::print_prediction(&args.prompt, text);
    }

    if args.keep {
        println!("{}", "Keeping remote resources; run `peft cleanup` when done".yellow());
        return outcome.map(|_| ());
    }

    let report = cleanup::cleanup_stage(&session, &dispatcher, &mut manifest).await;
    match (outcome, report) {
        (Ok(_), Ok(report)) => {
            cleanup::print_report(&manifest, &report);
            Ok(())
        }
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Ok(report)) => {
            cleanup::print_report(&manifest, &report);
            Err(e)
        }
        (Err(e), Err(cleanup_err)) => {
            warn!(error = %cleanup_err, run = %manifest.run_id, "Cleanup after a failed run also failed");
            Err(e)
        }
    }
}

async fn pipeline(
    session: &Session,
    dispatcher: &JobDispatcher<'_>,
    request: &FineTuneRequest,
    manifest: &mut RunManifest,
    args: &RunArgs,
    serving_accelerator: AcceleratorType,
) -> Result<String> {
    train::train_stage(session, dispatcher, request, manifest, false).await?;
    deploy::deploy_stage(session, dispatcher, manifest, serving_accelerator).await?;
    let Some(endpoint) = Endpoint::from_manifest(manifest) else {
        bail!("Deployment recorded no endpoint");
    };
    let params = predict::sampling_params(&args.sampling);
    Ok(dispatcher.predict(&endpoint, &args.prompt, &params).await?)
}
