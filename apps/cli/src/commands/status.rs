//! Status command implementation.

use crate::session::{GlobalContext, Session};
use anyhow::{Context, Result};
use colored::Colorize;
use peft_training::{list_runs, RunLayout, RunManifest};

/// Show one run, or list all runs when no id is given.
///
/// Listing reads only local manifests; `--refresh` asks the platform for
/// the current job state and so needs full configuration.
pub async fn execute(ctx: &GlobalContext, run: Option<String>, refresh: bool, json: bool) -> Result<()> {
    if run.is_none() && !refresh {
        let layout = RunLayout::for_workspace_root(&ctx.workspace);
        let runs = list_runs(&layout).context("Failed to list runs")?;
        if json {
            println!("{}", serde_json::to_string_pretty(&runs)?);
        } else {
            print_runs(&runs);
        }
        return Ok(());
    }

    let mut session = Session::open(ctx)?;
    let mut manifest = session.load_run(run.as_deref())?;
    if refresh {
        if let Some(job) = manifest.job_name.clone() {
            let status = session.plane().get_job(&job).await.with_context(|| format!("Failed to query job {job}"))?;
            manifest.job_state = Some(status.state.to_string());
            session.save_run(&mut manifest)?;
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&manifest)?);
    } else {
        print_run(&manifest);
    }
    Ok(())
}

fn print_runs(runs: &[RunManifest]) {
    println!();
    if runs.is_empty() {
        println!("{}", "No runs yet. Start one with `peft train`.".yellow());
        println!();
        return;
    }
    println!("{}", format!("Runs ({})", runs.len()).bold().cyan());
    for run in runs {
        let marker = if run.is_clean() { "clean".dimmed() } else { "live".green() };
        println!(
            "  {}  {}  {}  {}",
            run.run_id.to_string().cyan(),
            run.created_at.format("%Y-%m-%d %H:%M"),
            run.base_model,
            marker
        );
    }
    println!();
}

fn print_run(run: &RunManifest) {
    let none = || "-".dimmed().to_string();
    println!();
    println!("{}", format!("Run {}", run.run_id).bold().cyan());
    println!("  Model:     {} ({})", run.base_model, run.precision_mode);
    println!("  Created:   {}", run.created_at.to_rfc3339());
    if let Some(allocation) = &run.training_allocation {
        println!("  Training:  {allocation}");
    }
    println!("  Job:       {}", run.job_name.clone().unwrap_or_else(none));
    println!("  State:     {}", run.job_state.clone().unwrap_or_else(none));
    if let Some(artifact) = &run.artifact {
        println!("  Merged:    {}", artifact.merged_model_dir);
    }
    if let Some(allocation) = &run.serving_allocation {
        println!("  Serving:   {allocation}");
    }
    println!("  Uploaded:  {}", run.model_name.clone().unwrap_or_else(none));
    println!("  Endpoint:  {}", run.endpoint_name.clone().unwrap_or_else(none));
    println!();
}
