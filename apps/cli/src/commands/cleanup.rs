//! Cleanup command implementation.

use crate::session::{GlobalContext, Session};
use anyhow::{Context, Result};
use colored::Colorize;
use peft_platform::{CleanupReport, DispatchOptions, JobDispatcher};
use peft_training::{NullProgressSink, RunManifest};
use serde_json::json;

pub async fn execute(ctx: &GlobalContext, run: Option<String>, json: bool) -> Result<()> {
    let mut session = Session::open(ctx)?;
    let mut manifest = session.load_run(run.as_deref())?;

    let progress = NullProgressSink;
    let dispatcher = session.dispatcher(&progress, DispatchOptions::default());
    let report = cleanup_stage(&session, &dispatcher, &mut manifest).await?;

    if json {
        let out = json!({ "run_id": manifest.run_id, "report": report });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }
    print_report(&manifest, &report);
    Ok(())
}

/// Delete everything the manifest lists. The manifest is written back even
/// when a delete fails, so it keeps naming whatever is still live.
pub async fn cleanup_stage(
    session: &Session,
    dispatcher: &JobDispatcher<'_>,
    manifest: &mut RunManifest,
) -> Result<CleanupReport> {
    let result = dispatcher.cleanup(manifest).await;
    session.save_run(manifest)?;
    result.with_context(|| format!("Cleanup of run {} stopped early", manifest.run_id))
}

pub fn print_report(manifest: &RunManifest, report: &CleanupReport) {
    println!();
    println!("{}", format!("Cleaned up run {}", manifest.run_id).bold().green());
    if report.deleted.is_empty() && report.already_gone.is_empty() {
        println!("  {}", "Nothing to delete".dimmed());
    }
    for name in &report.deleted {
        println!("  {} {}", "deleted".green(), name);
    }
    for name in &report.already_gone {
        println!("  {} {}", "already gone".yellow(), name);
    }
    println!();
}
