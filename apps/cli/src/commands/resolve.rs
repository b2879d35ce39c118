//! Resolve command implementation.

use crate::commands::types::ResolveArgs;
use anyhow::Result;
use colored::Colorize;
use peft_training::{resolve, resolve_serving, AcceleratorType, BaseModel, PrecisionMode};
use serde_json::json;

/// Print the hardware a run would use, without touching the platform.
pub fn execute(args: ResolveArgs) -> Result<()> {
    let model: BaseModel = args.model.parse()?;
    let accelerator: AcceleratorType = args.accelerator.parse()?;
    let precision: PrecisionMode = args.precision.parse()?;
    let serving_accelerator: AcceleratorType = args.serving_accelerator.parse()?;

    let training = resolve(model.id(), accelerator, precision)?;
    let serving = resolve_serving(model.id(), serving_accelerator)?;

    if args.json {
        let out = json!({
            "model": model.id(),
            "size_class": model.size_class(),
            "precision_mode": precision,
            "training": training,
            "serving": serving,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!("{}", format!("Hardware for {model}").bold().cyan());
    println!("  Size class: {}", model.size_class().to_string().dimmed());
    println!("  Precision:  {}", precision.to_string().dimmed());
    println!();
    println!("  {:<10} {}", "Training".bold(), training);
    println!("  {:<10} {}", "Serving".bold(), serving);
    println!();
    Ok(())
}
