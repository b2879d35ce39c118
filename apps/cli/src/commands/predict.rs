//! Predict command implementation.

use crate::commands::types::{PredictArgs, SamplingArgs};
use crate::session::{GlobalContext, Session};
use anyhow::{Context, Result};
use colored::Colorize;
use peft_platform::{DispatchOptions, Endpoint, SamplingParams};
use peft_training::NullProgressSink;
use serde_json::json;

pub fn sampling_params(args: &SamplingArgs) -> SamplingParams {
    SamplingParams {
        max_tokens: args.max_tokens,
        temperature: args.temperature,
        top_p: args.top_p,
        top_k: args.top_k,
        raw_response: args.raw_response,
    }
}

pub async fn execute(ctx: &GlobalContext, args: PredictArgs) -> Result<()> {
    let mut session = Session::open(ctx)?;
    let manifest = session.load_run(args.run.as_deref())?;
    let endpoint = Endpoint::from_manifest(&manifest)
        .with_context(|| format!("Run {} has no endpoint. Run `peft deploy` first.", manifest.run_id))?;

    let progress = NullProgressSink;
    let dispatcher = session.dispatcher(&progress, DispatchOptions::default());
    let params = sampling_params(&args.sampling);
    let text = dispatcher.predict(&endpoint, &args.prompt, &params).await.context("Prediction failed")?;

    if args.json {
        let out = json!({
            "run_id": manifest.run_id,
            "endpoint": endpoint.endpoint_name,
            "prompt": args.prompt,
            "prediction": text,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    print_prediction(&args.prompt, &text);
    Ok(())
}

pub fn print_prediction(prompt: &str, text: &str) {
    println!();
    println!("{} {}", "Prompt:".bold(), prompt);
    println!("{}", "Response:".bold().green());
    println!("{text}");
    println!();
}
