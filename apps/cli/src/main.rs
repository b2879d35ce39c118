//! PEFT CLI - LoRA fine-tuning and serving on a managed ML platform
//!
//! This CLI provides a `peft` command that trains a LoRA adapter on a
//! Llama 3 base model, deploys the merged model behind an endpoint, sends
//! predictions, and deletes everything the run created.

mod commands;
mod config;
mod session;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, shells};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::types::{ConfigCommand, ConfigOverrides, DeployArgs, PredictArgs, ResolveArgs, RunArgs, TrainArgs};
use commands::{cleanup, deploy, predict, resolve, run, status, train};
use session::GlobalContext;

/// PEFT CLI - Parameter-efficient fine-tuning runs
///
/// Every remote resource a run creates is recorded under `.peft/runs/` so
/// that `peft cleanup` can remove it later.
#[derive(Parser, Debug)]
#[command(
    name = "peft",
    author,
    version,
    about = "LoRA fine-tuning, deployment, and prediction for Llama 3 models"
)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Workspace directory holding `.peft/runs` (defaults to the current directory)
    #[arg(short = 'w', long, global = true)]
    workspace: Option<PathBuf>,

    /// Use the in-memory control plane instead of the real platform
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(flatten)]
    overrides: ConfigOverrides,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the training and serving hardware for a model
    ///
    /// Purely local: no configuration or credentials are needed.
    Resolve(ResolveArgs),

    /// Submit a LoRA fine-tuning job and wait for it
    Train(TrainArgs),

    /// Deploy a run's merged model behind a new endpoint
    Deploy(DeployArgs),

    /// Send one prompt to a run's endpoint
    Predict(PredictArgs),

    /// Delete the endpoint, model, and job a run created
    Cleanup {
        /// Run id (defaults to the most recent run)
        #[arg(long)]
        run: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List runs, or show one run's resources
    Status {
        /// Run id
        #[arg(long)]
        run: Option<String>,

        /// Query the platform for the job's current state
        #[arg(long)]
        refresh: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Train, deploy, predict once, and clean up
    Run(RunArgs),

    /// Inspect configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Ok(shell) = std::env::var("PEFT_GENERATE_COMPLETIONS") {
        let mut cmd = Args::command();
        match shell.as_str() {
            "bash" => generate(shells::Bash, &mut cmd, "peft", &mut std::io::stdout()),
            "zsh" => generate(shells::Zsh, &mut cmd, "peft", &mut std::io::stdout()),
            "fish" => generate(shells::Fish, &mut cmd, "peft", &mut std::io::stdout()),
            _ => anyhow::bail!("Unknown shell: {shell}. Supported: bash, zsh, fish"),
        }
        return Ok(());
    }

    let args = Args::parse();

    let level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    // Logs go to stderr so `--json` output stays parseable.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .without_time()
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let workspace = match args.workspace {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    let ctx = GlobalContext { workspace, dry_run: args.dry_run, overrides: args.overrides };

    match args.command {
        Command::Resolve(resolve_args) => resolve::execute(resolve_args),
        Command::Train(train_args) => train::execute(&ctx, train_args).await,
        Command::Deploy(deploy_args) => deploy::execute(&ctx, deploy_args).await,
        Command::Predict(predict_args) => predict::execute(&ctx, predict_args).await,
        Command::Cleanup { run, json } => cleanup::execute(&ctx, run, json).await,
        Command::Status { run, refresh, json } => status::execute(&ctx, run, refresh, json).await,
        Command::Run(run_args) => run::execute(&ctx, run_args).await,
        Command::Config(command) => commands::config::execute(&ctx.overrides, command),
    }
}
