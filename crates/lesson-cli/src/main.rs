//! Daily Lesson CLI
//!
//! Serves the lesson trigger over HTTP, or performs a single run from the
//! command line (for cron or CI schedulers).

use std::net::SocketAddr;
use std::path::Path;
use std::process::ExitCode;

use chrono::Utc;
use clap::{Parser, Subcommand};
use lesson_orchestrator::{
    create_router, AppState, Config, ErrorResponse, LessonResponse, LessonWorkflow, Secrets,
    WorkflowSettings,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Default port for the HTTP trigger.
const DEFAULT_PORT: u16 = 3000;

/// Daily Lesson - generates one Bible lesson a day and delivers it by
/// email and Telegram, keeping progress in a GitHub-hosted JSON file.
#[derive(Parser, Debug)]
#[command(name = "daily-lesson")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: lesson.json in current directory)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Serve the trigger endpoint at /api/generate-lesson
    Serve {
        /// Port for the HTTP server
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
    },
    /// Run the workflow once and print the trigger response
    Run,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(config = ?args.config, "Config file");

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

async fn run(args: Args) -> anyhow::Result<ExitCode> {
    let config = load_config(args.config.as_deref())?;
    let secrets = Secrets::from_env();

    let missing = secrets.missing();
    if !missing.is_empty() {
        tracing::warn!(
            missing = %missing.join(", "),
            "Some credentials are not set; the steps that need them will fail"
        );
    }

    let services = lesson_services::build_services(&config, &secrets)
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    let workflow = LessonWorkflow::new(services, WorkflowSettings::from_config(&config, &secrets));

    match args.command {
        Command::Serve { port } => {
            serve(workflow, port).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Run => Ok(run_once(&workflow).await),
    }
}

/// Serves the trigger until Ctrl+C.
async fn serve(workflow: LessonWorkflow, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    let router = create_router(AppState::new(workflow));

    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to bind to {addr}: {e}\n\nSuggestion: Try a different port with --port"
        )
    })?;

    tracing::info!(%addr, "Lesson trigger listening on /api/generate-lesson");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received Ctrl+C, shutting down");
            }
        })
        .await?;

    Ok(())
}

/// Runs the workflow once and prints the same JSON body the trigger returns.
async fn run_once(workflow: &LessonWorkflow) -> ExitCode {
    let today = Utc::now().date_naive();

    let (body, code) = match workflow.run(today).await {
        Ok(outcome) => (
            serde_json::to_string(&LessonResponse::from(&outcome)),
            ExitCode::SUCCESS,
        ),
        Err(failure) => {
            failure.log();
            (
                serde_json::to_string(&ErrorResponse::from(&failure)),
                ExitCode::from(1),
            )
        }
    };

    match body {
        Ok(body) => println!("{body}"),
        Err(e) => eprintln!("Error: cannot encode response: {e}"),
    }
    code
}

/// Loads configuration from the specified path or the current directory.
fn load_config(config_path: Option<&str>) -> anyhow::Result<Config> {
    match config_path {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            Config::load_from_file(path).map_err(|e| anyhow::anyhow!("{e}"))
        }
        None => Config::load().map_err(|e| anyhow::anyhow!("{e}")),
    }
}
