//! aqms-ir: StationXML inventories in and out of the AQMS station tables.

use std::io;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use aqms_ir::cli::Args;
use aqms_ir::commands;
use aqms_ir::config::LoaderConfig;
use ingestion::Loader;

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    if let Err(e) = init_tracing(&args) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::from(1);
    }

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = commands::exit_code(&e);
            error!(error = %format!("{e:#}"), exit_code = code, "Command failed");
            eprintln!("Error: {e:#}");
            ExitCode::from(code as u8)
        }
    }
}

fn init_tracing(args: &Args) -> Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Reports go to stdout; logs stay on stderr.
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(io::stderr);

    if args.log_json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

async fn run(args: &Args) -> Result<()> {
    let config = LoaderConfig::resolve(args.config.as_deref(), &args.overrides())?;
    info!(url = %config.redacted_url(), "Starting aqms-ir");

    let store = config.open_store().await?;
    let loader = Loader::new(store);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    commands::execute(&loader, &args.command, args.json, &mut out).await
}
