mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use serde_json::json;
use tapedeck::config::Config;
use tapedeck::observability::init_tracing;
use tapedeck::progress::KeyLayout;
use tapedeck::schedule::{Buffers, plan};
use tapedeck::server::{self, AppState};
use tapedeck::streams::StreamSource;

type AnyError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), AnyError> {
    let cli = Cli::parse();

    let config = match cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    init_tracing(&config.telemetry);

    match cli.command {
        Commands::Run => run_once(config).await?,
        Commands::Serve(args) => server::run(config, args.address).await?,
        Commands::Plan(args) => {
            print_plan(config, args.at.unwrap_or_else(chrono::Utc::now)).await?
        }
    }

    Ok(())
}

async fn run_once(config: Config) -> Result<(), AnyError> {
    let state = AppState::from_config(config)?;
    let report = state
        .reconciler
        .run(&state.source, &state.cache)
        .await?;

    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.failed() > 0 {
        tracing::warn!(failed = report.failed(), "Some windows failed to reconcile");
    }
    Ok(())
}

async fn print_plan(config: Config, at: chrono::DateTime<chrono::Utc>) -> Result<(), AnyError> {
    let source = StreamSource::from_config(&config.streams)?;
    let streams = source.fetch(&Default::default()).await?;
    let layout = KeyLayout::new(
        config.storage.prefix.clone(),
        config.storage.marker_suffix.clone(),
    );

    for (stream, window) in plan(&streams, at, Buffers::from(&config.schedule)) {
        let line = json!({
            "stream": stream.label(),
            "url": stream.url,
            "hour_start": window.hour_start,
            "window_start": window.window_start,
            "window_stop": window.window_stop,
            "hour_end": window.hour_end(),
            "prefix": layout.window_prefix(stream, window.hour_start),
        });
        println!("{}", line);
    }

    Ok(())
}
