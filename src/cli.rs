use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "tapedeck")]
#[command(about = "Hourly stream recording reconciler", long_about = None)]
pub struct Cli {
    /// Configuration file (overrides TAPEDECK_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a single reconciliation pass and exit
    Run,
    /// Reconcile on an interval and serve /health
    Serve(ServeArgs),
    /// Print the windows that would be reconciled, without touching storage
    Plan(PlanArgs),
}

#[derive(clap::Args, Debug)]
pub struct ServeArgs {
    /// Address to bind the HTTP server to (defaults to server.bind_addr)
    #[arg(long)]
    pub address: Option<SocketAddr>,
}

#[derive(clap::Args, Debug)]
pub struct PlanArgs {
    /// Instant to plan for, RFC 3339 (defaults to now)
    #[arg(long)]
    pub at: Option<DateTime<Utc>>,
}
