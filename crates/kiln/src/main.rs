//! kiln CLI - static-site asset pipeline.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "Static-site asset pipeline with a live-reloading dev server")]
#[command(version)]
pub struct Cli {
    /// Task to run (see --list)
    #[arg(default_value = "default")]
    task: String,

    /// Path to kiln.toml config file
    #[arg(short, long, default_value = "kiln.toml")]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Dev server port
    #[arg(short, long)]
    port: Option<u16>,

    /// Do not open browser
    #[arg(long)]
    no_open: bool,

    /// List available tasks and exit
    #[arg(long)]
    list: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    let project = config::load_config(&cli.config)?.into_project(cli.port, cli.no_open);

    if cli.list {
        commands::list::run(&project);
        return Ok(());
    }

    commands::run::run(&project, &cli.task).await
}
