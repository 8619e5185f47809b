//! homeport CLI - run homeport locally on a kind cluster

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

mod commands;
mod display;
mod error;
mod exit_codes;

use commands::Context;
use commands::install::InstallArgs;
use commands::uninstall::UninstallArgs;
use error::{CliError, Result};

#[derive(Parser)]
#[command(name = "homeport")]
#[command(author = "homeport Contributors")]
#[command(version)]
#[command(about = "Run homeport locally on a kind cluster", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,

    /// Settings file (default: <config dir>/homeport/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Cluster provider (kind, external)
    #[arg(long, global = true)]
    provider: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the cluster, deploy homeport and open it in a browser
    Install(InstallArgs),

    /// Remove homeport and delete the cluster
    Uninstall(UninstallArgs),
}

fn main() {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = Cli::parse();
    init_tracing(cli.debug);

    let code = match run(cli) {
        Ok(()) => exit_codes::SUCCESS,
        Err(e) => {
            let code = e.exit_code();
            eprintln!("{:?}", miette::Report::new(e));
            code
        }
    };
    std::process::exit(code);
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::internal(format!("failed to start async runtime: {}", e)))?;

    runtime.block_on(async move {
        let cancel = CancellationToken::new();
        let context = Context::load(cli.config.as_deref(), cli.provider.as_deref(), cancel.clone())?;

        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\n{} interrupted, stopping", style("⚠").yellow().bold());
                cancel.cancel();
            }
        });

        match cli.command {
            Commands::Install(args) => commands::install::run(&context, args).await,
            Commands::Uninstall(args) => commands::uninstall::run(&context, args).await,
        }
    })
}
