//! Uninstall command - remove homeport and its cluster

use clap::Args;
use homeport_install::UninstallOptions;

use crate::commands::Context;
use crate::display;
use crate::error::Result;

#[derive(Debug, Args)]
pub struct UninstallArgs {
    /// Keep the local data directory
    #[arg(long)]
    pub persisted: bool,
}

/// Run the uninstall command
pub async fn run(context: &Context, args: UninstallArgs) -> Result<()> {
    display::print_header("Uninstalling homeport from", &context.provider.cluster_name, &context.provider.name);

    let options = UninstallOptions {
        persisted: args.persisted,
    };
    let outcome = context.orchestrator().uninstall(&options).await?;

    display::print_uninstall_summary(&context.provider.cluster_name, &outcome);
    Ok(())
}
