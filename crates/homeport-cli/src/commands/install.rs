//! Install command - bring up the cluster and open homeport

use std::path::PathBuf;

use clap::Args;
use homeport_install::{Credentials, InstallOptions, SystemBrowser};

use crate::commands::Context;
use crate::display;
use crate::error::{CliError, Result};

#[derive(Debug, Args)]
pub struct InstallArgs {
    /// Host port for the ingress (defaults to the configured port)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Basic-auth username
    #[arg(short, long, env = "HOMEPORT_USERNAME", default_value = "admin")]
    pub username: String,

    /// Basic-auth password
    #[arg(long, env = "HOMEPORT_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Additional host to route to the front end (repeatable)
    #[arg(long = "host")]
    pub hosts: Vec<String>,

    /// Application chart version (latest when unset)
    #[arg(long)]
    pub chart_version: Option<String>,

    /// Set application chart values (key=value)
    #[arg(long = "set")]
    pub set: Vec<String>,

    /// Values file for the application chart
    #[arg(short = 'f', long = "values")]
    pub values: Option<PathBuf>,

    /// Check the front end is up, but do not open a browser
    #[arg(long)]
    pub no_browser: bool,
}

impl InstallArgs {
    fn options(self, default_port: u16) -> Result<InstallOptions> {
        let port = self.port.unwrap_or(default_port);
        if port == 0 {
            return Err(CliError::usage("port must be between 1 and 65535"));
        }

        let mut options = InstallOptions::new(port, Credentials::new(self.username, self.password));
        options.hosts = self.hosts;
        options.chart_version = self.chart_version;
        options.values = self.set;
        options.values_file = self.values;
        options.no_browser = self.no_browser;
        Ok(options)
    }
}

/// Run the install command
pub async fn run(context: &Context, args: InstallArgs) -> Result<()> {
    let options = args.options(context.settings.port)?;

    display::print_header("Installing homeport on", &context.provider.cluster_name, &context.provider.name);

    let outcome = context.orchestrator().install(&options, &SystemBrowser).await?;

    display::print_install_summary(&outcome);
    Ok(())
}
