//! CLI error types with exit code handling
//!
//! Wraps the orchestration errors and maps each of them to an exit code.

use homeport_core::CoreError;
use homeport_install::InstallError;
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// Install or uninstall failed
    #[error(transparent)]
    #[diagnostic(transparent)]
    Install(#[from] InstallError),

    /// Settings or provider could not be resolved
    #[error("Configuration error: {message}")]
    #[diagnostic(code(homeport::cli::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Invalid arguments
    #[error("Usage error: {message}")]
    #[diagnostic(code(homeport::cli::usage))]
    Usage { message: String },

    /// Internal error (runtime, unexpected failure)
    #[error("Internal error: {message}")]
    #[diagnostic(code(homeport::cli::internal))]
    Internal { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Install(e) => install_exit_code(e),
            CliError::Config { .. } => exit_codes::CONFIG_ERROR,
            CliError::Usage { .. } => exit_codes::USAGE_ERROR,
            CliError::Internal { .. } => exit_codes::ERROR,
        }
    }

    /// Create a usage error
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

fn install_exit_code(error: &InstallError) -> i32 {
    match error {
        InstallError::EngineUnreachable { .. } => exit_codes::ENGINE_ERROR,
        InstallError::PortUnavailable { .. }
        | InstallError::PortProbe { .. }
        | InstallError::IngressPortConflict { .. } => exit_codes::PORT_ERROR,
        InstallError::ContainerNotRunning { .. }
        | InstallError::InspectFailed { .. }
        | InstallError::InvalidPort { .. }
        | InstallError::PortNotFound { .. }
        | InstallError::ClusterOperationFailed { .. }
        | InstallError::ChartDeployFailed { .. }
        | InstallError::ClusterApi { .. } => exit_codes::CLUSTER_ERROR,
        InstallError::NamespaceDeleteTimeout { .. } | InstallError::LivenessTimeout { .. } => {
            exit_codes::TIMEOUT_ERROR
        }
        InstallError::Config { .. } => exit_codes::CONFIG_ERROR,
        InstallError::Cancelled => exit_codes::INTERRUPTED,
        _ => exit_codes::ERROR,
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        let help = match &err {
            CoreError::UnknownProvider { .. } => {
                Some("set `provider` in the settings file or pass --provider".to_string())
            }
            CoreError::YamlParse(_) => Some("settings are camelCase YAML".to_string()),
            _ => None,
        };
        CliError::Config {
            message: err.to_string(),
            help,
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
