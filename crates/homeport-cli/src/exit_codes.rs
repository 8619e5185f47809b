//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

/// Success - operation completed without errors
pub const SUCCESS: i32 = 0;

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Configuration error - unreadable settings, unknown provider, bad host
pub const CONFIG_ERROR: i32 = 2;

/// Container engine missing or not running
pub const ENGINE_ERROR: i32 = 3;

/// Requested port is taken, or the ingress could not bind it
pub const PORT_ERROR: i32 = 4;

/// Cluster, chart or API operation failed
pub const CLUSTER_ERROR: i32 = 5;

/// A wait ran out (liveness, namespace deletion)
pub const TIMEOUT_ERROR: i32 = 6;

/// Usage error - invalid arguments or options (following sysexits.h convention)
pub const USAGE_ERROR: i32 = 64;

/// Interrupted by Ctrl-C (128 + SIGINT)
pub const INTERRUPTED: i32 = 130;
