//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

/// Configuration error - missing credentials or invalid cluster config
pub const CONFIG_ERROR: i32 = 2;

/// Provisioning error - a terraform stage failed
pub const PROVISION_ERROR: i32 = 3;

/// Cluster error - Kubernetes API call failed
pub const CLUSTER_ERROR: i32 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;

/// Timed out (same as timeout(1))
pub const TIMEOUT: i32 = 124;

/// Interrupted by Ctrl-C
pub const CANCELLED: i32 = 130;
