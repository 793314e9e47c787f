//! CLI commands

// Infrastructure
pub mod cleanup;
pub mod provision;

// Cluster
pub mod machine_controller;
pub mod machines;
