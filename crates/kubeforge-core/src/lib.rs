//! Kubeforge Core - shared types for the cluster bootstrapping tool
//!
//! This crate provides the foundational types used throughout kubeforge:
//! - `ClusterConfig`: The cluster configuration file (machine-controller settings)
//! - `PollSettings`: Interval/timeout pairs for bounded convergence waits
//! - `CredentialSource`: Injected lookup for provider credentials

pub mod config;
pub mod credentials;
pub mod error;

pub use config::{ClusterConfig, DEFAULT_NAMESPACE, MachineControllerConfig, PollSettings};
pub use credentials::{CredentialSource, EnvCredentials, StaticCredentials};
pub use error::{CoreError, Result};
