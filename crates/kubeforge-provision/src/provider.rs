//! Cloud provider descriptors
//!
//! Each provider is a binding of a terraform directory and the credential
//! variables that must be set before anything is run. Adding a provider means
//! adding one row to [`PROVIDERS`].

use kubeforge_core::CredentialSource;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{ProvisionError, Result};

/// Static description of a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderSpec {
    /// Canonical name
    pub name: &'static str,
    /// Directory under the terraform root
    pub directory: &'static str,
    /// Variables that must be non-empty
    pub credentials: &'static [&'static str],
}

/// Provider descriptor table, indexed by [`Provider`]
pub const PROVIDERS: [ProviderSpec; 3] = [
    ProviderSpec {
        name: "aws",
        directory: "aws",
        credentials: &["AWS_ACCESS_KEY_ID", "AWS_SECRET_ACCESS_KEY"],
    },
    ProviderSpec {
        name: "digitalocean",
        directory: "digitalocean",
        credentials: &["DIGITALOCEAN_TOKEN"],
    },
    ProviderSpec {
        name: "hetzner",
        directory: "hetzner",
        credentials: &["HCLOUD_TOKEN"],
    },
];

/// Supported cloud providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Aws,
    DigitalOcean,
    Hetzner,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::Aws, Provider::DigitalOcean, Provider::Hetzner];

    pub fn spec(self) -> &'static ProviderSpec {
        match self {
            Provider::Aws => &PROVIDERS[0],
            Provider::DigitalOcean => &PROVIDERS[1],
            Provider::Hetzner => &PROVIDERS[2],
        }
    }

    pub fn name(self) -> &'static str {
        self.spec().name
    }

    pub fn directory(self) -> &'static str {
        self.spec().directory
    }

    pub fn required_credentials(self) -> &'static [&'static str] {
        self.spec().credentials
    }

    /// Resolve every required credential, failing if any is missing or empty
    pub fn resolve_credentials(
        self,
        source: &dyn CredentialSource,
    ) -> Result<BTreeMap<String, String>> {
        let mut resolved = BTreeMap::new();
        let mut missing = Vec::new();

        for key in self.required_credentials() {
            match source.lookup(key) {
                Some(value) => {
                    resolved.insert(key.to_string(), value);
                }
                None => missing.push(key.to_string()),
            }
        }

        if !missing.is_empty() {
            return Err(ProvisionError::MissingCredential {
                provider: self.name().to_string(),
                missing,
            });
        }

        Ok(resolved)
    }

    /// Credentials that are currently available, without failing on gaps
    pub fn available_credentials(self, source: &dyn CredentialSource) -> BTreeMap<String, String> {
        self.required_credentials()
            .iter()
            .filter_map(|key| source.lookup(key).map(|value| (key.to_string(), value)))
            .collect()
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Provider {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "aws" => Ok(Provider::Aws),
            "digitalocean" | "do" => Ok(Provider::DigitalOcean),
            "hetzner" | "hcloud" => Ok(Provider::Hetzner),
            _ => Err(ProvisionError::UnknownProvider(s.to_string())),
        }
    }
}
