//! Configuration management

use std::{env, path::Path};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};

use crate::topology::DialectHint;
use crate::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory scanned for topology descriptors (`*.xml`, `*.conf`)
    pub topologies_dir: String,

    /// Descriptor dialect to force for every load (`native` or `cluster`).
    /// When unset, the dialect is auto-detected from each document's root
    /// element.
    #[serde(default)]
    pub dialect: Option<String>,

    /// Federation filter configuration
    pub federation: FederationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            topologies_dir: "topologies".to_string(),
            dialect: None,
            federation: FederationConfig::default(),
        }
    }
}

/// Federation filter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FederationConfig {
    /// Enable the federation filter
    pub enabled: bool,

    /// Shared secret for the built-in HMAC token authority.
    /// Supports: literal value, `env:VAR_NAME`, or `auto` (generates a random
    /// secret at startup, useful for single-process deployments).
    #[serde(default)]
    pub secret: Option<String>,
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            secret: None,
        }
    }
}

impl FederationConfig {
    /// Resolve the shared secret (expand env vars, generate if `auto`)
    #[must_use]
    pub fn resolve_secret(&self) -> Option<String> {
        self.secret.as_ref().map(|secret| {
            if secret == "auto" {
                use rand::RngExt;
                let random_bytes: [u8; 32] = rand::rng().random();
                format!(
                    "pcl_{}",
                    base64::Engine::encode(
                        &base64::engine::general_purpose::URL_SAFE_NO_PAD,
                        random_bytes
                    )
                )
            } else if let Some(var_name) = secret.strip_prefix("env:") {
                env::var(var_name).unwrap_or_else(|_| secret.clone())
            } else {
                secret.clone()
            }
        })
    }
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist or cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        // Load from file if provided
        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        // Merge environment variables (PORTCULLIS_ prefix)
        figment = figment.merge(Env::prefixed("PORTCULLIS_").split("__"));

        figment.extract().map_err(|e| Error::Config(e.to_string()))
    }

    /// Check field-level invariants that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty topologies directory, an unknown dialect
    /// name, or a federation section that is enabled without a secret.
    pub fn validate(&self) -> Result<()> {
        if self.topologies_dir.is_empty() {
            return Err(Error::Config(
                "topologies_dir must not be empty".to_string(),
            ));
        }
        self.dialect_hint()?;
        if self.federation.enabled && self.federation.secret.is_none() {
            return Err(Error::Config(
                "federation.secret must be set when federation is enabled".to_string(),
            ));
        }
        Ok(())
    }

    /// The configured dialect hint, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if `dialect` names an unknown dialect.
    pub fn dialect_hint(&self) -> Result<Option<DialectHint>> {
        self.dialect
            .as_deref()
            .map(|name| {
                name.parse()
                    .map_err(|()| Error::Config(format!("Unknown dialect: {name}")))
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid_once_secret_is_set() {
        let mut config = Config::default();
        assert_eq!(config.topologies_dir, "topologies");
        assert!(config.federation.enabled);

        // Enabled federation without a secret must be rejected
        assert!(config.validate().is_err());

        config.federation.secret = Some("shared-secret".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn disabled_federation_needs_no_secret() {
        let config = Config {
            federation: FederationConfig {
                enabled: false,
                secret: None,
            },
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn literal_secret_resolves_to_itself() {
        let config = FederationConfig {
            enabled: true,
            secret: Some("literal-secret".to_string()),
        };
        assert_eq!(config.resolve_secret(), Some("literal-secret".to_string()));
    }

    #[test]
    fn auto_secret_is_generated() {
        let config = FederationConfig {
            enabled: true,
            secret: Some("auto".to_string()),
        };
        let secret = config.resolve_secret().unwrap();
        assert!(secret.starts_with("pcl_"), "secret should start with pcl_");
        assert!(secret.len() > 40, "secret should be reasonably long");
    }

    #[test]
    fn unset_env_secret_falls_back_to_literal() {
        let config = FederationConfig {
            enabled: true,
            secret: Some("env:PORTCULLIS_TEST_UNSET_SECRET".to_string()),
        };
        assert_eq!(
            config.resolve_secret(),
            Some("env:PORTCULLIS_TEST_UNSET_SECRET".to_string())
        );
    }

    #[test]
    fn dialect_hint_parses_known_names() {
        let mut config = Config {
            dialect: Some("cluster".to_string()),
            ..Config::default()
        };
        assert_eq!(config.dialect_hint().unwrap(), Some(DialectHint::Cluster));

        config.dialect = Some("ini".to_string());
        assert!(config.dialect_hint().is_err());
    }
}
