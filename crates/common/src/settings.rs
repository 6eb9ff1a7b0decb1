//! Process-wide configuration.
//!
//! Settings are loaded from TOML and merged with environment variables prefixed
//! with `BID_BRIDGE__`. For example, `BID_BRIDGE__PRIVACY__COPPA=true` overrides
//! `privacy.coppa`. Settings are read-only from the adapters' point of view.

use std::collections::BTreeMap;

use config::{Config, Environment, File, FileFormat};
use error_stack::{Report, ResultExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use validator::Validate;

use crate::error::BidBridgeError;

pub const ENVIRONMENT_VARIABLE_PREFIX: &str = "BID_BRIDGE";
pub const ENVIRONMENT_VARIABLE_SEPARATOR: &str = "__";

/// Shared privacy switches that are not auction-scoped.
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct PrivacyConfig {
    /// Site-wide COPPA flag. Never sourced from the bid request.
    #[serde(default)]
    pub coppa: bool,
    /// Seller chain object passed through verbatim when the auction's
    /// first-party data does not carry one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schain: Option<Json>,
}

/// Raw per-partner configuration tables, keyed by partner code.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(transparent)]
pub struct PartnerSettings {
    entries: BTreeMap<String, Json>,
}

impl PartnerSettings {
    /// Replace (or add) the raw configuration for `code`.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` cannot be represented as JSON.
    pub fn insert_config<T: Serialize>(
        &mut self,
        code: &str,
        value: &T,
    ) -> Result<(), Report<BidBridgeError>> {
        let json = serde_json::to_value(value).change_context(BidBridgeError::Configuration {
            message: format!("Failed to serialize config for partner '{code}'"),
        })?;
        self.entries.insert(code.to_string(), json);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, code: &str) -> Option<&Json> {
        self.entries.get(code)
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// Implemented by every partner's typed configuration section.
pub trait PartnerConfig: DeserializeOwned + Validate {
    fn is_enabled(&self) -> bool;
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct Settings {
    #[serde(default)]
    #[validate(nested)]
    pub privacy: PrivacyConfig,
    #[serde(default)]
    pub partners: PartnerSettings,
}

impl Settings {
    /// Load the settings embedded at build time, merged with the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded TOML is invalid or fails validation.
    pub fn new() -> Result<Self, Report<BidBridgeError>> {
        let toml_str = include_str!("../../../bid-bridge.toml");
        Self::from_toml(toml_str)
    }

    /// Parse settings from a TOML string, applying environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML cannot be parsed, an override has the
    /// wrong type, or validation fails.
    pub fn from_toml(toml_str: &str) -> Result<Self, Report<BidBridgeError>> {
        let environment = Environment::default()
            .prefix(ENVIRONMENT_VARIABLE_PREFIX)
            .separator(ENVIRONMENT_VARIABLE_SEPARATOR);

        let toml = File::from_str(toml_str, FileFormat::Toml);
        let config = Config::builder()
            .add_source(toml)
            .add_source(environment)
            .build()
            .change_context(BidBridgeError::Configuration {
                message: "Failed to build configuration".to_string(),
            })?;

        let settings: Self =
            config
                .try_deserialize()
                .change_context(BidBridgeError::Configuration {
                    message: "Failed to deserialize configuration".to_string(),
                })?;

        settings
            .validate()
            .change_context(BidBridgeError::Configuration {
                message: "Settings validation failed".to_string(),
            })?;

        Ok(settings)
    }

    /// Serialize the effective settings back to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if a partner table holds a value TOML cannot express.
    pub fn to_toml(&self) -> Result<String, Report<BidBridgeError>> {
        toml::to_string(self).change_context(BidBridgeError::Configuration {
            message: "Failed to serialize settings".to_string(),
        })
    }

    /// Read the typed configuration of a partner.
    ///
    /// Returns `Ok(None)` when the partner has no table or is disabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the table does not match `T` or fails validation.
    pub fn partner_config<T: PartnerConfig>(
        &self,
        code: &str,
    ) -> Result<Option<T>, Report<BidBridgeError>> {
        let Some(raw) = self.partners.get(code) else {
            return Ok(None);
        };

        let config: T =
            serde_json::from_value(raw.clone()).change_context(BidBridgeError::Configuration {
                message: format!("Invalid configuration for partner '{code}'"),
            })?;

        if !config.is_enabled() {
            return Ok(None);
        }

        config
            .validate()
            .change_context(BidBridgeError::Configuration {
                message: format!("Configuration for partner '{code}' failed validation"),
            })?;

        Ok(Some(config))
    }
}
