//! Configuration commands.
//!
//! Configuration is loaded from TOML files and merged with environment variables
//! prefixed with `BID_BRIDGE__`. For example, `BID_BRIDGE__PRIVACY__COPPA=true`
//! will override `privacy.coppa` in the TOML file.

use std::fs;
use std::path::Path;

use bid_bridge_common::adapter::{build_registry, AdapterRegistry};
use bid_bridge_common::settings::Settings;

use crate::error::CliError;

/// Load settings from a TOML file merged with environment variables, or the
/// embedded defaults when no file is given.
pub(crate) fn load_settings(file: Option<&Path>, verbose: bool) -> Result<Settings, CliError> {
    let Some(file) = file else {
        if verbose {
            log::info!("Using embedded configuration");
        }
        return Settings::new()
            .map_err(|e| CliError::Config(format!("Failed to load embedded config: {e:?}")));
    };

    let content = fs::read_to_string(file)?;
    if verbose {
        log::info!("Loading config from: {}", file.display());
        log::info!("Environment variables with BID_BRIDGE__ prefix will be merged");
    }

    Settings::from_toml(&content)
        .map_err(|e| CliError::Config(format!("Failed to parse and merge config: {e:?}")))
}

/// Partner tables present in the settings that did not produce an adapter.
fn inactive_partners<'a>(settings: &'a Settings, registry: &AdapterRegistry) -> Vec<&'a str> {
    let active = registry.codes();
    settings
        .partners
        .codes()
        .filter(|code| !active.iter().any(|active| active == code))
        .collect()
}

/// Validate a configuration file.
///
/// Validates TOML syntax and field constraints after merging with environment
/// variables, then reports which partner tables yield an adapter.
pub fn validate(file: &Path, verbose: bool) -> Result<(), CliError> {
    let settings = load_settings(Some(file), verbose)?;
    let registry = build_registry(&settings);

    println!("Configuration is valid");
    println!("  File: {}", file.display());
    println!("  COPPA: {}", settings.privacy.coppa);
    println!(
        "  Seller chain: {}",
        if settings.privacy.schain.is_some() {
            "configured"
        } else {
            "none"
        }
    );

    println!("\nPartners:");
    for code in registry.codes() {
        println!("  - {}: enabled", code);
    }
    for code in inactive_partners(&settings, &registry) {
        println!("  - {}: disabled or invalid", code);
    }

    if verbose {
        let merged = settings
            .to_toml()
            .map_err(|e| CliError::Config(format!("Failed to serialize merged config: {e:?}")))?;
        println!("\nMerged configuration:");
        println!("---");
        println!("{}", merged.trim_end());
        println!("---");
    }

    Ok(())
}

/// List the partner codes that register an adapter.
pub fn partners(file: Option<&Path>, verbose: bool) -> Result<(), CliError> {
    let settings = load_settings(file, verbose)?;
    let registry = build_registry(&settings);

    for code in registry.codes() {
        println!("{}", code);
    }
    if verbose {
        for code in inactive_partners(&settings, &registry) {
            log::info!("Partner '{}' is configured but not registered", code);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const VALID_CONFIG: &str = r#"
[privacy]
coppa = true

[partners.adtrue]
endpoint = "https://hb.adtrue.com/prebid/auction"

[partners.gamma]
enabled = false
"#;

    fn write_config(dir: &TempDir, content: &str) -> PathBuf {
        let config_path = dir.path().join("bid-bridge.toml");
        fs::write(&config_path, content).expect("should write config");
        config_path
    }

    #[test]
    fn test_validate_valid_config() {
        let dir = TempDir::new().expect("should create temp dir");
        let config_path = write_config(&dir, VALID_CONFIG);

        assert!(validate(&config_path, false).is_ok());
        assert!(validate(&config_path, true).is_ok());
    }

    #[test]
    fn test_validate_invalid_toml() {
        let dir = TempDir::new().expect("should create temp dir");
        let config_path = write_config(&dir, "invalid { toml");

        assert!(matches!(
            validate(&config_path, false),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn test_validate_nonexistent_file() {
        let dir = TempDir::new().expect("should create temp dir");
        let config_path = dir.path().join("nonexistent.toml");

        assert!(matches!(validate(&config_path, false), Err(CliError::Io(_))));
    }

    #[test]
    fn test_inactive_partners() {
        let dir = TempDir::new().expect("should create temp dir");
        let config_path = write_config(&dir, VALID_CONFIG);
        let settings = load_settings(Some(&config_path), false).expect("should load config");
        let registry = build_registry(&settings);

        assert_eq!(registry.codes(), vec!["adtrue"]);
        assert_eq!(inactive_partners(&settings, &registry), vec!["gamma"]);
    }

    #[test]
    fn test_load_embedded_settings() {
        let settings = load_settings(None, false).expect("should load embedded config");
        assert!(!build_registry(&settings).is_empty());
    }
}
