// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `validate` command.

use serde_json::{json, Value};
use south_opcua::{ConfigTranslator, ConnectorConfig, SecurityMode};

use crate::cli::{Cli, OutputFormat, ValidateArgs};
use crate::error::{BinError, BinResult};
use crate::loader::{load_items, ConfigOverrides};

/// Outcome of translating a configuration file.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    /// The translated configuration.
    pub config: ConnectorConfig,
    /// Settings that are accepted but probably not what was intended.
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// Translates `items` exactly as plugin init does and collects warnings.
    pub fn from_items(items: &south_opcua::ConfigItems) -> BinResult<Self> {
        let config = ConfigTranslator::translate(items)
            .map_err(|e| BinError::from(e).with_context("Configuration validation failed"))?;

        let mut warnings = Vec::new();
        if config.subscriptions.is_empty() {
            warnings.push("No subscription roots configured".to_string());
        }
        if config.username_auth && config.username.is_empty() {
            warnings.push("Username authentication selected without a username".to_string());
        }
        if matches!(config.security_mode, SecurityMode::Sign | SecurityMode::SignAndEncrypt)
            && config.certificates.client_cert.is_none()
        {
            warnings.push(format!(
                "Security mode {} selected without a client certificate",
                config.security_mode
            ));
        }

        Ok(Self { config, warnings })
    }

    /// Summary suitable for JSON output. The password is never included.
    pub fn summary(&self) -> Value {
        let config = &self.config;
        json!({
            "url": config.url,
            "asset": config.asset,
            "subscribe_by_id": config.subscribe_by_id,
            "subscriptions": config.subscriptions.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "reporting_interval_ms": config.reporting_interval.as_millis() as u64,
            "security_mode": config.security_mode.to_string(),
            "security_policy": config.security_policy.to_string(),
            "user_auth": if config.username_auth { "username" } else { "anonymous" },
        })
    }
}

/// Executes the `validate` command.
pub fn validate(cli: &Cli, args: ValidateArgs) -> BinResult<()> {
    let config_path = &cli.config;
    let items = load_items(config_path, &ConfigOverrides::default())?;
    let report = ValidationReport::from_items(&items)?;

    match args.format {
        OutputFormat::Text => {
            let config = &report.config;
            println!("✓ Configuration is valid: {}", config_path.display());
            println!();
            println!("Summary:");
            println!("  Endpoint:           {}", config.url);
            println!("  Asset prefix:       {}", config.asset);
            println!("  Subscription roots: {}", config.subscriptions.len());
            for root in &config.subscriptions {
                println!("    - {}", root);
            }
            println!("  Reporting interval: {} ms", config.reporting_interval.as_millis());
            println!("  Security:           {} / {}", config.security_mode, config.security_policy);

            if !report.warnings.is_empty() {
                println!();
                println!("Warnings:");
                for warning in &report.warnings {
                    println!("  ⚠ {}", warning);
                }
            }

            if args.show_config {
                println!();
                println!("Translated configuration:");
                println!("{:#?}", config);
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "valid": true,
                "config_path": config_path.display().to_string(),
                "summary": report.summary(),
                "warnings": report.warnings,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use south_opcua::ConfigItems;

    fn items() -> ConfigItems {
        ConfigItems::new()
            .with("url", "opc.tcp://plc:4840")
            .with("subscription", r#"{"subscriptions": ["ns=2;s=Line1"]}"#)
    }

    #[test]
    fn test_report_clean() {
        let report = ValidationReport::from_items(&items()).unwrap();
        assert!(report.warnings.is_empty());
        assert_eq!(report.summary()["subscriptions"][0], "ns=2;s=Line1");
        assert_eq!(report.summary()["user_auth"], "anonymous");
    }

    #[test]
    fn test_report_warnings() {
        let items = items()
            .with("subscription", r#"{"subscriptions": []}"#)
            .with("userAuthPolicy", "username")
            .with("securityMode", "Sign");
        let report = ValidationReport::from_items(&items).unwrap();
        assert_eq!(report.warnings.len(), 3);
    }

    #[test]
    fn test_report_missing_url() {
        let items = ConfigItems::new().with("subscription", r#"{"subscriptions": []}"#);
        let err = ValidationReport::from_items(&items).unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_summary_hides_password() {
        let items = items()
            .with("userAuthPolicy", "username")
            .with("username", "operator")
            .with("password", "hunter2");
        let report = ValidationReport::from_items(&items).unwrap();
        assert!(!report.summary().to_string().contains("hunter2"));
    }
}
