// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration file loading against real files.

use std::io::Write;

use south_bin::commands::ValidationReport;
use south_bin::{load_items, ConfigOverrides};
use south_opcua::{default_config, OpcUaPlugin, RealOpcUaTransport};
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_load_flat_object() {
    let file = write_config(
        r#"{
            "url": "opc.tcp://plc:4840",
            "asset": "plant",
            "subscription": "{\"subscriptions\": [\"ns=5;s=Root\"]}",
            "reportingInterval": 250
        }"#,
    );

    let items = load_items(file.path(), &ConfigOverrides::default()).unwrap();
    assert_eq!(items.get("url"), Some("opc.tcp://plc:4840"));
    assert_eq!(items.get("asset"), Some("plant"));
    assert_eq!(items.get("reportingInterval"), Some("250"));

    let report = ValidationReport::from_items(&items).unwrap();
    assert_eq!(report.config.subscriptions.len(), 1);
    assert_eq!(report.config.reporting_interval.as_millis(), 250);
}

#[test]
fn test_load_default_category() {
    let document = serde_json::to_string_pretty(&default_config()).unwrap();
    let file = write_config(&document);

    let items = load_items(file.path(), &ConfigOverrides::default()).unwrap();
    let report = ValidationReport::from_items(&items).unwrap();

    assert_eq!(report.config.asset, "opcua");
    assert_eq!(report.config.subscriptions[0].to_string(), "ns=5;s=85/0:Simulation");
    assert!(!report.config.username_auth);
}

#[test]
fn test_overrides_replace_file_values() {
    let file = write_config(r#"{"url": "opc.tcp://old:4840", "asset": "old"}"#);
    let overrides = ConfigOverrides {
        url: Some("opc.tcp://new:4840".to_string()),
        asset: Some("line1".to_string()),
    };

    let items = load_items(file.path(), &overrides).unwrap();
    assert_eq!(items.get("url"), Some("opc.tcp://new:4840"));
    assert_eq!(items.get("asset"), Some("line1"));
}

#[test]
fn test_missing_file_without_url_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.json");

    let err = load_items(&path, &ConfigOverrides::default()).unwrap_err();
    assert_eq!(err.exit_code(), 1);
    assert!(err.to_string().contains("absent.json"));
}

#[test]
fn test_missing_file_with_url_override() {
    let dir = tempfile::tempdir().unwrap();
    let overrides = ConfigOverrides {
        url: Some("opc.tcp://plc:4840".to_string()),
        asset: None,
    };

    let items = load_items(&dir.path().join("absent.json"), &overrides).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items.get("url"), Some("opc.tcp://plc:4840"));
}

#[test]
fn test_malformed_file() {
    let file = write_config("{ not json");
    let err = load_items(file.path(), &ConfigOverrides::default()).unwrap_err();
    assert_eq!(err.exit_code(), 1);
    assert!(err.to_string().starts_with("parsing "));
}

#[test]
fn test_init_rejects_missing_subscriptions_array() {
    let file = write_config(r#"{"url": "opc.tcp://plc:4840", "subscription": "{\"roots\": []}"}"#);
    let items = load_items(file.path(), &ConfigOverrides::default()).unwrap();

    let result = OpcUaPlugin::init(&items, RealOpcUaTransport::new("south-bin-test"));
    assert!(result.is_err());
}
