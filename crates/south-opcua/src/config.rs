// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration translation.
//!
//! The host hands the plugin a configuration category: a set of named items
//! whose values are strings. [`ConfigItems`] is that view, and
//! [`ConfigTranslator`] maps it onto a typed [`ConnectorConfig`].
//!
//! | key                 | effect                                    | default   |
//! |---------------------|-------------------------------------------|-----------|
//! | `url`               | server endpoint (required at init)        |           |
//! | `asset`             | asset name prefix                         | `opcua`   |
//! | `subscription`      | JSON `{"subscriptions": [node ids]}`      |           |
//! | `subscribeById`     | tokens from node IDs instead of names     | `false`   |
//! | `reportingInterval` | publishing interval in milliseconds       | `1000`    |
//! | `securityMode`      | Any, None, Sign, SignAndEncrypt           | `Any`     |
//! | `securityPolicy`    | Any, Basic256, Basic256Sha256             | `Any`     |
//! | `userAuthPolicy`    | anonymous, username                       | anonymous |
//! | `username`          | user name                                 |           |
//! | `password`          | password                                  |           |
//!
//! Certificate keys (`caCert`, `serverCert`, `clientCert`, `clientKey`,
//! `caCrl`) are stored only. Unknown keys are ignored.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{error, warn};

use crate::error::{ConfigurationError, OpcUaError, OpcUaResult};
use crate::types::{
    AuthPolicy, CertificatePaths, NodeId, SecurityMode, SecurityPolicy, SessionSettings,
    SubscriptionParameters,
};

/// Plugin name announced to the host.
pub const PLUGIN_NAME: &str = "open62541";

/// Asset prefix used when none is configured.
pub const DEFAULT_ASSET: &str = "opcua";

/// Publishing interval used when none is configured.
pub const DEFAULT_REPORTING_INTERVAL: Duration = Duration::from_millis(1000);

// =============================================================================
// ConfigItems
// =============================================================================

/// Key/value view of a configuration category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigItems {
    items: BTreeMap<String, String>,
}

impl ConfigItems {
    /// Creates an empty item set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON document.
    ///
    /// Accepts the category shape (`{"url": {"value": "..."}}`, falling back
    /// to `default` when there is no `value`) and a flat object
    /// (`{"url": "..."}`). Non-string values are stored as their JSON text.
    pub fn from_json(document: &str) -> OpcUaResult<Self> {
        let value: Value = serde_json::from_str(document).map_err(|e| {
            OpcUaError::configuration(ConfigurationError::invalid_document(e.to_string()))
        })?;
        Self::from_value(&value)
    }

    /// Builds items from an already parsed JSON object.
    pub fn from_value(value: &Value) -> OpcUaResult<Self> {
        let object = value.as_object().ok_or_else(|| {
            OpcUaError::configuration(ConfigurationError::invalid_document(
                "configuration must be a JSON object",
            ))
        })?;

        let items = object
            .iter()
            .map(|(key, item)| {
                let value = match item {
                    Value::Object(fields) => fields
                        .get("value")
                        .or_else(|| fields.get("default"))
                        .map(Self::scalar_text)
                        .unwrap_or_else(|| item.to_string()),
                    other => Self::scalar_text(other),
                };
                (key.clone(), value)
            })
            .collect();

        Ok(Self { items })
    }

    fn scalar_text(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }

    /// Sets an item, returning `self` for chaining.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Sets an item.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.items.insert(key.into(), value.into());
    }

    /// Returns the value of an item.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.items.get(key).map(String::as_str)
    }

    /// Returns `true` if the item exists.
    pub fn contains(&self, key: &str) -> bool {
        self.items.contains_key(key)
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if there are no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// =============================================================================
// ConnectorConfig
// =============================================================================

/// Typed connector configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectorConfig {
    /// Server endpoint URL.
    pub url: String,

    /// Asset name prefix.
    pub asset: String,

    /// Derive identity tokens from node IDs instead of browse names.
    pub subscribe_by_id: bool,

    /// Roots of the address-space walk.
    pub subscriptions: Vec<NodeId>,

    /// Publishing interval requested for the subscription.
    pub reporting_interval: Duration,

    /// Message security mode.
    pub security_mode: SecurityMode,

    /// Security policy.
    pub security_policy: SecurityPolicy,

    /// Authenticate with username and password.
    pub username_auth: bool,

    /// User name for username authentication.
    pub username: String,

    /// Password for username authentication.
    pub password: String,

    /// Certificate material (stored, not used to connect).
    pub certificates: CertificatePaths,
}

impl ConnectorConfig {
    /// Creates a configuration for `url` with every other setting at its
    /// default.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            asset: DEFAULT_ASSET.to_string(),
            subscribe_by_id: false,
            subscriptions: Vec::new(),
            reporting_interval: DEFAULT_REPORTING_INTERVAL,
            security_mode: SecurityMode::Invalid,
            security_policy: SecurityPolicy::Unspecified,
            username_auth: false,
            username: String::new(),
            password: String::new(),
            certificates: CertificatePaths::default(),
        }
    }

    /// Returns the identity the session authenticates with.
    pub fn auth(&self) -> AuthPolicy {
        if self.username_auth {
            AuthPolicy::Username {
                username: self.username.clone(),
                password: self.password.clone(),
            }
        } else {
            AuthPolicy::Anonymous
        }
    }

    /// Snapshot of what the transport needs to open a session.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            url: self.url.clone(),
            security_mode: self.security_mode,
            security_policy: self.security_policy,
            auth: self.auth(),
        }
    }

    /// Subscription parameters derived from the reporting interval.
    pub fn subscription_parameters(&self) -> SubscriptionParameters {
        SubscriptionParameters::with_publishing_interval(self.reporting_interval)
    }
}

impl fmt::Debug for ConnectorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorConfig")
            .field("url", &self.url)
            .field("asset", &self.asset)
            .field("subscribe_by_id", &self.subscribe_by_id)
            .field("subscriptions", &self.subscriptions)
            .field("reporting_interval", &self.reporting_interval)
            .field("security_mode", &self.security_mode)
            .field("security_policy", &self.security_policy)
            .field("username_auth", &self.username_auth)
            .field("username", &self.username)
            .field("password", &"***")
            .field("certificates", &self.certificates)
            .finish()
    }
}

// =============================================================================
// ConfigTranslator
// =============================================================================

/// Maps configuration items onto a [`ConnectorConfig`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigTranslator;

impl ConfigTranslator {
    /// Builds a fresh configuration. The `url` item is required.
    pub fn translate(items: &ConfigItems) -> OpcUaResult<ConnectorConfig> {
        let url = items.get("url").ok_or_else(|| {
            error!("OPC UA plugin is missing a URL");
            OpcUaError::configuration(ConfigurationError::missing_field("url"))
        })?;

        let mut config = ConnectorConfig::new(url);
        Self::apply(items, &mut config)?;
        Ok(config)
    }

    /// Applies every recognized item to `config`.
    ///
    /// Items are independent of each other. Unrecognized security options
    /// are logged and fall back to the unspecified value. A subscription
    /// item without a `subscriptions` array is fatal.
    pub fn apply(items: &ConfigItems, config: &mut ConnectorConfig) -> OpcUaResult<()> {
        if let Some(url) = items.get("url") {
            config.url = url.to_string();
        }

        config.asset = items.get("asset").unwrap_or(DEFAULT_ASSET).to_string();

        if let Some(by_id) = items.get("subscribeById") {
            config.subscribe_by_id = by_id == "true";
        }

        if let Some(document) = items.get("subscription") {
            config.subscriptions = Self::parse_subscriptions(document)?;
        }

        if let Some(interval) = items.get("reportingInterval") {
            match interval.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => config.reporting_interval = Duration::from_millis(ms),
                _ => warn!(value = %interval, "Invalid reporting interval, keeping current value"),
            }
        }

        if let Some(mode) = items.get("securityMode") {
            config.security_mode = SecurityMode::from_option(mode).unwrap_or_else(|| {
                error!(security_mode = %mode, "Invalid Security mode");
                SecurityMode::Invalid
            });
        }

        if let Some(policy) = items.get("securityPolicy") {
            config.security_policy = SecurityPolicy::from_option(policy).unwrap_or_else(|| {
                error!(security_policy = %policy, "Invalid Security policy");
                SecurityPolicy::Unspecified
            });
        }

        if let Some(policy) = items.get("userAuthPolicy") {
            config.username_auth = match policy {
                "username" => true,
                "anonymous" => false,
                other => {
                    warn!(policy = %other, "Unknown user authentication policy, using anonymous");
                    false
                }
            };
        }

        if let Some(username) = items.get("username") {
            config.username = username.to_string();
        }

        if let Some(password) = items.get("password") {
            config.password = password.to_string();
        }

        let certs = &mut config.certificates;
        for (key, slot) in [
            ("caCert", &mut certs.ca_cert),
            ("serverCert", &mut certs.server_cert),
            ("clientCert", &mut certs.client_cert),
            ("clientKey", &mut certs.client_key),
            ("caCrl", &mut certs.ca_crl),
        ] {
            if let Some(value) = items.get(key) {
                *slot = Some(value.to_string());
            }
        }

        Ok(())
    }

    /// Parses the subscription document into the list of walk roots.
    pub fn parse_subscriptions(document: &str) -> OpcUaResult<Vec<NodeId>> {
        let invalid = |reason: String| {
            OpcUaError::configuration(ConfigurationError::invalid_subscription(reason))
        };

        let value: Value = serde_json::from_str(document)
            .map_err(|e| invalid(format!("subscription is not valid JSON: {}", e)))?;

        let Some(entries) = value.get("subscriptions").and_then(Value::as_array) else {
            error!("OPC UA plugin is missing a subscriptions array");
            return Err(OpcUaError::configuration(ConfigurationError::MissingSubscriptions));
        };

        entries
            .iter()
            .map(|entry| {
                let text = entry
                    .as_str()
                    .ok_or_else(|| invalid(format!("subscription entry {} is not a string", entry)))?;
                text.parse::<NodeId>()
            })
            .collect()
    }
}

// =============================================================================
// Default Configuration
// =============================================================================

/// Returns the plugin's default configuration category.
pub fn default_config() -> Value {
    let cert_validity = " securityMode == \"Sign\" || securityMode == \"SignAndEncrypt\" ";
    let user_validity = " userAuthPolicy == \"username\" ";

    json!({
        "plugin": {
            "description": "Simple OPC UA data change plugin",
            "type": "string",
            "default": PLUGIN_NAME,
            "readonly": "true"
        },
        "asset": {
            "description": "Asset name",
            "type": "string",
            "default": DEFAULT_ASSET,
            "displayName": "Asset Name",
            "order": "1",
            "mandatory": "true"
        },
        "url": {
            "description": "URL of the OPC UA Server",
            "type": "string",
            "default": "opc.tcp://localhost:53530/OPCUA/SimulationServer",
            "displayName": "OPCUA Server URL",
            "order": "2"
        },
        "subscription": {
            "description": "Variables to observe changes in",
            "type": "JSON",
            "default": "{ \"subscriptions\" : [ \"ns=5;s=85/0:Simulation\" ] }",
            "displayName": "OPCUA Object Subscriptions",
            "order": "3"
        },
        "subscribeById": {
            "description": "Name readings after node identifiers instead of browse names",
            "type": "boolean",
            "default": "false",
            "displayName": "Subscribe By ID",
            "order": "4"
        },
        "reportingInterval": {
            "description": "The minimum reporting interval for data change notifications",
            "type": "integer",
            "default": DEFAULT_REPORTING_INTERVAL.as_millis().to_string(),
            "displayName": "Min Reporting Interval (millisec)",
            "order": "5"
        },
        "securityMode": {
            "description": "Security mode to use while connecting to OPCUA server",
            "type": "enumeration",
            "options": ["Any", "None", "Sign", "SignAndEncrypt"],
            "default": "Any",
            "displayName": "Security mode",
            "order": "6"
        },
        "securityPolicy": {
            "description": "Security policy to use while connecting to OPCUA server",
            "type": "enumeration",
            "options": ["Any", "Basic256", "Basic256Sha256"],
            "default": "Any",
            "displayName": "Security policy",
            "order": "7",
            "validity": cert_validity
        },
        "userAuthPolicy": {
            "description": "User authentication policy to use while connecting to OPCUA server",
            "type": "enumeration",
            "options": ["anonymous", "username"],
            "default": "anonymous",
            "displayName": "User authentication policy",
            "order": "8"
        },
        "username": {
            "description": "Username",
            "type": "string",
            "default": "",
            "displayName": "Username",
            "order": "9",
            "validity": user_validity
        },
        "password": {
            "description": "Password",
            "type": "password",
            "default": "",
            "displayName": "Password",
            "order": "10",
            "validity": user_validity
        },
        "caCert": {
            "description": "CA certificate authority file in DER format",
            "type": "string",
            "default": "cacert",
            "displayName": "CA certificate authority",
            "order": "11",
            "validity": cert_validity
        },
        "serverCert": {
            "description": "Server certificate in the DER format",
            "type": "string",
            "default": "OPCUAServer",
            "displayName": "Server public key",
            "order": "12",
            "validity": cert_validity
        },
        "clientCert": {
            "description": "Client public key file in DER format",
            "type": "string",
            "default": "clientcert",
            "displayName": "Client public key",
            "order": "13",
            "validity": cert_validity
        },
        "clientKey": {
            "description": "Client private key file in DER format",
            "type": "string",
            "default": "clientkey",
            "displayName": "Client private key",
            "order": "14",
            "validity": cert_validity
        },
        "caCrl": {
            "description": "Certificate Revocation List in DER format",
            "type": "string",
            "default": "cacrl",
            "displayName": "Certificate revocation list",
            "order": "15",
            "validity": cert_validity
        }
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn base_items() -> ConfigItems {
        ConfigItems::new()
            .with("url", "opc.tcp://localhost:4840")
            .with("subscription", r#"{"subscriptions": ["ns=5;s=Root"]}"#)
    }

    #[test]
    fn test_translate_defaults() {
        let config = ConfigTranslator::translate(&base_items()).unwrap();
        assert_eq!(config.url, "opc.tcp://localhost:4840");
        assert_eq!(config.asset, "opcua");
        assert!(!config.subscribe_by_id);
        assert_eq!(config.subscriptions, vec![NodeId::string(5, "Root")]);
        assert_eq!(config.reporting_interval, Duration::from_millis(1000));
        assert_eq!(config.security_mode, SecurityMode::Invalid);
        assert_eq!(config.security_policy, SecurityPolicy::Unspecified);
        assert_eq!(config.auth(), AuthPolicy::Anonymous);
    }

    #[test]
    fn test_translate_requires_url() {
        let err = ConfigTranslator::translate(&ConfigItems::new()).unwrap_err();
        assert!(matches!(
            err,
            OpcUaError::Configuration(ConfigurationError::MissingField { ref field }) if field == "url"
        ));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_missing_subscriptions_array_is_fatal() {
        let items = base_items().with("subscription", r#"{"roots": ["ns=5;s=Root"]}"#);
        let err = ConfigTranslator::translate(&items).unwrap_err();
        assert!(matches!(
            err,
            OpcUaError::Configuration(ConfigurationError::MissingSubscriptions)
        ));

        let items = base_items().with("subscription", r#"{"subscriptions": "ns=5;s=Root"}"#);
        assert!(ConfigTranslator::translate(&items).is_err());
    }

    #[test]
    fn test_malformed_subscription_entries() {
        assert!(ConfigTranslator::parse_subscriptions("not json").is_err());
        assert!(ConfigTranslator::parse_subscriptions(r#"{"subscriptions": [5]}"#).is_err());
        assert!(ConfigTranslator::parse_subscriptions(r#"{"subscriptions": ["ns=x;i=1"]}"#).is_err());
    }

    #[test]
    fn test_subscriptions_fully_replaced() {
        let mut config = ConfigTranslator::translate(&base_items()).unwrap();
        let items = ConfigItems::new()
            .with("subscription", r#"{"subscriptions": ["ns=2;i=10", "ns=2;i=11"]}"#);
        ConfigTranslator::apply(&items, &mut config).unwrap();
        assert_eq!(
            config.subscriptions,
            vec![NodeId::numeric(2, 10), NodeId::numeric(2, 11)]
        );
    }

    #[test]
    fn test_bogus_security_mode_falls_back() {
        let items = base_items()
            .with("securityMode", "Bogus")
            .with("securityPolicy", "Basic128");
        let config = ConfigTranslator::translate(&items).unwrap();
        assert_eq!(config.security_mode, SecurityMode::Invalid);
        assert_eq!(config.security_policy, SecurityPolicy::Unspecified);
    }

    #[test]
    fn test_security_and_auth_keys() {
        let items = base_items()
            .with("securityMode", "SignAndEncrypt")
            .with("securityPolicy", "Basic256Sha256")
            .with("userAuthPolicy", "username")
            .with("username", "operator")
            .with("password", "secret")
            .with("subscribeById", "true")
            .with("asset", "plant")
            .with("reportingInterval", "250")
            .with("caCert", "cacert")
            .with("unknownKey", "ignored");

        let config = ConfigTranslator::translate(&items).unwrap();
        assert_eq!(config.security_mode, SecurityMode::SignAndEncrypt);
        assert_eq!(config.security_policy, SecurityPolicy::Basic256Sha256);
        assert!(config.subscribe_by_id);
        assert_eq!(config.asset, "plant");
        assert_eq!(config.reporting_interval, Duration::from_millis(250));
        assert_eq!(config.certificates.ca_cert.as_deref(), Some("cacert"));
        assert_eq!(
            config.auth(),
            AuthPolicy::Username {
                username: "operator".into(),
                password: "secret".into()
            }
        );
        assert!(!format!("{:?}", config).contains("secret"));
    }

    #[test]
    fn test_invalid_reporting_interval_ignored() {
        let items = base_items().with("reportingInterval", "soon");
        let config = ConfigTranslator::translate(&items).unwrap();
        assert_eq!(config.reporting_interval, DEFAULT_REPORTING_INTERVAL);
    }

    #[test]
    fn test_items_from_category_json() {
        let items = ConfigItems::from_json(
            r#"{
                "url": {"value": "opc.tcp://h:4840", "default": "x"},
                "asset": {"default": "plant"},
                "subscribeById": true,
                "subscription": {"subscriptions": ["ns=5;s=Root"]}
            }"#,
        )
        .unwrap();

        assert_eq!(items.get("url"), Some("opc.tcp://h:4840"));
        assert_eq!(items.get("asset"), Some("plant"));
        assert_eq!(items.get("subscribeById"), Some("true"));

        let config = ConfigTranslator::translate(&items).unwrap();
        assert_eq!(config.subscriptions, vec![NodeId::string(5, "Root")]);
    }

    #[test]
    fn test_items_from_invalid_json() {
        assert!(ConfigItems::from_json("[1, 2]").is_err());
        assert!(ConfigItems::from_json("{").is_err());
    }

    #[test]
    fn test_default_config_round_trips_through_items() {
        let items = ConfigItems::from_value(&default_config()).unwrap();
        assert_eq!(items.get("plugin"), Some(PLUGIN_NAME));

        let config = ConfigTranslator::translate(&items).unwrap();
        assert_eq!(config.asset, DEFAULT_ASSET);
        assert_eq!(config.subscriptions, vec![NodeId::string(5, "85/0:Simulation")]);
        assert!(!config.username_auth);
    }
}
