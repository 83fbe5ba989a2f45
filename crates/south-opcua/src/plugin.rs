// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Host plugin boundary.
//!
//! The host drives the plugin through a fixed set of entry points:
//!
//! | entry point         | effect                                           |
//! |---------------------|--------------------------------------------------|
//! | [`plugin_info`]     | name, flags, type and default configuration      |
//! | `init`              | translate configuration, build the connector     |
//! | `start`             | connect, walk, run the event loop                |
//! | `register_ingest`   | install the reading callback and its context     |
//! | `poll`              | unsupported; this is a push-only plugin          |
//! | `reconfigure`       | stop, apply the new configuration, start         |
//! | `shutdown`          | stop and release                                 |

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::client::OpcUaTransport;
use crate::config::{default_config, ConfigItems, ConfigTranslator, ConnectorConfig, PLUGIN_NAME};
use crate::connector::{Connector, ConnectorState};
use crate::error::{OpcUaError, OpcUaResult, PluginError};
use crate::ingest::Reading;

/// Plugin interface version implemented.
pub const INTERFACE_VERSION: &str = "1.0.0";

// =============================================================================
// PluginInfo
// =============================================================================

/// Kind of plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PluginType {
    /// Data ingress plugin.
    South,
}

/// Plugin capability flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PluginFlags(u32);

impl PluginFlags {
    /// Readings are pushed by the plugin; poll is not used.
    pub const ASYNC: Self = Self(0x0001);

    /// Returns the raw flag bits.
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Returns `true` if all bits of `other` are set.
    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

/// What the host learns about the plugin before init.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginInfo {
    /// Plugin name.
    pub name: &'static str,
    /// Plugin version.
    pub version: &'static str,
    /// Capability flags.
    pub flags: PluginFlags,
    /// Plugin type.
    pub plugin_type: PluginType,
    /// Host interface version.
    pub interface_version: &'static str,
    /// Default configuration category.
    pub config: Value,
}

/// Returns the plugin information.
pub fn plugin_info() -> PluginInfo {
    let info = PluginInfo {
        name: PLUGIN_NAME,
        version: env!("CARGO_PKG_VERSION"),
        flags: PluginFlags::ASYNC,
        plugin_type: PluginType::South,
        interface_version: INTERFACE_VERSION,
        config: default_config(),
    };
    info!(plugin = info.name, version = info.version, "OPC UA plugin info requested");
    info
}

// =============================================================================
// OpcUaPlugin
// =============================================================================

/// A plugin instance: one connector plus the host-facing entry points.
pub struct OpcUaPlugin<T: OpcUaTransport + 'static> {
    connector: Connector<T>,
}

impl<T: OpcUaTransport + 'static> fmt::Debug for OpcUaPlugin<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpcUaPlugin")
            .field("connector", &self.connector)
            .finish()
    }
}

impl<T: OpcUaTransport + 'static> OpcUaPlugin<T> {
    /// Initializes the plugin from the host configuration.
    ///
    /// # Errors
    ///
    /// Fails without a `url` item or with a malformed `subscription` item.
    pub fn init(items: &ConfigItems, transport: T) -> OpcUaResult<Self> {
        let config = ConfigTranslator::translate(items)?;
        info!(
            endpoint = %config.url,
            roots = config.subscriptions.len(),
            asset = %config.asset,
            "OPC UA plugin initialized"
        );
        Ok(Self {
            connector: Connector::new(config, transport),
        })
    }

    /// Wraps an existing connector.
    pub fn from_connector(connector: Connector<T>) -> Self {
        Self { connector }
    }

    /// Starts the connector. Returns the number of monitored items.
    pub async fn start(&mut self) -> OpcUaResult<usize> {
        self.connector.start().await
    }

    /// Registers the ingestion callback and the context handed back to it.
    pub fn register_ingest<C, F>(&self, context: C, callback: F)
    where
        C: Send + Sync + 'static,
        F: Fn(&C, Reading) + Send + Sync + 'static,
    {
        self.connector.bridge().register(context, callback);
    }

    /// Always fails: readings are pushed through the ingest callback.
    pub fn poll(&self) -> OpcUaResult<Reading> {
        let err = OpcUaError::plugin(PluginError::PollNotSupported);
        err.log("poll");
        Err(err)
    }

    /// Stops, applies the new configuration on top of the current one and
    /// starts again.
    pub async fn reconfigure(&mut self, items: &ConfigItems) -> OpcUaResult<usize> {
        if let Err(e) = self.connector.stop().await {
            e.log("reconfigure");
        }

        let mut config: ConnectorConfig = self.connector.config().clone();
        ConfigTranslator::apply(items, &mut config)?;
        self.connector.apply_config(config)?;

        let registered = self.connector.start().await?;
        info!("OPC UA plugin restart after reconfigure");
        Ok(registered)
    }

    /// Stops the connector and releases the plugin.
    pub async fn shutdown(mut self) -> OpcUaResult<()> {
        let result = self.connector.stop().await;
        info!("OPC UA plugin shut down");
        result
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectorState {
        self.connector.state()
    }

    /// Active configuration.
    pub fn config(&self) -> &ConnectorConfig {
        self.connector.config()
    }

    /// The underlying connector.
    pub fn connector(&self) -> &Connector<T> {
        &self.connector
    }

    /// Mutable access to the underlying connector.
    pub fn connector_mut(&mut self) -> &mut Connector<T> {
        &mut self.connector
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_info() {
        let info = plugin_info();
        assert_eq!(info.name, "open62541");
        assert_eq!(info.interface_version, "1.0.0");
        assert_eq!(info.plugin_type, PluginType::South);
        assert!(info.flags.contains(PluginFlags::ASYNC));
        assert!(info.config.get("url").is_some());
        assert!(info.config.get("reportingInterval").is_some());
    }

    #[test]
    fn test_flags() {
        assert_eq!(PluginFlags::ASYNC.bits(), 1);
    }
}
