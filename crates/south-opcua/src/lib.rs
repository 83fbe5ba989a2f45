// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA south connector.
//!
//! Subscribes to every variable beneath a set of configured root nodes on an
//! OPC UA server and pushes each data change to the host as a reading.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │            OpcUaPlugin (init / start / reconfigure / ...)       │
//! └─────────────────────────────────────────────────────────────────┘
//!            │ ConfigTranslator                 │
//!            ▼                                  ▼
//! ┌──────────────────────┐        ┌──────────────────────────────────┐
//! │   ConnectorConfig    │───────▶│            Connector             │
//! └──────────────────────┘        │  (lifecycle, roots, session)     │
//!                                 └──────────────────────────────────┘
//!                                   │ start            │ running
//!                                   ▼                  ▼
//!                  ┌──────────────────────┐  ┌──────────────────────┐
//!                  │ AddressSpaceWalker   │  │      EventLoop       │
//!                  │ SubscriptionRegistrar│  │  decode ─▶ ingest    │
//!                  └──────────────────────┘  └──────────────────────┘
//!                                   │                  │
//!                                   ▼                  ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        OpcUaTransport                           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Error Handling
//!
//! ```text
//! OpcUaError
//! ├── Connection    - Endpoint and session failures (fatal at start)
//! ├── Browse        - Browse failures (contained to one node)
//! ├── Subscription  - Subscription and monitored item failures
//! ├── Configuration - Missing or malformed settings (fatal at init)
//! └── Plugin        - Boundary misuse (poll, wrong state)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use south_opcua::{ConfigItems, OpcUaPlugin, RealOpcUaTransport};
//!
//! let items = ConfigItems::new()
//!     .with("url", "opc.tcp://localhost:4840")
//!     .with("asset", "plant")
//!     .with("subscription", r#"{"subscriptions": ["ns=5;s=Root"]}"#);
//!
//! let mut plugin = OpcUaPlugin::init(&items, RealOpcUaTransport::new("south-opcua"))?;
//! plugin.register_ingest((), |_, reading| println!("{}", reading));
//! plugin.start().await?;
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod browse;
pub mod client;
pub mod config;
pub mod connector;
pub mod decoder;
pub mod error;
pub mod event_loop;
pub mod ingest;
pub mod plugin;
pub mod subscription;
pub mod types;

// Re-export commonly used types
pub use error::{
    BrowseError, ConfigurationError, ConnectionError, ErrorCode, ErrorSeverity, OpcUaError,
    OpcUaResult, PluginError, SubscriptionError,
};

pub use types::{
    AuthPolicy, CertificatePaths, MonitoringParameters, NodeClass, NodeId, NodeIdentifier,
    SecurityMode, SecurityPolicy, SessionSettings, SubscriptionParameters,
};

pub use client::{BrowseReference, DataChange, MonitoredItemResult, OpcUaTransport, TransportState};

#[cfg(feature = "real-transport")]
pub use client::RealOpcUaTransport;

pub use browse::{AddressSpaceWalker, WalkStatistics};
pub use config::{default_config, ConfigItems, ConfigTranslator, ConnectorConfig};
pub use connector::{Connector, ConnectorState};
pub use decoder::{decode, NormalizedValue, WireValue};
pub use event_loop::{EventLoop, EventLoopStats};
pub use ingest::{Datapoint, IngestCallback, IngestionBridge, Reading};
pub use plugin::{plugin_info, OpcUaPlugin, PluginFlags, PluginInfo, PluginType};
pub use subscription::{HandleRegistry, MonitorHandle, MonitoredEntry, SubscriptionRegistrar};
