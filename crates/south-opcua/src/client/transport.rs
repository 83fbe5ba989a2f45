// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA transport abstraction layer.
//!
//! The connector only needs a handful of client services: session connect
//! and disconnect, Browse, CreateSubscription, CreateMonitoredItems and the
//! network iterate cycle that delivers data changes. [`OpcUaTransport`]
//! captures exactly those, so the lifecycle, walk and event loop can run
//! against a live server or an in-memory test double.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decoder::WireValue;
use crate::error::OpcUaResult;
use crate::types::{MonitoringParameters, NodeClass, NodeId, SessionSettings, SubscriptionParameters};

// =============================================================================
// TransportState
// =============================================================================

/// Connection state of the transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransportState {
    /// Transport is not connected.
    #[default]
    Disconnected,

    /// Transport is establishing a session.
    Connecting,

    /// Transport has an active session.
    Connected,

    /// The last connect attempt failed.
    Failed,
}

impl TransportState {
    /// Returns `true` if the transport is connected.
    #[inline]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

// =============================================================================
// Status Codes
// =============================================================================

/// Well-known OPC UA status codes used by the connector.
pub mod status {
    /// Good.
    pub const GOOD: u32 = 0x0000_0000;
    /// BadUnexpectedError.
    pub const BAD_UNEXPECTED_ERROR: u32 = 0x8001_0000;
    /// BadCommunicationError.
    pub const BAD_COMMUNICATION_ERROR: u32 = 0x8005_0000;
    /// BadTimeout.
    pub const BAD_TIMEOUT: u32 = 0x800A_0000;
    /// BadNodeIdInvalid.
    pub const BAD_NODE_ID_INVALID: u32 = 0x8033_0000;
    /// BadNodeIdUnknown.
    pub const BAD_NODE_ID_UNKNOWN: u32 = 0x8034_0000;
    /// BadAttributeIdInvalid.
    pub const BAD_ATTRIBUTE_ID_INVALID: u32 = 0x8035_0000;
    /// BadTooManyMonitoredItems.
    pub const BAD_TOO_MANY_MONITORED_ITEMS: u32 = 0x80DB_0000;

    /// Returns `true` if the severity bits of `code` are Good.
    #[inline]
    pub const fn is_good(code: u32) -> bool {
        code & 0xC000_0000 == 0
    }

    /// Returns the symbolic name of a status code, if known.
    pub fn name(code: u32) -> &'static str {
        match code {
            GOOD => "Good",
            BAD_UNEXPECTED_ERROR => "BadUnexpectedError",
            BAD_COMMUNICATION_ERROR => "BadCommunicationError",
            BAD_TIMEOUT => "BadTimeout",
            BAD_NODE_ID_INVALID => "BadNodeIdInvalid",
            BAD_NODE_ID_UNKNOWN => "BadNodeIdUnknown",
            BAD_ATTRIBUTE_ID_INVALID => "BadAttributeIdInvalid",
            BAD_TOO_MANY_MONITORED_ITEMS => "BadTooManyMonitoredItems",
            c if is_good(c) => "Good",
            c if c & 0x8000_0000 != 0 => "Bad",
            _ => "Uncertain",
        }
    }
}

// =============================================================================
// Service Results
// =============================================================================

/// One reference returned by Browse.
#[derive(Debug, Clone, PartialEq)]
pub struct BrowseReference {
    /// Target node of the reference.
    pub node_id: NodeId,

    /// Browse name of the target.
    pub browse_name: String,

    /// Display name of the target.
    pub display_name: String,

    /// Node class mask value of the target.
    pub node_class: u32,
}

impl BrowseReference {
    /// Returns the decoded node class, if it is a known value.
    #[inline]
    pub fn class(&self) -> Option<NodeClass> {
        NodeClass::from_value(self.node_class)
    }
}

/// Result of creating one monitored item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitoredItemResult {
    /// Server-assigned monitored item ID (0 on failure).
    pub monitored_item_id: u32,

    /// Status code for this item.
    pub status_code: u32,
}

impl MonitoredItemResult {
    /// Creates a successful result.
    pub fn good(monitored_item_id: u32) -> Self {
        Self {
            monitored_item_id,
            status_code: status::GOOD,
        }
    }

    /// Creates a failed result.
    pub fn bad(status_code: u32) -> Self {
        Self {
            monitored_item_id: 0,
            status_code,
        }
    }

    /// Returns `true` if the item was created.
    #[inline]
    pub fn is_good(&self) -> bool {
        status::is_good(self.status_code)
    }
}

/// A data change notification for one monitored item.
#[derive(Debug, Clone, PartialEq)]
pub struct DataChange {
    /// Client handle the item was created with.
    pub client_handle: u32,

    /// New value.
    pub value: WireValue,

    /// Status code of the value.
    pub status_code: u32,

    /// Source timestamp.
    pub source_timestamp: Option<DateTime<Utc>>,

    /// Server timestamp.
    pub server_timestamp: Option<DateTime<Utc>>,
}

impl DataChange {
    /// Creates a good notification with no timestamps.
    pub fn new(client_handle: u32, value: WireValue) -> Self {
        Self {
            client_handle,
            value,
            status_code: status::GOOD,
            source_timestamp: None,
            server_timestamp: None,
        }
    }
}

// =============================================================================
// OpcUaTransport Trait
// =============================================================================

/// Abstract transport for the OPC UA client services the connector uses.
///
/// A transport owns at most one session. `connect` creates it and
/// `disconnect` destroys it, taking every subscription with it.
#[async_trait]
pub trait OpcUaTransport: Send + Sync {
    // =========================================================================
    // Connection Management
    // =========================================================================

    /// Opens a session with the given settings.
    ///
    /// # Errors
    ///
    /// Returns a connection error if discovery, the handshake or activation
    /// fails. No session is left behind on error.
    async fn connect(&mut self, settings: &SessionSettings) -> OpcUaResult<()>;

    /// Closes the session and every subscription on it.
    ///
    /// Disconnecting a transport with no session is a no-op.
    async fn disconnect(&mut self) -> OpcUaResult<()>;

    /// Returns `true` if a session is active.
    fn is_connected(&self) -> bool;

    /// Returns the current transport state.
    fn state(&self) -> TransportState;

    // =========================================================================
    // Browse
    // =========================================================================

    /// Returns every forward hierarchical reference of `node_id`.
    ///
    /// All result fields are requested and there is no cap on the number of
    /// references; continuation points are followed by the implementation.
    async fn browse(&self, node_id: &NodeId) -> OpcUaResult<Vec<BrowseReference>>;

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Creates a subscription context and returns its ID.
    async fn create_subscription(&self, params: &SubscriptionParameters) -> OpcUaResult<u32>;

    /// Deletes a subscription and all of its monitored items.
    async fn delete_subscription(&self, subscription_id: u32) -> OpcUaResult<()>;

    /// Creates one data change monitored item on the value attribute of
    /// `node_id`, requesting both timestamps.
    ///
    /// A per-item failure is reported through the returned status, not as
    /// an error. Errors mean the service call itself failed.
    async fn create_monitored_item(
        &self,
        subscription_id: u32,
        node_id: &NodeId,
        client_handle: u32,
        params: &MonitoringParameters,
    ) -> OpcUaResult<MonitoredItemResult>;

    // =========================================================================
    // Network Processing
    // =========================================================================

    /// Drives one bounded iteration of protocol I/O, waiting at most
    /// `timeout`, and returns the data changes that arrived, in order.
    async fn run_iterate(&self, timeout: Duration) -> OpcUaResult<Vec<DataChange>>;

    // =========================================================================
    // Metadata
    // =========================================================================

    /// Returns the endpoint of the current (or last) session.
    fn endpoint(&self) -> &str;
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_state() {
        assert!(TransportState::Connected.is_connected());
        assert!(!TransportState::Disconnected.is_connected());
        assert!(!TransportState::Failed.is_connected());
        assert_eq!(TransportState::Connecting.to_string(), "Connecting");
    }

    #[test]
    fn test_status_codes() {
        assert!(status::is_good(status::GOOD));
        assert!(!status::is_good(status::BAD_NODE_ID_UNKNOWN));
        assert!(!status::is_good(0x4000_0000));
        assert_eq!(status::name(status::BAD_NODE_ID_UNKNOWN), "BadNodeIdUnknown");
        assert_eq!(status::name(0x8099_0000), "Bad");
        assert_eq!(status::name(0x4010_0000), "Uncertain");
    }

    #[test]
    fn test_monitored_item_result() {
        assert!(MonitoredItemResult::good(7).is_good());
        let bad = MonitoredItemResult::bad(status::BAD_NODE_ID_UNKNOWN);
        assert!(!bad.is_good());
        assert_eq!(bad.monitored_item_id, 0);
    }

    #[test]
    fn test_browse_reference_class() {
        let reference = BrowseReference {
            node_id: NodeId::string(5, "Temp"),
            browse_name: "Temp".into(),
            display_name: "Temp".into(),
            node_class: 2,
        };
        assert_eq!(reference.class(), Some(NodeClass::Variable));
    }
}
