// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Monitored item registration.
//!
//! Every variable found by the walk becomes one monitored item. The item's
//! identity token (the human-readable node name) is kept in a
//! [`HandleRegistry`] and the registry index is sent to the server as the
//! item's client handle. Notifications carry that handle back, so the
//! notification path recovers the token with an index lookup:
//!
//! ```text
//!   walk ──▶ SubscriptionRegistrar::register ──▶ HandleRegistry::insert
//!                     │                                │
//!                     ▼                                ▼
//!           create_monitored_item(handle)      MonitorHandle(n) ─▶ token
//!                                                      ▲
//!   event loop ◀── DataChange { client_handle: n } ────┘
//! ```
//!
//! Items are never removed one at a time; the registry is cleared as a whole
//! when the subscription is torn down.

use std::fmt;

use parking_lot::RwLock;
use tracing::debug;

use crate::client::{status, OpcUaTransport};
use crate::error::{OpcUaError, OpcUaResult, SubscriptionError};
use crate::types::{MonitoringParameters, NodeId};

// =============================================================================
// Identity Tokens
// =============================================================================

/// Removes every quote character from a node name.
///
/// Some servers wrap string identifiers in quotes on the wire
/// (`ns=5;s="Temp"`); tokens must never carry them.
pub fn strip_quotes(name: &str) -> String {
    name.chars().filter(|c| *c != '"').collect()
}

/// Derives the identity token for a variable node.
///
/// With `by_id` the token is the node identifier in string form, otherwise
/// the browse name. An empty browse name falls back to the identifier.
pub fn identity_token(node_id: &NodeId, browse_name: &str, by_id: bool) -> String {
    if by_id || browse_name.is_empty() {
        strip_quotes(&node_id.to_string())
    } else {
        strip_quotes(browse_name)
    }
}

// =============================================================================
// HandleRegistry
// =============================================================================

/// Client handle of a monitored item; an index into the [`HandleRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonitorHandle(pub u32);

impl MonitorHandle {
    /// Returns the raw client handle value.
    #[inline]
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for MonitorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Per-item metadata owned by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoredEntry {
    /// Identity token; becomes the datapoint name.
    pub token: String,

    /// Monitored node.
    pub node_id: NodeId,

    /// Server-assigned monitored item ID.
    pub monitored_item_id: u32,
}

/// Arena of monitored items indexed by [`MonitorHandle`].
///
/// Shared between the caller's context (which fills it during the walk and
/// clears it on stop) and the event loop (which reads it per notification).
#[derive(Debug, Default)]
pub struct HandleRegistry {
    entries: RwLock<Vec<MonitoredEntry>>,
}

impl HandleRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves the next handle for `token` and `node_id`.
    pub fn insert(&self, token: impl Into<String>, node_id: NodeId) -> MonitorHandle {
        let mut entries = self.entries.write();
        let handle = MonitorHandle(entries.len() as u32);
        entries.push(MonitoredEntry {
            token: token.into(),
            node_id,
            monitored_item_id: 0,
        });
        handle
    }

    /// Records the server ID for a created item.
    pub fn confirm(&self, handle: MonitorHandle, monitored_item_id: u32) {
        if let Some(entry) = self.entries.write().get_mut(handle.0 as usize) {
            entry.monitored_item_id = monitored_item_id;
        }
    }

    /// Drops the most recent reservation if it is `handle`.
    ///
    /// Used when item creation fails right after [`insert`](Self::insert).
    pub fn release(&self, handle: MonitorHandle) {
        let mut entries = self.entries.write();
        if entries.len() == handle.0 as usize + 1 {
            entries.pop();
        }
    }

    /// Returns the token for a client handle.
    pub fn token(&self, handle: u32) -> Option<String> {
        self.entries
            .read()
            .get(handle as usize)
            .map(|e| e.token.clone())
    }

    /// Returns the entry for a client handle.
    pub fn get(&self, handle: MonitorHandle) -> Option<MonitoredEntry> {
        self.entries.read().get(handle.0 as usize).cloned()
    }

    /// Returns `true` if `node_id` has a live item.
    pub fn contains_node(&self, node_id: &NodeId) -> bool {
        self.entries.read().iter().any(|e| &e.node_id == node_id)
    }

    /// Returns every live token, in registration order.
    pub fn tokens(&self) -> Vec<String> {
        self.entries.read().iter().map(|e| e.token.clone()).collect()
    }

    /// Number of live monitored items.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if there are no live items.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Forgets every item. Called when the subscription is torn down.
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

// =============================================================================
// SubscriptionRegistrar
// =============================================================================

/// Creates monitored items on one subscription.
pub struct SubscriptionRegistrar<'a, T: OpcUaTransport> {
    transport: &'a T,
    subscription_id: u32,
    registry: &'a HandleRegistry,
    params: MonitoringParameters,
}

impl<'a, T: OpcUaTransport> SubscriptionRegistrar<'a, T> {
    /// Creates a registrar for `subscription_id` using default item
    /// parameters.
    pub fn new(transport: &'a T, subscription_id: u32, registry: &'a HandleRegistry) -> Self {
        Self {
            transport,
            subscription_id,
            registry,
            params: MonitoringParameters::default(),
        }
    }

    /// Returns the subscription items are created on.
    pub fn subscription_id(&self) -> u32 {
        self.subscription_id
    }

    /// Creates one monitored item for `node_id` under `token`.
    ///
    /// A per-item failure is logged with the token and status and returned;
    /// callers log-and-continue.
    pub async fn register(&self, node_id: &NodeId, token: &str) -> OpcUaResult<MonitorHandle> {
        let handle = self.registry.insert(token, node_id.clone());

        let result = self
            .transport
            .create_monitored_item(self.subscription_id, node_id, handle.value(), &self.params)
            .await;

        match result {
            Ok(item) if item.is_good() => {
                self.registry.confirm(handle, item.monitored_item_id);
                debug!(
                    token = %token,
                    node_id = %node_id,
                    handle = handle.value(),
                    monitored_item_id = item.monitored_item_id,
                    "Monitored item created"
                );
                Ok(handle)
            }
            Ok(item) => {
                self.registry.release(handle);
                let err = OpcUaError::subscription(SubscriptionError::monitored_item_failed(
                    token,
                    status::name(item.status_code),
                ));
                err.log("create monitored item");
                Err(err)
            }
            Err(e) => {
                self.registry.release(handle);
                e.log("create monitored item");
                Err(e)
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_quotes() {
        assert_eq!(strip_quotes("\"Temp\""), "Temp");
        assert_eq!(strip_quotes("ns=5;s=\"Temp\""), "ns=5;s=Temp");
        assert_eq!(strip_quotes("Plain"), "Plain");
        assert_eq!(strip_quotes("\"\""), "");
    }

    #[test]
    fn test_identity_token_by_name() {
        let node = NodeId::string(5, "\"Temp\"");
        assert_eq!(identity_token(&node, "\"Temp\"", false), "Temp");
        assert_eq!(identity_token(&node, "Temp", false), "Temp");
    }

    #[test]
    fn test_identity_token_by_id() {
        let node = NodeId::string(5, "\"Temp\"");
        assert_eq!(identity_token(&node, "Temp", true), "ns=5;s=Temp");
    }

    #[test]
    fn test_identity_token_empty_browse_name_falls_back() {
        let node = NodeId::numeric(2, 1001);
        assert_eq!(identity_token(&node, "", false), "ns=2;i=1001");
    }

    #[test]
    fn test_registry_insert_and_lookup() {
        let registry = HandleRegistry::new();
        let a = registry.insert("Temp", NodeId::string(5, "Temp"));
        let b = registry.insert("Pressure", NodeId::string(5, "Pressure"));

        assert_eq!(a, MonitorHandle(0));
        assert_eq!(b, MonitorHandle(1));
        assert_eq!(registry.token(1).as_deref(), Some("Pressure"));
        assert_eq!(registry.token(7), None);
        assert!(registry.contains_node(&NodeId::string(5, "Temp")));
        assert_eq!(registry.len(), 2);

        registry.confirm(a, 42);
        assert_eq!(registry.get(a).map(|e| e.monitored_item_id), Some(42));
    }

    #[test]
    fn test_registry_release_only_last() {
        let registry = HandleRegistry::new();
        let a = registry.insert("A", NodeId::numeric(1, 1));
        let b = registry.insert("B", NodeId::numeric(1, 2));

        registry.release(a);
        assert_eq!(registry.len(), 2);

        registry.release(b);
        assert_eq!(registry.tokens(), vec!["A".to_string()]);
    }

    #[test]
    fn test_registry_clear() {
        let registry = HandleRegistry::new();
        registry.insert("A", NodeId::numeric(1, 1));
        registry.clear();
        assert!(registry.is_empty());
        assert_eq!(registry.token(0), None);
    }
}
