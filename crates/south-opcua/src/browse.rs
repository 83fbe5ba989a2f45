// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Address-space walk.
//!
//! Expands each configured root into the flat list of variables beneath it:
//!
//! ```text
//!   Root (Object)
//!   ├── Temp (Variable)        ──▶ register "Temp"
//!   ├── Line1 (Object)         ──▶ descend
//!   │   ├── Speed (Variable)   ──▶ register "Speed"
//!   │   └── Root (Object)      ──▶ already visited, skipped
//!   └── Reset (Method)         ──▶ ignored
//! ```
//!
//! Traversal is depth-first in browse order. A visited set keyed by node ID
//! spans every root of one start, so the walk terminates on cyclic address
//! spaces and a node reachable along several paths is registered once.

use std::collections::HashSet;

use tracing::{debug, error, trace};

use crate::client::{BrowseReference, OpcUaTransport};
use crate::error::OpcUaResult;
use crate::subscription::{identity_token, SubscriptionRegistrar};
use crate::types::{NodeClass, NodeId};

// =============================================================================
// WalkStatistics
// =============================================================================

/// Counters collected over one or more walks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStatistics {
    /// Browse requests issued.
    pub browsed: usize,

    /// Variables discovered.
    pub variables: usize,

    /// Monitored items created.
    pub registered: usize,

    /// Monitored items that failed.
    pub failed: usize,

    /// References skipped because the node was already visited.
    pub revisits: usize,
}

// =============================================================================
// AddressSpaceWalker
// =============================================================================

/// Recursive browse that registers a monitored item per variable.
pub struct AddressSpaceWalker<'a, T: OpcUaTransport> {
    transport: &'a T,
    registrar: SubscriptionRegistrar<'a, T>,
    subscribe_by_id: bool,
    visited: HashSet<NodeId>,
    stats: WalkStatistics,
}

impl<'a, T: OpcUaTransport> AddressSpaceWalker<'a, T> {
    /// Creates a walker registering through `registrar`.
    pub fn new(transport: &'a T, registrar: SubscriptionRegistrar<'a, T>, subscribe_by_id: bool) -> Self {
        Self {
            transport,
            registrar,
            subscribe_by_id,
            visited: HashSet::new(),
            stats: WalkStatistics::default(),
        }
    }

    /// Returns the counters collected so far.
    pub fn statistics(&self) -> WalkStatistics {
        self.stats
    }

    /// Walks everything below `start` and returns the number of monitored
    /// items registered.
    ///
    /// When `active` is false variables are discovered but not registered.
    /// Browse failures below the start node are logged and treated as a node
    /// without children; failures of the start node itself are returned.
    pub async fn walk(&mut self, start: &NodeId, active: bool) -> OpcUaResult<usize> {
        let before = self.stats.registered;
        self.visited.insert(start.clone());

        let root_children = self.browse_children(start).await?;
        let mut stack: Vec<std::vec::IntoIter<BrowseReference>> = vec![root_children.into_iter()];

        while let Some(frame) = stack.last_mut() {
            let Some(reference) = frame.next() else {
                stack.pop();
                continue;
            };

            if self.visited.contains(&reference.node_id) {
                self.stats.revisits += 1;
                trace!(node_id = %reference.node_id, "Node already visited");
                continue;
            }

            match reference.class() {
                Some(NodeClass::Variable) => {
                    self.visited.insert(reference.node_id.clone());
                    debug!(node_id = %reference.node_id, "Node is a variable");
                    self.stats.variables += 1;
                    if active {
                        self.register(&reference).await;
                    }
                }
                Some(NodeClass::Object) => {
                    self.visited.insert(reference.node_id.clone());
                    debug!(node_id = %reference.node_id, "Node is an object");
                    match self.browse_children(&reference.node_id).await {
                        Ok(children) => stack.push(children.into_iter()),
                        Err(e) => {
                            error!(node_id = %reference.node_id, error = %e, "Browse failed, skipping subtree");
                        }
                    }
                }
                _ => trace!(node_id = %reference.node_id, node_class = reference.node_class, "Ignoring reference"),
            }
        }

        Ok(self.stats.registered - before)
    }

    async fn browse_children(&mut self, node_id: &NodeId) -> OpcUaResult<Vec<BrowseReference>> {
        self.stats.browsed += 1;
        let children = self.transport.browse(node_id).await?;
        if children.is_empty() {
            debug!(node_id = %node_id, "Browse results in 0 result size");
        }
        Ok(children)
    }

    async fn register(&mut self, reference: &BrowseReference) {
        let token = identity_token(&reference.node_id, &reference.browse_name, self.subscribe_by_id);
        match self.registrar.register(&reference.node_id, &token).await {
            Ok(_) => self.stats.registered += 1,
            Err(_) => self.stats.failed += 1,
        }
    }
}
