// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Connection lifecycle.
//!
//! ```text
//!                 start()                          stop()
//! Disconnected ──▶ Connecting ──▶ Connected ──▶ Running ──▶ Stopping ──▶ Disconnected
//!                      │              │
//!                      └──── error ───┴──▶ Disconnected (partial session released)
//! ```
//!
//! `Connecting` and `Stopping` exist only inside `start` and `stop`. A
//! running session is held as a [`RunningSession`] value; `stop` takes it
//! out, joins its event loop and only then disconnects, so the transport is
//! never torn down underneath the loop.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex as SyncMutex;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::browse::{AddressSpaceWalker, WalkStatistics};
use crate::client::OpcUaTransport;
use crate::config::ConnectorConfig;
use crate::error::{OpcUaError, OpcUaResult, PluginError};
use crate::event_loop::{EventLoop, EventLoopStats, DEFAULT_ITERATE_TIMEOUT};
use crate::ingest::IngestionBridge;
use crate::subscription::{HandleRegistry, SubscriptionRegistrar};
use crate::types::NodeId;

// =============================================================================
// ConnectorState
// =============================================================================

/// Lifecycle state of a connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorState {
    /// No session.
    #[default]
    Disconnected,
    /// Connect handshake in progress.
    Connecting,
    /// Session established, walk in progress.
    Connected,
    /// Event loop running.
    Running,
    /// Teardown in progress.
    Stopping,
}

impl ConnectorState {
    /// Returns `true` while a session exists.
    #[inline]
    pub fn has_session(&self) -> bool {
        matches!(self, Self::Connected | Self::Running | Self::Stopping)
    }
}

impl fmt::Display for ConnectorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Running => write!(f, "Running"),
            Self::Stopping => write!(f, "Stopping"),
        }
    }
}

/// What a running session owns.
#[derive(Debug)]
struct RunningSession {
    event_loop: EventLoop,
    subscription_id: u32,
}

// =============================================================================
// Connector
// =============================================================================

/// Owns the session, the subscription roots and the event loop.
pub struct Connector<T: OpcUaTransport + 'static> {
    transport: Arc<Mutex<T>>,
    config: ConnectorConfig,
    roots: SyncMutex<Vec<NodeId>>,
    registry: Arc<HandleRegistry>,
    bridge: Arc<IngestionBridge>,
    session: Option<RunningSession>,
    state: ConnectorState,
    iterate_timeout: Duration,
    last_walk: WalkStatistics,
}

impl<T: OpcUaTransport + 'static> Connector<T> {
    /// Creates a disconnected connector. The roots are taken from
    /// `config.subscriptions`.
    pub fn new(config: ConnectorConfig, transport: T) -> Self {
        let bridge = Arc::new(IngestionBridge::new(config.asset.clone()));
        Self {
            transport: Arc::new(Mutex::new(transport)),
            roots: SyncMutex::new(config.subscriptions.clone()),
            config,
            registry: Arc::new(HandleRegistry::new()),
            bridge,
            session: None,
            state: ConnectorState::Disconnected,
            iterate_timeout: DEFAULT_ITERATE_TIMEOUT,
            last_walk: WalkStatistics::default(),
        }
    }

    /// Overrides the bounded wait of one event loop iteration.
    pub fn with_iterate_timeout(mut self, timeout: Duration) -> Self {
        self.iterate_timeout = timeout;
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectorState {
        self.state
    }

    /// Returns `true` while the event loop runs.
    pub fn is_running(&self) -> bool {
        self.state == ConnectorState::Running
    }

    /// Active configuration.
    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    /// The shared transport.
    pub fn transport(&self) -> Arc<Mutex<T>> {
        Arc::clone(&self.transport)
    }

    /// The ingestion bridge.
    pub fn bridge(&self) -> &Arc<IngestionBridge> {
        &self.bridge
    }

    /// The monitored item registry.
    pub fn registry(&self) -> &Arc<HandleRegistry> {
        &self.registry
    }

    /// Number of live monitored items.
    pub fn monitored_count(&self) -> usize {
        self.registry.len()
    }

    /// Counters of the most recent walk.
    pub fn last_walk(&self) -> WalkStatistics {
        self.last_walk
    }

    /// Snapshot of the subscription roots.
    pub fn roots(&self) -> Vec<NodeId> {
        self.roots.lock().clone()
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Replaces the whole root set. Only allowed without a session.
    pub fn set_roots(&self, roots: Vec<NodeId>) -> OpcUaResult<()> {
        self.ensure_disconnected("set_roots")?;
        *self.roots.lock() = roots;
        Ok(())
    }

    /// Installs a new configuration. Only allowed without a session.
    ///
    /// The root set and the asset prefix follow the new configuration.
    pub fn apply_config(&mut self, config: ConnectorConfig) -> OpcUaResult<()> {
        self.ensure_disconnected("apply_config")?;
        *self.roots.lock() = config.subscriptions.clone();
        self.bridge.set_asset_prefix(config.asset.clone());
        self.config = config;
        Ok(())
    }

    fn ensure_disconnected(&self, operation: &'static str) -> OpcUaResult<()> {
        if self.state.has_session() {
            return Err(OpcUaError::plugin(PluginError::invalid_state(operation, self.state)));
        }
        Ok(())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Connects, opens the subscription, walks every root and starts the
    /// event loop. Returns the number of monitored items created.
    ///
    /// # Errors
    ///
    /// Connection and subscription failures release the session and are
    /// returned. Walk failures are logged per root and do not fail the start.
    pub async fn start(&mut self) -> OpcUaResult<usize> {
        if self.session.is_some() {
            return Err(OpcUaError::plugin(PluginError::invalid_state("start", self.state)));
        }

        let settings = self.config.session_settings();
        self.state = ConnectorState::Connecting;

        let connected = self.transport.lock().await.connect(&settings).await;
        if let Err(e) = connected {
            e.log("connect");
            self.release_partial_session().await;
            return Err(e);
        }
        self.state = ConnectorState::Connected;

        let subscription_id = {
            let transport = self.transport.lock().await;
            transport
                .create_subscription(&self.config.subscription_parameters())
                .await
        };
        let subscription_id = match subscription_id {
            Ok(id) => id,
            Err(e) => {
                e.log("create subscription");
                self.release_partial_session().await;
                return Err(e);
            }
        };

        let registered = self.walk_roots(subscription_id).await;

        let event_loop = EventLoop::spawn(
            Arc::clone(&self.transport),
            Arc::clone(&self.registry),
            Arc::clone(&self.bridge),
            self.iterate_timeout,
        );
        self.session = Some(RunningSession {
            event_loop,
            subscription_id,
        });
        self.state = ConnectorState::Running;

        info!(
            endpoint = %settings.url,
            subscription_id,
            monitored_items = registered,
            "OPC UA connector running"
        );
        Ok(registered)
    }

    async fn walk_roots(&mut self, subscription_id: u32) -> usize {
        let roots = self.roots();
        let transport = self.transport.lock().await;
        let registrar = SubscriptionRegistrar::new(&*transport, subscription_id, &self.registry);
        let mut walker = AddressSpaceWalker::new(&*transport, registrar, self.config.subscribe_by_id);

        let mut registered = 0;
        for root in &roots {
            debug!(root = %root, "Adding subscriptions for node");
            match walker.walk(root, true).await {
                Ok(count) => registered += count,
                Err(e) => error!(root = %root, error = %e, "Failed to walk subscription root"),
            }
        }

        self.last_walk = walker.statistics();
        registered
    }

    async fn release_partial_session(&mut self) {
        if let Err(e) = self.transport.lock().await.disconnect().await {
            warn!(error = %e, "Failed to release partial session");
        }
        self.registry.clear();
        self.state = ConnectorState::Disconnected;
    }

    /// Stops the event loop, clears the root set and disconnects.
    ///
    /// Idempotent; without a session this does nothing. The teardown always
    /// completes, so after an `Err` the connector is still `Disconnected`.
    pub async fn stop(&mut self) -> OpcUaResult<()> {
        let Some(session) = self.session.take() else {
            debug!("Stop requested while not running");
            return Ok(());
        };

        self.state = ConnectorState::Stopping;
        let stats: EventLoopStats = session.event_loop.stop().await;

        self.roots.lock().clear();

        let mut transport = self.transport.lock().await;
        if let Err(e) = transport.delete_subscription(session.subscription_id).await {
            debug!(subscription_id = session.subscription_id, error = %e, "Subscription not deleted before disconnect");
        }
        let result = transport.disconnect().await;
        drop(transport);

        self.registry.clear();
        self.state = ConnectorState::Disconnected;

        info!(
            delivered = stats.delivered,
            iterations = stats.iterations,
            "OPC UA connector stopped"
        );

        if let Err(e) = &result {
            warn!(error = %e, "Disconnect reported an error");
        }
        result
    }

    /// Stops and starts again with the current roots and configuration.
    ///
    /// The previous session is fully torn down before the new one exists. A
    /// failed disconnect is logged; the roots survive it and the new session
    /// is still opened.
    pub async fn restart(&mut self) -> OpcUaResult<usize> {
        let roots = self.roots();
        let stopped = self.stop().await;
        *self.roots.lock() = roots;
        if let Err(e) = stopped {
            e.log("restart");
        }
        self.start().await
    }
}

impl<T: OpcUaTransport + 'static> Drop for Connector<T> {
    fn drop(&mut self) {
        if let Some(session) = &self.session {
            session.event_loop.cancel();
        }
    }
}

impl<T: OpcUaTransport + 'static> fmt::Debug for Connector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connector")
            .field("state", &self.state)
            .field("endpoint", &self.config.url)
            .field("roots", &self.roots.lock().len())
            .field("monitored_items", &self.registry.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectorState::Running.to_string(), "Running");
        assert_eq!(ConnectorState::default(), ConnectorState::Disconnected);
    }

    #[test]
    fn test_state_has_session() {
        assert!(!ConnectorState::Disconnected.has_session());
        assert!(!ConnectorState::Connecting.has_session());
        assert!(ConnectorState::Connected.has_session());
        assert!(ConnectorState::Running.has_session());
        assert!(ConnectorState::Stopping.has_session());
    }
}
