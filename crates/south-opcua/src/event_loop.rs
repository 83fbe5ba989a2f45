// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The background task that services a running session.
//!
//! Each iteration waits (bounded) for protocol I/O and delivers the data
//! changes that arrived, one at a time and in order, to the ingestion
//! bridge. Cancellation is cooperative through a [`CancellationToken`];
//! [`EventLoop::stop`] cancels and then joins, so once it returns the task
//! no longer touches the transport.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{DataChange, OpcUaTransport};
use crate::ingest::IngestionBridge;
use crate::subscription::HandleRegistry;

/// Bounded wait of one iteration.
pub const DEFAULT_ITERATE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Counters reported when the loop ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventLoopStats {
    /// Completed iterations.
    pub iterations: u64,
    /// Notifications delivered to the bridge.
    pub delivered: u64,
    /// Notifications whose client handle was not registered.
    pub unknown_handles: u64,
    /// Iterations that returned an error.
    pub errors: u64,
}

/// Handle to a running event loop task.
#[derive(Debug)]
pub struct EventLoop {
    cancel: CancellationToken,
    handle: JoinHandle<EventLoopStats>,
}

impl EventLoop {
    /// Spawns the loop on the current runtime.
    pub fn spawn<T>(
        transport: Arc<Mutex<T>>,
        registry: Arc<HandleRegistry>,
        bridge: Arc<IngestionBridge>,
        iterate_timeout: Duration,
    ) -> Self
    where
        T: OpcUaTransport + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            info!(
                timeout_ms = iterate_timeout.as_millis() as u64,
                "Event loop started"
            );

            let mut stats = EventLoopStats::default();

            loop {
                let result = tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    result = async {
                        let transport = transport.lock().await;
                        transport.run_iterate(iterate_timeout).await
                    } => result,
                };

                stats.iterations += 1;

                match result {
                    Ok(changes) => {
                        for change in &changes {
                            Self::deliver(&registry, &bridge, change, &mut stats);
                        }
                    }
                    Err(e) => {
                        stats.errors += 1;
                        e.log("event loop iteration");
                        // Back off for one iteration so a dead session does not spin.
                        tokio::select! {
                            _ = token.cancelled() => break,
                            _ = tokio::time::sleep(iterate_timeout) => {}
                        }
                    }
                }
            }

            info!(
                iterations = stats.iterations,
                delivered = stats.delivered,
                "Event loop stopped"
            );
            stats
        });

        Self { cancel, handle }
    }

    fn deliver(
        registry: &HandleRegistry,
        bridge: &IngestionBridge,
        change: &DataChange,
        stats: &mut EventLoopStats,
    ) {
        match registry.token(change.client_handle) {
            Some(token) => {
                bridge.on_data_change(&token, change);
                stats.delivered += 1;
            }
            None => {
                stats.unknown_handles += 1;
                debug!(handle = change.client_handle, "Data change for unknown client handle");
            }
        }
    }

    /// Returns `true` until the task has exited.
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Requests termination without waiting.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancels the loop and waits for the task to finish.
    pub async fn stop(self) -> EventLoopStats {
        self.cancel.cancel();
        match self.handle.await {
            Ok(stats) => stats,
            Err(e) => {
                warn!(error = %e, "Event loop task ended abnormally");
                EventLoopStats::default()
            }
        }
    }
}
