// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Shutdown signal handling.

use tracing::info;

use crate::error::{BinError, BinResult};

/// Waits for SIGTERM, SIGINT or SIGQUIT (Unix) or Ctrl+C (elsewhere).
///
/// # Errors
///
/// Fails if a signal handler cannot be registered.
pub async fn wait_for_signal() -> BinResult<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let register = |kind: SignalKind, name: &str| {
            signal(kind).map_err(|e| BinError::init(format!("failed to register {name} handler: {e}")))
        };
        let mut sigterm = register(SignalKind::terminate(), "SIGTERM")?;
        let mut sigint = register(SignalKind::interrupt(), "SIGINT")?;
        let mut sigquit = register(SignalKind::quit(), "SIGQUIT")?;

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = sigint.recv() => info!("Received SIGINT"),
            _ = sigquit.recv() => info!("Received SIGQUIT"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .map_err(|e| BinError::init(format!("failed to listen for Ctrl+C: {e}")))?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
