// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA client transports.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │              Connector / Walker / Registrar / EventLoop         │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    OpcUaTransport                               │
//! │               (Abstract transport layer)                        │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │     RealOpcUaTransport (feature = "real-transport")             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

mod transport;

#[cfg(feature = "real-transport")]
mod real_transport;

pub use transport::{
    status, BrowseReference, DataChange, MonitoredItemResult, OpcUaTransport, TransportState,
};

#[cfg(feature = "real-transport")]
pub use real_transport::RealOpcUaTransport;
