// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # south-bin
//!
//! Command-line host for the OPC UA south connector.
//!
//! Stands in for the host process: it loads a configuration category from a
//! JSON file, drives the plugin entry points and prints every reading the
//! connector pushes.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         main.rs                             │
//! │                      (Entry Point)                          │
//! └─────────────────────────┬───────────────────────────────────┘
//!                           │
//!                    ┌──────▼──────┐
//!                    │    cli.rs   │
//!                    └──────┬──────┘
//!                           │
//!               ┌───────────┼───────────┐
//!               ▼           ▼           ▼
//!        ┌──────────┐ ┌──────────┐ ┌──────────┐
//!        │ commands │ │ loader   │ │ logging  │
//!        └────┬─────┘ └──────────┘ └──────────┘
//!             │
//!      ┌──────▼──────┐     ┌─────────────┐
//!      │ OpcUaPlugin │◀────│  shutdown   │
//!      └─────────────┘     └─────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Run against the server configured in opcua.json
//! south-opcua -c opcua.json
//!
//! # Override the endpoint and asset prefix
//! south-opcua run --url opc.tcp://plc:4840 --asset line1
//!
//! # Check a configuration file
//! south-opcua validate --show-config
//!
//! # Print the default configuration category
//! south-opcua defaults
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod cli;
pub mod commands;
pub mod error;
pub mod loader;
pub mod logging;
pub mod shutdown;

// =============================================================================
// Re-exports
// =============================================================================

pub use cli::{Cli, Commands};
pub use error::{BinError, BinResult};
pub use loader::{load_items, ConfigOverrides};
pub use logging::init_logging;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
