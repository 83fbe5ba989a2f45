// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration file loading.
//!
//! The file holds either a full configuration category, as produced by the
//! `defaults` command, or a flat object of item values. Flag overrides are
//! applied on top of what the file provides.

use std::path::Path;

use south_opcua::ConfigItems;
use tracing::debug;

use crate::error::{BinError, BinResult};

/// Item values supplied on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    /// Replaces the `url` item.
    pub url: Option<String>,
    /// Replaces the `asset` item.
    pub asset: Option<String>,
}

impl ConfigOverrides {
    /// Returns `true` if no override is set.
    pub fn is_empty(&self) -> bool {
        self.url.is_none() && self.asset.is_none()
    }

    /// Writes the overrides into `items`.
    pub fn apply(&self, items: &mut ConfigItems) {
        if let Some(url) = &self.url {
            items.insert("url", url.clone());
        }
        if let Some(asset) = &self.asset {
            items.insert("asset", asset.clone());
        }
    }
}

/// Reads the configuration file and applies `overrides`.
///
/// A missing file is accepted when the overrides supply a `url`, so the
/// host can run from flags alone.
pub fn load_items(path: &Path, overrides: &ConfigOverrides) -> BinResult<ConfigItems> {
    let mut items = if path.exists() {
        let document = std::fs::read_to_string(path)
            .map_err(|e| BinError::from(e).with_context(format!("reading {}", path.display())))?;
        ConfigItems::from_json(&document)
            .map_err(|e| BinError::from(e).with_context(format!("parsing {}", path.display())))?
    } else if overrides.url.is_some() {
        debug!(path = %path.display(), "Configuration file not found, using flags only");
        ConfigItems::new()
    } else {
        return Err(BinError::config(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    };

    overrides.apply(&mut items);
    debug!(path = %path.display(), items = items.len(), "Configuration loaded");
    Ok(items)
}
