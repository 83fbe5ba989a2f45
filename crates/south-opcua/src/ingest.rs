// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Readings and the ingestion bridge.
//!
//! Each data change becomes one [`Reading`] with a single [`Datapoint`] and
//! is handed synchronously to the callback the host registered. The call
//! happens on the event loop, so the next notification is processed only
//! after the callback returns.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::client::DataChange;
use crate::decoder::{decode, NormalizedValue};

// =============================================================================
// Reading
// =============================================================================

/// A named value inside a reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Datapoint {
    /// Datapoint name.
    pub name: String,

    /// Decoded value.
    pub value: NormalizedValue,
}

impl Datapoint {
    /// Creates a datapoint.
    pub fn new(name: impl Into<String>, value: NormalizedValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// One reading delivered to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Asset the reading belongs to.
    pub asset_name: String,

    /// Datapoints of the reading.
    pub datapoints: Vec<Datapoint>,

    /// Source timestamp reported by the server, if any.
    pub user_timestamp: Option<DateTime<Utc>>,

    /// Time the reading was created.
    pub timestamp: DateTime<Utc>,
}

impl Reading {
    /// Creates a reading stamped with the current time.
    pub fn new(asset_name: impl Into<String>, datapoints: Vec<Datapoint>) -> Self {
        Self {
            asset_name: asset_name.into(),
            datapoints,
            user_timestamp: None,
            timestamp: Utc::now(),
        }
    }

    /// Sets the source timestamp.
    pub fn with_user_timestamp(mut self, ts: Option<DateTime<Utc>>) -> Self {
        self.user_timestamp = ts;
        self
    }

    /// Returns the datapoint with the given name.
    pub fn datapoint(&self, name: &str) -> Option<&Datapoint> {
        self.datapoints.iter().find(|dp| dp.name == name)
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {{", self.asset_name)?;
        for (i, dp) in self.datapoints.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, " {}: {}", dp.name, dp.value)?;
        }
        write!(f, " }}")
    }
}

// =============================================================================
// IngestionBridge
// =============================================================================

/// Callback the host registers to receive readings.
pub type IngestCallback = Arc<dyn Fn(Reading) + Send + Sync>;

/// Turns data changes into readings and forwards them to the host.
pub struct IngestionBridge {
    asset_prefix: RwLock<String>,
    callback: RwLock<Option<IngestCallback>>,
}

impl IngestionBridge {
    /// Creates a bridge with the given asset name prefix and no callback.
    pub fn new(asset_prefix: impl Into<String>) -> Self {
        Self {
            asset_prefix: RwLock::new(asset_prefix.into()),
            callback: RwLock::new(None),
        }
    }

    /// Returns the asset name prefix.
    pub fn asset_prefix(&self) -> String {
        self.asset_prefix.read().clone()
    }

    /// Replaces the asset name prefix.
    pub fn set_asset_prefix(&self, prefix: impl Into<String>) {
        *self.asset_prefix.write() = prefix.into();
    }

    /// Registers the ingestion callback together with the host's context.
    ///
    /// The context is handed back on every call, unchanged.
    pub fn register<C, F>(&self, context: C, callback: F)
    where
        C: Send + Sync + 'static,
        F: Fn(&C, Reading) + Send + Sync + 'static,
    {
        let callback: IngestCallback = Arc::new(move |reading| callback(&context, reading));
        *self.callback.write() = Some(callback);
    }

    /// Returns `true` once a callback is registered.
    pub fn has_callback(&self) -> bool {
        self.callback.read().is_some()
    }

    /// Builds the reading for one data change.
    pub fn build_reading(&self, token: &str, change: &DataChange) -> Reading {
        let value = decode(&change.value);
        let asset_name = format!("{}{}", self.asset_prefix.read(), token);
        Reading::new(asset_name, vec![Datapoint::new(token, value)])
            .with_user_timestamp(change.source_timestamp)
    }

    /// Decodes a data change for `token` and forwards the reading.
    pub fn on_data_change(&self, token: &str, change: &DataChange) {
        debug!(token = %token, "Value changed");

        let reading = self.build_reading(token, change);

        // Cloned out so the callback runs without the lock held.
        let callback = self.callback.read().clone();
        match callback {
            Some(callback) => {
                trace!(asset = %reading.asset_name, "Ingesting reading");
                callback(reading);
            }
            None => debug!(token = %token, "No ingest callback registered, reading dropped"),
        }
    }
}

impl fmt::Debug for IngestionBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestionBridge")
            .field("asset_prefix", &*self.asset_prefix.read())
            .field("has_callback", &self.has_callback())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::WireValue;
    use std::sync::Mutex;

    #[test]
    fn test_reading_asset_and_datapoint() {
        let bridge = IngestionBridge::new("plant");
        let reading = bridge.build_reading("Temp", &DataChange::new(0, WireValue::Int32(42)));

        assert_eq!(reading.asset_name, "plantTemp");
        assert_eq!(reading.datapoints.len(), 1);
        assert_eq!(
            reading.datapoint("Temp").map(|dp| dp.value.clone()),
            Some(NormalizedValue::Integer(42))
        );
    }

    #[test]
    fn test_callback_receives_context() {
        let bridge = IngestionBridge::new("");
        let received: Arc<Mutex<Vec<(u32, Reading)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);

        bridge.register(7u32, move |ctx: &u32, reading| {
            sink.lock().unwrap().push((*ctx, reading));
        });
        assert!(bridge.has_callback());

        bridge.on_data_change("Level", &DataChange::new(0, WireValue::Double(0.5)));

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].0, 7);
        assert_eq!(received[0].1.asset_name, "Level");
        assert_eq!(received[0].1.datapoints[0].value, NormalizedValue::Float(0.5));
    }

    #[test]
    fn test_no_callback_drops_reading() {
        let bridge = IngestionBridge::new("opcua");
        assert!(!bridge.has_callback());
        bridge.on_data_change("Temp", &DataChange::new(0, WireValue::Int32(1)));
    }

    #[test]
    fn test_non_scalar_value_uses_default() {
        let bridge = IngestionBridge::new("");
        let change = DataChange::new(0, WireValue::Array(vec![WireValue::Int32(1)]));
        let reading = bridge.build_reading("Vec", &change);
        assert_eq!(reading.datapoints[0].value, NormalizedValue::Integer(0));
    }

    #[test]
    fn test_reading_display() {
        let reading = Reading::new("plantTemp", vec![Datapoint::new("Temp", NormalizedValue::Integer(42))]);
        assert_eq!(reading.to_string(), "plantTemp { Temp: 42 }");
    }

    #[test]
    fn test_prefix_update() {
        let bridge = IngestionBridge::new("a");
        bridge.set_asset_prefix("b");
        assert_eq!(bridge.asset_prefix(), "b");
    }
}
