// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `run` command.

use south_opcua::{OpcUaPlugin, Reading, RealOpcUaTransport};
use tracing::{info, warn};

use crate::cli::{Cli, OutputFormat, RunArgs};
use crate::error::BinResult;
use crate::loader::load_items;
use crate::shutdown::wait_for_signal;

/// Runs the plugin until a shutdown signal arrives.
///
/// A failed start is returned after the plugin has been shut down, so the
/// session is never left half open.
pub async fn run(cli: &Cli, args: RunArgs) -> BinResult<()> {
    let items = load_items(&cli.config, &args.overrides())?;

    let mut plugin = OpcUaPlugin::init(&items, RealOpcUaTransport::new(crate::NAME))?;
    plugin.register_ingest(args.format, |format, reading| {
        println!("{}", format_reading(*format, &reading));
    });

    info!(config = %cli.config.display(), "Starting OPC UA south connector");
    let registered = match plugin.start().await {
        Ok(registered) => registered,
        Err(e) => {
            if let Err(shutdown) = plugin.shutdown().await {
                warn!(error = %shutdown, "Shutdown after failed start reported an error");
            }
            return Err(e.into());
        }
    };
    if registered == 0 {
        warn!("No variables are monitored; check the subscription roots");
    }

    wait_for_signal().await?;

    plugin.shutdown().await?;
    Ok(())
}

/// Renders one reading for standard output.
pub fn format_reading(format: OutputFormat, reading: &Reading) -> String {
    match format {
        OutputFormat::Text => match reading.user_timestamp {
            Some(ts) => format!("{} {}", ts.to_rfc3339(), reading),
            None => format!("{} {}", reading.timestamp.to_rfc3339(), reading),
        },
        OutputFormat::Json => serde_json::to_string(reading).unwrap_or_else(|_| reading.to_string()),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use south_opcua::{Datapoint, NormalizedValue};

    fn reading() -> Reading {
        Reading::new("plantTemp", vec![Datapoint::new("Temp", NormalizedValue::Integer(42))])
    }

    #[test]
    fn test_format_reading_text() {
        let reading = reading();
        let line = format_reading(OutputFormat::Text, &reading);
        assert!(line.ends_with("plantTemp { Temp: 42 }"));
        assert!(line.starts_with(&reading.timestamp.to_rfc3339()));
    }

    #[test]
    fn test_format_reading_json() {
        let line = format_reading(OutputFormat::Json, &reading());
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["asset_name"], "plantTemp");
        assert_eq!(value["datapoints"][0]["name"], "Temp");
    }
}
