// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `defaults` command.

use south_opcua::default_config;

use crate::cli::Cli;
use crate::error::BinResult;

/// Prints the default configuration category. The output is a valid
/// configuration file for `run` and `validate`.
pub fn defaults(_cli: &Cli) -> BinResult<()> {
    println!("{}", serde_json::to_string_pretty(&default_config())?);
    Ok(())
}
