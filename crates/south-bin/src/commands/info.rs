// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `info` command.

use south_opcua::{plugin_info, PluginFlags};

use crate::cli::Cli;
use crate::error::BinResult;

/// Displays plugin and version information.
pub fn info(_cli: &Cli) -> BinResult<()> {
    let info = plugin_info();

    println!("OPC UA South Connector");
    println!();
    println!("Plugin Information:");
    println!("  Name:              {}", info.name);
    println!("  Version:           {}", info.version);
    println!("  Type:              {:?}", info.plugin_type);
    println!("  Interface Version: {}", info.interface_version);
    println!(
        "  Mode:              {}",
        if info.flags.contains(PluginFlags::ASYNC) { "async (push)" } else { "poll" }
    );
    println!();
    println!("Build Information:");
    println!("  south-bin:    {}", crate::VERSION);
    println!("  Target:       {}", std::env::consts::ARCH);
    println!("  OS:           {}", std::env::consts::OS);
    println!();
    println!("License: PolyForm Noncommercial License 1.0.0");
    println!("Copyright (c) 2025 Sylvex. All rights reserved.");

    Ok(())
}
