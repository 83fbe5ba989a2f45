// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI command implementations.
//!
//! - `run`: Drive the plugin against a live server
//! - `validate`: Translate the configuration file
//! - `defaults`: Print the default configuration category
//! - `info`: Show plugin and version information

mod defaults;
mod info;
mod run;
mod validate;

pub use defaults::defaults;
pub use info::info;
pub use run::{format_reading, run};
pub use validate::{validate, ValidationReport};

use crate::cli::{Cli, Commands};
use crate::error::BinResult;

/// Executes the appropriate command based on CLI arguments.
pub async fn execute(cli: Cli) -> BinResult<()> {
    match cli.effective_command() {
        Commands::Run(args) => run::run(&cli, args).await,
        Commands::Validate(args) => validate::validate(&cli, args),
        Commands::Defaults => defaults::defaults(&cli),
        Commands::Info => info::info(&cli),
    }
}
