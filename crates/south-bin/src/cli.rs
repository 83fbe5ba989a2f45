// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI argument parsing and command definitions.
//!
//! - `run`: Connect and print readings until interrupted (default)
//! - `validate`: Translate the configuration file without connecting
//! - `defaults`: Print the default configuration category
//! - `info`: Show plugin and version information

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::loader::ConfigOverrides;

// =============================================================================
// Main CLI Structure
// =============================================================================

/// OPC UA south connector host.
///
/// Subscribes to every variable beneath the configured root nodes and prints
/// each data change as a reading.
#[derive(Parser, Debug)]
#[command(
    name = "south-opcua",
    author = "Sylvex <contact@sylvex.io>",
    version = crate::VERSION,
    about = "OPC UA south connector host",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    /// Configuration file path (JSON category or flat object)
    #[arg(
        short,
        long,
        default_value = "opcua.json",
        env = "SOUTH_OPCUA_CONFIG",
        global = true
    )]
    pub config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        short,
        long,
        default_value = "info",
        env = "SOUTH_OPCUA_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json, compact)
    #[arg(long, default_value = "text", env = "SOUTH_OPCUA_LOG_FORMAT", global = true)]
    pub log_format: LogFormat,

    /// Enable quiet mode (warnings and errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

// =============================================================================
// Subcommands
// =============================================================================

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Connect to the server and print readings
    ///
    /// This is the default command when no subcommand is specified.
    /// Runs until SIGINT or SIGTERM, then shuts the plugin down.
    Run(RunArgs),

    /// Validate the configuration file
    ///
    /// Translates the configuration exactly as `init` would, without
    /// opening a session.
    Validate(ValidateArgs),

    /// Print the default configuration category
    Defaults,

    /// Show plugin and version information
    Info,
}

// =============================================================================
// Command Arguments
// =============================================================================

/// Arguments for the `run` command.
#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// Server endpoint URL, overriding `url` in the file
    #[arg(long, env = "SOUTH_OPCUA_URL")]
    pub url: Option<String>,

    /// Asset name prefix, overriding `asset` in the file
    #[arg(long)]
    pub asset: Option<String>,

    /// Output format for readings
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

impl RunArgs {
    /// Configuration overrides carried by the flags.
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            url: self.url.clone(),
            asset: self.asset.clone(),
        }
    }
}

/// Arguments for the `validate` command.
#[derive(Args, Debug, Clone, Default)]
pub struct ValidateArgs {
    /// Show the translated configuration after validation
    #[arg(short, long)]
    pub show_config: bool,

    /// Output format for validation results
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

// =============================================================================
// Enums
// =============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for structured logging
    Json,
    /// Compact format for minimal output
    Compact,
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// One JSON document per line
    Json,
}

// =============================================================================
// Helper Methods
// =============================================================================

impl Cli {
    /// Parse CLI arguments from the command line.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the effective command, defaulting to `Run` if none specified.
    pub fn effective_command(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or_else(|| Commands::Run(RunArgs::default()))
    }

    /// Get the effective log level based on flags.
    pub fn effective_log_level(&self) -> &str {
        if self.quiet {
            "warn"
        } else if self.verbose {
            "debug"
        } else {
            &self.log_level
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command() {
        let cli = Cli::parse_from(["south-opcua"]);
        assert!(cli.command.is_none());
        assert!(matches!(cli.effective_command(), Commands::Run(_)));
    }

    #[test]
    fn test_run_overrides() {
        let cli = Cli::parse_from([
            "south-opcua",
            "run",
            "--url",
            "opc.tcp://plc:4840",
            "--asset",
            "line1",
            "-f",
            "json",
        ]);
        let Some(Commands::Run(args)) = cli.command else {
            panic!("Expected Run command");
        };
        assert_eq!(args.format, OutputFormat::Json);

        let overrides = args.overrides();
        assert_eq!(overrides.url.as_deref(), Some("opc.tcp://plc:4840"));
        assert_eq!(overrides.asset.as_deref(), Some("line1"));
    }

    #[test]
    fn test_validate_command() {
        let cli = Cli::parse_from(["south-opcua", "validate", "--show-config"]);
        if let Some(Commands::Validate(args)) = cli.command {
            assert!(args.show_config);
            assert_eq!(args.format, OutputFormat::Text);
        } else {
            panic!("Expected Validate command");
        }
    }

    #[test]
    fn test_defaults_and_info() {
        let cli = Cli::parse_from(["south-opcua", "defaults"]);
        assert!(matches!(cli.command, Some(Commands::Defaults)));
        let cli = Cli::parse_from(["south-opcua", "info"]);
        assert!(matches!(cli.command, Some(Commands::Info)));
    }

    #[test]
    fn test_config_path() {
        let cli = Cli::parse_from(["south-opcua", "-c", "/etc/south/opcua.json"]);
        assert_eq!(cli.config, PathBuf::from("/etc/south/opcua.json"));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["south-opcua", "validate", "-c", "plant.json", "--log-format", "json"]);
        assert_eq!(cli.config, PathBuf::from("plant.json"));
        assert_eq!(cli.log_format, LogFormat::Json);
    }

    #[test]
    fn test_quiet_wins_over_verbose() {
        let cli = Cli::parse_from(["south-opcua", "-q", "-v"]);
        assert_eq!(cli.effective_log_level(), "warn");

        let cli = Cli::parse_from(["south-opcua", "-v"]);
        assert_eq!(cli.effective_log_level(), "debug");

        let cli = Cli::parse_from(["south-opcua", "-l", "trace"]);
        assert_eq!(cli.effective_log_level(), "trace");
    }
}
