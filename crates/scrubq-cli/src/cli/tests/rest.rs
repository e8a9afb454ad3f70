//! Tests for gate, config and the global options.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;
use std::path::Path;

#[test]
fn cli_parse_gate() {
    assert!(matches!(parse(&["scrubq", "gate"]), CliCommand::Gate));
}

#[test]
fn cli_parse_config() {
    assert!(matches!(parse(&["scrubq", "config"]), CliCommand::Config));
}

#[test]
fn cli_global_config_before_or_after_subcommand() {
    let cli = Cli::try_parse_from(["scrubq", "--config", "/etc/scrubq.toml", "gate"]).unwrap();
    assert_eq!(cli.config.as_deref(), Some(Path::new("/etc/scrubq.toml")));

    let cli = Cli::try_parse_from(["scrubq", "run", "--config", "alt.toml"]).unwrap();
    assert_eq!(cli.config.as_deref(), Some(Path::new("alt.toml")));
    assert!(matches!(cli.command, CliCommand::Run { .. }));
}

#[test]
fn cli_config_defaults_to_xdg() {
    let cli = Cli::try_parse_from(["scrubq", "config"]).unwrap();
    assert!(cli.config.is_none());
}

#[test]
fn cli_rejects_unknown_subcommand() {
    assert!(Cli::try_parse_from(["scrubq", "add", "x"]).is_err());
}

#[test]
fn cli_requires_subcommand() {
    assert!(Cli::try_parse_from(["scrubq"]).is_err());
}
