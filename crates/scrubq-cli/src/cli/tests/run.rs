//! Tests for the run subcommand.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;

#[test]
fn cli_parse_run_defaults() {
    match parse(&["scrubq", "run"]) {
        CliCommand::Run {
            shards,
            ticks,
            replica_failure_pct,
        } => {
            assert_eq!(shards, 8);
            assert_eq!(ticks, 30);
            assert_eq!(replica_failure_pct, 10);
        }
        _ => panic!("expected Run"),
    }
}

#[test]
fn cli_parse_run_with_options() {
    match parse(&[
        "scrubq",
        "run",
        "--shards",
        "64",
        "--ticks",
        "5",
        "--replica-failure-pct",
        "100",
    ]) {
        CliCommand::Run {
            shards,
            ticks,
            replica_failure_pct,
        } => {
            assert_eq!(shards, 64);
            assert_eq!(ticks, 5);
            assert_eq!(replica_failure_pct, 100);
        }
        _ => panic!("expected Run with options"),
    }
}

#[test]
fn cli_parse_run_rejects_failure_pct_over_100() {
    assert!(Cli::try_parse_from(["scrubq", "run", "--replica-failure-pct", "101"]).is_err());
}

#[test]
fn cli_parse_run_rejects_negative_shards() {
    assert!(Cli::try_parse_from(["scrubq", "run", "--shards", "-1"]).is_err());
}
