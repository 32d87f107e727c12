//! Command-line interface for trialqc.
//!
//! Provides commands to simulate raw trials, run the QC pipeline over a
//! trial file, and run both end to end.

mod commands;

pub use commands::{
    load_trials, parse_cli, run, run_with_cli, write_json, Cli, Commands, DemoArgs, QcArgs,
    RunArgs, SimulateArgs,
};
