//! CLI subcommand implementations for the `harvest` binary.

pub mod doctor;
pub mod output;
pub mod run_cmd;
