//! Subcommands of the `gp2nc` binary

pub mod config;
pub mod migrate;
