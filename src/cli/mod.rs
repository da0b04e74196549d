//! Command-line interface for rbd-lineage.

pub mod commands;

pub use commands::Cli;
