//! CLI module for triagr - command-line interface and subcommands.

pub mod commands;

pub use commands::Cli;
