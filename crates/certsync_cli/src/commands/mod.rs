//! Subcommand implementations.

pub mod get;
pub mod put;
pub mod verify;
