//! Command implementations for the PEFT CLI.

pub mod cleanup;
pub mod config;
pub mod deploy;
pub mod predict;
pub mod resolve;
pub mod run;
pub mod status;
pub mod train;
pub mod types;
