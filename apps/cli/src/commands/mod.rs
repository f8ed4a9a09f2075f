//! Command implementations for the trainctl CLI.

pub mod archive;
pub mod config;
pub mod session;
pub mod train;
pub mod upload;
