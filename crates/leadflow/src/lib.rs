//! Lead scoring and assignment engine for sales pipeline automation.

pub mod config;
pub mod error;
pub mod leads;
pub mod telemetry;
