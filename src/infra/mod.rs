//! Infrastructure adapters and runtime bootstrap.

pub mod assets;
pub mod catalog;
pub mod client;
pub mod error;
pub mod telemetry;
