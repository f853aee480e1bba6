//! Password generation service with per-client abuse detection.

pub mod config;
pub mod generator;
pub mod guard;
pub mod identity;
pub mod metrics;
pub mod obs;
pub mod server;
pub mod telemetry;
