//! Observability module
//!
//! Structured logging for API requests and test-session transitions.

pub mod telemetry;
