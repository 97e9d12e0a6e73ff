//! Unit tests for lectern modules
//!
//! HTTP-facing tests run against the in-process mock LMS server; nothing here
//! needs a real backend.

mod test_access;
mod test_api;
mod test_cli;
mod test_config;
mod test_engine;
mod test_views;
