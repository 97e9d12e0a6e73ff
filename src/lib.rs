//! Lectern - a learning-management client
//!
//! A typed client for an LMS REST API plus the logic that sits in front of
//! it: who may see which course, the test-taking state machine with its
//! countdown, admin editors over local drafts, and the read-only dashboards.
//!
//! - **API**: one async trait, [`api::LmsApi`], with a `reqwest` implementation
//! - **Auth**: a file-backed [`auth::Session`] and pluggable credential checks
//! - **Engine**: scoring, navigation and timing of a test attempt
//! - **Editors**: create-or-update drafts with ordered child lists
//!
//! # Quick Start
//!
//! ```ignore
//! use lectern::{api::ApiClient, config::Config, api::LmsApi};
//!
//! let config = Config::load(None)?;
//! let api = ApiClient::new(&config)?.with_token(Some(token));
//! let courses = api.list_courses().await?;
//! ```

// ─── Core ──────────────────────────────────────────────────────────
pub mod api;
pub mod auth;
pub mod config;
pub mod errors;
pub mod routes;

// ─── Learning logic ───────────────────────────────────────────────
pub mod access;
pub mod editors;
pub mod engine;
pub mod views;

// ─── Infrastructure ───────────────────────────────────────────────
pub mod cli;
pub mod observability;
pub mod testing;

pub use api::{ApiClient, LmsApi};
pub use auth::{Session, SessionStore};
pub use config::Config;
pub use errors::LecternError;
