//! Testing module
//!
//! In-process mock of the LMS backend, used by unit and integration tests.

pub mod mock_api;
