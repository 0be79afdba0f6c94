//! Common test utilities and helpers
//!
//! This module provides shared test infrastructure including:
//! - Test fixtures
//! - Mock mailer and backend
//! - API test client over an in-memory database

pub mod fixtures;
pub mod test_app;

pub use fixtures::*;
pub use mocks::*;
pub use test_app::*;
