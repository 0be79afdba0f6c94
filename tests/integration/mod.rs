//! Integration tests for the FutureKonnect console
//!
//! These tests drive the API router in-process against an in-memory
//! database, a recording mailer and mocked HTTP collaborators.

mod api_tests;
mod audit_trail_tests;
mod hasura_tests;
mod tenant_tests;
