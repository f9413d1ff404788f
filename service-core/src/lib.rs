//! service-core: Shared infrastructure for the campus portal client crates.
pub mod config;
pub mod observability;
