//! ruzma-core: Shared infrastructure for Ruzma backend services.
//!
//! Configuration loading, the HTTP error type, tracing setup and the
//! request-id / request-metrics middleware every service mounts.
pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;
