//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - Versioned binary files for the LocalCache port
//! - HTTPS client for the backend ports (identity REST + callable functions)
//! - In-process backend for demo mode and tests
//! - Scripted identity-verification flow for the KycProvider port

pub mod file_cache;
pub mod http;
pub mod kyc;
pub mod memory;

#[cfg(test)]
pub mod http_mock;
