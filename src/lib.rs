//! Menu client library
//!
//! Fetches a user's navigation menu from the menu service, caches it, falls
//! back to a local tree when the service is unavailable, and filters the tree
//! by visibility and permissions for display.
//!
//! - [`data`] - wire types, the HTTP fetcher and the fallback tree
//! - [`cache`] - in-memory TTL cache
//! - [`transform`] - pure tree algorithms
//! - [`service`] - orchestration of the above
//! - [`cli`] - argument parsing and text rendering for the `menuctl` binary

pub mod cache;
pub mod cli;
pub mod data;
pub mod service;
pub mod transform;
