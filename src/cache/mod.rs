//! Cache module for keeping API responses in memory
//!
//! This module provides a generic TTL cache used by the menu service for two
//! independent purposes: fetched menu trees keyed by token, and permission
//! check answers keyed by menu and token.

mod store;

pub use store::{Cache, CacheEntry};
