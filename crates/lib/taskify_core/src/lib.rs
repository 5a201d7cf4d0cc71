//! # taskify_core
//!
//! Core domain logic for Taskify: authentication, token lifecycle, permission
//! resolution, caching, rate limiting and the task/user services built on them.

pub mod auth;
pub mod cache;
pub mod migrate;
pub mod models;
pub mod rate_limit;
pub mod seed;
pub mod store;
pub mod tasks;
pub mod users;
pub mod uuid;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}
