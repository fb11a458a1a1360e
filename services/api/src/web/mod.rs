pub mod auth;
pub mod health;
pub mod insights;
pub mod middleware;
pub mod query;
pub mod rate_limit;
pub mod records;
pub mod reports;
pub mod rest;
pub mod router;
pub mod state;
pub mod stats;

// Re-export the router builder so binaries and tests can assemble the app.
pub use router::build_router;
pub use middleware::{require_admin, require_auth};
