//! Request extractors and layers shared by all routes.

pub mod auth;
pub mod rate_limit;
