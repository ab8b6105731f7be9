// Library exports for arenahub
// The binary and the integration tests both build on these modules

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod feed;
pub mod forum;
pub mod rate_limit;
pub mod routes;
pub mod sgg;
pub mod state;
pub mod validation;
