//! HTTP API endpoints for the workflow relay

mod cache;
mod compute;
mod health;
mod results;

pub use cache::cache_routes;
pub use compute::compute_routes;
pub use health::health_routes;
pub use results::results_routes;
