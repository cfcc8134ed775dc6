// Library exports so integration tests can drive the app end to end.

pub mod config;
pub mod error;
pub mod extractors;
pub mod identity;
pub mod middleware;
pub mod routes;
pub mod session;
pub mod state;
pub mod store;
