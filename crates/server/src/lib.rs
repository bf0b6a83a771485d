//! HTTP API for the hot list, material library and rewrite workflow.

pub mod error;
pub mod routes;
pub mod server;
pub mod state;

#[cfg(test)]
mod test_support;

pub use error::ApiError;
pub use server::{router, run};
pub use state::AppState;
