pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod statistics;
pub mod store;

pub use error::{GatewayError, Result};
