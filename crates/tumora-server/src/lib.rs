//! Tumora Server
//!
//! HTTP front end for the brain MRI tumor classifier: accepts an uploaded
//! scan, runs it through the detector and renders the outcome as JSON.

pub mod config;
pub mod render;
pub mod routes;
pub mod state;

pub use config::{Overrides, ServerConfig};
pub use routes::{create_router, AppError};
pub use state::AppState;
