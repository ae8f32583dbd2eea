//! Tumora Core
//!
//! Core types and error handling shared across Tumora components.
//!
//! This crate provides:
//! - The error taxonomy every stage reports through
//! - The two-category label and the prediction result type

pub mod error;
pub mod types;

pub use error::{Error, ErrorKind, Result};
pub use types::{Label, Prediction, DEFAULT_THRESHOLD};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, ErrorKind, Result};
    pub use crate::types::{Label, Prediction};
}
