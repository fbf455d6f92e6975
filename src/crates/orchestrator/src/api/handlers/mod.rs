//! API request handlers
//!
//! Provides handler functions for all API endpoints organized by resource.

pub mod generate;
pub mod health;
pub mod models;

pub use generate::{generate, generate_stream};
pub use health::health;
pub use models::list_models;
