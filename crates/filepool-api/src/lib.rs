//! Filepool API library.
//!
//! HTTP handlers, middleware, and application setup for the upload relay.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod setup;
pub mod state;
pub mod utils;

pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
