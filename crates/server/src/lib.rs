//! HTTP API server for depot.
//!
//! This crate provides the HTTP surface over the storage engine:
//! - Streaming file upload and download
//! - File, chunk and storage administration
//! - User registration and bearer-token login
//! - First-start bootstrap of the admin account and settings

pub mod auth;
pub mod bootstrap;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod routes;
pub mod state;

pub use auth::{AuthenticatedUser, Caller, TraceId};
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
