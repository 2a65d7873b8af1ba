//! HTTP server module
//!
//! - Axum router with the upload, processing and download endpoints
//! - Multipart form reading and upload staging
//! - Error to status code mapping
//! - Request logging and CORS middleware

pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod upload;

pub use routes::create_router;
