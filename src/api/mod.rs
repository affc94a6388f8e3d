//! HTTP endpoints for the relay
//!
//! - POST /api/process - image + prompt, creates or continues a session
//! - GET /api/query - text prompt on an existing session
//! - GET /health
//! - GET /metrics

pub mod extract;
pub mod handlers;
pub mod models;
pub mod routes;

pub use handlers::RelayState;
pub use models::{ApiError, ChatResponse, QueryParams};
pub use routes::{build_router, init_relay_state};
