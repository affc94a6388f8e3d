//! Chat session bookkeeping
//!
//! Sessions live for the process lifetime: no expiry, no capacity bound,
//! no persistence.

pub mod models;
pub mod store;

pub use models::Session;
pub use store::{InMemorySessionStore, SessionError, SessionIdStrategy, SessionStore};
