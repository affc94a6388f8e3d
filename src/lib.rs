//! Image chat relay
//!
//! Accepts an image plus a prompt over HTTP, forwards them to a Gemini
//! multimodal model and returns the text reply, keeping per-session
//! conversation history in memory.

pub mod api;
pub mod config;
pub mod error;
pub mod gemini;
pub mod image;
pub mod metrics;
pub mod session;

pub use crate::config::Config;
pub use crate::error::{RelayError, Result};
