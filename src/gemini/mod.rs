//! Gemini model client adapter
//!
//! Wraps the Generative Language REST API:
//! - Files API resumable upload for images
//! - `generateContent` with the full conversation history

pub mod client;
pub mod config;
pub mod models;

pub use client::{GeminiClient, GeminiError, ModelClient};
pub use config::{GeminiConfig, GenerationConfig};
pub use models::{AssetReference, Conversation, FileData, Part, Role, Turn};
