//! HTTP request handlers
//!
//! - `api` - Health check endpoint
//! - `sessions` - Ephemeral Realtime credential minting

pub mod api;
pub mod sessions;

pub use sessions::mint_session;
