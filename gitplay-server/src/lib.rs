//! # gitplay-server
//!
//! HTTP server for gitplay that exposes a history backend to remote sessions.

pub mod api;
pub mod server;

pub use api::{create_router, AppState};
pub use server::GitplayServer;
