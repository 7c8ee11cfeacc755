//! Undertow Web - HTTP streaming delivery server
//!
//! Exposes the resolver chain and swarm session cache over a small
//! anonymous HTTP surface: ranged media delivery, cache warm-up, and
//! on-the-fly subtitle conversion.

pub mod handlers;
pub mod server;

// Re-export main types
pub use server::{AppState, router, run_server, serve_until};
