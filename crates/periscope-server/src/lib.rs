//! # periscope-server
//!
//! The session relay. Viewers connect over `/ws`, each gets its own frame
//! stream from the shared browser, and their messages are decoded and routed
//! onto the browser or the host.
//!
//! - [`RelayServer`]: router, listener and shared state
//! - [`dispatcher::Dispatcher`]: message decoding and routing
//! - [`websocket`]: viewer registry, sessions and frame streaming
//! - [`ShutdownOrchestrator`]: drain, browser teardown and exit

#![deny(unsafe_code)]

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::RelayConfig;
pub use error::ServerError;
pub use server::RelayServer;
pub use shutdown::{ShutdownOrchestrator, ShutdownPhase};
