//! Viewer WebSocket handling.
//!
//! - [`registry::SessionRegistry`]: the live viewer map
//! - [`connection::ViewerConnection`]: one viewer's socket and cancellation
//! - [`session::run_viewer`]: the reader side of a viewer
//! - [`stream::stream_frames`]: the frame pusher side of a viewer

pub mod connection;
pub mod registry;
pub mod session;
pub mod stream;
