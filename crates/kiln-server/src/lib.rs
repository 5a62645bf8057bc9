//! Development server with live reload for kiln.
//!
//! Serves the working source directory, watches it for changes, and pushes
//! reload or stylesheet-inject messages to connected browsers over a
//! WebSocket.

pub mod server;
pub mod watcher;
pub mod websocket;

pub use server::{DevServer, DevServerConfig, ServerError};
pub use watcher::{FileWatcher, WatchEvent, WatchEventKind};
pub use websocket::{ReloadHub, ReloadMessage};
