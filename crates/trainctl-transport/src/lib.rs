//! Network transports for trainctl sessions.
//!
//! - [`HttpUploadClient`]: multipart upload over reqwest
//! - [`WebSocketTransport`]: the training stream over tokio-tungstenite

pub mod http;
pub mod websocket;

pub use http::HttpUploadClient;
pub use websocket::WebSocketTransport;
