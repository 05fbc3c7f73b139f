//! WebSocket link to the platform bridge.

pub mod connection;
pub mod dispatcher;
