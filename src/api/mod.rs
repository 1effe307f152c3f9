//! HTTP API surface besides the WebSocket stream

pub mod health;
