//! HTTP and WebSocket surface.

pub mod avatar;
pub mod webhook;
pub mod ws;
