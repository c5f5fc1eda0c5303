//! WebSocket endpoints

pub mod agents;
