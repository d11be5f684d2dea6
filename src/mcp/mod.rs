//! Model Context Protocol surface: JSON-RPC framing and HTTP transports.

pub mod protocol;
pub mod transport;
