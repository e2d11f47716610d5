//! Toolbridge: exposes an enterprise backend's HTTP tools over MCP.
//!
//! Callers list tools, describe a tool to learn its nested parameter
//! template, then invoke it with flat arguments that the bridge reshapes
//! into the structure the backend expects.

pub mod backend;
pub mod bridge;
pub mod cli;
pub mod config;
pub mod envelope;
pub mod error;
pub mod mcp;
pub mod schema;
pub mod template;
pub mod validation;

pub use bridge::{Bridge, BridgeOptions};
pub use config::Config;
pub use error::{BridgeError, BridgeResult};
