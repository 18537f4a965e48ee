mod utils;
mod amf;
mod protocol;
mod handshake;
mod chunk;
mod message;
mod broker;
mod muxer;
mod connection;
mod handlers;
mod server;

// Re-export commonly used types at crate root
pub use utils::*;
pub use amf::*;
pub use protocol::*;
pub use handshake::*;
pub use chunk::*;
pub use message::*;
pub use connection::*;

// Broker exports
pub use broker::*;

// Muxer exports
pub use muxer::*;

// Handler exports
pub use handlers::{CommandHandler, CommandHandlerRegistry};

// Server exports
pub use server::{RtmpServer, ServerConfig, ServerConfigBuilder, ServerContext};
