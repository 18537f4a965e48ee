mod connection;
mod context;
mod net_stream;
mod state;
mod stream_manager;

pub use connection::*;
pub use context::*;
pub use net_stream::*;
pub use state::*;
pub use stream_manager::*;
