mod events;
mod registry;
mod stream;
mod subscriber;

pub use events::*;
pub use registry::*;
pub use stream::*;
pub use subscriber::*;
