mod c0c1;
mod digest;
mod s0s1s2;
mod state;

pub use c0c1::*;
pub use digest::*;
pub use s0s1s2::*;
pub use state::*;
