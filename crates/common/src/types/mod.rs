//! Shared value types.

mod breakpoint;
mod snapshot;
mod target;

pub use breakpoint::*;
pub use snapshot::*;
pub use target::*;
