//! In-process debuggee.
//!
//! [`SimTarget`] runs a scripted [`Program`] and exposes it through
//! [`ControlInterface`](crate::ControlInterface), with the same suspension and request
//! semantics a remote debug agent has. The `rdb` binary uses it as its target, and the
//! engine tests drive whole sessions against it.

mod program;
mod target;

pub use program::*;
pub use target::*;
