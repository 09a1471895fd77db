//! Frame-level vocabulary shared by the hub, sessions and adapters.

pub mod close_code;
mod frame;

pub use frame::{FrameKind, Incoming, Packet};
