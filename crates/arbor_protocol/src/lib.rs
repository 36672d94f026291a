//! Wire formats spoken between Arbor components.
//!
//! - [`wire`]: binary UDP packets exchanged between clients and storage nodes.
//! - [`control`]: newline-delimited text commands sent to the coordinator.

pub mod constants;
pub mod control;
pub mod wire;

pub use control::{ControlError, ControlRequest, ControlResponse};
pub use wire::{Packet, WireError};
