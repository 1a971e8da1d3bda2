//! # Core Data Model
//!
//! The values that move through a session's pipeline.
//!
//! ## Components
//! - **Packet**: a decoded protocol packet (id + opaque body)
//! - **Batch**: a group of packets exchanged as one transport unit,
//!   carrying its compression tag and cached byte forms

pub mod batch;
pub mod packet;

pub use batch::PacketBatch;
pub use packet::GamePacket;
