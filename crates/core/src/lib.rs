//! data model shared by the LTE MAC sub-network simulator

pub mod frame;
pub mod packet;
pub mod types;

pub use frame::{MacFrame, SessionQueue};
pub use packet::{IpPacket, UeSession};
pub use types::{Bits, DelayMs, PacketId, SessionId, Timestamp};
