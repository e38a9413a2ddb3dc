//! The binary wire protocol: CRC-16, frame header/payload, and the
//! resyncing stream parser.

pub mod crc;
pub mod frame;

pub use crc::crc16;
pub use frame::{encode, parse_frames, ChannelCalibration, FunctionCode, Header, Packet, Payload};
