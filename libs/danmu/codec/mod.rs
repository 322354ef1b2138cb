//! Frame codec: pure translation between bytes and frames, no I/O.

pub mod frame;

pub use frame::{
    decode, encode, encode_heartbeat, popularity, Decoded, Frame, FrameHeader, Opcode,
    ProtocolVersion, HEADER_LEN,
};
