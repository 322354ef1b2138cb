//! Binary frame codec
//!
//! Every frame is a 16-byte big-endian header followed by a payload:
//!
//! ```text
//! 0       4       6       8          12         16
//! ├───────┼───────┼───────┼──────────┼──────────┼──────────────┐
//! │ total │ head  │ ver   │ opcode   │ sequence │ payload ...  │
//! │ u32   │ u16   │ u16   │ u32      │ u32      │ total - 16   │
//! └───────┴───────┴───────┴──────────┴──────────┴──────────────┘
//! ```
//!
//! A zlib frame (version 2) carries one or more complete frames,
//! concatenated, inside its compressed body.

use crate::error::{DanmuError, Result};
use flate2::read::ZlibDecoder;
use serde::Serialize;
use std::borrow::Cow;
use std::io::Read;

/// Fixed header size in bytes
pub const HEADER_LEN: usize = 16;

/// Sequence number written on every outgoing frame
pub const DEFAULT_SEQUENCE: u32 = 1;

/// Compressed bodies nested deeper than this are rejected
pub const MAX_COMPRESSION_DEPTH: usize = 4;

/// Upper bound for one decompressed body
pub const MAX_DECOMPRESSED_LEN: usize = 16 * 1024 * 1024;

/// Body encoding announced in the header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolVersion {
    /// 0: uncompressed JSON
    Plain,
    /// 1: uncompressed heartbeat / auth body
    HeartbeatPlain,
    /// 2: zlib-compressed concatenated frames
    Zlib,
    /// 3: brotli-compressed concatenated frames (not supported)
    Brotli,
    Other(u16),
}

impl From<u16> for ProtocolVersion {
    fn from(raw: u16) -> Self {
        match raw {
            0 => ProtocolVersion::Plain,
            1 => ProtocolVersion::HeartbeatPlain,
            2 => ProtocolVersion::Zlib,
            3 => ProtocolVersion::Brotli,
            other => ProtocolVersion::Other(other),
        }
    }
}

impl From<ProtocolVersion> for u16 {
    fn from(version: ProtocolVersion) -> Self {
        match version {
            ProtocolVersion::Plain => 0,
            ProtocolVersion::HeartbeatPlain => 1,
            ProtocolVersion::Zlib => 2,
            ProtocolVersion::Brotli => 3,
            ProtocolVersion::Other(raw) => raw,
        }
    }
}

/// Frame type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Heartbeat,
    /// Carries the room popularity as a big-endian u32
    HeartbeatReply,
    /// JSON command payload
    Message,
    Auth,
    AuthReply,
    Other(u32),
}

impl From<u32> for Opcode {
    fn from(raw: u32) -> Self {
        match raw {
            2 => Opcode::Heartbeat,
            3 => Opcode::HeartbeatReply,
            5 => Opcode::Message,
            7 => Opcode::Auth,
            8 => Opcode::AuthReply,
            other => Opcode::Other(other),
        }
    }
}

impl From<Opcode> for u32 {
    fn from(opcode: Opcode) -> Self {
        match opcode {
            Opcode::Heartbeat => 2,
            Opcode::HeartbeatReply => 3,
            Opcode::Message => 5,
            Opcode::Auth => 7,
            Opcode::AuthReply => 8,
            Opcode::Other(raw) => raw,
        }
    }
}

/// Parsed 16-byte header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub total_length: u32,
    pub header_length: u16,
    pub version: ProtocolVersion,
    pub opcode: Opcode,
    pub sequence: u32,
}

impl FrameHeader {
    /// Read a header from the start of `buf`
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_LEN {
            return Err(DanmuError::MalformedFrame(format!(
                "need {} header bytes, have {}",
                HEADER_LEN,
                buf.len()
            )));
        }

        Ok(Self {
            total_length: u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]),
            header_length: u16::from_be_bytes([buf[4], buf[5]]),
            version: u16::from_be_bytes([buf[6], buf[7]]).into(),
            opcode: u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]).into(),
            sequence: u32::from_be_bytes([buf[12], buf[13], buf[14], buf[15]]),
        })
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.total_length.to_be_bytes());
        out.extend_from_slice(&self.header_length.to_be_bytes());
        out.extend_from_slice(&u16::from(self.version).to_be_bytes());
        out.extend_from_slice(&u32::from(self.opcode).to_be_bytes());
        out.extend_from_slice(&self.sequence.to_be_bytes());
    }

    pub fn payload_len(&self) -> usize {
        (self.total_length as usize).saturating_sub(HEADER_LEN)
    }
}

/// One decoded (and, if needed, decompressed) frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub opcode: Opcode,
    pub version: ProtocolVersion,
    pub sequence: u32,
    pub payload: Vec<u8>,
}

impl Frame {
    /// Payload as UTF-8, if it is
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }
}

/// Result of decoding one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Frame(Frame),
    /// Version we recognise but don't parse (brotli, unknown)
    Unsupported {
        version: ProtocolVersion,
        opcode: Opcode,
        payload_len: usize,
    },
}

/// Encode a control frame
///
/// `None` produces an empty body (heartbeats).
pub fn encode<T: Serialize + ?Sized>(payload: Option<&T>, opcode: Opcode) -> Result<Vec<u8>> {
    let body = match payload {
        Some(value) => {
            serde_json::to_vec(value).map_err(|e| DanmuError::Encoding(e.to_string()))?
        }
        None => Vec::new(),
    };

    let total_length = u32::try_from(HEADER_LEN + body.len())
        .map_err(|_| DanmuError::Encoding(format!("payload too large: {} bytes", body.len())))?;

    let header = FrameHeader {
        total_length,
        header_length: HEADER_LEN as u16,
        version: ProtocolVersion::Plain,
        opcode,
        sequence: DEFAULT_SEQUENCE,
    };

    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    header.write(&mut out);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Empty heartbeat frame (opcode 2)
pub fn encode_heartbeat() -> Vec<u8> {
    let header = FrameHeader {
        total_length: HEADER_LEN as u32,
        header_length: HEADER_LEN as u16,
        version: ProtocolVersion::Plain,
        opcode: Opcode::Heartbeat,
        sequence: DEFAULT_SEQUENCE,
    };
    let mut out = Vec::with_capacity(HEADER_LEN);
    header.write(&mut out);
    out
}

/// Decode every frame in `buf`, in wire order
///
/// Compressed bodies are expanded in place: their sub-frames appear where
/// the compressed frame was. Uses an explicit stack, so hostile nesting
/// cannot grow the call stack.
pub fn decode(buf: &[u8]) -> Result<Vec<Decoded>> {
    let mut out = Vec::new();
    // (buffer, cursor, depth)
    let mut stack: Vec<(Cow<'_, [u8]>, usize, usize)> = vec![(Cow::Borrowed(buf), 0, 0)];

    while let Some((buffer, cursor, depth)) = stack.last_mut() {
        if *cursor >= buffer.len() {
            stack.pop();
            continue;
        }

        let rest = &buffer[*cursor..];
        let header = FrameHeader::parse(rest)?;
        let total = header.total_length as usize;

        if total < HEADER_LEN {
            return Err(DanmuError::MalformedFrame(format!(
                "declared length {} is shorter than the header",
                total
            )));
        }
        if total > rest.len() {
            return Err(DanmuError::MalformedFrame(format!(
                "declared length {} exceeds the {} bytes available",
                total,
                rest.len()
            )));
        }

        let payload = &rest[HEADER_LEN..total];
        *cursor += total;
        let depth = *depth;

        match header.version {
            ProtocolVersion::Plain | ProtocolVersion::HeartbeatPlain => {
                out.push(Decoded::Frame(Frame {
                    opcode: header.opcode,
                    version: header.version,
                    sequence: header.sequence,
                    payload: payload.to_vec(),
                }));
            }
            ProtocolVersion::Zlib => {
                if depth >= MAX_COMPRESSION_DEPTH {
                    return Err(DanmuError::MalformedFrame(format!(
                        "compressed frames nested deeper than {}",
                        MAX_COMPRESSION_DEPTH
                    )));
                }
                let inflated = inflate(payload)?;
                stack.push((Cow::Owned(inflated), 0, depth + 1));
            }
            version @ (ProtocolVersion::Brotli | ProtocolVersion::Other(_)) => {
                out.push(Decoded::Unsupported {
                    version,
                    opcode: header.opcode,
                    payload_len: payload.len(),
                });
            }
        }
    }

    Ok(out)
}

/// Popularity value carried by a heartbeat reply
pub fn popularity(payload: &[u8]) -> Option<u32> {
    let bytes: [u8; 4] = payload.get(..4)?.try_into().ok()?;
    Some(u32::from_be_bytes(bytes))
}

fn inflate(body: &[u8]) -> Result<Vec<u8>> {
    let mut inflated = Vec::new();
    ZlibDecoder::new(body)
        .take(MAX_DECOMPRESSED_LEN as u64 + 1)
        .read_to_end(&mut inflated)
        .map_err(|e| DanmuError::MalformedFrame(format!("zlib: {}", e)))?;

    if inflated.len() > MAX_DECOMPRESSED_LEN {
        return Err(DanmuError::MalformedFrame(format!(
            "decompressed body exceeds {} bytes",
            MAX_DECOMPRESSED_LEN
        )));
    }
    Ok(inflated)
}
