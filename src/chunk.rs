//! Steam voice-chunk framing.
//!
//! A framed voice chunk carries, little-endian: the owner's 64-bit SteamID,
//! a payload-type byte (always `0x0B` for voice), the sample rate, a
//! voice-type byte (`0x06` compressed audio, `0x00` silence marker), a
//! 16-bit length, the audio bytes, and a trailing CRC32 over everything
//! before it. Minimum size is 18 bytes (empty audio region).
//!
//! Framing errors are per-chunk: the chunk is dropped and the caller keeps
//! going.

use bytes::{Buf, BufMut, Bytes};
use crc::{CRC_32_ISO_HDLC, Crc};
use thiserror::Error;

// CRC-32/ISO-HDLC is the IEEE 802.3 polynomial used on the wire.
const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Smallest possible chunk: header (14 bytes), no data, checksum (4 bytes).
pub const MIN_CHUNK_LEN: usize = 18;

const PAYLOAD_TYPE_VOICE: u8 = 0x0B;
const VOICE_TYPE_AUDIO: u8 = 0x06;
const VOICE_TYPE_SILENCE: u8 = 0x00;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FramingError {
    #[error("insufficient amount of data to frame a voice chunk ({0})")]
    InsufficientData(String),

    #[error("invalid voice packet ({0})")]
    InvalidVoicePacket(String),

    #[error("mismatching voice data checksum (received {received:#010x}, computed {computed:#010x})")]
    ChecksumMismatch { received: u32, computed: u32 },
}

/// Audio region of a voice chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkBody {
    /// Compressed audio bytes (`voice_type == 0x06`).
    Audio(Bytes),
    /// Intentional silence (`voice_type == 0x00`); the length field counts
    /// silence frames and carries no data.
    Silence { frames: u16 },
}

/// One parsed voice chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceChunk {
    pub steam_id: u64,
    pub sample_rate: u16,
    pub body: ChunkBody,
    pub checksum: u32,
}

impl VoiceChunk {
    /// Build a chunk with its checksum computed.
    pub fn new(steam_id: u64, sample_rate: u16, body: ChunkBody) -> Self {
        let mut chunk = Self {
            steam_id,
            sample_rate,
            body,
            checksum: 0,
        };
        chunk.checksum = CRC32.checksum(&chunk.prefix_bytes());
        chunk
    }

    /// Parse a chunk from raw bytes, validating structure and checksum.
    pub fn parse(bytes: &[u8]) -> Result<Self, FramingError> {
        let total = bytes.len();
        if total < MIN_CHUNK_LEN {
            return Err(FramingError::InsufficientData(format!(
                "received {total} bytes, expected at least {MIN_CHUNK_LEN} bytes"
            )));
        }

        let mut buf = bytes;
        let steam_id = buf.get_u64_le();

        let payload_type = buf.get_u8();
        if payload_type != PAYLOAD_TYPE_VOICE {
            return Err(FramingError::InvalidVoicePacket(format!(
                "received payload type {payload_type:#04x}, expected {PAYLOAD_TYPE_VOICE:#04x}"
            )));
        }

        let sample_rate = buf.get_u16_le();
        let voice_type = buf.get_u8();
        let declared_length = buf.get_u16_le();

        let body = match voice_type {
            VOICE_TYPE_AUDIO => {
                let wanted = declared_length as usize;
                if buf.remaining() < wanted {
                    return Err(FramingError::InsufficientData(format!(
                        "received {total} bytes, expected at least {} bytes",
                        total + (wanted - buf.remaining())
                    )));
                }
                ChunkBody::Audio(buf.copy_to_bytes(wanted))
            }
            VOICE_TYPE_SILENCE => ChunkBody::Silence {
                frames: declared_length,
            },
            other => {
                return Err(FramingError::InvalidVoicePacket(format!(
                    "expected 0x6 or 0x0 voice data, received {other:#x}"
                )));
            }
        };

        // Exactly the 4 checksum bytes must remain. Fewer means the chunk
        // was truncated; more means the framing is off.
        match buf.remaining() {
            4 => {}
            n if n < 4 => {
                return Err(FramingError::InsufficientData(format!(
                    "has {n} bytes remaining, expected 4 checksum bytes"
                )));
            }
            n => {
                return Err(FramingError::InvalidVoicePacket(format!(
                    "has {n} bytes remaining, expected 4 bytes remaining"
                )));
            }
        }

        let checksum = buf.get_u32_le();
        let computed = CRC32.checksum(&bytes[..total - 4]);
        if checksum != computed {
            return Err(FramingError::ChecksumMismatch {
                received: checksum,
                computed,
            });
        }

        Ok(Self {
            steam_id,
            sample_rate,
            body,
            checksum,
        })
    }

    /// Serialize the chunk, including its checksum.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.prefix_bytes();
        out.put_u32_le(self.checksum);
        out
    }

    // Everything the checksum covers.
    fn prefix_bytes(&self) -> Vec<u8> {
        let data_len = match &self.body {
            ChunkBody::Audio(data) => data.len(),
            ChunkBody::Silence { .. } => 0,
        };

        let mut out = Vec::with_capacity(MIN_CHUNK_LEN + data_len);
        out.put_u64_le(self.steam_id);
        out.put_u8(PAYLOAD_TYPE_VOICE);
        out.put_u16_le(self.sample_rate);
        match &self.body {
            ChunkBody::Audio(data) => {
                out.put_u8(VOICE_TYPE_AUDIO);
                out.put_u16_le(data.len() as u16);
                out.put_slice(data);
            }
            ChunkBody::Silence { frames } => {
                out.put_u8(VOICE_TYPE_SILENCE);
                out.put_u16_le(*frames);
            }
        }
        out
    }
}
