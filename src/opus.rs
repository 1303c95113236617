//! Sub-frame Opus demuxing and decoding.
//!
//! An Opus voice payload carries a sequence of sub-frames, each prefixed by
//! a little-endian `i16` length and a `u16` sequence number. The demuxer
//! tracks the expected sequence number across payloads so gaps can be
//! concealed by the decoder's packet-loss mode:
//!
//! - a length of `-1` resets the expected sequence to 0 and discards the
//!   rest of the payload
//! - a sub-frame older than expected is dropped
//! - a gap synthesizes concealment for up to [`MAX_CONCEALED_FRAMES`]
//!   frames; the expected sequence is left untouched, so the stream
//!   resynchronizes on the next in-order payload
//!
//! One decoder instance serves one player for a whole render pass; the
//! concealment state is only meaningful with that history.

use bytes::Buf;

use crate::chunk::{ChunkBody, VoiceChunk};
use crate::error::{Error, Result};
use crate::render::{SegmentDecoder, SegmentError};

/// Samples per Opus sub-frame (10 ms at 48 kHz, 20 ms at 24 kHz).
pub const FRAME_SAMPLES: usize = 480;

/// Sample rate of Steam-voice (framed-chunk) payloads.
pub const STEAM_VOICE_SAMPLE_RATE: u32 = 24_000;

/// Sample rate of raw sub-framed Opus payloads.
pub const OPUS_SAMPLE_RATE: u32 = 48_000;

/// Cap on concealment so an implausible gap cannot allocate unbounded audio.
const MAX_CONCEALED_FRAMES: u16 = 10;

const RESET_SENTINEL: i16 = -1;

/// Stateful decoder for one player's Opus voice stream.
pub struct OpusVoiceDecoder {
    decoder: opus::Decoder,
    current_frame: u16,
    /// Whether payloads are wrapped in checksummed Steam voice chunks.
    framed: bool,
}

impl OpusVoiceDecoder {
    /// Decoder for Steam-voice payloads: framed chunks, 24 kHz.
    pub fn steam_voice() -> Result<Self> {
        Self::new(STEAM_VOICE_SAMPLE_RATE, true)
    }

    /// Decoder for raw sub-framed Opus payloads, 48 kHz.
    pub fn raw_opus() -> Result<Self> {
        Self::new(OPUS_SAMPLE_RATE, false)
    }

    fn new(sample_rate: u32, framed: bool) -> Result<Self> {
        let decoder = opus::Decoder::new(sample_rate, opus::Channels::Mono)
            .map_err(|err| Error::Decoding(format!("failed to create Opus decoder: {err}")))?;

        Ok(Self {
            decoder,
            current_frame: 0,
            framed,
        })
    }

    /// Walk one payload's sub-frames, decoding or concealing each.
    fn demux(&mut self, payload: &[u8]) -> std::result::Result<Vec<f32>, SegmentError> {
        let mut buf = payload;
        let mut output = Vec::new();

        while buf.remaining() > 0 {
            if buf.remaining() < 2 {
                return Err(SegmentError::Codec(
                    "truncated sub-frame length field".into(),
                ));
            }
            let chunk_len = buf.get_i16_le();

            if chunk_len == RESET_SENTINEL {
                self.current_frame = 0;
                break;
            }
            if chunk_len < 0 {
                return Err(SegmentError::Codec(format!(
                    "invalid sub-frame length {chunk_len}"
                )));
            }

            if buf.remaining() < 2 {
                return Err(SegmentError::Codec(
                    "truncated sub-frame sequence field".into(),
                ));
            }
            let sequence = buf.get_u16_le();

            let wanted = chunk_len as usize;
            if buf.remaining() < wanted {
                return Err(SegmentError::Codec(format!(
                    "sub-frame shorter than its declared length ({} of {wanted} bytes)",
                    buf.remaining()
                )));
            }
            let frame = buf.copy_to_bytes(wanted);

            let expected = self.current_frame;
            if sequence < expected {
                // Out-of-order or stale sub-frame.
                continue;
            }

            if sequence == expected {
                self.current_frame = sequence.wrapping_add(1);
                self.decode_subframe(&frame, &mut output)?;
            } else {
                self.conceal_loss(sequence - expected, &mut output)?;
            }
        }

        Ok(output)
    }

    fn decode_subframe(
        &mut self,
        frame: &[u8],
        output: &mut Vec<f32>,
    ) -> std::result::Result<(), SegmentError> {
        let mut pcm = vec![0.0f32; FRAME_SAMPLES];
        let written = self
            .decoder
            .decode_float(frame, &mut pcm, false)
            .map_err(|err| SegmentError::Codec(format!("opus decode failed: {err}")))?;
        pcm.truncate(written);
        output.extend_from_slice(&pcm);
        Ok(())
    }

    /// Synthesize concealment for `missing` lost sub-frames, capped.
    fn conceal_loss(
        &mut self,
        missing: u16,
        output: &mut Vec<f32>,
    ) -> std::result::Result<(), SegmentError> {
        let frames = missing.min(MAX_CONCEALED_FRAMES);
        for _ in 0..frames {
            let mut pcm = vec![0.0f32; FRAME_SAMPLES];
            let written = self
                .decoder
                .decode_float(&[], &mut pcm, false)
                .map_err(|err| SegmentError::Codec(format!("opus concealment failed: {err}")))?;
            pcm.truncate(written);
            output.extend_from_slice(&pcm);
        }
        Ok(())
    }
}

impl SegmentDecoder for OpusVoiceDecoder {
    type Sample = f32;

    fn decode_segment(&mut self, payload: &[u8]) -> std::result::Result<Vec<f32>, SegmentError> {
        if !self.framed {
            return self.demux(payload);
        }

        let chunk = VoiceChunk::parse(payload)?;
        match chunk.body {
            // A silence marker carries no audio.
            ChunkBody::Silence { .. } => Ok(Vec::new()),
            ChunkBody::Audio(data) => self.demux(&data),
        }
    }
}
