//! Rendering modes.
//!
//! A renderer turns collected per-player voice segments into WAV files. All
//! three modes are generic over [`SegmentDecoder`] (the codec) and the PCM
//! representation it produces, so the legacy int16 and modern float pipelines
//! share one implementation of each mode.
//!
//! Error policy (one renderer-wide rule):
//! - framing errors drop the chunk with a warning and never escalate
//! - codec errors drop the segment but go through the [`ErrorSink`], so the
//!   first-error policy can stop the run
//! - WAV-creation errors drop the player and go through the sink

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::chunk::FramingError;
use crate::collector::{PlayerVoice, VoiceSegment};
use crate::error::{Error, ErrorSink, Result};
use crate::opts::Mode;
use crate::sample::RenderSample;

pub mod compact;
pub mod full;
pub mod mix;

/// Fixed chunk size, in samples, for streamed output and mixing buffers.
/// A memory/throughput tradeoff only; output bytes do not depend on it.
pub(crate) const CHUNK_SAMPLES: usize = 8192;

/// Decodes one voice segment's payload into PCM.
///
/// Implementations are stateful (Opus packet-loss concealment needs history),
/// so exactly one decoder instance serves one player within a render pass.
pub trait SegmentDecoder {
    type Sample: RenderSample;

    fn decode_segment(&mut self, payload: &[u8]) -> std::result::Result<Vec<Self::Sample>, SegmentError>;
}

/// Why a single segment failed to decode.
#[derive(Debug, Error)]
pub enum SegmentError {
    /// Malformed chunk framing; the chunk is dropped silently (warn only).
    #[error(transparent)]
    Framing(#[from] FramingError),

    /// Codec-level failure; surfaced as a decoding error.
    #[error("{0}")]
    Codec(String),
}

/// Where and how a render pass writes its output.
#[derive(Debug, Clone)]
pub struct RenderContext<'a> {
    pub demo_stem: &'a str,
    pub output_dir: &'a Path,
    pub duration_seconds: f64,
    pub sample_rate: u32,
}

/// Render collected voice with the requested mode.
///
/// `new_decoder` is invoked once per player so concealment state never leaks
/// across players.
pub fn render<D, F>(
    mode: Mode,
    players: &[PlayerVoice],
    ctx: &RenderContext<'_>,
    new_decoder: F,
    errors: &mut ErrorSink,
) -> Result<Vec<PathBuf>>
where
    D: SegmentDecoder,
    F: FnMut() -> Result<D>,
{
    match mode {
        Mode::SplitCompact => compact::render(players, ctx, new_decoder, errors),
        Mode::SplitFull => full::render(players, ctx, new_decoder, errors),
        Mode::SingleFull => mix::render(players, ctx, new_decoder, errors),
    }
}

/// Apply the per-segment error policy, returning `None` when the segment is
/// dropped.
pub(crate) fn decode_or_drop<D: SegmentDecoder>(
    decoder: &mut D,
    segment: &VoiceSegment,
    errors: &mut ErrorSink,
) -> Result<Option<Vec<D::Sample>>> {
    match decoder.decode_segment(&segment.payload) {
        Ok(samples) => Ok(Some(samples)),
        Err(SegmentError::Framing(err)) => {
            tracing::warn!(
                timestamp_seconds = segment.timestamp_seconds,
                "dropping voice chunk: {err}"
            );
            Ok(None)
        }
        Err(SegmentError::Codec(message)) => {
            errors.report(Error::Decoding(message))?;
            Ok(None)
        }
    }
}

/// Decode every segment of one player, in collection order.
pub(crate) fn decode_player<D: SegmentDecoder>(
    decoder: &mut D,
    segments: &[VoiceSegment],
    errors: &mut ErrorSink,
) -> Result<Vec<(f64, Vec<D::Sample>)>> {
    let mut decoded = Vec::with_capacity(segments.len());
    for segment in segments {
        if let Some(samples) = decode_or_drop(decoder, segment, errors)? {
            decoded.push((segment.timestamp_seconds, samples));
        }
    }
    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    struct FixedFailure(fn() -> SegmentError);

    impl SegmentDecoder for FixedFailure {
        type Sample = i16;

        fn decode_segment(&mut self, _payload: &[u8]) -> std::result::Result<Vec<i16>, SegmentError> {
            Err((self.0)())
        }
    }

    fn segment() -> VoiceSegment {
        VoiceSegment {
            payload: Bytes::from_static(&[0]),
            timestamp_seconds: 1.0,
        }
    }

    #[test]
    fn framing_errors_drop_the_chunk_without_escalating() {
        let mut decoder = FixedFailure(|| {
            SegmentError::Framing(FramingError::ChecksumMismatch {
                received: 0,
                computed: 1,
            })
        });
        // Even under the strict policy a framing error never terminates.
        let mut errors = ErrorSink::new(true);

        let result = decode_or_drop(&mut decoder, &segment(), &mut errors).unwrap();
        assert!(result.is_none());
        assert_eq!(errors.reported(), 0);
    }

    #[test]
    fn codec_errors_go_through_the_error_sink() {
        let mut decoder = FixedFailure(|| SegmentError::Codec("bad frame".into()));
        let mut errors = ErrorSink::new(false);

        let result = decode_or_drop(&mut decoder, &segment(), &mut errors).unwrap();
        assert!(result.is_none());
        assert_eq!(errors.reported(), 1);
    }

    #[test]
    fn codec_errors_terminate_under_the_strict_policy() {
        let mut decoder = FixedFailure(|| SegmentError::Codec("bad frame".into()));
        let mut errors = ErrorSink::new(true);

        let err = decode_or_drop(&mut decoder, &segment(), &mut errors).unwrap_err();
        assert_eq!(err.exit_code(), 16);
    }
}
