//! Split-full: one file per player, voice placed at its original
//! timestamps, gaps filled with silence, length equal to the demo duration.
//!
//! Each player's segments are decoded up front, placed on the timeline (with
//! monotonicity repair), and streamed out with silence filling every gap.
//! The produced file always holds exactly `round(duration · rate)` samples.

use std::path::PathBuf;

use crate::collector::PlayerVoice;
use crate::error::{ErrorSink, Result};
use crate::timeline::{self, PlacedSegment};
use crate::wav::{WavSink, split_file_path};

use super::{RenderContext, SegmentDecoder, decode_player};

pub fn render<D, F>(
    players: &[PlayerVoice],
    ctx: &RenderContext<'_>,
    mut new_decoder: F,
    errors: &mut ErrorSink,
) -> Result<Vec<PathBuf>>
where
    D: SegmentDecoder,
    F: FnMut() -> Result<D>,
{
    let total_samples = timeline::total_sample_count(ctx.duration_seconds, ctx.sample_rate);
    let mut files = Vec::with_capacity(players.len());

    for voice in players {
        let mut decoder = new_decoder()?;
        let decoded = decode_player(&mut decoder, &voice.segments, errors)?;
        let placed = timeline::place(decoded, ctx.sample_rate, total_samples);

        let path = split_file_path(ctx.output_dir, ctx.demo_stem, &voice.player.file_label());
        let mut sink = match WavSink::<D::Sample>::create(path, ctx.sample_rate) {
            Ok(sink) => sink,
            Err(err) => {
                errors.report(err)?;
                continue;
            }
        };

        write_timeline(&mut sink, &placed, total_samples)?;
        files.push(sink.finalize()?);
    }

    Ok(files)
}

/// Stream placed segments with silence in every gap, out to `total_samples`.
fn write_timeline<S: crate::sample::RenderSample>(
    sink: &mut WavSink<S>,
    placed: &[PlacedSegment<S>],
    total_samples: u64,
) -> Result<()> {
    let mut cursor = 0u64;

    for segment in placed {
        sink.write_silence(segment.start - cursor)?;
        sink.write_samples(&segment.samples)?;
        cursor = segment.end();
    }

    sink.write_silence(total_samples - cursor)
}
