//! Split-compact: one file per player, voice only, no silence.
//!
//! Segments are decoded and written one at a time, so only a single
//! segment's PCM is held in memory. The on-disk duration is the sum of
//! decoded sample counts.

use std::path::PathBuf;

use crate::collector::PlayerVoice;
use crate::error::{ErrorSink, Result};
use crate::wav::{WavSink, split_file_path};

use super::{RenderContext, SegmentDecoder, decode_or_drop};

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
    let mut files = Vec::with_capacity(players.len());

    for voice in players {
        let mut decoder = new_decoder()?;

        let path = split_file_path(ctx.output_dir, ctx.demo_stem, &voice.player.file_label());
        let mut sink = match WavSink::<D::Sample>::create(path, ctx.sample_rate) {
            Ok(sink) => sink,
            Err(err) => {
                errors.report(err)?;
                continue;
            }
        };

        for segment in &voice.segments {
            if let Some(samples) = decode_or_drop(&mut decoder, segment, errors)? {
                sink.write_samples(&samples)?;
            }
        }

        files.push(sink.finalize()?);
    }

    Ok(files)
}
