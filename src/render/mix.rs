//! Single-full: every player's voice mixed into one file at original
//! timestamps, length equal to the demo duration.
//!
//! All segments of all players are decoded and placed up front (with
//! per-player monotonicity repair), then the output timeline is walked in
//! fixed-size chunks:
//!
//! 1. overlapping samples are summed into an accumulator, counting how many
//!    non-silent sources touched each index
//! 2. indices with more than one active source are scaled by `1/√n`
//!    (equal-power normalization); a lone source passes through unchanged
//! 3. the chunk's pre-clip peak is measured; the PCM16 path clips to
//!    `±INT16_MAX`; a peak beyond full scale rescales the chunk to full scale
//!
//! Peak limiting is per-chunk only; there is no global normalization pass.

use std::path::PathBuf;

use crate::collector::PlayerVoice;
use crate::error::{ErrorSink, Result};
use crate::sample::RenderSample;
use crate::timeline::{self, PlacedSegment};
use crate::wav::{WavSink, single_file_path};

use super::{CHUNK_SAMPLES, RenderContext, SegmentDecoder, decode_player};

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

    // Decode and place per player so monotonicity repair and concealment
    // state stay within each player's stream, then mix across all of them.
    let mut placed: Vec<PlacedSegment<D::Sample>> = Vec::new();
    for voice in players {
        let mut decoder = new_decoder()?;
        let decoded = decode_player(&mut decoder, &voice.segments, errors)?;
        placed.extend(timeline::place(decoded, ctx.sample_rate, total_samples));
    }
    placed.sort_by_key(|segment| segment.start);

    let path = single_file_path(ctx.output_dir, ctx.demo_stem);
    let mut sink = match WavSink::<D::Sample>::create(path, ctx.sample_rate) {
        Ok(sink) => sink,
        Err(err) => {
            errors.report(err)?;
            return Ok(Vec::new());
        }
    };

    write_mixed(&mut sink, &placed, total_samples)?;
    Ok(vec![sink.finalize()?])
}

fn write_mixed<S: RenderSample>(
    sink: &mut WavSink<S>,
    placed: &[PlacedSegment<S>],
    total_samples: u64,
) -> Result<()> {
    let mut accumulator = vec![S::Accum::default(); CHUNK_SAMPLES];
    let mut active_sources = vec![0u32; CHUNK_SAMPLES];

    // Segments are sorted by start; `window` tracks those that can still
    // intersect the current chunk.
    let mut window = 0usize;
    let mut chunk_start = 0u64;

    while chunk_start < total_samples {
        let chunk_len = CHUNK_SAMPLES.min((total_samples - chunk_start) as usize);
        let chunk_end = chunk_start + chunk_len as u64;

        accumulator[..chunk_len].fill(S::Accum::default());
        active_sources[..chunk_len].fill(0);

        while window < placed.len() && placed[window].end() <= chunk_start {
            window += 1;
        }

        for segment in &placed[window..] {
            if segment.start >= chunk_end {
                break;
            }
            mix_segment_into(
                segment,
                chunk_start,
                &mut accumulator[..chunk_len],
                &mut active_sources[..chunk_len],
            );
        }

        finish_chunk::<S>(&mut accumulator[..chunk_len], &active_sources[..chunk_len]);

        for &value in &accumulator[..chunk_len] {
            sink.write_wav_sample(S::accum_to_wav(value))?;
        }

        chunk_start = chunk_end;
    }

    Ok(())
}

/// Add the part of `segment` that intersects the current chunk, counting
/// non-silent contributions per index. Silence never counts as an active
/// source, so a zero sample cannot depress the normalizer.
fn mix_segment_into<S: RenderSample>(
    segment: &PlacedSegment<S>,
    chunk_start: u64,
    accumulator: &mut [S::Accum],
    active_sources: &mut [u32],
) {
    let chunk_end = chunk_start + accumulator.len() as u64;
    let overlap_start = segment.start.max(chunk_start);
    let overlap_end = segment.end().min(chunk_end);

    for position in overlap_start..overlap_end {
        let sample = segment.samples[(position - segment.start) as usize];
        if sample.is_silence() {
            continue;
        }
        let index = (position - chunk_start) as usize;
        accumulator[index] = S::accumulate(accumulator[index], sample);
        active_sources[index] += 1;
    }
}

/// Equal-power normalization followed by per-chunk peak limiting.
fn finish_chunk<S: RenderSample>(accumulator: &mut [S::Accum], active_sources: &[u32]) {
    for (value, &active) in accumulator.iter_mut().zip(active_sources) {
        if active > 1 {
            *value = S::scale(*value, 1.0 / f64::from(active).sqrt());
        }
    }

    let peak = accumulator
        .iter()
        .map(|&value| S::magnitude(value))
        .fold(0.0f64, f64::max);

    for value in accumulator.iter_mut() {
        *value = S::clip(*value);
    }

    if peak > S::full_scale() {
        let factor = S::full_scale() / peak;
        for value in accumulator.iter_mut() {
            *value = S::scale(*value, factor);
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use crate::collector::{PlayerId, VoiceSegment};
    use crate::render::SegmentError;

    use super::*;

    /// Test decoder: payload is a little-endian f32 amplitude followed by a
    /// u16 sample count.
    struct LevelDecoder;

    impl SegmentDecoder for LevelDecoder {
        type Sample = f32;

        fn decode_segment(&mut self, payload: &[u8]) -> std::result::Result<Vec<f32>, SegmentError> {
            let amplitude = f32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]);
            let count = u16::from_le_bytes([payload[4], payload[5]]);
            Ok(vec![amplitude; usize::from(count)])
        }
    }

    /// PCM16 variant of the same scheme (i16 amplitude, u16 count).
    struct LevelDecoder16;

    impl SegmentDecoder for LevelDecoder16 {
        type Sample = i16;

        fn decode_segment(&mut self, payload: &[u8]) -> std::result::Result<Vec<i16>, SegmentError> {
            let amplitude = i16::from_le_bytes([payload[0], payload[1]]);
            let count = u16::from_le_bytes([payload[2], payload[3]]);
            Ok(vec![amplitude; usize::from(count)])
        }
    }

    fn float_segment(timestamp_seconds: f64, amplitude: f32, count: u16) -> VoiceSegment {
        let mut payload = amplitude.to_le_bytes().to_vec();
        payload.extend_from_slice(&count.to_le_bytes());
        VoiceSegment {
            payload: Bytes::from(payload),
            timestamp_seconds,
        }
    }

    fn pcm16_segment(timestamp_seconds: f64, amplitude: i16, count: u16) -> VoiceSegment {
        let mut payload = amplitude.to_le_bytes().to_vec();
        payload.extend_from_slice(&count.to_le_bytes());
        VoiceSegment {
            payload: Bytes::from(payload),
            timestamp_seconds,
        }
    }

    fn player(steam_id: u64, name: &str, segments: Vec<VoiceSegment>) -> PlayerVoice {
        PlayerVoice {
            player: PlayerId {
                steam_id,
                name: name.to_owned(),
            },
            segments,
        }
    }

    fn ctx<'a>(dir: &'a std::path::Path, duration: f64, rate: u32) -> RenderContext<'a> {
        RenderContext {
            demo_stem: "match",
            output_dir: dir,
            duration_seconds: duration,
            sample_rate: rate,
        }
    }

    fn read_i32(path: &std::path::Path) -> Vec<i32> {
        hound::WavReader::open(path)
            .unwrap()
            .samples::<i32>()
            .collect::<std::result::Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn two_overlapping_speakers_mix_at_equal_power() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let context = ctx(dir.path(), 2.0, 24_000);
        let players = vec![
            player(1, "a", vec![float_segment(0.5, 0.5, 480)]),
            player(2, "b", vec![float_segment(0.5, 0.5, 480)]),
        ];

        let mut errors = ErrorSink::new(false);
        let files = render(&players, &context, || Ok(LevelDecoder), &mut errors)?;
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("match.wav"));

        let samples = read_i32(&files[0]);
        assert_eq!(samples.len(), 48_000);

        // (0.5 + 0.5) / sqrt(2), via the renderer's own arithmetic.
        let mixed = (f64::from((f64::from(1.0f32) * (1.0 / 2.0f64.sqrt())) as f32)
            * f64::from(i32::MAX)) as i32;
        let overlap = &samples[12_000..12_480];
        assert!(overlap.iter().all(|&s| s == mixed));

        let expected_ratio = f64::from(overlap[0]) / f64::from(i32::MAX);
        assert!((expected_ratio - 0.707).abs() < 0.001);

        assert!(samples[..12_000].iter().all(|&s| s == 0));
        assert!(samples[12_480..].iter().all(|&s| s == 0));
        Ok(())
    }

    #[test]
    fn a_lone_speaker_passes_through_unchanged() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let context = ctx(dir.path(), 1.0, 24_000);
        let players = vec![player(1, "a", vec![float_segment(0.0, 0.25, 100)])];

        let mut errors = ErrorSink::new(false);
        let files = render(&players, &context, || Ok(LevelDecoder), &mut errors)?;
        let samples = read_i32(&files[0]);

        let expected = (0.25f64 * f64::from(i32::MAX)) as i32;
        assert!(samples[..100].iter().all(|&s| s == expected));
        Ok(())
    }

    #[test]
    fn silent_samples_do_not_depress_the_normalizer() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let context = ctx(dir.path(), 1.0, 24_000);
        // Player b is present but decoded to digital silence.
        let players = vec![
            player(1, "a", vec![float_segment(0.0, 0.5, 100)]),
            player(2, "b", vec![float_segment(0.0, 0.0, 100)]),
        ];

        let mut errors = ErrorSink::new(false);
        let files = render(&players, &context, || Ok(LevelDecoder), &mut errors)?;
        let samples = read_i32(&files[0]);

        let expected = (0.5f64 * f64::from(i32::MAX)) as i32;
        assert!(samples[..100].iter().all(|&s| s == expected));
        Ok(())
    }

    #[test]
    fn chunk_peak_never_exceeds_full_scale() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let context = ctx(dir.path(), 1.0, 24_000);
        // Three players at 0.9: sum 2.7, normalized 2.7/sqrt(3) ≈ 1.56 > 1.
        let players = vec![
            player(1, "a", vec![float_segment(0.0, 0.9, 200)]),
            player(2, "b", vec![float_segment(0.0, 0.9, 200)]),
            player(3, "c", vec![float_segment(0.0, 0.9, 200)]),
        ];

        let mut errors = ErrorSink::new(false);
        let files = render(&players, &context, || Ok(LevelDecoder), &mut errors)?;
        let samples = read_i32(&files[0]);

        let peak = samples.iter().map(|s| s.unsigned_abs()).max().unwrap();
        assert!(peak <= i32::MAX as u32);
        // The limited region sits at full scale.
        assert_eq!(samples[0], i32::MAX);
        Ok(())
    }

    #[test]
    fn pcm16_path_clips_then_limits() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let context = ctx(dir.path(), 1.0, 22_050);
        let players = vec![
            player(1, "a", vec![pcm16_segment(0.0, 30_000, 50)]),
            player(2, "b", vec![pcm16_segment(0.0, 30_000, 50)]),
        ];

        let mut errors = ErrorSink::new(false);
        let files = render(&players, &context, || Ok(LevelDecoder16), &mut errors)?;

        let mut reader = hound::WavReader::open(&files[0])?;
        assert_eq!(reader.spec().bits_per_sample, 16);
        let samples: Vec<i16> = reader.samples::<i16>().collect::<std::result::Result<_, _>>()?;
        assert_eq!(samples.len(), 22_050);

        // Sum 60000, equal-power 42426 (truncated), peak 42426 > 32767:
        // clip to 32767, then rescale by 32767/42426.
        let normalized = (60_000.0f64 * (1.0 / 2.0f64.sqrt())) as i32;
        let expected = (f64::from(32_767) * (32_767.0 / f64::from(normalized))) as i16;
        assert!(samples[..50].iter().all(|&s| s == expected));
        assert!(samples[50..].iter().all(|&s| s == 0));
        Ok(())
    }

    #[test]
    fn sequential_speakers_do_not_interact() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let context = ctx(dir.path(), 10.0, 24_000);
        let players = vec![
            player(1, "a", vec![float_segment(1.0, 0.5, 480)]),
            player(2, "b", vec![float_segment(5.0, 0.25, 480)]),
        ];

        let mut errors = ErrorSink::new(false);
        let files = render(&players, &context, || Ok(LevelDecoder), &mut errors)?;
        let samples = read_i32(&files[0]);
        assert_eq!(samples.len(), 240_000);

        let a = (0.5f64 * f64::from(i32::MAX)) as i32;
        let b = (0.25f64 * f64::from(i32::MAX)) as i32;
        assert!(samples[24_000..24_480].iter().all(|&s| s == a));
        assert!(samples[120_000..120_480].iter().all(|&s| s == b));
        Ok(())
    }

    #[test]
    fn mixing_spans_chunk_boundaries() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let context = ctx(dir.path(), 1.0, 24_000);
        // One long segment crossing the 8192-sample chunk boundary.
        let players = vec![player(1, "a", vec![float_segment(0.0, 0.5, 10_000)])];

        let mut errors = ErrorSink::new(false);
        let files = render(&players, &context, || Ok(LevelDecoder), &mut errors)?;
        let samples = read_i32(&files[0]);

        let expected = (0.5f64 * f64::from(i32::MAX)) as i32;
        assert!(samples[..10_000].iter().all(|&s| s == expected));
        assert!(samples[10_000..].iter().all(|&s| s == 0));
        Ok(())
    }
}
