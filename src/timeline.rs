//! Sparse-to-dense timeline math shared by the full renderers.
//!
//! Decoded segments arrive as `(timestamp, samples)` pairs; placement maps
//! each onto an absolute sample position and repairs any overlap so a
//! player's segments never write over each other.

use tracing::warn;

/// Total output length for a timeline render: `round(duration · rate)`.
pub fn total_sample_count(duration_seconds: f64, sample_rate: u32) -> u64 {
    (duration_seconds * f64::from(sample_rate)).round() as u64
}

/// A decoded segment pinned to an absolute start position (in samples).
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedSegment<S> {
    pub start: u64,
    pub samples: Vec<S>,
}

impl<S> PlacedSegment<S> {
    pub fn end(&self) -> u64 {
        self.start + self.samples.len() as u64
    }
}

/// Place one player's decoded segments on the output timeline.
///
/// Rules, applied in collection order:
/// - `start = round(timestamp · rate)`
/// - a start before the previous segment's end is clamped up to it, so
///   placement is monotonic and samples never overwrite earlier samples
/// - a clamped start at or past `total_samples` drops the segment
/// - a tail extending past `total_samples` is truncated
pub fn place<S>(
    decoded: Vec<(f64, Vec<S>)>,
    sample_rate: u32,
    total_samples: u64,
) -> Vec<PlacedSegment<S>> {
    let mut placed = Vec::with_capacity(decoded.len());
    let mut previous_end = 0u64;

    for (timestamp, mut samples) in decoded {
        if samples.is_empty() {
            continue;
        }

        let mut start = (timestamp * f64::from(sample_rate)).round() as u64;
        if start < previous_end {
            start = previous_end;
        }

        if start >= total_samples {
            warn!(
                timestamp_seconds = timestamp,
                start_sample = start,
                total_samples,
                "dropping voice segment placed past the end of the demo"
            );
            continue;
        }

        let available = (total_samples - start) as usize;
        if samples.len() > available {
            samples.truncate(available);
        }

        previous_end = start + samples.len() as u64;
        placed.push(PlacedSegment { start, samples });
    }

    placed
}
