//! WAV output over `hound`.
//!
//! All output is mono integer PCM: 32-bit containers for the float voice
//! paths and 16-bit for legacy CELT. Silence is streamed without
//! materializing large buffers.

use std::io::BufWriter;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::error::{Error, Result};
use crate::sample::RenderSample;

/// Output file name for one player in the split modes:
/// `<demo-stem>_<player-label>.wav`.
pub fn split_file_path(output_dir: &Path, demo_stem: &str, player_label: &str) -> PathBuf {
    output_dir.join(format!("{demo_stem}_{player_label}.wav"))
}

/// Output file name for the combined single-full mode: `<demo-stem>.wav`.
pub fn single_file_path(output_dir: &Path, demo_stem: &str) -> PathBuf {
    output_dir.join(format!("{demo_stem}.wav"))
}

/// A mono WAV writer typed by the PCM representation it accepts.
pub struct WavSink<S: RenderSample> {
    writer: WavWriter<BufWriter<std::fs::File>>,
    path: PathBuf,
    _samples: PhantomData<S>,
}

impl<S: RenderSample> WavSink<S> {
    pub fn create(path: PathBuf, sample_rate: u32) -> Result<Self> {
        let spec = WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: S::BITS_PER_SAMPLE,
            sample_format: SampleFormat::Int,
        };

        let writer = WavWriter::create(&path, spec).map_err(|source| Error::WavCreation {
            path: path.clone(),
            source,
        })?;

        Ok(Self {
            writer,
            path,
            _samples: PhantomData,
        })
    }

    /// Write decoded samples, converting to the container's integer format.
    pub fn write_samples(&mut self, samples: &[S]) -> Result<()> {
        for &sample in samples {
            self.write_wav_sample(sample.to_wav())?;
        }
        Ok(())
    }

    /// Write one already-converted integer sample (mixing path).
    pub fn write_wav_sample(&mut self, sample: S::Wav) -> Result<()> {
        self.writer
            .write_sample(sample)
            .map_err(|source| Error::WavCreation {
                path: self.path.clone(),
                source,
            })
    }

    /// Write `count` zero-valued samples.
    pub fn write_silence(&mut self, count: u64) -> Result<()> {
        let zero = S::default().to_wav();
        for _ in 0..count {
            self.write_wav_sample(zero)?;
        }
        Ok(())
    }

    /// Finish the file and return its path.
    pub fn finalize(self) -> Result<PathBuf> {
        let path = self.path;
        self.writer
            .finalize()
            .map_err(|source| Error::WavCreation {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }
}
