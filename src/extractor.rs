//! Per-demo orchestration.
//!
//! One [`Extractor`] processes demos sequentially: open and identify the
//! container, assert the native decoder stack, drive the parser into the
//! segment collector, then hand the collected voice to the configured
//! renderer. The CELT library is loaded on first use and reused across
//! demos; decoder state never outlives a render pass.

use std::path::{Path, PathBuf};

use crate::celt::CeltLibrary;
use crate::collector::{Collected, SegmentCollector, VoiceFormat};
use crate::demo::{self, DemoKind};
use crate::error::{Error, ErrorSink, Result};
use crate::libs::{self, NativeStack};
use crate::opts::ExtractConfig;
use crate::opus::OpusVoiceDecoder;
use crate::render::{self, RenderContext};
use crate::source::SourceProvider;

/// Outcome of one successfully processed demo.
#[derive(Debug)]
pub struct DemoReport {
    pub demo: PathBuf,
    pub format: VoiceFormat,
    /// WAV files written, in output order.
    pub files: Vec<PathBuf>,
}

/// Drives extraction for a batch of demos under one configuration.
pub struct Extractor {
    config: ExtractConfig,
    celt: Option<CeltLibrary>,
}

impl Extractor {
    pub fn new(config: ExtractConfig) -> Self {
        Self { config, celt: None }
    }

    pub fn config(&self) -> &ExtractConfig {
        &self.config
    }

    /// Extract one demo end-to-end.
    ///
    /// Per-demo fatal errors (open, format, parse, codec, no voice data)
    /// are returned; per-segment and per-player errors are routed through
    /// `errors` and only propagate under the first-error policy.
    pub fn process_demo(
        &mut self,
        path: &Path,
        provider: &mut dyn SourceProvider,
        errors: &mut ErrorSink,
    ) -> Result<DemoReport> {
        let demo = demo::open(path)?;

        // The legacy pipeline depends on runtime-loaded native libraries;
        // fail before parsing if they cannot be present.
        if demo.kind == DemoKind::Source1 {
            let dir = libs::resolve_search_dir()?;
            libs::assert_library_files(&dir, NativeStack::Celt)?;
            if self.celt.is_none() {
                self.celt = Some(CeltLibrary::load(&dir)?);
            }
        }

        let mut source = provider.open(&demo).map_err(|source| Error::Parsing {
            demo: path.to_path_buf(),
            source,
        })?;

        let mut collector = SegmentCollector::new(self.config.steam_ids.clone());
        let end = source
            .drive(&mut collector)
            .map_err(|source| Error::Parsing {
                demo: path.to_path_buf(),
                source,
            })?;

        let collected = collector.finish(end, path)?;
        let files = self.render(&demo.stem, &collected, errors)?;

        Ok(DemoReport {
            demo: path.to_path_buf(),
            format: collected.format,
            files,
        })
    }

    fn render(
        &self,
        demo_stem: &str,
        collected: &Collected,
        errors: &mut ErrorSink,
    ) -> Result<Vec<PathBuf>> {
        let ctx = RenderContext {
            demo_stem,
            output_dir: &self.config.output_dir,
            duration_seconds: collected.duration_seconds,
            sample_rate: collected.format.sample_rate(),
        };

        match collected.format {
            VoiceFormat::Legacy => {
                let celt = match self.celt.as_ref() {
                    Some(celt) => celt,
                    None => {
                        return Err(Error::CeltLoad(
                            "CELT library not initialized for a legacy demo".into(),
                        ));
                    }
                };
                render::render(
                    self.config.mode,
                    &collected.players,
                    &ctx,
                    || celt.new_decoder(),
                    errors,
                )
            }
            VoiceFormat::SteamVoice => render::render(
                self.config.mode,
                &collected.players,
                &ctx,
                OpusVoiceDecoder::steam_voice,
                errors,
            ),
            VoiceFormat::Opus => render::render(
                self.config.mode,
                &collected.players,
                &ctx,
                OpusVoiceDecoder::raw_opus,
                errors,
            ),
        }
    }
}
