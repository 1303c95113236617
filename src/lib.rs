//! `demovoice` — per-player voice extraction from Counter-Strike demos.
//!
//! This crate reconstructs in-game voice from demo recordings and writes
//! WAV files. It provides:
//! - Codec-level decoding: Steam voice-chunk framing with checksum
//!   validation, sub-frame Opus demuxing with packet-loss concealment, and
//!   legacy CELT through Valve's shared library
//! - A per-player segment model built from timestamped voice messages
//! - Three rendering modes: compact per-player concatenation, per-player
//!   sample-accurate timelines, and an all-players equal-power mixdown
//!
//! Demo container parsing is deliberately pluggable: a parser backend
//! implements [`source::VoiceMessageSource`] and pushes voice messages into
//! the pipeline (see that module for the contract). The library is designed
//! to be used by both the bundled CLI and embedders with their own parsers.

// Error taxonomy and exit codes.
pub mod error;

// Library-level configuration.
pub mod opts;

// Demo-file front door and the parser seam.
pub mod demo;
pub mod source;

// Voice collection and codec-level decoding.
pub mod celt;
pub mod chunk;
pub mod collector;
pub mod opus;

// Native library discovery.
pub mod libs;

// PCM representations, timeline math, WAV output, renderers.
pub mod render;
pub mod sample;
pub mod timeline;
pub mod wav;

// Per-demo orchestration.
pub mod extractor;

// Logging configuration.
pub mod logging;

pub use error::{Error, ErrorSink, Result};
pub use extractor::{DemoReport, Extractor};
pub use opts::{ExtractConfig, Mode};
