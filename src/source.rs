//! The demo-parser seam.
//!
//! Demo container parsing is a large external concern (network-message
//! framing, string tables, game state); this crate consumes it through the
//! traits below and stays container-agnostic. A parser backend implements
//! [`VoiceMessageSource`]: it walks the demo and pushes each voice message
//! into the supplied [`VoiceSink`] in arrival order, exposing the demo clock
//! and player identities through [`SourceContext`].
//!
//! The integration contract, in the parser's direction:
//! - messages are delivered synchronously, timestamps non-decreasing
//! - a truncated demo ends with [`ParseEnd::Truncated`] (still valid output)
//! - the sink may return [`ParseControl::Cancel`]; the parser stops and
//!   returns [`ParseEnd::Cancelled`] without an error

use bytes::Bytes;
use thiserror::Error;

use crate::demo::DemoFile;

/// Wire-level codec tag attached to each voice message by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadFormat {
    /// Source-1 engine voice (CELT).
    Celt,
    /// Source-2 Steam voice: Opus wrapped in a checksummed chunk, 24 kHz.
    Steam,
    /// Source-2 post-update voice: raw sub-framed Opus, 48 kHz.
    Opus,
    /// Anything else; the description is surfaced in the
    /// unsupported-codec error (e.g. `"vaudio_speex 4 3"`).
    Other(String),
}

/// One voice message as delivered by the demo parser.
#[derive(Debug, Clone)]
pub struct VoiceMessage {
    /// 64-bit Steam identifier of the speaking player.
    pub steam_id: u64,
    /// Opaque codec-specific payload.
    pub voice_data: Bytes,
    pub format: PayloadFormat,
}

/// Flow control returned by the sink for each message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseControl {
    Continue,
    Cancel,
}

/// How a parse run ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParseEnd {
    /// The demo was parsed to its end.
    Completed { duration_seconds: f64 },
    /// The demo ended unexpectedly mid-stream. Benign: whatever was
    /// collected up to that point is still rendered.
    Truncated { duration_seconds: f64 },
    /// The sink asked the parser to stop. Nothing is rendered.
    Cancelled,
}

/// Demo-clock and identity queries available to the sink while parsing.
pub trait SourceContext {
    /// Demo wall-clock, in seconds, at the current message.
    fn current_time_seconds(&self) -> f64;

    /// Display name for a player, if the parser has seen one.
    fn player_name(&self, steam_id: u64) -> Option<String>;
}

/// Receives voice messages in arrival order.
pub trait VoiceSink {
    fn on_voice_message(&mut self, ctx: &dyn SourceContext, message: VoiceMessage) -> ParseControl;
}

/// A parser backend driving one demo file.
pub trait VoiceMessageSource {
    /// Parse the demo, pushing every voice message into `sink`.
    fn drive(&mut self, sink: &mut dyn VoiceSink) -> std::result::Result<ParseEnd, ParseError>;
}

/// Builds a [`VoiceMessageSource`] for an opened demo.
///
/// Embedders implement this on top of their container parser; any `FnMut`
/// closure with the right shape also works.
pub trait SourceProvider {
    fn open(
        &mut self,
        demo: &DemoFile,
    ) -> std::result::Result<Box<dyn VoiceMessageSource>, ParseError>;
}

impl<F> SourceProvider for F
where
    F: FnMut(&DemoFile) -> std::result::Result<Box<dyn VoiceMessageSource>, ParseError>,
{
    fn open(
        &mut self,
        demo: &DemoFile,
    ) -> std::result::Result<Box<dyn VoiceMessageSource>, ParseError> {
        self(demo)
    }
}

/// Error surfaced by a parser backend.
///
/// Intentionally loose: parser backends are external and their failure modes
/// vary, so this mirrors the message/anything split rather than enumerating
/// container internals.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ParseError {
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}
