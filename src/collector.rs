//! Segment collection.
//!
//! The collector sits on the parser seam as a [`VoiceSink`]: it latches the
//! demo's voice format from the first message, resolves player identities
//! through a first-wins name cache, applies the optional Steam-ID filter, and
//! accumulates each player's segments in arrival order. When the parse run
//! ends it produces the input for the renderers.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use bytes::Bytes;
use tracing::warn;

use crate::error::{Error, Result};
use crate::source::{ParseControl, ParseEnd, PayloadFormat, SourceContext, VoiceMessage, VoiceSink};

/// Characters stripped from player names because they are forbidden in file
/// names on some platforms.
const FORBIDDEN_NAME_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// The demo-wide voice format, latched from the first voice message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceFormat {
    /// Source-1 CELT at 22050 Hz, 16-bit PCM.
    Legacy,
    /// Source-2 Steam voice: Opus in framed chunks at 24000 Hz.
    SteamVoice,
    /// Source-2 raw sub-framed Opus at 48000 Hz.
    Opus,
}

impl VoiceFormat {
    pub fn sample_rate(self) -> u32 {
        match self {
            VoiceFormat::Legacy => 22_050,
            VoiceFormat::SteamVoice => 24_000,
            VoiceFormat::Opus => 48_000,
        }
    }

    fn from_payload(format: &PayloadFormat) -> std::result::Result<Self, String> {
        match format {
            PayloadFormat::Celt => Ok(VoiceFormat::Legacy),
            PayloadFormat::Steam => Ok(VoiceFormat::SteamVoice),
            PayloadFormat::Opus => Ok(VoiceFormat::Opus),
            PayloadFormat::Other(description) => Err(description.clone()),
        }
    }
}

/// A stable player identity: SteamID plus the sanitized first-seen name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerId {
    pub steam_id: u64,
    pub name: String,
}

impl PlayerId {
    /// Label used in output file names: `<name>_<steam-id>`.
    pub fn file_label(&self) -> String {
        format!("{}_{}", self.name, self.steam_id)
    }
}

/// One voice message's payload pinned to the demo clock.
#[derive(Debug, Clone)]
pub struct VoiceSegment {
    pub payload: Bytes,
    pub timestamp_seconds: f64,
}

/// One player's ordered voice segments.
#[derive(Debug, Clone)]
pub struct PlayerVoice {
    pub player: PlayerId,
    pub segments: Vec<VoiceSegment>,
}

/// Everything a renderer needs, produced when parsing completes.
#[derive(Debug)]
pub struct Collected {
    pub format: VoiceFormat,
    pub duration_seconds: f64,
    /// Players ordered by SteamID so repeated runs emit identical output.
    pub players: Vec<PlayerVoice>,
}

/// Remove file-name-hostile characters from a display name.
pub fn sanitize_player_name(name: &str) -> String {
    name.chars()
        .filter(|c| !FORBIDDEN_NAME_CHARS.contains(c))
        .collect()
}

/// Accumulates voice messages from a parser run.
#[derive(Debug, Default)]
pub struct SegmentCollector {
    format: Option<VoiceFormat>,
    unsupported: Option<String>,
    filter: Option<HashSet<u64>>,
    names: HashMap<u64, String>,
    voices: BTreeMap<u64, Vec<VoiceSegment>>,
}

impl SegmentCollector {
    pub fn new(filter: Option<HashSet<u64>>) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    /// Turn the collected state into renderer input.
    ///
    /// A truncated demo is still valid; a cancelled run means an unsupported
    /// codec; an empty collection is `NoVoiceDataFound`.
    pub fn finish(self, end: ParseEnd, demo: &Path) -> Result<Collected> {
        let duration_seconds = match end {
            ParseEnd::Completed { duration_seconds } => duration_seconds,
            ParseEnd::Truncated { duration_seconds } => {
                warn!(demo = %demo.display(), "demo ended unexpectedly; rendering partial voice data");
                duration_seconds
            }
            ParseEnd::Cancelled => {
                let description = self
                    .unsupported
                    .unwrap_or_else(|| "parse cancelled before a codec was identified".to_owned());
                return Err(Error::UnsupportedCodec(description));
            }
        };

        if let Some(description) = self.unsupported {
            return Err(Error::UnsupportedCodec(description));
        }

        let Some(format) = self.format else {
            return Err(Error::NoVoiceData {
                demo: demo.to_path_buf(),
            });
        };

        if self.voices.values().all(Vec::is_empty) {
            return Err(Error::NoVoiceData {
                demo: demo.to_path_buf(),
            });
        }

        let names = self.names;
        let players = self
            .voices
            .into_iter()
            .filter(|(_, segments)| !segments.is_empty())
            .map(|(steam_id, segments)| PlayerVoice {
                player: PlayerId {
                    steam_id,
                    name: names.get(&steam_id).cloned().unwrap_or_default(),
                },
                segments,
            })
            .collect();

        Ok(Collected {
            format,
            duration_seconds,
            players,
        })
    }
}

impl VoiceSink for SegmentCollector {
    fn on_voice_message(&mut self, ctx: &dyn SourceContext, message: VoiceMessage) -> ParseControl {
        // Latch the stream format from the first message.
        let format = match self.format {
            Some(format) => format,
            None => match VoiceFormat::from_payload(&message.format) {
                Ok(format) => {
                    self.format = Some(format);
                    format
                }
                Err(description) => {
                    self.unsupported = Some(description);
                    return ParseControl::Cancel;
                }
            },
        };

        if VoiceFormat::from_payload(&message.format) != Ok(format) {
            warn!(
                steam_id = message.steam_id,
                "dropping voice message with format differing from the demo's"
            );
            return ParseControl::Continue;
        }

        if let Some(filter) = &self.filter {
            if !filter.contains(&message.steam_id) {
                return ParseControl::Continue;
            }
        }

        // First-wins name cache: a rename keeps the first name seen.
        if !self.names.contains_key(&message.steam_id) {
            match ctx.player_name(message.steam_id) {
                Some(name) => {
                    self.names
                        .insert(message.steam_id, sanitize_player_name(&name));
                }
                None => {
                    warn!(
                        steam_id = message.steam_id,
                        "unable to find player's name, dropping voice message"
                    );
                    return ParseControl::Continue;
                }
            }
        }

        self.voices
            .entry(message.steam_id)
            .or_default()
            .push(VoiceSegment {
                payload: message.voice_data,
                timestamp_seconds: ctx.current_time_seconds(),
            });

        ParseControl::Continue
    }
}
