//! Shared fixtures: a scripted parser backend and payload builders.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use bytes::{BufMut, Bytes};

use demovoice::chunk::{ChunkBody, VoiceChunk};
use demovoice::source::{
    ParseControl, ParseEnd, ParseError, PayloadFormat, SourceContext, VoiceMessage,
    VoiceMessageSource, VoiceSink,
};

/// A parser backend that replays a fixed message script.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    pub messages: Vec<(f64, VoiceMessage)>,
    pub names: HashMap<u64, String>,
    pub duration_seconds: f64,
    pub truncated: bool,
}

struct ScriptedContext<'a> {
    now: f64,
    names: &'a HashMap<u64, String>,
}

impl SourceContext for ScriptedContext<'_> {
    fn current_time_seconds(&self) -> f64 {
        self.now
    }

    fn player_name(&self, steam_id: u64) -> Option<String> {
        self.names.get(&steam_id).cloned()
    }
}

impl VoiceMessageSource for ScriptedSource {
    fn drive(&mut self, sink: &mut dyn VoiceSink) -> Result<ParseEnd, ParseError> {
        for (time, message) in &self.messages {
            let ctx = ScriptedContext {
                now: *time,
                names: &self.names,
            };
            if sink.on_voice_message(&ctx, message.clone()) == ParseControl::Cancel {
                return Ok(ParseEnd::Cancelled);
            }
        }

        if self.truncated {
            Ok(ParseEnd::Truncated {
                duration_seconds: self.duration_seconds,
            })
        } else {
            Ok(ParseEnd::Completed {
                duration_seconds: self.duration_seconds,
            })
        }
    }
}

impl ScriptedSource {
    pub fn named(mut self, steam_id: u64, name: &str) -> Self {
        self.names.insert(steam_id, name.to_owned());
        self
    }

    pub fn message(mut self, time: f64, steam_id: u64, format: PayloadFormat, payload: Vec<u8>) -> Self {
        self.messages.push((
            time,
            VoiceMessage {
                steam_id,
                voice_data: Bytes::from(payload),
                format,
            },
        ));
        self
    }
}

/// Write a demo stub with the given 8-byte signature.
pub fn write_demo(dir: &Path, name: &str, signature: &[u8; 8]) -> PathBuf {
    let path = dir.join(name);
    let mut contents = signature.to_vec();
    contents.extend_from_slice(&[0u8; 128]);
    std::fs::write(&path, contents).unwrap();
    path
}

/// Encode `count` Opus sub-frames of a sine at `sample_rate`, sequenced from
/// `first_sequence`, in the sub-frame wire format.
pub fn opus_payload(sample_rate: u32, first_sequence: u16, count: u16) -> Vec<u8> {
    let mut encoder =
        opus::Encoder::new(sample_rate, opus::Channels::Mono, opus::Application::Voip).unwrap();

    let mut out = Vec::new();
    for index in 0..count {
        let pcm: Vec<f32> = (0..480)
            .map(|i| {
                let t = (u32::from(index) * 480 + i) as f32;
                (t * 440.0 * std::f32::consts::TAU / sample_rate as f32).sin() * 0.5
            })
            .collect();

        let mut packet = vec![0u8; 4000];
        let len = encoder.encode_float(&pcm, &mut packet).unwrap();
        packet.truncate(len);

        out.put_i16_le(packet.len() as i16);
        out.put_u16_le(first_sequence + index);
        out.put_slice(&packet);
    }
    out
}

/// Wrap a sub-framed Opus payload in a checksummed Steam voice chunk.
pub fn steam_chunk(steam_id: u64, inner: Vec<u8>) -> Vec<u8> {
    VoiceChunk::new(steam_id, 24_000, ChunkBody::Audio(Bytes::from(inner))).to_bytes()
}

/// Read every sample of a 32-bit mono WAV.
pub fn read_i32_samples(path: &Path) -> Vec<i32> {
    hound::WavReader::open(path)
        .unwrap()
        .samples::<i32>()
        .collect::<Result<_, _>>()
        .unwrap()
}
