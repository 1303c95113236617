//! Demo-file front door: open, sniff the container generation, rewind.
//!
//! The first 8 bytes of a demo identify the container: `HL2DEMO` for the
//! source-1 generation (CELT voice) and `PBDEMS2` for source-2 (Steam voice
//! or raw Opus). Anything else is unsupported.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

const SIGNATURE_LEN: usize = 8;
const SOURCE1_SIGNATURE: &[u8] = b"HL2DEMO";
const SOURCE2_SIGNATURE: &[u8] = b"PBDEMS2";

/// Network-protocol cutoff separating the two embedded source-2 event-list
/// schemas. Demos recorded below this protocol use the older schema.
pub const SOURCE2_SCHEMA_PROTOCOL_CUTOFF: u32 = 13992;

/// Demo container generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoKind {
    /// `HL2DEMO` — source-1, legacy CELT voice pipeline.
    Source1,
    /// `PBDEMS2` — source-2, Steam-voice / Opus pipeline.
    Source2,
}

/// Which embedded event-list schema a source-2 parser should be handed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventListSchema {
    /// Network protocol below [`SOURCE2_SCHEMA_PROTOCOL_CUTOFF`].
    Pre13992,
    Current,
}

impl EventListSchema {
    pub fn for_network_protocol(protocol: u32) -> Self {
        if protocol < SOURCE2_SCHEMA_PROTOCOL_CUTOFF {
            EventListSchema::Pre13992
        } else {
            EventListSchema::Current
        }
    }
}

/// An opened demo with its container generation identified.
///
/// The file handle is rewound to the start so a parser backend can read the
/// demo from byte zero.
#[derive(Debug)]
pub struct DemoFile {
    pub path: PathBuf,
    /// File name without the `.dem` extension; used for output naming.
    pub stem: String,
    pub kind: DemoKind,
    pub file: File,
}

/// Open a demo and identify its container generation.
///
/// Errors:
/// - [`Error::DemoNotFound`] when the path does not exist
/// - [`Error::OpenDemo`] for other I/O failures (including a header shorter
///   than 8 bytes)
/// - [`Error::UnsupportedDemoFormat`] for an unrecognized signature
pub fn open(path: &Path) -> Result<DemoFile> {
    let mut file = File::open(path).map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            Error::DemoNotFound {
                path: path.to_path_buf(),
            }
        } else {
            Error::OpenDemo {
                demo: path.to_path_buf(),
                source: err,
            }
        }
    })?;

    let kind = read_signature(&mut file, path)?;

    file.seek(SeekFrom::Start(0)).map_err(|err| Error::OpenDemo {
        demo: path.to_path_buf(),
        source: err,
    })?;

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "demo".to_owned());

    Ok(DemoFile {
        path: path.to_path_buf(),
        stem,
        kind,
        file,
    })
}

fn read_signature(file: &mut File, path: &Path) -> Result<DemoKind> {
    let mut buffer = [0u8; SIGNATURE_LEN];
    file.read_exact(&mut buffer).map_err(|err| Error::OpenDemo {
        demo: path.to_path_buf(),
        source: err,
    })?;

    // The signature is NUL-padded to 8 bytes.
    let trimmed: &[u8] = {
        let end = buffer
            .iter()
            .rposition(|&b| b != 0)
            .map_or(0, |idx| idx + 1);
        &buffer[..end]
    };

    match trimmed {
        SOURCE1_SIGNATURE => Ok(DemoKind::Source1),
        SOURCE2_SIGNATURE => Ok(DemoKind::Source2),
        other => Err(Error::UnsupportedDemoFormat(
            String::from_utf8_lossy(other).into_owned(),
        )),
    }
}
