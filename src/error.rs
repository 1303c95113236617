use std::path::PathBuf;

use thiserror::Error;

use crate::source::ParseError;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Crate-wide error type.
///
/// Every variant maps to a stable process exit code so callers (and scripts
/// wrapping the CLI) can distinguish failure classes without parsing
/// messages. The codes are part of the public contract; see [`Error::exit_code`].
#[derive(Debug, Error)]
pub enum Error {
    /// Bad CLI input. Always fatal, regardless of the error policy.
    #[error("{0}")]
    InvalidArguments(String),

    /// The CELT shared library could not be loaded or is missing symbols.
    #[error("failed to load the CELT decoder library: {0}")]
    CeltLoad(String),

    #[error("demo not found: {}", path.display())]
    DemoNotFound { path: PathBuf },

    /// Demo-level parser failure. The benign "unexpected end of stream" is
    /// not an error; truncated demos still produce output.
    #[error("failed to parse demo {}", demo.display())]
    Parsing {
        demo: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("unsupported audio codec: {0}")]
    UnsupportedCodec(String),

    #[error("no voice data found in demo {}", demo.display())]
    NoVoiceData { demo: PathBuf },

    /// Codec-level decode failure. Per-segment: the segment is dropped and
    /// rendering continues unless the first-error policy is active.
    #[error("failed to decode voice data: {0}")]
    Decoding(String),

    #[error("couldn't create WAV file {}", path.display())]
    WavCreation {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    #[error("failed to open demo {}", demo.display())]
    OpenDemo {
        demo: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported demo format: {0}")]
    UnsupportedDemoFormat(String),

    #[error("the required library file {0} doesn't exist")]
    MissingLibraryFiles(String),
}

impl Error {
    /// Stable process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidArguments(_) => 10,
            Error::CeltLoad(_) => 11,
            Error::DemoNotFound { .. } => 12,
            Error::Parsing { .. } => 13,
            Error::UnsupportedCodec(_) => 14,
            Error::NoVoiceData { .. } => 15,
            Error::Decoding(_) => 16,
            Error::WavCreation { .. } => 17,
            Error::OpenDemo { .. } => 18,
            Error::UnsupportedDemoFormat(_) => 19,
            Error::MissingLibraryFiles(_) => 20,
        }
    }
}

/// Collects non-fatal errors and applies the configured failure policy.
///
/// With `exit_on_first_error` disabled (the default), reported errors are
/// logged to standard error and processing continues. With it enabled,
/// [`ErrorSink::report`] returns the error so callers can unwind to the
/// top level, which exits with the error's code.
#[derive(Debug)]
pub struct ErrorSink {
    exit_on_first_error: bool,
    reported: usize,
}

impl ErrorSink {
    pub fn new(exit_on_first_error: bool) -> Self {
        Self {
            exit_on_first_error,
            reported: 0,
        }
    }

    /// Surface a non-fatal error.
    pub fn report(&mut self, err: Error) -> Result<()> {
        self.reported += 1;
        tracing::error!(exit_code = err.exit_code(), "{err:#}");

        if self.exit_on_first_error {
            return Err(err);
        }

        Ok(())
    }

    /// How many errors were surfaced through this sink.
    pub fn reported(&self) -> usize {
        self.reported
    }
}
