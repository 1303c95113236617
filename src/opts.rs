use std::collections::HashSet;
use std::path::PathBuf;

/// Output layout for rendered voice.
///
/// Integration notes:
/// - When the `cli` feature is enabled, `clap::ValueEnum` is derived so the
///   enum maps directly onto the `--mode` flag (kebab-case values).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum Mode {
    /// One file per player containing only their voice, no silence.
    #[default]
    SplitCompact,

    /// One file per player, voice at original timestamps, silence elsewhere,
    /// file length equal to the demo duration.
    SplitFull,

    /// One combined file with every player mixed at original timestamps,
    /// file length equal to the demo duration.
    SingleFull,
}

/// Extraction configuration.
///
/// This is *library-level configuration*, not CLI flags directly: the CLI
/// maps user input onto this type, and other frontends (tests, batch jobs,
/// embedders) construct it programmatically. It replaces what the reference
/// implementation kept as process-wide globals.
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    /// Directory WAV files are written to. Must exist.
    pub output_dir: PathBuf,

    pub mode: Mode,

    /// Surface the first non-fatal error as fatal, with its exit code.
    pub exit_on_first_error: bool,

    /// When set, only voice from these SteamIDs is collected.
    pub steam_ids: Option<HashSet<u64>>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            mode: Mode::default(),
            exit_on_first_error: false,
            steam_ids: None,
        }
    }
}
