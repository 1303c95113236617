// src/bin/demovoice.rs

use std::path::{Path, PathBuf};

use clap::Parser;

use demovoice::demo::DemoFile;
use demovoice::source::{ParseError, VoiceMessageSource};
use demovoice::{Error, ErrorSink, ExtractConfig, Extractor, Mode, Result};

fn main() {
    demovoice::logging::init();

    let params = Params::parse();
    if let Err(err) = run(params) {
        // The error was already logged if it went through the sink; print it
        // again for the common case of early argument failures.
        eprintln!("{err}");
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            eprintln!("{cause}");
            source = cause.source();
        }
        std::process::exit(err.exit_code());
    }
}

fn run(params: Params) -> Result<()> {
    let demos = validate_demo_paths(&params.demos)?;
    let output_dir = resolve_output_dir(params.output.as_deref())?;

    // Map CLI flags into library configuration. Keeping this mapping
    // explicit keeps the library reusable and the CLI thin.
    let config = ExtractConfig {
        output_dir,
        mode: params.mode,
        exit_on_first_error: params.exit_on_first_error,
        steam_ids: None,
    };

    let mut extractor = Extractor::new(config.clone());
    let mut errors = ErrorSink::new(config.exit_on_first_error);

    // Demo container parsing is an integration point: embedders hand the
    // extractor a parser backend via `demovoice::source::SourceProvider`.
    // This standalone build ships without one and reports it per demo.
    let mut provider = |demo: &DemoFile| -> std::result::Result<Box<dyn VoiceMessageSource>, ParseError> {
        Err(ParseError::msg(format!(
            "no demo container parser is linked into this binary ({:?} container); \
             implement demovoice::source::VoiceMessageSource on top of a parser \
             and hand it to demovoice::Extractor",
            demo.kind
        )))
    };

    for demo in &demos {
        println!("Processing demo {}", demo.display());

        match extractor.process_demo(demo, &mut provider, &mut errors) {
            Ok(report) => {
                for file in &report.files {
                    println!("{}", file.display());
                }
            }
            Err(err) => {
                // A demo that couldn't be opened skips the closing progress
                // line; every other outcome still gets one.
                let failed_to_open =
                    matches!(err, Error::DemoNotFound { .. } | Error::OpenDemo { .. });
                errors.report(err)?;
                if failed_to_open {
                    continue;
                }
            }
        }

        println!("End processing demo {}", demo.display());
    }

    Ok(())
}

fn validate_demo_paths(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    if paths.is_empty() {
        return Err(Error::InvalidArguments("no demo path provided".into()));
    }

    for path in paths {
        if path.extension().and_then(|e| e.to_str()) != Some("dem") {
            return Err(Error::InvalidArguments(format!(
                "invalid demo path: {}",
                path.display()
            )));
        }
    }

    Ok(paths.to_vec())
}

fn resolve_output_dir(output: Option<&Path>) -> Result<PathBuf> {
    // A supplied path may be relative; make it absolute before checking it.
    let dir = match output {
        Some(path) if path.is_absolute() => path.to_path_buf(),
        Some(path) => current_dir()?.join(path),
        None => current_dir()?,
    };

    if !dir.is_dir() {
        return Err(Error::InvalidArguments(format!(
            "output folder doesn't exist: {}",
            dir.display()
        )));
    }

    Ok(dir)
}

fn current_dir() -> Result<PathBuf> {
    std::env::current_dir()
        .map_err(|err| Error::InvalidArguments(format!("failed to get current directory: {err}")))
}

/// CLI parameters for `demovoice`.
#[derive(Parser, Debug)]
#[command(name = "demovoice")]
#[command(about = "Extract per-player voice audio from Counter-Strike demos into WAV files")]
struct Params {
    /// Demo file paths (`.dem`).
    #[arg(value_name = "DEMO", required = true)]
    demos: Vec<PathBuf>,

    /// Directory where WAV files are written. Defaults to the current
    /// directory; must exist.
    #[arg(long = "output")]
    output: Option<PathBuf>,

    /// Exit at the first error encountered, with that error's exit code.
    #[arg(long = "exit-on-first-error", default_value_t = false)]
    exit_on_first_error: bool,

    /// Output mode.
    #[arg(long = "mode", value_enum, default_value_t = Mode::SplitCompact)]
    mode: Mode,
}
