//! Native shared-library discovery.
//!
//! The legacy pipeline decodes through Valve's CELT build, which only exists
//! as a redistributable shared library and is loaded at runtime from the
//! platform's dynamic-library search path. On non-Windows platforms the
//! search variable is mandatory; on Windows an unset variable falls back to
//! the current directory.
//!
//! The modern pipeline's Opus decoder is linked statically, so its file list
//! here documents the historical runtime contract and is only enforced for
//! the dynamically-loaded CELT stack.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Which native decoder stack a pipeline depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeStack {
    /// Legacy source-1 voice: Valve CELT plus its tier0/vstdlib runtime.
    Celt,
    /// Source-2 voice: libopus.
    Opus,
}

/// Name of the search-path environment variable for this platform.
pub fn search_path_variable() -> &'static str {
    if cfg!(target_os = "macos") {
        "DYLD_LIBRARY_PATH"
    } else {
        "LD_LIBRARY_PATH"
    }
}

/// Files that must be present in the search directory for a stack.
pub fn required_files(stack: NativeStack) -> &'static [&'static str] {
    match stack {
        NativeStack::Celt => {
            if cfg!(target_os = "windows") {
                &["vaudio_celt.dll", "tier0.dll"]
            } else if cfg!(target_os = "macos") {
                &["vaudio_celt.dylib", "libtier0.dylib", "libvstdlib.dylib"]
            } else {
                &["vaudio_celt_client.so", "libtier0_client.so"]
            }
        }
        NativeStack::Opus => {
            if cfg!(target_os = "windows") {
                &["opus.dll"]
            } else if cfg!(target_os = "macos") {
                &["libopus.0.dylib"]
            } else {
                &["libopus.so.0"]
            }
        }
    }
}

/// File name of the CELT library itself (the one handed to the loader).
pub fn celt_library_file() -> &'static str {
    required_files(NativeStack::Celt)[0]
}

/// Resolve the native-library search directory from the environment.
///
/// The variable's value is treated as a single directory; a trailing path
/// separator is tolerated. Missing variable (off-Windows) or a non-existent
/// directory are argument errors.
pub fn resolve_search_dir() -> Result<PathBuf> {
    let variable = search_path_variable();
    let value = std::env::var(variable).unwrap_or_default();

    if value.is_empty() {
        if !cfg!(target_os = "windows") {
            return Err(Error::InvalidArguments(format!(
                "{variable} is missing, usage example: {variable}=. demovoice my_demo.dem"
            )));
        }
        return std::env::current_dir()
            .map_err(|err| Error::InvalidArguments(format!("failed to get current directory: {err}")));
    }

    let trimmed = value.trim_end_matches(std::path::MAIN_SEPARATOR);
    let dir = PathBuf::from(trimmed);
    if !dir.is_dir() {
        return Err(Error::InvalidArguments(format!(
            "library folder doesn't exist: {}",
            dir.display()
        )));
    }

    Ok(dir)
}

/// Verify every required file of `stack` is present in `dir`.
pub fn assert_library_files(dir: &Path, stack: NativeStack) -> Result<()> {
    for file in required_files(stack) {
        if !dir.join(file).is_file() {
            return Err(Error::MissingLibraryFiles((*file).to_owned()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"").unwrap();
    }

    #[test]
    fn required_files_are_nonempty_for_both_stacks() {
        assert!(!required_files(NativeStack::Celt).is_empty());
        assert!(!required_files(NativeStack::Opus).is_empty());
    }

    #[test]
    fn celt_library_file_is_the_celt_entry() {
        assert!(celt_library_file().contains("celt"));
    }

    #[test]
    fn assertion_passes_when_all_files_exist() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        for file in required_files(NativeStack::Celt) {
            touch(dir.path(), file);
        }

        assert_library_files(dir.path(), NativeStack::Celt)?;
        Ok(())
    }

    #[test]
    fn assertion_names_the_first_missing_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        // Only the CELT library itself, none of its runtime.
        touch(dir.path(), celt_library_file());

        let err = assert_library_files(dir.path(), NativeStack::Celt).unwrap_err();
        assert_eq!(err.exit_code(), 20);
        assert!(!err.to_string().contains("celt"));
        Ok(())
    }

    #[test]
    fn opus_stack_assertion_checks_its_own_files() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let err = assert_library_files(dir.path(), NativeStack::Opus).unwrap_err();
        assert_eq!(err.exit_code(), 20);

        for file in required_files(NativeStack::Opus) {
            touch(dir.path(), file);
        }
        assert_library_files(dir.path(), NativeStack::Opus)?;
        Ok(())
    }
}
