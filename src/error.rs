//! Named failure kinds for the conditions callers (and tests) want to match on.
//!
//! Everything else in this crate returns `anyhow::Result` and relies on
//! `.context(...)` for narrative detail, matching the rest of the crate's
//! error handling. These variants exist only for the handful of fatal
//! conditions that have a caller-visible identity (an exit code, a retry
//! decision, a test assertion) rather than just a message.

use std::fmt;

#[derive(Debug)]
pub enum RepackError {
    /// `globalgamemanagers` is missing, unreadable, or the directory isn't
    /// laid out like a Unity `*_Data` folder.
    GameDirInvalid { game_dir: String, reason: String },
    /// `globalgamemanagers` was read but contains no `BuildSettings` (class 141) object.
    BuildSettingsMissing,
    /// A scene name from the `--objects` manifest isn't in `BuildSettings.scenes`.
    UnknownScene { name: String },
    /// `resolve_path` ran out of matching children partway through a path.
    PathNotFound {
        scene: String,
        path: String,
        segment: String,
    },
    /// The `--objects` manifest is not valid JSON, or not `{scene: [path, ...]}`.
    ManifestInvalid { path: String, reason: String },
    /// The output bundle could not be written.
    BundleWriteError { path: String, reason: String },
}

impl fmt::Display for RepackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepackError::GameDirInvalid { game_dir, reason } => {
                write!(f, "'{game_dir}' is not a usable game directory: {reason}")
            }
            RepackError::BuildSettingsMissing => {
                write!(f, "no BuildSettings object found in globalgamemanagers")
            }
            RepackError::UnknownScene { name } => {
                write!(f, "scene '{name}' is not in BuildSettings.scenes")
            }
            RepackError::PathNotFound {
                scene,
                path,
                segment,
            } => write!(
                f,
                "in scene '{scene}', path '{path}' has no child named '{segment}'"
            ),
            RepackError::ManifestInvalid { path, reason } => {
                write!(f, "could not read object manifest '{path}': {reason}")
            }
            RepackError::BundleWriteError { path, reason } => {
                write!(f, "could not write bundle to '{path}': {reason}")
            }
        }
    }
}

impl std::error::Error for RepackError {}

/// Diagnostic-only: multiple candidates matched a path segment and the first was used.
/// Not an error variant of [`RepackError`] because it never aborts the pipeline.
pub struct AmbiguousPath<'a> {
    pub scene: &'a str,
    pub path: &'a str,
    pub candidates: usize,
}

impl fmt::Display for AmbiguousPath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "found {} candidates for '{}', choosing first",
            self.candidates, self.path
        )
    }
}
