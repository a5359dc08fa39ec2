//! Error taxonomy for layout, decoding, selection and applying.

use std::{io, path::PathBuf};

use thiserror::Error;

/// The monitor topology reported by the display enumerator can't be used.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("no monitors were reported by the display enumerator")]
    NoMonitors,

    #[error("none of the {0} monitor(s) is flagged primary")]
    NoPrimary(usize),

    #[error("{0} monitors are flagged primary, expected exactly one")]
    MultiplePrimaries(usize),

    #[error("primary monitor must start at (0,0), found ({left},{top})")]
    PrimaryNotAtOrigin { left: i32, top: i32 },

    #[error("monitor {index} has an empty rectangle")]
    EmptyMonitor { index: usize },
}

/// A source file could not be read as an image.
#[derive(Debug, Error)]
#[error("failed to decode {}: {source}", .path.display())]
pub struct DecodeError {
    pub path: PathBuf,
    #[source]
    pub source: image::ImageError,
}

#[derive(Debug, Error)]
pub enum SelectionError {
    /// The directory holds no eligible files at all, seen or not.
    #[error("directory {} has no eligible image files", .0.display())]
    Exhausted(PathBuf),

    #[error("failed to list directory {}: {source}", .path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("gave up on {} after {attempts} failed attempt(s)", .dir.display())]
    AttemptsFailed { dir: PathBuf, attempts: usize },

    #[error("failed to persist seen-list {}: {reason}", .path.display())]
    Persist { path: PathBuf, reason: String },
}

/// The desktop refused the finished canvas.
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("failed to write wallpaper bitmap {}: {source}", .path.display())]
    Save {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("desktop rejected wallpaper {}: {reason}", .path.display())]
    Rejected { path: PathBuf, reason: String },
}

/// Errors that abort a rotation run (or, in periodic mode, a cycle).
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Apply(#[from] ApplyError),

    #[error("composition requested before the monitor layout was resolved")]
    Unresolved,
}
