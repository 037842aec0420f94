//! Error types for the asset system.

use std::fmt;
use std::path::PathBuf;

use crate::registry::TypeHandle;

/// Errors that can occur during asset operations.
///
/// None of these are fatal: every failure degrades to "resource unavailable
/// this frame" and leaves the cache structurally valid.
#[derive(Debug)]
pub enum AssetError {
    /// A load was requested through a handle the registry has never seen.
    UnregisteredType {
        /// The handle that failed to translate.
        handle: TypeHandle,
    },

    /// The asset type's load callback reported failure.
    LoadFailed {
        /// Name of the asset type.
        type_name: &'static str,
        /// The path being loaded.
        path: String,
        /// Description of the error.
        message: String,
    },

    /// Failed to read asset data from disk.
    Io {
        /// The path that failed to load.
        path: PathBuf,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// The file-watch backend rejected a path.
    WatchFailed {
        /// The path that could not be watched.
        path: PathBuf,
        /// Description of the error.
        message: String,
    },

    /// A payload slot did not hold the type its capability table expects.
    PayloadTypeMismatch {
        /// Name of the expected asset type.
        expected: &'static str,
    },
}

impl fmt::Display for AssetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetError::UnregisteredType { handle } => {
                write!(f, "Asset type {:?} is not registered", handle)
            }
            AssetError::LoadFailed {
                type_name,
                path,
                message,
            } => {
                write!(f, "Could not load {} '{}': {}", type_name, path, message)
            }
            AssetError::Io { path, source } => {
                write!(f, "IO error loading '{}': {}", path.display(), source)
            }
            AssetError::WatchFailed { path, message } => {
                write!(f, "Could not watch '{}': {}", path.display(), message)
            }
            AssetError::PayloadTypeMismatch { expected } => {
                write!(f, "Payload slot does not hold a {} payload", expected)
            }
        }
    }
}

impl std::error::Error for AssetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AssetError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<std::io::Error> for AssetError {
    fn from(err: std::io::Error) -> Self {
        AssetError::Io {
            path: PathBuf::new(),
            source: err,
        }
    }
}

/// Result type alias for asset operations.
pub type AssetResult<T> = Result<T, AssetError>;
