//! SUMMARY:
//! Define the crate-wide error type and the coarse error taxonomy it maps onto.
//!
//! OVERVIEW:
//! Every public operation either succeeds or fails with a `VfsError`. Callers that only care
//! about the category of failure (missing target, rule violation, permission problem, missing
//! backend capability, bad input, anything else) match on `VfsError::kind()` instead of the
//! concrete variant.
use crate::validator::Violations;
use std::io;
use std::path::Path;
use thiserror::Error;

const MAX_ERROR_PATH_LEN: usize = 256;

// Internal helper: render error-friendly path display (truncate long values).
pub(crate) fn truncate_path_display(path: &Path, max_len: usize) -> String {
    let path_str = path.to_string_lossy();
    let char_count = path_str.chars().count();
    if char_count <= max_len {
        return path_str.into_owned();
    }
    let keep = max_len.saturating_sub(5) / 2;
    let start: String = path_str.chars().take(keep).collect();
    let mut tail_chars: Vec<char> = path_str.chars().rev().take(keep).collect();
    tail_chars.reverse();
    let end: String = tail_chars.into_iter().collect();
    format!("{start}...{end}")
}

/// Render a path for an error message or a storage label.
pub(crate) fn path_label(path: &Path) -> String {
    truncate_path_display(path, MAX_ERROR_PATH_LEN)
}

/// SUMMARY:
/// Coarse classification of a `VfsError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The path does not exist, or is not the expected type.
    NotFound,
    /// One or more path rules failed.
    ConstraintViolation,
    /// Permission or lock-acquisition failure, or use of a binary handle in the wrong mode.
    AccessDenied,
    /// The backend does not implement the operation.
    Unsupported,
    /// Malformed input.
    InvalidValue,
    /// Any other I/O failure, including stale binary handles.
    Runtime,
}

/// SUMMARY:
/// Represent every failure produced by path resolution, rule checks and storage I/O.
///
/// DETAILS:
/// `target` fields carry a human readable label of the storage involved (a truncated path for
/// disk-backed storage, a short description for memory and stream storage).
#[derive(Debug, Error)]
pub enum VfsError {
    /// The target does not exist.
    #[error("No such file or directory: {target}")]
    NotFound { target: String },

    /// The target exists but is not the expected kind of entry.
    #[error("Expected a {expected} at {target}")]
    WrongType {
        target: String,
        expected: &'static str,
    },

    /// One or more rules failed; carries every failed rule.
    #[error(transparent)]
    ConstraintViolation(#[from] Violations),

    /// Permission, lock or access-mode failure.
    #[error("Access denied on {target}: {reason}")]
    AccessDenied { target: String, reason: String },

    /// The backend lacks the requested capability.
    #[error("{operation} is not supported by the {backend} backend")]
    Unsupported {
        backend: &'static str,
        operation: &'static str,
    },

    /// Malformed constructor input or argument.
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// A binary read would run past the recorded end of file.
    #[error("Read of {requested} bytes at offset {position} exceeds size {size} of {target}")]
    ReadPastEnd {
        target: String,
        position: u64,
        requested: u64,
        size: u64,
    },

    /// The file behind an open binary handle changed since it was opened.
    #[error("{target} changed since it was opened: {detail}")]
    Stale { target: String, detail: String },

    /// A native I/O call failed.
    #[error("{operation} failed on {target}")]
    Io {
        operation: &'static str,
        target: String,
        #[source]
        source: io::Error,
    },

    /// Failure not classifiable above.
    #[error("{0}")]
    Runtime(String),
}

impl VfsError {
    // Internal helper: wrap an I/O error, promoting NotFound / PermissionDenied to their variants.
    pub(crate) fn io(operation: &'static str, target: impl Into<String>, source: io::Error) -> Self {
        let target = target.into();
        match source.kind() {
            io::ErrorKind::NotFound => Self::NotFound { target },
            io::ErrorKind::PermissionDenied => Self::AccessDenied {
                target,
                reason: format!("{operation}: {source}"),
            },
            _ => Self::Io {
                operation,
                target,
                source,
            },
        }
    }

    #[inline]
    pub(crate) fn not_found(target: impl Into<String>) -> Self {
        Self::NotFound {
            target: target.into(),
        }
    }

    #[inline]
    pub(crate) fn wrong_type(target: impl Into<String>, expected: &'static str) -> Self {
        Self::WrongType {
            target: target.into(),
            expected,
        }
    }

    #[inline]
    pub(crate) fn access_denied(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::AccessDenied {
            target: target.into(),
            reason: reason.into(),
        }
    }

    #[inline]
    pub(crate) fn unsupported(backend: &'static str, operation: &'static str) -> Self {
        Self::Unsupported { backend, operation }
    }

    #[inline]
    pub(crate) fn stale(target: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Stale {
            target: target.into(),
            detail: detail.into(),
        }
    }

    /// SUMMARY:
    /// Classify this error into the crate's error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            VfsError::NotFound { .. } | VfsError::WrongType { .. } => ErrorKind::NotFound,
            VfsError::ConstraintViolation(_) => ErrorKind::ConstraintViolation,
            VfsError::AccessDenied { .. } => ErrorKind::AccessDenied,
            VfsError::Unsupported { .. } => ErrorKind::Unsupported,
            VfsError::InvalidValue(_) | VfsError::ReadPastEnd { .. } => ErrorKind::InvalidValue,
            VfsError::Stale { .. } | VfsError::Runtime(_) => ErrorKind::Runtime,
            VfsError::Io { source, .. } => match source.kind() {
                io::ErrorKind::NotFound => ErrorKind::NotFound,
                io::ErrorKind::PermissionDenied => ErrorKind::AccessDenied,
                io::ErrorKind::Unsupported => ErrorKind::Unsupported,
                io::ErrorKind::InvalidInput => ErrorKind::InvalidValue,
                _ => ErrorKind::Runtime,
            },
        }
    }

    /// Returns the rule violations when this is a `ConstraintViolation`.
    pub fn violations(&self) -> Option<&Violations> {
        match self {
            VfsError::ConstraintViolation(violations) => Some(violations),
            _ => None,
        }
    }
}

impl From<io::Error> for VfsError {
    fn from(source: io::Error) -> Self {
        VfsError::io("io", "<unknown>", source)
    }
}

#[cfg(test)]
mod tests;
