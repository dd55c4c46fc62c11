/////////////////////////////////////////////////////////////////////////////////////////////
//
// Defines the error type and error categories reported by field generation.
//
// Created on: 15 Nov 2025     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

use warpfield_utils::KernelType;
use std::{
    error::Error,
    fmt, io,
    path::{Path, PathBuf},
};

/// Category of a [`FieldError`].
///
/// Every category is fatal for the run that raised it; nothing is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldErrorKind {
    /// No implementation exists for the requested scalar type, dimensionality or grid layout.
    UnsupportedConfiguration,
    /// An input file is unreadable or its contents are inconsistent.
    MalformedInput,
    /// Index-valued points were supplied without the grid needed to convert them.
    MissingDependency,
    /// The kernel system could not be solved.
    SingularSystem,
    /// The output could not be written.
    IoFailure,
}

impl FieldErrorKind {
    /// Process exit status used by the command line front end for this category.
    pub fn exit_code(&self) -> i32 {
        match self {
            FieldErrorKind::UnsupportedConfiguration => 3,
            FieldErrorKind::MalformedInput => 4,
            FieldErrorKind::MissingDependency => 5,
            FieldErrorKind::SingularSystem => 6,
            FieldErrorKind::IoFailure => 7,
        }
    }
}

pub type FieldResult<T> = std::result::Result<T, FieldError>;

/// Errors that can occur while reading inputs, fitting a transform, evaluating a
/// field, or writing results.
#[derive(Debug)]
pub enum FieldError {
    /// The requested configuration has no implementation.
    Unsupported { reason: String },
    /// Input content is inconsistent or cannot be parsed.
    Malformed {
        path: Option<PathBuf>,
        reason: String,
    },
    /// An input file could not be opened or read.
    Read {
        path: PathBuf,
        source: io::Error,
    },
    /// A saved transform could not be parsed.
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    /// A collaborator needed to interpret the inputs is absent.
    MissingDependency { reason: String },
    /// The kernel system is singular or numerically unsolvable.
    SingularSystem {
        kernel_type: KernelType,
        num_landmarks: usize,
        reason: String,
    },
    /// An output file could not be created, written, or renamed into place.
    Write {
        path: PathBuf,
        source: io::Error,
    },
    /// A transform could not be serialized.
    Serialize {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl FieldError {
    pub(crate) fn unsupported(reason: impl Into<String>) -> Self {
        FieldError::Unsupported {
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        FieldError::Malformed {
            path: None,
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed_file(path: &Path, reason: impl Into<String>) -> Self {
        FieldError::Malformed {
            path: Some(path.to_path_buf()),
            reason: reason.into(),
        }
    }

    pub(crate) fn read(path: &Path, source: io::Error) -> Self {
        FieldError::Read {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn write(path: &Path, source: io::Error) -> Self {
        FieldError::Write {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Category of this error.
    pub fn kind(&self) -> FieldErrorKind {
        match self {
            FieldError::Unsupported { .. } => FieldErrorKind::UnsupportedConfiguration,
            FieldError::Malformed { .. } | FieldError::Read { .. } | FieldError::Parse { .. } => {
                FieldErrorKind::MalformedInput
            }
            FieldError::MissingDependency { .. } => FieldErrorKind::MissingDependency,
            FieldError::SingularSystem { .. } => FieldErrorKind::SingularSystem,
            FieldError::Write { .. } | FieldError::Serialize { .. } => FieldErrorKind::IoFailure,
        }
    }

    /// Process exit status for this error, see [`FieldErrorKind::exit_code`].
    pub fn exit_code(&self) -> i32 {
        self.kind().exit_code()
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldError::Unsupported { reason } => {
                write!(f, "unsupported configuration: {}", reason)
            }
            FieldError::Malformed { path: Some(path), reason } => {
                write!(f, "malformed input in {}: {}", path.display(), reason)
            }
            FieldError::Malformed { path: None, reason } => {
                write!(f, "malformed input: {}", reason)
            }
            FieldError::Read { path, source } => {
                write!(f, "reading {}: {}", path.display(), source)
            }
            FieldError::Parse { path, source } => {
                write!(f, "parsing JSON in {}: {}", path.display(), source)
            }
            FieldError::MissingDependency { reason } => {
                write!(f, "missing dependency: {}", reason)
            }
            FieldError::SingularSystem {
                kernel_type,
                num_landmarks,
                reason,
            } => write!(
                f,
                "singular {} system for {} landmarks: {}",
                kernel_type, num_landmarks, reason
            ),
            FieldError::Write { path, source } => {
                write!(f, "writing {}: {}", path.display(), source)
            }
            FieldError::Serialize { path, source } => {
                write!(f, "serializing JSON to {}: {}", path.display(), source)
            }
        }
    }
}

impl Error for FieldError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            FieldError::Read { source, .. } | FieldError::Write { source, .. } => Some(source),
            FieldError::Parse { source, .. } | FieldError::Serialize { source, .. } => {
                Some(source)
            }
            FieldError::Unsupported { .. }
            | FieldError::Malformed { .. }
            | FieldError::MissingDependency { .. }
            | FieldError::SingularSystem { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct_and_non_zero() {
        let kinds = [
            FieldErrorKind::UnsupportedConfiguration,
            FieldErrorKind::MalformedInput,
            FieldErrorKind::MissingDependency,
            FieldErrorKind::SingularSystem,
            FieldErrorKind::IoFailure,
        ];
        let mut codes: Vec<i32> = kinds.iter().map(|k| k.exit_code()).collect();
        assert!(codes.iter().all(|c| *c != 0));
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), kinds.len());
    }

    #[test]
    fn io_errors_keep_their_source() {
        let err = FieldError::read(
            Path::new("missing.txt"),
            io::Error::new(io::ErrorKind::NotFound, "no such file"),
        );
        assert_eq!(err.kind(), FieldErrorKind::MalformedInput);
        assert!(err.source().is_some());
        assert!(err.to_string().contains("missing.txt"));

        let err = FieldError::write(
            Path::new("out.mhd"),
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.kind(), FieldErrorKind::IoFailure);
        assert_eq!(err.exit_code(), 7);
    }
}
