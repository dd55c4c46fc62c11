/////////////////////////////////////////////////////////////////////////////////////////////
//
// Declares the file collaborators used by the field generation pipeline.
//
// Created on: 15 Nov 2025     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # io
//!
//! The pipeline never touches files directly. Grid descriptions, landmark lists and
//! the output field go through the traits below, so alternative formats or in-memory
//! fakes can be swapped in.

mod metaimage;
mod point_file;

pub use metaimage::{MetaImageReader, MetaImageWriter};
pub use point_file::PointFileReader;

use crate::{
    correspondence::PointList,
    dense_field::FieldView,
    error::{FieldError, FieldResult},
    grid::GridDescriptor,
};
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

/// Discovers the properties of a reference grid without loading its cells.
pub trait GridDescriptorReader: Send + Sync {
    fn describe(&self, path: &Path) -> FieldResult<GridDescriptor>;
}

/// Reads an ordered landmark list.
pub trait PointSetReader: Send + Sync {
    fn read_points(&self, path: &Path) -> FieldResult<PointList>;
}

/// Persists a displacement field.
pub trait FieldWriter: Send + Sync {
    fn write(&self, path: &Path, field: FieldView<'_>) -> FieldResult<()>;

    /// Removes a field previously written to `path`. Best effort.
    fn discard(&self, path: &Path) {
        let _ = fs::remove_file(path);
    }
}

/// Temporary sibling of `path`, renamed over it once complete.
pub(crate) fn temporary_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

/// Writes `chunks` to a temporary file next to `path`.
pub(crate) fn write_temporary(path: &Path, chunks: &[&[u8]]) -> FieldResult<PathBuf> {
    let temporary = temporary_path(path);
    let result = File::create(&temporary).and_then(|file| {
        let mut w = BufWriter::new(file);
        for chunk in chunks {
            w.write_all(chunk)?;
        }
        w.flush()
    });

    match result {
        Ok(()) => Ok(temporary),
        Err(e) => {
            let _ = fs::remove_file(&temporary);
            Err(FieldError::write(path, e))
        }
    }
}

/// Moves a temporary file from [`write_temporary`] over `path`, removing it on failure.
pub(crate) fn commit_temporary(temporary: &Path, path: &Path) -> FieldResult<()> {
    fs::rename(temporary, path).map_err(|e| {
        let _ = fs::remove_file(temporary);
        FieldError::write(path, e)
    })
}
