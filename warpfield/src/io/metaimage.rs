/////////////////////////////////////////////////////////////////////////////////////////////
//
// Reads MetaImage headers as grid descriptors and writes displacement fields as MetaImages.
//
// Created on: 15 Nov 2025     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

use super::{FieldWriter, GridDescriptorReader, commit_temporary, write_temporary};
use crate::{
    dense_field::FieldView,
    dispatch::ScalarType,
    error::{FieldError, FieldResult},
    grid::GridDescriptor,
};
use std::{
    collections::HashMap,
    ffi::OsStr,
    fs::{self, File},
    io::{self, BufRead, BufReader},
    path::Path,
};

/// Key that ends a MetaImage header. Anything after it is cell data.
const DATA_FILE_KEY: &str = "ElementDataFile";

/// MetaImage layout chosen from the output file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    /// `.mhd` header with cells in a sibling `.raw` file.
    Detached,
    /// `.mha` header followed by the cells in the same file.
    Local,
}

fn layout_of(path: &Path) -> Option<Layout> {
    let extension = path.extension().and_then(OsStr::to_str)?;
    match extension.to_ascii_lowercase().as_str() {
        "mhd" => Some(Layout::Detached),
        "mha" => Some(Layout::Local),
        _ => None,
    }
}

fn parse_element_type(value: &str) -> Option<ScalarType> {
    let scalar_type = match value {
        "MET_CHAR" => ScalarType::I8,
        "MET_UCHAR" => ScalarType::U8,
        "MET_SHORT" => ScalarType::I16,
        "MET_USHORT" => ScalarType::U16,
        "MET_INT" | "MET_LONG" => ScalarType::I32,
        "MET_UINT" | "MET_ULONG" => ScalarType::U32,
        "MET_LONG_LONG" => ScalarType::I64,
        "MET_ULONG_LONG" => ScalarType::U64,
        "MET_FLOAT" => ScalarType::F32,
        "MET_DOUBLE" => ScalarType::F64,
        _ => return None,
    };
    Some(scalar_type)
}

/// Reads the header of a MetaImage (`.mhd` or `.mha`) file.
///
/// Missing `ElementSpacing` defaults to one, a missing `Offset` (or its aliases `Origin`
/// and `Position`) to zero, and a missing `ElementNumberOfChannels` to one.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetaImageReader;

impl MetaImageReader {
    fn read_header(path: &Path) -> FieldResult<HashMap<String, String>> {
        let file = File::open(path).map_err(|e| FieldError::read(path, e))?;
        let reader = BufReader::new(file);

        let mut entries = HashMap::new();
        for line in reader.lines() {
            let line = line.map_err(|e| FieldError::read(path, e))?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let (key, value) = line.split_once('=').ok_or_else(|| {
                FieldError::malformed_file(path, format!("header line {:?} is not `key = value`", line))
            })?;
            let key = key.trim();
            entries.insert(key.to_string(), value.trim().to_string());

            if key == DATA_FILE_KEY {
                break;
            }
        }
        Ok(entries)
    }
}

fn parse_values<T: std::str::FromStr>(path: &Path, key: &str, value: &str) -> FieldResult<Vec<T>> {
    value
        .split_whitespace()
        .map(|token| {
            token.parse::<T>().map_err(|_| {
                FieldError::malformed_file(path, format!("{} has an invalid value {:?}", key, token))
            })
        })
        .collect()
}

fn expect_len<T>(path: &Path, key: &str, values: Vec<T>, dimensions: usize) -> FieldResult<Vec<T>> {
    if values.len() != dimensions {
        return Err(FieldError::malformed_file(
            path,
            format!("{} has {} values for {} dimensions", key, values.len(), dimensions),
        ));
    }
    Ok(values)
}

impl GridDescriptorReader for MetaImageReader {
    fn describe(&self, path: &Path) -> FieldResult<GridDescriptor> {
        if layout_of(path).is_none() {
            return Err(FieldError::malformed_file(
                path,
                "unrecognized image format, expected a .mhd or .mha MetaImage",
            ));
        }

        let header = Self::read_header(path)?;
        let required = |key: &str| {
            header
                .get(key)
                .map(String::as_str)
                .ok_or_else(|| FieldError::malformed_file(path, format!("missing {}", key)))
        };

        let dimensions: usize = required("NDims")?.parse().map_err(|_| {
            FieldError::malformed_file(path, "NDims is not a non-negative integer")
        })?;
        if dimensions == 0 {
            return Err(FieldError::malformed_file(path, "NDims must be positive"));
        }

        let size = expect_len(
            path,
            "DimSize",
            parse_values::<usize>(path, "DimSize", required("DimSize")?)?,
            dimensions,
        )?;

        let element_type = required("ElementType")?;
        let scalar_type = parse_element_type(element_type).ok_or_else(|| {
            FieldError::malformed_file(path, format!("unrecognized ElementType {}", element_type))
        })?;

        let spacing = match header.get("ElementSpacing") {
            Some(value) => expect_len(
                path,
                "ElementSpacing",
                parse_values::<f64>(path, "ElementSpacing", value)?,
                dimensions,
            )?,
            None => vec![1.0; dimensions],
        };

        let origin_key = ["Offset", "Origin", "Position"]
            .into_iter()
            .find(|key| header.contains_key(*key));
        let origin = match origin_key {
            Some(key) => expect_len(path, key, parse_values::<f64>(path, key, &header[key])?, dimensions)?,
            None => vec![0.0; dimensions],
        };

        let num_components = match header.get("ElementNumberOfChannels") {
            Some(value) => value.parse::<usize>().map_err(|_| {
                FieldError::malformed_file(path, "ElementNumberOfChannels is not a positive integer")
            })?,
            None => 1,
        };
        if num_components == 0 {
            return Err(FieldError::malformed_file(path, "ElementNumberOfChannels must be positive"));
        }

        Ok(GridDescriptor {
            scalar_type,
            dimensions,
            size,
            spacing,
            origin,
            num_components,
        })
    }
}

/// Writes displacement fields as `MET_FLOAT` vector MetaImages in little endian order.
///
/// The extension of the output path selects the layout: `.mhd` writes a header and a
/// sibling `.raw` data file, `.mha` writes a single file with `LOCAL` data.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetaImageWriter;

impl MetaImageWriter {
    fn header(field: &FieldView<'_>, data_file: &str) -> String {
        let join = |values: Vec<String>| values.join(" ");
        let dimensions = field.size.len();
        let identity: Vec<String> = (0..dimensions * dimensions)
            .map(|i| (if i % (dimensions + 1) == 0 { "1" } else { "0" }).to_string())
            .collect();

        let mut header = String::new();
        header.push_str("ObjectType = Image\n");
        header.push_str(&format!("NDims = {}\n", dimensions));
        header.push_str("BinaryData = True\n");
        header.push_str("BinaryDataByteOrderMSB = False\n");
        header.push_str("CompressedData = False\n");
        header.push_str(&format!("TransformMatrix = {}\n", join(identity)));
        header.push_str(&format!(
            "Offset = {}\n",
            join(field.origin.iter().map(|v| v.to_string()).collect())
        ));
        header.push_str(&format!(
            "ElementSpacing = {}\n",
            join(field.spacing.iter().map(|v| v.to_string()).collect())
        ));
        header.push_str(&format!(
            "DimSize = {}\n",
            join(field.size.iter().map(|v| v.to_string()).collect())
        ));
        header.push_str(&format!("ElementNumberOfChannels = {}\n", field.components));
        header.push_str("ElementType = MET_FLOAT\n");
        header.push_str(&format!("{} = {}\n", DATA_FILE_KEY, data_file));
        header
    }
}

/// Converts the field values to `f32`, failing on values that `f32` cannot hold.
fn encode_cells(path: &Path, field: &FieldView<'_>) -> FieldResult<Vec<u8>> {
    let expected = field
        .size
        .iter()
        .try_fold(field.components, |values, s| values.checked_mul(*s))
        .filter(|values| *values == field.data.len())
        .ok_or_else(|| {
            FieldError::write(
                path,
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!(
                        "field holds {} values, which does not match size {:?} with {} components",
                        field.data.len(),
                        field.size,
                        field.components
                    ),
                ),
            )
        })?;

    let mut bytes = Vec::with_capacity(expected * std::mem::size_of::<f32>());
    for (i, value) in field.data.iter().enumerate() {
        let single = *value as f32;
        if !single.is_finite() {
            return Err(FieldError::write(
                path,
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "displacement component {} of cell {} ({}) cannot be stored as a 32-bit float",
                        i % field.components,
                        i / field.components,
                        value
                    ),
                ),
            ));
        }
        bytes.extend_from_slice(&single.to_le_bytes());
    }
    Ok(bytes)
}

impl FieldWriter for MetaImageWriter {
    fn write(&self, path: &Path, field: FieldView<'_>) -> FieldResult<()> {
        let layout = layout_of(path).ok_or_else(|| {
            FieldError::write(
                path,
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "unrecognized field format, expected a .mhd or .mha MetaImage",
                ),
            )
        })?;

        let cells = encode_cells(path, &field)?;

        match layout {
            Layout::Local => {
                let header = Self::header(&field, "LOCAL");
                let temporary = write_temporary(path, &[header.as_bytes(), &cells])?;
                commit_temporary(&temporary, path)
            }
            Layout::Detached => {
                let raw_path = path.with_extension("raw");
                let raw_name = raw_path
                    .file_name()
                    .and_then(OsStr::to_str)
                    .ok_or_else(|| {
                        FieldError::write(
                            path,
                            io::Error::new(io::ErrorKind::InvalidInput, "output file name is not valid UTF-8"),
                        )
                    })?
                    .to_string();

                let raw_temporary = write_temporary(&raw_path, &[&cells])?;
                let header = Self::header(&field, &raw_name);
                let header_temporary = match write_temporary(path, &[header.as_bytes()]) {
                    Ok(temporary) => temporary,
                    Err(e) => {
                        let _ = fs::remove_file(&raw_temporary);
                        return Err(e);
                    }
                };

                let renamed = fs::rename(&raw_temporary, &raw_path)
                    .map_err(|e| FieldError::write(&raw_path, e))
                    .and_then(|_| {
                        fs::rename(&header_temporary, path).map_err(|e| {
                            let _ = fs::remove_file(&raw_path);
                            FieldError::write(path, e)
                        })
                    });
                if renamed.is_err() {
                    let _ = fs::remove_file(&raw_temporary);
                    let _ = fs::remove_file(&header_temporary);
                }
                renamed
            }
        }
    }

    fn discard(&self, path: &Path) {
        if layout_of(path) == Some(Layout::Detached) {
            let _ = fs::remove_file(path.with_extension("raw"));
        }
        let _ = fs::remove_file(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::FieldErrorKind, io::temporary_path};
    use std::path::PathBuf;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("warpfield_metaimage_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    fn field_2d(data: &[f64]) -> FieldView<'_> {
        FieldView {
            size: &[3, 2],
            spacing: &[0.5, 2.0],
            origin: &[1.0, -1.0],
            components: 2,
            data,
        }
    }

    #[test]
    fn describes_header_with_defaults() {
        let path = scratch("defaults.mhd");
        fs::write(
            &path,
            "ObjectType = Image\nNDims = 3\nDimSize = 4 5 6\nElementType = MET_SHORT\nElementDataFile = defaults.raw\n",
        )
        .unwrap();

        let descriptor = MetaImageReader.describe(&path).unwrap();
        assert_eq!(descriptor.scalar_type, ScalarType::I16);
        assert_eq!(descriptor.dimensions, 3);
        assert_eq!(descriptor.size, vec![4, 5, 6]);
        assert_eq!(descriptor.spacing, vec![1.0; 3]);
        assert_eq!(descriptor.origin, vec![0.0; 3]);
        assert_eq!(descriptor.num_components, 1);
    }

    #[test]
    fn accepts_origin_aliases() {
        let path = scratch("origin.mhd");
        fs::write(
            &path,
            "NDims = 2\nDimSize = 4 5\nElementSpacing = 0.5 0.25\nOrigin = -3 7.5\nElementType = MET_UCHAR\nElementDataFile = origin.raw\n",
        )
        .unwrap();

        let descriptor = MetaImageReader.describe(&path).unwrap();
        assert_eq!(descriptor.scalar_type, ScalarType::U8);
        assert_eq!(descriptor.spacing, vec![0.5, 0.25]);
        assert_eq!(descriptor.origin, vec![-3.0, 7.5]);
    }

    #[test]
    fn rejects_incomplete_or_unknown_headers() {
        let path = scratch("incomplete.mhd");
        fs::write(&path, "NDims = 2\nElementType = MET_FLOAT\n").unwrap();
        let err = MetaImageReader.describe(&path).unwrap_err();
        assert_eq!(err.kind(), FieldErrorKind::MalformedInput);

        fs::write(&path, "NDims = 2\nDimSize = 4 4\nElementType = MET_COMPLEX\n").unwrap();
        let err = MetaImageReader.describe(&path).unwrap_err();
        assert_eq!(err.kind(), FieldErrorKind::MalformedInput);

        fs::write(&path, "NDims = 2\nDimSize = 4 4 4\nElementType = MET_FLOAT\n").unwrap();
        let err = MetaImageReader.describe(&path).unwrap_err();
        assert_eq!(err.kind(), FieldErrorKind::MalformedInput);

        let err = MetaImageReader.describe(&scratch("absent.mhd")).unwrap_err();
        assert_eq!(err.kind(), FieldErrorKind::MalformedInput);

        let err = MetaImageReader.describe(&scratch("image.png")).unwrap_err();
        assert_eq!(err.kind(), FieldErrorKind::MalformedInput);
    }

    #[test]
    fn writes_detached_field_that_reads_back() {
        let data: Vec<f64> = (0..12).map(|i| i as f64 * 0.25 - 1.0).collect();
        let path = scratch("detached.mhd");
        MetaImageWriter.write(&path, field_2d(&data)).unwrap();

        let descriptor = MetaImageReader.describe(&path).unwrap();
        assert_eq!(descriptor.scalar_type, ScalarType::F32);
        assert_eq!(descriptor.size, vec![3, 2]);
        assert_eq!(descriptor.spacing, vec![0.5, 2.0]);
        assert_eq!(descriptor.origin, vec![1.0, -1.0]);
        assert_eq!(descriptor.num_components, 2);

        let raw = fs::read(path.with_extension("raw")).unwrap();
        assert_eq!(raw.len(), 12 * 4);
        let values: Vec<f32> = raw
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        assert_eq!(values[0], -1.0);
        assert_eq!(values[11], 1.75);
        assert!(!temporary_path(&path).exists());
    }

    #[test]
    fn writes_local_field() {
        let data = vec![0.5; 12];
        let path = scratch("local.mha");
        MetaImageWriter.write(&path, field_2d(&data)).unwrap();

        let descriptor = MetaImageReader.describe(&path).unwrap();
        assert_eq!(descriptor.num_components, 2);

        let bytes = fs::read(&path).unwrap();
        assert_eq!(&bytes[bytes.len() - 4..], &0.5f32.to_le_bytes());
    }

    #[test]
    fn unrepresentable_values_leave_no_output() {
        let mut data = vec![0.0; 12];
        data[7] = 1e300;
        let path = scratch("overflow.mhd");

        let err = MetaImageWriter.write(&path, field_2d(&data)).unwrap_err();
        assert_eq!(err.kind(), FieldErrorKind::IoFailure);
        assert!(!path.exists());
        assert!(!path.with_extension("raw").exists());

        let err = MetaImageWriter.write(&scratch("field.nii"), field_2d(&[0.0; 12])).unwrap_err();
        assert_eq!(err.kind(), FieldErrorKind::IoFailure);
    }

    #[test]
    fn rejects_views_that_disagree_with_their_size() {
        let path = scratch("mismatch.mha");
        let err = MetaImageWriter.write(&path, field_2d(&[0.0; 10])).unwrap_err();
        assert_eq!(err.kind(), FieldErrorKind::IoFailure);

        let huge = FieldView {
            size: &[usize::MAX / 2, 4],
            ..field_2d(&[0.0; 12])
        };
        let err = MetaImageWriter.write(&path, huge).unwrap_err();
        assert_eq!(err.kind(), FieldErrorKind::IoFailure);
        assert!(!path.exists());
    }
}
