/////////////////////////////////////////////////////////////////////////////////////////////
//
// Reads landmark lists from transformix style point files and CSV files.
//
// Created on: 15 Nov 2025     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

use super::PointSetReader;
use crate::{
    correspondence::{PointKind, PointList},
    error::{FieldError, FieldResult},
};
use csv::{ReaderBuilder, Trim};
use faer::Mat;
use std::{ffi::OsStr, fs, fs::File, path::Path};

/// Reads landmark files.
///
/// Files with a `.csv` extension hold one physical point per record, optionally after a
/// header row. Any other file is read in the transformix layout:
///
/// ```text
/// index
/// 3
/// 12 40
/// 18 44
/// 25 47
/// ```
///
/// where the first token is `index` or `point` and the second the number of points. A
/// file starting directly with the count holds physical points.
#[derive(Debug, Clone, Copy, Default)]
pub struct PointFileReader;

impl PointSetReader for PointFileReader {
    fn read_points(&self, path: &Path) -> FieldResult<PointList> {
        let is_csv = path
            .extension()
            .and_then(OsStr::to_str)
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

        let list = match is_csv {
            true => read_csv(path)?,
            false => {
                let text = fs::read_to_string(path).map_err(|e| FieldError::read(path, e))?;
                parse_transformix(&text).map_err(|reason| FieldError::malformed_file(path, reason))?
            }
        };

        if list.is_empty() {
            return Err(FieldError::malformed_file(path, "the file contains no points"));
        }
        Ok(list)
    }
}

/// Stacks equally long rows into a point matrix.
fn rows_to_matrix(rows: &[Vec<f64>]) -> Mat<f64> {
    let num_cols = rows.first().map_or(0, Vec::len);
    Mat::from_fn(rows.len(), num_cols, |i, j| rows[i][j])
}

fn parse_transformix(text: &str) -> Result<PointList, String> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(number, line)| (number + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty());

    let (_, first) = lines.next().ok_or("the file is empty")?;
    let header: Vec<&str> = first.split_whitespace().collect();

    let kind = match header[0].to_ascii_lowercase().as_str() {
        "index" => Some(PointKind::Index),
        "point" => Some(PointKind::Physical),
        _ => None,
    };

    let count_token = match (kind, header.len()) {
        (Some(_), 1) => lines.next().ok_or("the point count is missing")?.1,
        (Some(_), 2) => header[1],
        (None, 1) => header[0],
        _ => return Err(format!("unexpected tokens in header line {:?}", first)),
    };

    let count: usize = count_token
        .trim()
        .parse()
        .map_err(|_| format!("invalid point count {:?}", count_token.trim()))?;

    let mut rows: Vec<Vec<f64>> = Vec::with_capacity(count);
    for (line_number, line) in lines {
        let row = line
            .split_whitespace()
            .map(|token| token.parse::<f64>())
            .collect::<Result<Vec<f64>, _>>()
            .map_err(|_| format!("line {} is not a list of numbers: {:?}", line_number, line))?;

        if let Some(first_row) = rows.first() {
            if first_row.len() != row.len() {
                return Err(format!(
                    "line {} has {} coordinates but earlier points have {}",
                    line_number,
                    row.len(),
                    first_row.len()
                ));
            }
        }
        rows.push(row);
    }

    if rows.len() != count {
        return Err(format!(
            "the header announces {} points but the file holds {}",
            count,
            rows.len()
        ));
    }

    Ok(PointList::new(
        rows_to_matrix(&rows),
        kind.unwrap_or(PointKind::Physical),
    ))
}

fn read_csv(path: &Path) -> FieldResult<PointList> {
    let file = File::open(path).map_err(|e| FieldError::read(path, e))?;
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .trim(Trim::All)
        .from_reader(file);

    let mut rows: Vec<Vec<f64>> = Vec::new();
    for (record_index, result) in reader.records().enumerate() {
        let record = result.map_err(|e| FieldError::malformed_file(path, e.to_string()))?;

        let parsed = record
            .iter()
            .map(|value| value.parse::<f64>())
            .collect::<Result<Vec<f64>, _>>();

        let row = match parsed {
            Ok(row) => row,
            // Non-numeric first record is a header
            Err(_) if record_index == 0 => continue,
            Err(_) => {
                return Err(FieldError::malformed_file(
                    path,
                    format!("record {} is not a list of numbers", record_index + 1),
                ));
            }
        };
        rows.push(row);
    }

    Ok(PointList::new(rows_to_matrix(&rows), PointKind::Physical))
}
