/////////////////////////////////////////////////////////////////////////////////////////////
//
// Evaluates a fitted kernel transform at every cell of a reference grid.
//
// Created on: 15 Nov 2025     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

use crate::{
    config::EvaluationParams,
    error::{FieldError, FieldResult},
    grid::Grid,
    kernel_transform::KernelTransform,
    progress::{self, ProgressMsg, ProgressSink},
};
use rayon::prelude::*;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

/// Displacement vectors over every cell of a grid, stored in lexicographic cell order
/// with axis 0 varying fastest.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplacementField<const D: usize> {
    grid: Grid<D>,
    vectors: Vec<[f64; D]>,
}

impl<const D: usize> DisplacementField<D> {
    pub fn grid(&self) -> &Grid<D> {
        &self.grid
    }

    pub fn num_cells(&self) -> usize {
        self.vectors.len()
    }

    /// Displacement `T(x) - x` at the cell `index`.
    pub fn get(&self, index: &[usize; D]) -> [f64; D] {
        self.vectors[self.grid.linear_offset(index)]
    }

    pub fn vectors(&self) -> &[[f64; D]] {
        &self.vectors
    }

    /// Dimension-erased view used by field writers.
    pub fn view(&self) -> FieldView<'_> {
        FieldView {
            size: self.grid.size(),
            spacing: self.grid.spacing(),
            origin: self.grid.origin(),
            components: D,
            data: self.vectors.as_flattened(),
        }
    }
}

/// Borrowed, dimension-erased displacement field.
///
/// `data` holds `components` interleaved values per cell, cells in lexicographic order
/// with axis 0 varying fastest.
#[derive(Debug, Clone, Copy)]
pub struct FieldView<'a> {
    pub size: &'a [usize],
    pub spacing: &'a [f64],
    pub origin: &'a [f64],
    pub components: usize,
    pub data: &'a [f64],
}

impl FieldView<'_> {
    pub fn num_cells(&self) -> usize {
        self.size.iter().product()
    }
}

/// Evaluates the displacement `T(x) - x` of `transform` at the physical position of
/// every cell of `grid`.
///
/// Scan lines along axis 0 are evaluated independently, on the rayon thread pool when
/// `params.parallel` is set. The result does not depend on the evaluation order.
pub fn evaluate_dense_field<const D: usize>(
    transform: &KernelTransform,
    grid: &Grid<D>,
    params: &EvaluationParams,
    progress_callback: Option<Arc<dyn ProgressSink>>,
) -> FieldResult<DisplacementField<D>> {
    if transform.dimensions() != D {
        return Err(FieldError::unsupported(format!(
            "cannot evaluate a {}D transform over a {}D grid",
            transform.dimensions(),
            D
        )));
    }

    let line_length = grid.size()[0];
    let num_lines = grid.num_cells() / line_length;
    let mut vectors = vec![[0.0; D]; grid.num_cells()];

    let completed = AtomicUsize::new(0);
    let report_step = (num_lines / 100).max(1);

    let evaluate_line = |(line, row): (usize, &mut [[f64; D]])| {
        let mut index = grid.index_from_offset(line * line_length);
        for (i, value) in row.iter_mut().enumerate() {
            index[0] = i;
            let position = grid.cell_position(&index);
            transform.displacement_into(&position, value);
        }

        let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
        if done % report_step == 0 || done == num_lines {
            progress::report(
                &progress_callback,
                ProgressMsg::FieldProgress {
                    progress: done as f64 / num_lines as f64,
                },
            );
        }
    };

    if params.parallel {
        vectors
            .par_chunks_mut(line_length)
            .enumerate()
            .for_each(evaluate_line);
    } else {
        vectors
            .chunks_mut(line_length)
            .enumerate()
            .for_each(evaluate_line);
    }

    Ok(DisplacementField {
        grid: *grid,
        vectors,
    })
}
