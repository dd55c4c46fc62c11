/////////////////////////////////////////////////////////////////////////////////////////////
//
// Models reference grids and their mapping from cell indices to physical coordinates.
//
// Created on: 15 Nov 2025     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

use crate::{
    dispatch::ScalarType,
    error::{FieldError, FieldResult},
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Properties of a reference grid discovered at run time, before any
/// dimensionality is fixed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridDescriptor {
    /// Scalar type of the grid cells.
    pub scalar_type: ScalarType,

    /// Number of grid axes.
    pub dimensions: usize,

    /// Number of cells along each axis.
    pub size: Vec<usize>,

    /// Physical distance between neighbouring cells along each axis.
    pub spacing: Vec<f64>,

    /// Physical position of the cell with index zero.
    pub origin: Vec<f64>,

    /// Number of scalar components per cell. Anything above one is a vector image.
    pub num_components: usize,
}

impl fmt::Display for GridDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "dimensions: {}", self.dimensions)?;
        writeln!(f, "pixel type: {}", self.scalar_type)?;
        writeln!(f, "components: {}", self.num_components)?;
        writeln!(f, "size: {:?}", self.size)?;
        writeln!(f, "spacing: {:?}", self.spacing)?;
        write!(f, "origin: {:?}", self.origin)
    }
}

/// A regular `D`-dimensional grid with the index-to-physical mapping
/// `physical = origin + spacing * index`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid<const D: usize> {
    size: [usize; D],
    spacing: [f64; D],
    origin: [f64; D],
}

impl<const D: usize> Grid<D> {
    /// Creates a grid, rejecting empty axes and non-positive or non-finite spacing.
    pub fn new(size: [usize; D], spacing: [f64; D], origin: [f64; D]) -> FieldResult<Self> {
        if size.iter().any(|s| *s == 0) {
            return Err(FieldError::malformed(format!(
                "grid size must be positive along every axis, got {:?}",
                size
            )));
        }
        if spacing.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(FieldError::malformed(format!(
                "grid spacing must be positive and finite, got {:?}",
                spacing
            )));
        }
        if origin.iter().any(|o| !o.is_finite()) {
            return Err(FieldError::malformed(format!(
                "grid origin must be finite, got {:?}",
                origin
            )));
        }

        // The field holds D doubles per cell and must stay addressable
        let bytes_per_cell = D * std::mem::size_of::<f64>();
        let addressable = size
            .iter()
            .try_fold(1usize, |cells, s| cells.checked_mul(*s))
            .and_then(|cells| cells.checked_mul(bytes_per_cell))
            .is_some_and(|bytes| bytes <= isize::MAX as usize);
        if !addressable {
            return Err(FieldError::malformed(format!(
                "grid size {:?} has too many cells to hold a displacement field",
                size
            )));
        }

        Ok(Self {
            size,
            spacing,
            origin,
        })
    }

    /// Builds the `D`-dimensional grid described by `descriptor`.
    ///
    /// Fails with an unsupported-configuration error when the descriptor has a different
    /// dimensionality.
    pub fn from_descriptor(descriptor: &GridDescriptor) -> FieldResult<Self> {
        if descriptor.dimensions != D {
            return Err(FieldError::unsupported(format!(
                "grid has {} dimensions, expected {}",
                descriptor.dimensions, D
            )));
        }

        let size: [usize; D] = descriptor.size.as_slice().try_into().map_err(|_| {
            FieldError::malformed(format!(
                "grid declares {} dimensions but {} sizes",
                D,
                descriptor.size.len()
            ))
        })?;
        let spacing: [f64; D] = descriptor.spacing.as_slice().try_into().map_err(|_| {
            FieldError::malformed(format!(
                "grid declares {} dimensions but {} spacings",
                D,
                descriptor.spacing.len()
            ))
        })?;
        let origin: [f64; D] = descriptor.origin.as_slice().try_into().map_err(|_| {
            FieldError::malformed(format!(
                "grid declares {} dimensions but {} origin coordinates",
                D,
                descriptor.origin.len()
            ))
        })?;

        Grid::new(size, spacing, origin)
    }

    pub fn size(&self) -> &[usize; D] {
        &self.size
    }

    pub fn spacing(&self) -> &[f64; D] {
        &self.spacing
    }

    pub fn origin(&self) -> &[f64; D] {
        &self.origin
    }

    /// Total number of cells, the product of the sizes. Never overflows, the
    /// constructor rejects grids whose cell count does not fit.
    pub fn num_cells(&self) -> usize {
        self.size.iter().product()
    }

    /// Maps an integer index, which may lie outside the grid, to physical space.
    pub fn index_to_physical(&self, index: &[i64; D]) -> [f64; D] {
        std::array::from_fn(|d| self.origin[d] + self.spacing[d] * index[d] as f64)
    }

    /// Physical position of the cell at `index`.
    #[inline(always)]
    pub fn cell_position(&self, index: &[usize; D]) -> [f64; D] {
        std::array::from_fn(|d| self.origin[d] + self.spacing[d] * index[d] as f64)
    }

    /// Offset of `index` in lexicographic order, axis 0 varying fastest.
    pub fn linear_offset(&self, index: &[usize; D]) -> usize {
        let mut offset = 0;
        for d in (0..D).rev() {
            offset = offset * self.size[d] + index[d];
        }
        offset
    }

    /// Inverse of [`Grid::linear_offset`].
    pub fn index_from_offset(&self, offset: usize) -> [usize; D] {
        let mut remainder = offset;
        std::array::from_fn(|d| {
            let i = remainder % self.size[d];
            remainder /= self.size[d];
            i
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FieldErrorKind;

    fn descriptor(dimensions: usize) -> GridDescriptor {
        GridDescriptor {
            scalar_type: ScalarType::I16,
            dimensions,
            size: vec![4; dimensions],
            spacing: vec![0.5; dimensions],
            origin: vec![-1.0; dimensions],
            num_components: 1,
        }
    }

    #[test]
    fn maps_indices_to_physical_points() {
        let grid = Grid::new([10, 20], [0.5, 2.0], [1.0, -3.0]).unwrap();

        assert_eq!(grid.index_to_physical(&[0, 0]), [1.0, -3.0]);
        assert_eq!(grid.index_to_physical(&[4, 3]), [3.0, 3.0]);
        assert_eq!(grid.index_to_physical(&[-2, 0]), [0.0, -3.0]);
        assert_eq!(grid.cell_position(&[4, 3]), [3.0, 3.0]);
        assert_eq!(grid.num_cells(), 200);
    }

    #[test]
    fn offsets_are_lexicographic_with_axis_zero_fastest() {
        let grid = Grid::new([3, 4, 2], [1.0; 3], [0.0; 3]).unwrap();

        assert_eq!(grid.linear_offset(&[0, 0, 0]), 0);
        assert_eq!(grid.linear_offset(&[1, 0, 0]), 1);
        assert_eq!(grid.linear_offset(&[0, 1, 0]), 3);
        assert_eq!(grid.linear_offset(&[0, 0, 1]), 12);

        for offset in 0..grid.num_cells() {
            let index = grid.index_from_offset(offset);
            assert_eq!(grid.linear_offset(&index), offset);
        }
    }

    #[test]
    fn rejects_degenerate_grids() {
        let err = Grid::new([0, 3], [1.0, 1.0], [0.0, 0.0]).unwrap_err();
        assert_eq!(err.kind(), FieldErrorKind::MalformedInput);

        let err = Grid::new([2, 3], [1.0, 0.0], [0.0, 0.0]).unwrap_err();
        assert_eq!(err.kind(), FieldErrorKind::MalformedInput);
    }

    #[test]
    fn rejects_grids_too_large_to_address() {
        let err = Grid::new([usize::MAX / 2, 3], [1.0, 1.0], [0.0, 0.0]).unwrap_err();
        assert_eq!(err.kind(), FieldErrorKind::MalformedInput);

        // The cell count fits but the vectors do not
        let err = Grid::new([usize::MAX / 16, 1], [1.0, 1.0], [0.0, 0.0]).unwrap_err();
        assert_eq!(err.kind(), FieldErrorKind::MalformedInput);

        let mut huge = descriptor(2);
        huge.size = vec![usize::MAX / 3, usize::MAX / 3];
        let err = Grid::<2>::from_descriptor(&huge).unwrap_err();
        assert_eq!(err.kind(), FieldErrorKind::MalformedInput);
    }

    #[test]
    fn descriptor_dimensionality_must_match() {
        let grid = Grid::<3>::from_descriptor(&descriptor(3)).unwrap();
        assert_eq!(grid.origin(), &[-1.0; 3]);

        let err = Grid::<3>::from_descriptor(&descriptor(2)).unwrap_err();
        assert_eq!(err.kind(), FieldErrorKind::UnsupportedConfiguration);

        let mut inconsistent = descriptor(2);
        inconsistent.spacing.push(1.0);
        let err = Grid::<2>::from_descriptor(&inconsistent).unwrap_err();
        assert_eq!(err.kind(), FieldErrorKind::MalformedInput);
    }
}
