/////////////////////////////////////////////////////////////////////////////////////////////
//
// Normalizes landmark lists into paired physical coordinates ready for fitting.
//
// Created on: 15 Nov 2025     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

use crate::{
    error::{FieldError, FieldResult},
    grid::Grid,
};
use faer::Mat;
use serde::{Deserialize, Serialize};

/// How the coordinates of a [`PointList`] are expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointKind {
    /// Grid indices, converted through the grid's index-to-physical mapping.
    Index,
    /// Physical coordinates, used as they are.
    Physical,
}

/// An ordered list of points as read from a landmark file, one point per row.
#[derive(Debug, Clone, PartialEq)]
pub struct PointList {
    pub points: Mat<f64>,
    pub kind: PointKind,
}

impl PointList {
    pub fn new(points: Mat<f64>, kind: PointKind) -> Self {
        Self { points, kind }
    }

    pub fn len(&self) -> usize {
        self.points.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.points.nrows() == 0
    }

    pub fn dimensions(&self) -> usize {
        self.points.ncols()
    }
}

/// Paired source and target landmarks in physical coordinates.
///
/// Row `i` of the source matrix corresponds to row `i` of the target matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrespondenceSet {
    source: Mat<f64>,
    target: Mat<f64>,
}

impl CorrespondenceSet {
    /// Pairs `source` and `target` row by row.
    ///
    /// Fails with a malformed-input error when the two sides differ in length or
    /// dimensionality, or contain non-finite coordinates.
    pub fn new(source: Mat<f64>, target: Mat<f64>) -> FieldResult<Self> {
        if source.nrows() != target.nrows() {
            return Err(FieldError::malformed(format!(
                "source has {} landmarks but target has {}",
                source.nrows(),
                target.nrows()
            )));
        }
        if source.ncols() != target.ncols() {
            return Err(FieldError::malformed(format!(
                "source landmarks are {}-dimensional but target landmarks are {}-dimensional",
                source.ncols(),
                target.ncols()
            )));
        }
        let all_finite = source
            .col_iter()
            .chain(target.col_iter())
            .all(|col| col.iter().all(|v| v.is_finite()));
        if !all_finite {
            return Err(FieldError::malformed("landmark coordinates must be finite"));
        }

        Ok(Self { source, target })
    }

    pub fn len(&self) -> usize {
        self.source.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.source.nrows() == 0
    }

    pub fn dimensions(&self) -> usize {
        self.source.ncols()
    }

    pub fn source(&self) -> &Mat<f64> {
        &self.source
    }

    pub fn target(&self) -> &Mat<f64> {
        &self.target
    }

    pub fn into_parts(self) -> (Mat<f64>, Mat<f64>) {
        (self.source, self.target)
    }
}

/// Converts `list` into physical coordinates.
///
/// Index components are rounded to the nearest integer, halfway cases away from zero,
/// before mapping through `grid`. Index lists without a grid fail with a
/// missing-dependency error naming `role`.
pub fn resolve_points<const D: usize>(
    list: &PointList,
    grid: Option<&Grid<D>>,
    role: &str,
) -> FieldResult<Mat<f64>> {
    if list.dimensions() != D {
        return Err(FieldError::malformed(format!(
            "{} landmarks are {}-dimensional but the grid is {}-dimensional",
            role,
            list.dimensions(),
            D
        )));
    }

    match list.kind {
        PointKind::Physical => Ok(list.points.clone()),
        PointKind::Index => {
            let grid = grid.ok_or_else(|| FieldError::MissingDependency {
                reason: format!(
                    "{} landmarks are grid indices but no {} grid was supplied to convert them",
                    role, role
                ),
            })?;

            let mut physical = Mat::<f64>::zeros(list.len(), D);
            for i in 0..list.len() {
                let mut index = [0i64; D];
                for (d, component) in index.iter_mut().enumerate() {
                    let value = list.points[(i, d)];
                    if !value.is_finite() {
                        return Err(FieldError::malformed(format!(
                            "{} landmark {} has a non-finite index",
                            role, i
                        )));
                    }
                    *component = value.round() as i64;
                }

                let point = grid.index_to_physical(&index);
                for (d, value) in point.iter().enumerate() {
                    physical[(i, d)] = *value;
                }
            }
            Ok(physical)
        }
    }
}

/// Loads the landmark correspondences of one run.
///
/// The source list is converted with the fixed grid and the target list with the moving
/// grid. Unequal list lengths are rejected before any conversion.
pub fn load_correspondences<const D: usize>(
    source: &PointList,
    target: &PointList,
    fixed_grid: &Grid<D>,
    moving_grid: Option<&Grid<D>>,
) -> FieldResult<CorrespondenceSet> {
    if source.len() != target.len() {
        return Err(FieldError::malformed(format!(
            "the fixed and moving landmark files contain {} and {} points",
            source.len(),
            target.len()
        )));
    }

    let source_points = resolve_points(source, Some(fixed_grid), "fixed")?;
    let target_points = resolve_points(target, moving_grid, "moving")?;

    CorrespondenceSet::new(source_points, target_points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FieldErrorKind;
    use faer::mat;

    fn grid() -> Grid<2> {
        Grid::new([10, 10], [0.5, 2.0], [1.0, -1.0]).unwrap()
    }

    #[test]
    fn index_points_are_rounded_then_mapped() {
        let list = PointList::new(mat![[2.4, 0.5], [-0.5, 3.6f64]], PointKind::Index);
        let physical = resolve_points(&list, Some(&grid()), "fixed").unwrap();

        // (2, 1) and (-1, 4)
        assert_eq!(physical, mat![[2.0, 1.0], [0.5, 7.0f64]]);
    }

    #[test]
    fn physical_points_pass_through() {
        let list = PointList::new(mat![[2.4, 0.5f64]], PointKind::Physical);
        let physical = resolve_points::<2>(&list, None, "moving").unwrap();
        assert_eq!(physical, list.points);
    }

    #[test]
    fn index_points_without_grid_are_missing_dependency() {
        let fixed = PointList::new(mat![[1.0, 1.0f64]], PointKind::Physical);
        let moving = PointList::new(mat![[1.0, 1.0f64]], PointKind::Index);

        let err = load_correspondences(&fixed, &moving, &grid(), None).unwrap_err();
        assert_eq!(err.kind(), FieldErrorKind::MissingDependency);

        let set = load_correspondences(&fixed, &moving, &grid(), Some(&grid())).unwrap();
        assert_eq!(set.target(), &mat![[1.5, 1.0f64]]);
    }

    #[test]
    fn unequal_lengths_fail_before_conversion() {
        let fixed = PointList::new(mat![[1.0, 1.0], [2.0, 2.0f64]], PointKind::Physical);
        let moving = PointList::new(mat![[1.0, 1.0f64]], PointKind::Index);

        let err = load_correspondences(&fixed, &moving, &grid(), None).unwrap_err();
        assert_eq!(err.kind(), FieldErrorKind::MalformedInput);
    }

    #[test]
    fn dimensionality_must_match_grid() {
        let fixed = PointList::new(mat![[1.0, 1.0, 1.0f64]], PointKind::Physical);
        let moving = PointList::new(mat![[1.0, 1.0, 1.0f64]], PointKind::Physical);

        let err = load_correspondences(&fixed, &moving, &grid(), None).unwrap_err();
        assert_eq!(err.kind(), FieldErrorKind::MalformedInput);
    }

    #[test]
    fn correspondence_set_preserves_order() {
        let source = mat![[0.0, 0.0], [1.0, 1.0f64]];
        let target = mat![[0.5, 0.0], [1.0, 1.5f64]];
        let set = CorrespondenceSet::new(source.clone(), target.clone()).unwrap();

        assert_eq!(set.len(), 2);
        assert_eq!(set.dimensions(), 2);
        let (s, t) = set.into_parts();
        assert_eq!(s, source);
        assert_eq!(t, target);

        let err = CorrespondenceSet::new(mat![[f64::NAN, 0.0]], mat![[0.0, 0.0f64]]).unwrap_err();
        assert_eq!(err.kind(), FieldErrorKind::MalformedInput);
    }
}
