/////////////////////////////////////////////////////////////////////////////////////////////
//
// Defines the physical and numerical constants shared by the spline kernels.
//
// Created on: 15 Nov 2025     Author: Daniel Owen 
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License. 
//
/////////////////////////////////////////////////////////////////////////////////////////////

/// Largest supported point dimensionality.
pub const MAX_DIMENSIONS: usize = 3;

/// Poisson ratio of the elastic medium modelled by the elastic body splines.
pub const POISSON_RATIO: f64 = 0.25;

/// Weighting of the isotropic term in the elastic body splines, `12 (1 - nu) - 1`.
pub const ELASTIC_ALPHA: f64 = 12.0 * (1.0 - POISSON_RATIO) - 1.0;

/// Separations shorter than this are treated as coincident by the reciprocal spline.
pub const SEPARATION_EPSILON: f64 = 1e-8;
