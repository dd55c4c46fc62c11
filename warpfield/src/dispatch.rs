/////////////////////////////////////////////////////////////////////////////////////////////
//
// Maps run-time (scalar type, dimensionality) pairs onto statically typed field generators.
//
// Created on: 15 Nov 2025     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # dispatch
//!
//! Reference grids are only described at run time, while field generation is compiled
//! per dimensionality. A [`DispatchRegistry`] holds one factory per supported
//! `(scalar type, dimensions)` pair and hands out a boxed handler for a discovered pair.
//! Unregistered pairs have no handler, and the caller reports them as unsupported.

use crate::{
    config::GenerationJob,
    error::{FieldError, FieldResult},
    grid::GridDescriptor,
    pipeline::{self, Collaborators, FieldSummary},
    progress::ProgressSink,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt, marker::PhantomData, sync::Arc};

/// Scalar type of the cells of a reference image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
}

impl ScalarType {
    pub const ALL: &'static [ScalarType] = &[
        ScalarType::U8,
        ScalarType::I8,
        ScalarType::U16,
        ScalarType::I16,
        ScalarType::U32,
        ScalarType::I32,
        ScalarType::U64,
        ScalarType::I64,
        ScalarType::F32,
        ScalarType::F64,
    ];

    /// Conventional image-toolkit name of the type.
    pub fn name(&self) -> &'static str {
        match self {
            ScalarType::U8 => "unsigned char",
            ScalarType::I8 => "char",
            ScalarType::U16 => "unsigned short",
            ScalarType::I16 => "short",
            ScalarType::U32 => "unsigned int",
            ScalarType::I32 => "int",
            ScalarType::U64 => "unsigned long",
            ScalarType::I64 => "long",
            ScalarType::F32 => "float",
            ScalarType::F64 => "double",
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Rust scalar types that reference image cells can hold.
pub trait PixelScalar: Copy + Send + Sync + 'static {
    const SCALAR_TYPE: ScalarType;
}

macro_rules! impl_pixel_scalar {
    ($( $t:ty => $V:ident ),* $(,)?) => {
        $(
            impl PixelScalar for $t {
                const SCALAR_TYPE: ScalarType = ScalarType::$V;
            }
        )*
    };
}

impl_pixel_scalar! {
    u8 => U8,
    i8 => I8,
    u16 => U16,
    i16 => I16,
    u32 => U32,
    i32 => I32,
    u64 => U64,
    i64 => I64,
    f32 => F32,
    f64 => F64,
}

/// Factory producing a fresh handler.
pub type HandlerFactory<H> = fn() -> Box<H>;

/// Table of handlers keyed by `(scalar type, dimensions)`.
pub struct DispatchRegistry<H: ?Sized> {
    factories: HashMap<(ScalarType, usize), HandlerFactory<H>>,
}

impl<H: ?Sized> Default for DispatchRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: ?Sized> fmt::Debug for DispatchRegistry<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchRegistry")
            .field("supported", &self.supported())
            .finish()
    }
}

impl<H: ?Sized> DispatchRegistry<H> {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Adds a factory for `(scalar_type, dimensions)`.
    ///
    /// A pair may only be registered once.
    pub fn register(
        &mut self,
        scalar_type: ScalarType,
        dimensions: usize,
        factory: HandlerFactory<H>,
    ) -> FieldResult<()> {
        let key = (scalar_type, dimensions);
        if self.factories.contains_key(&key) {
            return Err(FieldError::unsupported(format!(
                "a handler for {} pixels in {}D is already registered",
                scalar_type, dimensions
            )));
        }
        self.factories.insert(key, factory);
        Ok(())
    }

    /// Creates the handler registered for `(scalar_type, dimensions)`, if any.
    pub fn lookup(&self, scalar_type: ScalarType, dimensions: usize) -> Option<Box<H>> {
        self.factories
            .get(&(scalar_type, dimensions))
            .map(|factory| factory())
    }

    pub fn contains(&self, scalar_type: ScalarType, dimensions: usize) -> bool {
        self.factories.contains_key(&(scalar_type, dimensions))
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Registered pairs, sorted by dimensionality then scalar type.
    pub fn supported(&self) -> Vec<(ScalarType, usize)> {
        let mut pairs: Vec<_> = self.factories.keys().copied().collect();
        pairs.sort_by_key(|(scalar_type, dimensions)| (*dimensions, *scalar_type));
        pairs
    }
}

/// Generates a deformation field for one concrete `(scalar type, dimensions)` pair.
pub trait FieldGenerator: Send + Sync {
    fn scalar_type(&self) -> ScalarType;

    fn dimensions(&self) -> usize;

    /// Runs the whole job against a fixed grid already described as `fixed`.
    fn run(
        &self,
        job: &GenerationJob,
        fixed: &GridDescriptor,
        io: &Collaborators<'_>,
        progress_callback: Option<Arc<dyn ProgressSink>>,
    ) -> FieldResult<FieldSummary>;
}

/// Field generator specialised on the scalar type `T` and dimensionality `D`.
pub struct KernelFieldGenerator<T, const D: usize> {
    _scalar: PhantomData<fn() -> T>,
}

impl<T, const D: usize> KernelFieldGenerator<T, D> {
    pub fn new() -> Self {
        Self {
            _scalar: PhantomData,
        }
    }
}

impl<T, const D: usize> Default for KernelFieldGenerator<T, D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: PixelScalar, const D: usize> FieldGenerator for KernelFieldGenerator<T, D> {
    fn scalar_type(&self) -> ScalarType {
        T::SCALAR_TYPE
    }

    fn dimensions(&self) -> usize {
        D
    }

    fn run(
        &self,
        job: &GenerationJob,
        fixed: &GridDescriptor,
        io: &Collaborators<'_>,
        progress_callback: Option<Arc<dyn ProgressSink>>,
    ) -> FieldResult<FieldSummary> {
        if fixed.scalar_type != T::SCALAR_TYPE {
            return Err(FieldError::unsupported(format!(
                "{} generator cannot handle {} pixels",
                T::SCALAR_TYPE,
                fixed.scalar_type
            )));
        }
        pipeline::generate_typed::<D>(job, fixed, io, progress_callback)
    }
}

fn make_generator<T: PixelScalar, const D: usize>() -> Box<dyn FieldGenerator> {
    Box::new(KernelFieldGenerator::<T, D>::new())
}

/// Registers one generator per scalar type and listed dimensionality.
macro_rules! register_generators {
    ($registry:ident, dims = $dims:tt, scalars = [ $( $t:ty ),* $(,)? ]) => {
        $( register_generators!(@scalar $registry, $t, $dims); )*
    };
    (@scalar $registry:ident, $t:ty, [ $( $d:literal ),* ]) => {
        $(
            $registry.register(<$t as PixelScalar>::SCALAR_TYPE, $d, make_generator::<$t, $d>)?;
        )*
    };
}

/// Builds the registry of every supported field generator: all ten scalar types, in 2D
/// and 3D.
pub fn field_generator_registry() -> FieldResult<DispatchRegistry<dyn FieldGenerator>> {
    let mut registry = DispatchRegistry::new();

    register_generators!(
        registry,
        dims = [2, 3],
        scalars = [u8, i8, u16, i16, u32, i32, u64, i64, f32, f64]
    );

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FieldErrorKind;

    trait Named {
        fn name(&self) -> &'static str;
    }

    struct Short2;
    impl Named for Short2 {
        fn name(&self) -> &'static str {
            "short-2"
        }
    }

    fn make_short2() -> Box<dyn Named> {
        Box::new(Short2)
    }

    #[test]
    fn registers_and_finds_handlers() {
        let mut registry: DispatchRegistry<dyn Named> = DispatchRegistry::new();
        registry.register(ScalarType::I16, 2, make_short2).unwrap();

        let handler = registry.lookup(ScalarType::I16, 2).unwrap();
        assert_eq!(handler.name(), "short-2");
        assert!(registry.lookup(ScalarType::I16, 3).is_none());
        assert!(registry.lookup(ScalarType::U8, 2).is_none());
    }

    #[test]
    fn rejects_duplicate_registration() {
        let mut registry: DispatchRegistry<dyn Named> = DispatchRegistry::new();
        registry.register(ScalarType::F32, 3, make_short2).unwrap();

        let err = registry.register(ScalarType::F32, 3, make_short2).unwrap_err();
        assert_eq!(err.kind(), FieldErrorKind::UnsupportedConfiguration);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn generator_registry_covers_every_scalar_in_2d_and_3d() {
        let registry = field_generator_registry().unwrap();
        assert_eq!(registry.len(), 20);

        for scalar_type in ScalarType::ALL {
            for dimensions in [2usize, 3] {
                let generator = registry.lookup(*scalar_type, dimensions).unwrap();
                assert_eq!(generator.scalar_type(), *scalar_type);
                assert_eq!(generator.dimensions(), dimensions);
            }
            assert!(!registry.contains(*scalar_type, 1));
            assert!(!registry.contains(*scalar_type, 4));
        }

        let supported = registry.supported();
        assert_eq!(supported.first(), Some(&(ScalarType::U8, 2)));
        assert_eq!(supported.last(), Some(&(ScalarType::F64, 3)));
    }

    #[test]
    fn scalar_names_follow_image_conventions() {
        assert_eq!(ScalarType::I16.to_string(), "short");
        assert_eq!(ScalarType::U8.to_string(), "unsigned char");
        assert_eq!(<f32 as PixelScalar>::SCALAR_TYPE, ScalarType::F32);
    }
}
