//! Numeric-runtime seam for the coupled-cluster pair-function algebra.
//!
//! The distributed multiresolution runtime that supplies one-particle (3D)
//! and two-particle (6D) numerical functions is an external collaborator.
//! This crate defines the trait surface the algebra is written against,
//! together with the boundary vocabulary (particle indices, kernel kinds,
//! operator parameters) and a dense grid-sampled reference backend used for
//! testing and small calculations.

pub mod function;
pub mod grid;

pub use function::{
    KernelKind, KernelParameters, OneParticleFunction, Particle, TwoParticleFunction,
};
pub use grid::{GridFunction, GridKernel, GridPair, GRID_SPACING};
