//! Pair-function algebra and operator-intermediate caches for
//! coupled-cluster calculations.
//!
//! A two-particle correlation function is represented in one of three
//! interchangeable forms ([`PairFunction`]): a full 6D function, a sum of
//! one-particle products, or such a sum with a convolution kernel applied
//! across the particle boundary. Every algebraic operation dispatches
//! exhaustively over the active forms of its operands. Expensive
//! kernel-applied intermediates are cached per [`ConvolutionOperator`] and
//! invalidated explicitly, never implicitly.
//!
//! Contract violations (invalid particle index, non-combinable operators,
//! undocumented cache slots, ...) abort the calculation with a panic; there
//! is no recoverable error in this core. Non-fatal conditions are reported
//! through `tracing` warnings or as structured reports
//! ([`config::SanityReport`]). Operator instances are not reentrant: callers
//! serialize access per instance.

pub mod config;
pub mod convolution;
pub mod function;
pub mod pair;
pub mod potentials;

pub use config::{ParameterRule, Parameters, SanityReport};
pub use convolution::{ConvolutionOperator, IntermediateInfo};
pub use function::{FunctionCategory, FunctionSet, TaggedFunction};
pub use pair::{
    apply_projector, apply_projector_one, ComplementProjector, PairFunction, Projector,
    SimpleProjector, StrongOrthogonalityProjector,
};
pub use potentials::{IntermediatePotentials, PotentialType};

pub use mra::{KernelKind, KernelParameters, Particle};
