//! Two-particle pair functions and the projectors acting on them.
//!
//! A pair function lives in exactly one of three representations:
//!
//! - *Pure*: one full two-particle function,
//! - *Decomposed*: Σ_i a_i⊗b_i without an operator,
//! - *OpDecomposed*: Σ_i op·(a_i⊗b_i) with a convolution kernel applied
//!   across the particle boundary.
//!
//! Every operation dispatches exhaustively over the active representations
//! of its operands. Pair functions are transient: they are built during one
//! amplitude update, consumed by inner products and projections, and
//! discarded. An operator referenced by an OpDecomposed pair function is
//! borrowed; the borrow checker enforces that it outlives the pair function.

mod function;
mod projector;

pub use function::PairFunction;
pub use projector::{
    apply_projector, apply_projector_one, ComplementProjector, Projector, SimpleProjector,
    StrongOrthogonalityProjector,
};
