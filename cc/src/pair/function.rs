//! The tagged-variant pair-function representation and its algebra.

use std::fmt;
use std::ops::MulAssign;

use nalgebra::DMatrix;
use mra::{KernelKind, OneParticleFunction, Particle, TwoParticleFunction};
use tracing::debug;

use crate::convolution::ConvolutionOperator;

/// A two-particle correlation function in one of three representations.
pub enum PairFunction<'op, T: TwoParticleFunction> {
    /// Full 6D function, no factorization.
    Pure(T),
    /// Σ_i a_i ⊗ b_i.
    Decomposed { a: Vec<T::Sp>, b: Vec<T::Sp> },
    /// Σ_i op·(a_i ⊗ b_i), kernel applied across the particle boundary.
    OpDecomposed {
        op: &'op ConvolutionOperator<T>,
        a: Vec<T::Sp>,
        b: Vec<T::Sp>,
    },
}

impl<'op, T: TwoParticleFunction> Clone for PairFunction<'op, T> {
    fn clone(&self) -> Self {
        match self {
            PairFunction::Pure(u) => PairFunction::Pure(u.clone()),
            PairFunction::Decomposed { a, b } => PairFunction::Decomposed {
                a: a.clone(),
                b: b.clone(),
            },
            PairFunction::OpDecomposed { op, a, b } => PairFunction::OpDecomposed {
                op,
                a: a.clone(),
                b: b.clone(),
            },
        }
    }
}

impl<'op, T: TwoParticleFunction> PairFunction<'op, T> {
    pub fn pure(u: T) -> Self {
        PairFunction::Pure(u)
    }

    pub fn decomposed(a: Vec<T::Sp>, b: Vec<T::Sp>) -> Self {
        check_factor_counts(a.len(), b.len());
        PairFunction::Decomposed { a, b }
    }

    pub fn op_decomposed(op: &'op ConvolutionOperator<T>, a: Vec<T::Sp>, b: Vec<T::Sp>) -> Self {
        check_factor_counts(a.len(), b.len());
        PairFunction::OpDecomposed { op, a, b }
    }

    pub fn is_pure(&self) -> bool {
        matches!(self, PairFunction::Pure(_))
    }

    pub fn is_decomposed_no_op(&self) -> bool {
        matches!(self, PairFunction::Decomposed { .. })
    }

    pub fn is_op_decomposed(&self) -> bool {
        matches!(self, PairFunction::OpDecomposed { .. })
    }

    pub fn has_operator(&self) -> bool {
        self.is_op_decomposed()
    }

    pub fn operator(&self) -> Option<&'op ConvolutionOperator<T>> {
        match self {
            PairFunction::OpDecomposed { op, .. } => Some(op),
            _ => None,
        }
    }

    pub fn name(&self) -> String {
        match self {
            PairFunction::Pure(_) => "u".to_string(),
            PairFunction::Decomposed { .. } => "|ab>".to_string(),
            PairFunction::OpDecomposed { op, .. } => format!("{}|ab>", op.kind()),
        }
    }

    /// The factor sequences ordered so that the first belongs to `particle`.
    fn assign_particles(&self, particle: Particle) -> (&[T::Sp], &[T::Sp]) {
        let (a, b) = match self {
            PairFunction::Decomposed { a, b } | PairFunction::OpDecomposed { a, b, .. } => (a, b),
            PairFunction::Pure(_) => panic!("a pure pair function has no factors to assign"),
        };
        match particle {
            Particle::One => (a.as_slice(), b.as_slice()),
            Particle::Two => (b.as_slice(), a.as_slice()),
        }
    }

    /// ⟨self|other⟩, with an optional correlation factor applied once to
    /// each particle of one operand.
    ///
    /// Symmetric under operand exchange; mixed-representation pairs
    /// delegate to the cheaper ordering.
    pub fn inner(&self, other: &Self, r2: Option<&T::Sp>) -> f64 {
        match (self, other) {
            (PairFunction::Pure(u1), PairFunction::Pure(u2)) => {
                if let Some(r2) = r2 {
                    let weighted = u1
                        .multiply_particle(r2, Particle::One)
                        .multiply_particle(r2, Particle::Two);
                    u2.inner(&weighted)
                } else {
                    u2.inner(u1)
                }
            }
            (PairFunction::Pure(u), PairFunction::Decomposed { a, b }) => {
                pure_vs_decomposed(u, None, a, b, r2)
            }
            (PairFunction::Pure(u), PairFunction::OpDecomposed { op, a, b }) => {
                pure_vs_decomposed(u, Some(op), a, b, r2)
            }
            (PairFunction::Decomposed { .. }, PairFunction::Pure(_))
            | (PairFunction::OpDecomposed { .. }, PairFunction::Pure(_)) => other.inner(self, r2),
            (
                PairFunction::Decomposed { a: a1, b: b1 },
                PairFunction::Decomposed { a: a2, b: b2 },
            ) => {
                let a2 = weighted_factors(a2, r2);
                let b2 = weighted_factors(b2, r2);
                // Hadamard product of the two cross inner-product matrices
                let ma = DMatrix::from_fn(a2.len(), a1.len(), |i, j| a2[i].inner(&a1[j]));
                let mb = DMatrix::from_fn(b2.len(), b1.len(), |i, j| b2[i].inner(&b1[j]));
                ma.component_mul(&mb).sum()
            }
            (
                PairFunction::Decomposed { a: a1, b: b1 },
                PairFunction::OpDecomposed { op, a: a2, b: b2 },
            ) => {
                let a2 = weighted_factors(a2, r2);
                let b2 = weighted_factors(b2, r2);
                let thresh = op.parameters().thresh_op;
                // ⟨x y| op |a_j b_j⟩ = Σ_j ⟨y·b_j | op(x·a_j)⟩
                let mut result = 0.0;
                for (x, y) in a1.iter().zip(b1) {
                    for (aj, bj) in a2.iter().zip(&b2) {
                        let xa = x.product(aj).truncated(thresh);
                        let yb = y.product(bj).truncated(thresh);
                        result += yb.inner(&op.convolve(&xa));
                    }
                }
                result
            }
            (PairFunction::OpDecomposed { .. }, PairFunction::Decomposed { .. }) => {
                other.inner(self, r2)
            }
            (
                PairFunction::OpDecomposed {
                    op: op1,
                    a: a1,
                    b: b1,
                },
                PairFunction::OpDecomposed {
                    op: op2,
                    a: a2,
                    b: b2,
                },
            ) => {
                if !op1.can_combine(op2) {
                    panic!(
                        "cannot combine {} with {} in a pair-function inner product",
                        op1.kind(),
                        op2.kind()
                    );
                }
                let bra = PairFunction::<T>::decomposed(a1.clone(), b1.clone());
                let mut result = 0.0;
                for (weight, op) in &op1.combine(op2) {
                    let ket = match op {
                        Some(op) => PairFunction::op_decomposed(op, a2.clone(), b2.clone()),
                        None => PairFunction::decomposed(a2.clone(), b2.clone()),
                    };
                    let term = weight * ket.inner(&bra, r2);
                    debug!("inner {} {} : {:.6e}", bra.name(), ket.name(), term);
                    result += term;
                }
                result
            }
        }
    }

    /// ⟨x y|self⟩ against one rank-1 bra.
    pub fn inner_rank1(&self, x: &T::Sp, y: &T::Sp) -> f64 {
        match self {
            PairFunction::Pure(u) => u.inner_composite(None, x, y),
            PairFunction::Decomposed { a, b } => a
                .iter()
                .zip(b)
                .map(|(ai, bi)| x.inner(ai) * y.inner(bi))
                .sum(),
            PairFunction::OpDecomposed { op, a, b } => {
                let thresh = op.parameters().thresh_op;
                a.iter()
                    .zip(b)
                    .map(|(ai, bi)| {
                        let op_xa = op.convolve(&x.product(ai)).truncated(thresh);
                        y.inner(&op_xa.product(bi))
                    })
                    .sum()
            }
        }
    }

    /// Integrates `particle` out against `f`, leaving a one-particle
    /// function of the other particle.
    pub fn project_out(&self, f: &T::Sp, particle: Particle) -> T::Sp {
        match self {
            PairFunction::Pure(u) => u.project_out(f, particle),
            PairFunction::Decomposed { .. } => {
                let (first, second) = self.assign_particles(particle);
                let mut result = f.zeros_like();
                for (fi, si) in first.iter().zip(second) {
                    result.accumulate(&si.scaled(f.inner(fi)));
                }
                result
            }
            PairFunction::OpDecomposed { op, .. } => {
                let (first, second) = self.assign_particles(particle);
                // ⟨f| op |a_i b_i⟩ = Σ_i op(f·a_i) · b_i
                let mut result = f.zeros_like();
                for (fi, si) in first.iter().zip(second) {
                    result.accumulate(&op.convolve(&f.product(fi)).product(si));
                }
                result
            }
        }
    }

    /// ⟨bra| op |self⟩ over `particle`, with the integrated particle traced
    /// out. Not implemented for op-decomposed pair functions.
    pub fn dirac_convolution(
        &self,
        bra: &T::Sp,
        op: &ConvolutionOperator<T>,
        particle: Particle,
    ) -> T::Sp {
        match self {
            PairFunction::Pure(u) => op.dirac_apply(bra, u, particle),
            PairFunction::Decomposed { .. } => {
                let (first, second) = self.assign_particles(particle);
                let mut result = bra.zeros_like();
                for (fi, si) in first.iter().zip(second) {
                    result.accumulate(&op.convolve(&bra.product(fi)).product(si));
                }
                result
            }
            PairFunction::OpDecomposed { .. } => {
                panic!("dirac convolution of an op-decomposed pair function is not implemented")
            }
        }
    }

    pub fn invert_sign(&mut self) {
        *self *= -1.0;
    }
}

impl<'op, T: TwoParticleFunction> MulAssign<f64> for PairFunction<'op, T> {
    fn mul_assign(&mut self, alpha: f64) {
        match self {
            PairFunction::Pure(u) => *u = u.scaled(alpha),
            // scaling one factor sequence scales the whole sum
            PairFunction::Decomposed { a, .. } | PairFunction::OpDecomposed { a, .. } => {
                for ai in a.iter_mut() {
                    *ai = ai.scaled(alpha);
                }
            }
        }
    }
}

impl<'op, T: TwoParticleFunction> fmt::Debug for PairFunction<'op, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PairFunction::Pure(_) => write!(f, "PairFunction::Pure"),
            PairFunction::Decomposed { a, .. } => {
                write!(f, "PairFunction::Decomposed(rank {})", a.len())
            }
            PairFunction::OpDecomposed { op, a, .. } => {
                write!(f, "PairFunction::OpDecomposed({}, rank {})", op.kind(), a.len())
            }
        }
    }
}

fn check_factor_counts(na: usize, nb: usize) {
    if na != nb {
        panic!("decomposed pair function needs matching factor counts, got {na} and {nb}");
    }
}

/// ⟨u| op? · Σ_i (a_i ⊗ b_i)⟩ with the optional correlation factor applied
/// to both factors of each term.
fn pure_vs_decomposed<T: TwoParticleFunction>(
    u: &T,
    op: Option<&ConvolutionOperator<T>>,
    a: &[T::Sp],
    b: &[T::Sp],
    r2: Option<&T::Sp>,
) -> f64 {
    let kernel = match op {
        None => None,
        Some(op) => match op.kind() {
            KernelKind::Identity => None,
            KernelKind::Coulomb | KernelKind::F12 => op.kernel_handle(),
            other => panic!("6D overlap with operator type {other} is not supported"),
        },
    };
    let a = weighted_factors(a, r2);
    let b = weighted_factors(b, r2);
    let mut result = 0.0;
    for (x, y) in a.iter().zip(&b) {
        result += u.inner_composite(kernel, x, y);
    }
    result
}

fn weighted_factors<F: OneParticleFunction>(factors: &[F], r2: Option<&F>) -> Vec<F> {
    match r2 {
        Some(r2) => factors.iter().map(|f| f.product(r2)).collect(),
        None => factors.to_vec(),
    }
}
