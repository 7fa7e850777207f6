//! Trait surface and boundary vocabulary of the numeric runtime.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the two particles of a pair function.
///
/// External callers count particles as 1 and 2; the runtime counts 0 and 1.
/// `from_particle_number` is the single place where the 1/2 convention is
/// validated, so every operation downstream can rely on a well-formed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Particle {
    One,
    Two,
}

impl Particle {
    /// Converts a 1-based particle number. Fatal outside {1, 2}.
    pub fn from_particle_number(n: usize) -> Self {
        match n {
            1 => Particle::One,
            2 => Particle::Two,
            _ => panic!("particle index must be 1 or 2, got {n}"),
        }
    }

    /// 1-based particle number.
    pub fn number(&self) -> usize {
        match self {
            Particle::One => 1,
            Particle::Two => 2,
        }
    }

    /// 0-based index in the runtime convention.
    pub fn index(&self) -> usize {
        self.number() - 1
    }

    pub fn other(&self) -> Self {
        match self {
            Particle::One => Particle::Two,
            Particle::Two => Particle::One,
        }
    }
}

impl fmt::Display for Particle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Kind of a singular integral kernel.
///
/// `Identity` is the literal identity and carries no kernel object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KernelKind {
    Coulomb,
    Slater,
    F12,
    Bsh,
    Identity,
}

impl KernelKind {
    /// Whether the kernel profile depends on the exponent `gamma`.
    pub fn needs_gamma(&self) -> bool {
        matches!(self, KernelKind::Slater | KernelKind::F12 | KernelKind::Bsh)
    }

    /// Whether a kernel object has to be constructed for this kind.
    pub fn has_kernel(&self) -> bool {
        !matches!(self, KernelKind::Identity)
    }
}

impl fmt::Display for KernelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KernelKind::Coulomb => "g12",
            KernelKind::Slater => "slater",
            KernelKind::F12 => "f12",
            KernelKind::Bsh => "bsh",
            KernelKind::Identity => "identity",
        };
        write!(f, "{name}")
    }
}

/// Numeric parameters of a convolution kernel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KernelParameters {
    /// Short-range cutoff regularizing the singularity.
    pub lo: f64,
    /// Truncation threshold for operator applications.
    pub thresh_op: f64,
    /// Exponent for Slater/F12/BSH kernels, unused by Coulomb.
    pub gamma: f64,
}

impl Default for KernelParameters {
    fn default() -> Self {
        KernelParameters {
            lo: 1.0e-6,
            thresh_op: 1.0e-6,
            gamma: 1.0,
        }
    }
}

/// A one-particle numerical function (orbital, amplitude or response vector)
/// as supplied by the runtime.
///
/// All operations are synchronous collective calls into the runtime; none of
/// them mutates shared state.
pub trait OneParticleFunction: Clone + Send + Sync {
    /// ⟨self|other⟩.
    fn inner(&self, other: &Self) -> f64;

    /// Pointwise product.
    fn product(&self, other: &Self) -> Self;

    fn scaled(&self, alpha: f64) -> Self;

    /// self += other.
    fn accumulate(&mut self, other: &Self);

    fn norm2(&self) -> f64 {
        self.inner(self).sqrt()
    }

    /// The zero function on the same support as `self`.
    fn zeros_like(&self) -> Self;

    /// Discards contributions below `thresh` (sparse-safe representation).
    fn truncated(self, thresh: f64) -> Self;

    /// Approximate memory footprint in bytes.
    fn nbytes(&self) -> usize;
}

/// A two-particle numerical function together with the kernel primitives the
/// runtime provides for it.
pub trait TwoParticleFunction: Clone + Send + Sync {
    type Sp: OneParticleFunction;
    type Kernel: Send + Sync;

    /// Constructs the kernel object for `kind`. Fatal for `Identity`, which
    /// carries no kernel object.
    fn build_kernel(kind: KernelKind, parameters: &KernelParameters) -> Self::Kernel;

    /// Kernel applied to a one-particle function.
    fn apply_kernel(kernel: &Self::Kernel, f: &Self::Sp) -> Self::Sp;

    /// The rank-1 function |a⟩⊗|b⟩.
    fn from_product(a: &Self::Sp, b: &Self::Sp) -> Self;

    /// ⟨self|other⟩ over both particles.
    fn inner(&self, other: &Self) -> f64;

    /// ⟨self| op · (a⊗b)⟩ with the kernel acting between the particles.
    /// `None` stands for the literal identity.
    fn inner_composite(&self, kernel: Option<&Self::Kernel>, a: &Self::Sp, b: &Self::Sp) -> f64;

    /// Pointwise multiplication by `f` in the argument slot of `particle`.
    fn multiply_particle(&self, f: &Self::Sp, particle: Particle) -> Self;

    /// Integrates `particle` out against `f`, leaving a function of the
    /// other particle.
    fn project_out(&self, f: &Self::Sp, particle: Particle) -> Self::Sp;

    /// Kernel applied in the argument slot of `particle`.
    fn apply_kernel_particle(kernel: &Self::Kernel, u: &Self, particle: Particle) -> Self;

    /// Dirac delta between the two particles: g(x) = u(x, x).
    fn trace_particles(&self) -> Self::Sp;

    fn scaled(&self, alpha: f64) -> Self;

    /// self += other.
    fn accumulate(&mut self, other: &Self);

    fn truncated(self, thresh: f64) -> Self;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn particle_number_roundtrip() {
        assert_eq!(Particle::from_particle_number(1), Particle::One);
        assert_eq!(Particle::from_particle_number(2), Particle::Two);
        assert_eq!(Particle::One.index(), 0);
        assert_eq!(Particle::Two.index(), 1);
        assert_eq!(Particle::One.other(), Particle::Two);
    }

    #[test]
    #[should_panic(expected = "particle index must be 1 or 2")]
    fn particle_number_out_of_range_is_fatal() {
        Particle::from_particle_number(3);
    }

    #[test]
    fn kernel_kind_properties() {
        assert!(KernelKind::Slater.needs_gamma());
        assert!(KernelKind::F12.needs_gamma());
        assert!(KernelKind::Bsh.needs_gamma());
        assert!(!KernelKind::Coulomb.needs_gamma());
        assert!(!KernelKind::Identity.has_kernel());
        assert_eq!(format!("{}", KernelKind::Coulomb), "g12");
    }
}
