//! Dense grid-sampled reference backend.
//!
//! A one-particle function is a vector of samples on a uniform radial grid,
//! a two-particle function a matrix `u[x][y]`, and a kernel a radial profile
//! `k(|x - y|)` materialized as a matrix on demand. The profiles are chosen
//! so that the closed-form products used by the operator-combination table
//! hold exactly pointwise.

use libm::exp;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::function::{
    KernelKind, KernelParameters, OneParticleFunction, Particle, TwoParticleFunction,
};

/// Distance between neighboring grid points.
pub const GRID_SPACING: f64 = 0.25;

const FOUR_PI: f64 = 4.0 * std::f64::consts::PI;

/// One-particle function sampled on the grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridFunction {
    values: DVector<f64>,
}

impl GridFunction {
    pub fn new(values: Vec<f64>) -> Self {
        GridFunction {
            values: DVector::from_vec(values),
        }
    }

    /// Samples `f` at the grid points `r_i = i * GRID_SPACING`.
    pub fn from_fn(n: usize, f: impl Fn(f64) -> f64) -> Self {
        GridFunction {
            values: DVector::from_fn(n, |i, _| f(i as f64 * GRID_SPACING)),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &DVector<f64> {
        &self.values
    }
}

impl OneParticleFunction for GridFunction {
    fn inner(&self, other: &Self) -> f64 {
        self.values.dot(&other.values)
    }

    fn product(&self, other: &Self) -> Self {
        GridFunction {
            values: self.values.component_mul(&other.values),
        }
    }

    fn scaled(&self, alpha: f64) -> Self {
        GridFunction {
            values: &self.values * alpha,
        }
    }

    fn accumulate(&mut self, other: &Self) {
        self.values += &other.values;
    }

    fn zeros_like(&self) -> Self {
        GridFunction {
            values: DVector::zeros(self.values.len()),
        }
    }

    fn truncated(mut self, thresh: f64) -> Self {
        for v in self.values.iter_mut() {
            if v.abs() < thresh {
                *v = 0.0;
            }
        }
        self
    }

    fn nbytes(&self) -> usize {
        self.values.len() * std::mem::size_of::<f64>()
    }
}

/// Radial kernel profile, materialized as a matrix on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridKernel {
    kind: KernelKind,
    parameters: KernelParameters,
}

impl GridKernel {
    pub fn new(kind: KernelKind, parameters: KernelParameters) -> Self {
        if !kind.has_kernel() {
            panic!("the identity operator carries no kernel object");
        }
        GridKernel { kind, parameters }
    }

    pub fn kind(&self) -> KernelKind {
        self.kind
    }

    /// Kernel value at interparticle distance `r`.
    pub fn profile(&self, r: f64) -> f64 {
        let lo = self.parameters.lo;
        let gamma = self.parameters.gamma;
        match self.kind {
            KernelKind::Coulomb => 1.0 / (r + lo),
            KernelKind::Slater => exp(-gamma * r),
            KernelKind::F12 => (1.0 - exp(-gamma * r)) / (2.0 * gamma),
            KernelKind::Bsh => exp(-gamma * r) / (FOUR_PI * (r + lo)),
            KernelKind::Identity => unreachable!("identity kernel is never materialized"),
        }
    }

    /// The profile evaluated on the n-point grid.
    pub fn matrix(&self, n: usize) -> DMatrix<f64> {
        DMatrix::from_fn(n, n, |i, j| {
            self.profile(GRID_SPACING * (i as f64 - j as f64).abs())
        })
    }
}

/// Two-particle function sampled on the grid, `u[x][y]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridPair {
    values: DMatrix<f64>,
}

impl GridPair {
    pub fn new(values: DMatrix<f64>) -> Self {
        GridPair { values }
    }

    pub fn values(&self) -> &DMatrix<f64> {
        &self.values
    }
}

impl TwoParticleFunction for GridPair {
    type Sp = GridFunction;
    type Kernel = GridKernel;

    fn build_kernel(kind: KernelKind, parameters: &KernelParameters) -> GridKernel {
        GridKernel::new(kind, *parameters)
    }

    fn apply_kernel(kernel: &GridKernel, f: &GridFunction) -> GridFunction {
        GridFunction {
            values: kernel.matrix(f.len()) * &f.values,
        }
    }

    fn from_product(a: &GridFunction, b: &GridFunction) -> Self {
        GridPair {
            values: &a.values * b.values.transpose(),
        }
    }

    fn inner(&self, other: &Self) -> f64 {
        self.values.dot(&other.values)
    }

    fn inner_composite(
        &self,
        kernel: Option<&GridKernel>,
        a: &GridFunction,
        b: &GridFunction,
    ) -> f64 {
        match kernel {
            // Σ_xy u[x][y] k(x,y) a[x] b[y]
            Some(k) => {
                let weighted = self.values.component_mul(&k.matrix(self.values.nrows()));
                (a.values.transpose() * weighted * &b.values)[(0, 0)]
            }
            None => (a.values.transpose() * &self.values * &b.values)[(0, 0)],
        }
    }

    fn multiply_particle(&self, f: &GridFunction, particle: Particle) -> Self {
        let n = self.values.nrows();
        let m = self.values.ncols();
        let values = match particle {
            Particle::One => DMatrix::from_fn(n, m, |x, y| f.values[x] * self.values[(x, y)]),
            Particle::Two => DMatrix::from_fn(n, m, |x, y| f.values[y] * self.values[(x, y)]),
        };
        GridPair { values }
    }

    fn project_out(&self, f: &GridFunction, particle: Particle) -> GridFunction {
        let values = match particle {
            Particle::One => self.values.tr_mul(&f.values),
            Particle::Two => &self.values * &f.values,
        };
        GridFunction { values }
    }

    fn apply_kernel_particle(kernel: &GridKernel, u: &Self, particle: Particle) -> Self {
        let k = kernel.matrix(u.values.nrows());
        // the profile matrix is symmetric
        let values = match particle {
            Particle::One => &k * &u.values,
            Particle::Two => &u.values * &k,
        };
        GridPair { values }
    }

    fn trace_particles(&self) -> GridFunction {
        GridFunction {
            values: self.values.diagonal(),
        }
    }

    fn scaled(&self, alpha: f64) -> Self {
        GridPair {
            values: &self.values * alpha,
        }
    }

    fn accumulate(&mut self, other: &Self) {
        self.values += &other.values;
    }

    fn truncated(mut self, thresh: f64) -> Self {
        for v in self.values.iter_mut() {
            if v.abs() < thresh {
                *v = 0.0;
            }
        }
        self
    }
}
