//! Convolution operators and their intermediate caches.
//!
//! A [`ConvolutionOperator`] wraps a singular integral kernel together with
//! three caches of precomputed elements ⟨phi_i| op |ket_j⟩, one per ket
//! category (Hole/Particle/Response). Caches are only ever populated against
//! a Hole bra set and are cleared explicitly by category. Cache reads hand
//! out copies, never references into the cache.

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use itertools::Itertools;
use mra::{KernelKind, KernelParameters, OneParticleFunction, Particle, TwoParticleFunction};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::function::{FunctionCategory, FunctionSet, TaggedFunction};

const FOUR_PI: f64 = 4.0 * std::f64::consts::PI;

/// Entry counts and memory footprint of the intermediate caches.
/// Diagnostics only, no correctness contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IntermediateInfo {
    pub hole: usize,
    pub particle: usize,
    pub response: usize,
    pub nbytes: usize,
}

pub struct ConvolutionOperator<T: TwoParticleFunction> {
    kind: KernelKind,
    parameters: KernelParameters,
    kernel: OnceLock<T::Kernel>,
    im_hole: HashMap<(usize, usize), T::Sp>,
    im_particle: HashMap<(usize, usize), T::Sp>,
    im_response: HashMap<(usize, usize), T::Sp>,
}

impl<T: TwoParticleFunction> ConvolutionOperator<T> {
    pub fn new(kind: KernelKind, parameters: KernelParameters) -> Self {
        if kind.needs_gamma() {
            info!(
                "creating {kind} operator with thresh={:.1e}, lo={:.1e}, gamma={}",
                parameters.thresh_op, parameters.lo, parameters.gamma
            );
        } else if kind.has_kernel() {
            info!(
                "creating {kind} operator with thresh={:.1e}, lo={:.1e}",
                parameters.thresh_op, parameters.lo
            );
        } else {
            info!("creating {kind} operator");
        }
        ConvolutionOperator {
            kind,
            parameters,
            kernel: OnceLock::new(),
            im_hole: HashMap::new(),
            im_particle: HashMap::new(),
            im_response: HashMap::new(),
        }
    }

    pub fn kind(&self) -> KernelKind {
        self.kind
    }

    pub fn parameters(&self) -> &KernelParameters {
        &self.parameters
    }

    /// The lazily constructed kernel object. Never called for the identity.
    fn kernel(&self) -> &T::Kernel {
        self.kernel
            .get_or_init(|| T::build_kernel(self.kind, &self.parameters))
    }

    /// Kernel handle for composite 6D inner products; `None` for the
    /// identity.
    pub(crate) fn kernel_handle(&self) -> Option<&T::Kernel> {
        if self.kind.has_kernel() {
            Some(self.kernel())
        } else {
            None
        }
    }

    /// Kernel applied to a plain one-particle function.
    pub fn convolve(&self, f: &T::Sp) -> T::Sp {
        if self.kind.has_kernel() {
            T::apply_kernel(self.kernel(), f)
        } else {
            f.clone()
        }
    }

    fn recompute(&self, bra: &TaggedFunction<T::Sp>, ket: &TaggedFunction<T::Sp>) -> T::Sp {
        if !self.kind.has_kernel() {
            return ket.function.clone();
        }
        self.convolve(&bra.function.product(&ket.function))
            .truncated(self.parameters.thresh_op)
    }

    /// ⟨bra| op |ket⟩ as a function of the remaining particle.
    ///
    /// With `use_cache` the element is looked up in the cache selected by
    /// the ket category (Mixed sums the Hole and Particle entries); a miss
    /// or an unsupported bra category falls back to direct recomputation.
    pub fn apply(
        &self,
        bra: &TaggedFunction<T::Sp>,
        ket: &TaggedFunction<T::Sp>,
        use_cache: bool,
    ) -> T::Sp {
        if !use_cache {
            debug!("recalculating <{}|{}|{}>", bra.name(), self.kind, ket.name());
            return self.recompute(bra, ket);
        }
        if bra.category == FunctionCategory::Hole {
            let key = (bra.index, ket.index);
            match ket.category {
                FunctionCategory::Hole => {
                    if let Some(im) = self.im_hole.get(&key) {
                        return im.clone();
                    }
                }
                FunctionCategory::Particle => {
                    if let Some(im) = self.im_particle.get(&key) {
                        return im.clone();
                    }
                }
                FunctionCategory::Response => {
                    if let Some(im) = self.im_response.get(&key) {
                        return im.clone();
                    }
                }
                // a mixed amplitude is the sum of its hole and particle parts
                FunctionCategory::Mixed => {
                    if let (Some(h), Some(p)) = (self.im_hole.get(&key), self.im_particle.get(&key))
                    {
                        let mut sum = h.clone();
                        sum.accumulate(p);
                        return sum;
                    }
                }
                FunctionCategory::Undefined => {}
            }
        }
        debug!(
            "no intermediate for <{}|{}|{}>, recalculating",
            bra.name(),
            self.kind,
            ket.name()
        );
        self.recompute(bra, ket)
    }

    /// Kernel applied in the argument slot of `particle` of a 6D function.
    /// Supported for the Coulomb kernel only.
    pub fn apply_particle(&self, u: &T, particle: Particle) -> T {
        if self.kind != KernelKind::Coulomb {
            panic!(
                "applying {} across one particle of a 6D function is only defined for g12",
                self.kind
            );
        }
        T::apply_kernel_particle(self.kernel(), u, particle)
    }

    /// ⟨bra| op |u⟩ over `particle`: multiply, convolve, then trace the
    /// particle out. Supported for the Coulomb kernel only.
    pub fn dirac_apply(&self, bra: &T::Sp, u: &T, particle: Particle) -> T::Sp {
        let weighted = u.multiply_particle(bra, particle);
        self.apply_particle(&weighted, particle).trace_particles()
    }

    /// Bulk-populates the cache selected by the ket category with all
    /// (bra_k, ket_l) elements. The bra set has to be of category Hole.
    pub fn update_elements(&mut self, bra: &FunctionSet<T::Sp>, ket: &FunctionSet<T::Sp>) {
        info!(
            "updating operator elements: <{}|{}|{}> ({}x{})",
            bra.category(),
            self.kind,
            ket.category(),
            bra.len(),
            ket.len()
        );
        if bra.category() != FunctionCategory::Hole {
            panic!(
                "cannot build <{}|{}|{}> intermediates: bra set must be of category Hole",
                bra.category(),
                self.kind,
                ket.category()
            );
        }
        if self.kind.has_kernel() {
            // construct the kernel once before the parallel loop
            let _ = self.kernel();
        }
        let this: &Self = self;
        let pairs: Vec<_> = bra.iter().cartesian_product(ket.iter()).collect();
        let elements: HashMap<(usize, usize), T::Sp> = pairs
            .into_par_iter()
            .map(|(k, l)| ((k.index, l.index), this.recompute(k, l)))
            .collect();
        match ket.category() {
            FunctionCategory::Hole => self.im_hole = elements,
            FunctionCategory::Particle => self.im_particle = elements,
            FunctionCategory::Response => self.im_response = elements,
            other => panic!("cannot store <Hole|{}|{}> intermediates", self.kind, other),
        }
    }

    /// Empties exactly the cache selected by `category`.
    pub fn clear_intermediates(&mut self, category: FunctionCategory) {
        info!("deleting all <Hole|{}|{}> intermediates", self.kind, category);
        match category {
            FunctionCategory::Hole => self.im_hole.clear(),
            FunctionCategory::Particle => self.im_particle.clear(),
            FunctionCategory::Response => self.im_response.clear(),
            other => panic!("intermediates for {other} functions are not defined"),
        }
    }

    /// Reports per-cache entry counts and approximate memory footprint.
    pub fn info(&self) -> IntermediateInfo {
        let nbytes = self
            .im_hole
            .values()
            .chain(self.im_particle.values())
            .chain(self.im_response.values())
            .map(|f| f.nbytes())
            .sum();
        let report = IntermediateInfo {
            hole: self.im_hole.len(),
            particle: self.im_particle.len(),
            response: self.im_response.len(),
            nbytes,
        };
        info!(
            "size of {} intermediates: <H|{}|H>={}, <H|{}|P>={}, <H|{}|R>={}, {} bytes",
            self.kind,
            self.kind,
            report.hole,
            self.kind,
            report.particle,
            self.kind,
            report.response,
            report.nbytes
        );
        report
    }

    /// Whether the product of this kernel with `other` has a finite
    /// expansion in supported kernels.
    pub fn can_combine(&self, other: &Self) -> bool {
        combination_table(self.kind, &self.parameters, other.kind, &other.parameters).is_some()
    }

    /// Expands op1·op2 into a weighted sum of simpler operators. `None`
    /// entries stand for the identity. Fatal for non-combinable kernels.
    pub fn combine(&self, other: &Self) -> Vec<(f64, Option<ConvolutionOperator<T>>)> {
        let terms = combination_table(self.kind, &self.parameters, other.kind, &other.parameters)
            .unwrap_or_else(|| panic!("cannot combine {} with {}", self.kind, other.kind));
        let lo = self.parameters.lo.min(other.parameters.lo);
        let thresh_op = self.parameters.thresh_op.min(other.parameters.thresh_op);
        terms
            .into_iter()
            .map(|(weight, term)| {
                let op = term.map(|(kind, gamma)| {
                    ConvolutionOperator::new(
                        kind,
                        KernelParameters {
                            lo,
                            thresh_op,
                            gamma,
                        },
                    )
                });
                (weight, op)
            })
            .collect()
    }
}

impl<T: TwoParticleFunction> fmt::Debug for ConvolutionOperator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConvolutionOperator")
            .field("kind", &self.kind)
            .field("parameters", &self.parameters)
            .field("im_hole", &self.im_hole.len())
            .field("im_particle", &self.im_particle.len())
            .field("im_response", &self.im_response.len())
            .finish()
    }
}

/// The fixed combination table: kernel products expressed as weighted sums
/// of supported kernels, `None` standing for the identity. Returns `None`
/// for pairs without a finite expansion (g12·g12, anything with bsh).
fn combination_table(
    k1: KernelKind,
    p1: &KernelParameters,
    k2: KernelKind,
    p2: &KernelParameters,
) -> Option<Vec<(f64, Option<(KernelKind, f64)>)>> {
    use KernelKind::{Bsh, Coulomb, Identity, Slater, F12};
    let g1 = p1.gamma;
    let g2 = p2.gamma;
    match (k1, k2) {
        (Identity, Identity) => Some(vec![(1.0, None)]),
        (Identity, k) => Some(vec![(1.0, Some((k, g2)))]),
        (k, Identity) => Some(vec![(1.0, Some((k, g1)))]),
        // f(γ1) f(γ2) = 1/(4γ1γ2) [1 - s(γ1) - s(γ2) + s(γ1+γ2)]
        (F12, F12) => {
            let w = 1.0 / (4.0 * g1 * g2);
            Some(vec![
                (w, None),
                (-w, Some((Slater, g1))),
                (-w, Some((Slater, g2))),
                (w, Some((Slater, g1 + g2))),
            ])
        }
        // g f(γ) = 1/(2γ) g - 2π/γ bsh(γ)
        (Coulomb, F12) => Some(fg_expansion(g2)),
        (F12, Coulomb) => Some(fg_expansion(g1)),
        // g s(γ) = 4π bsh(γ)
        (Coulomb, Slater) => Some(vec![(FOUR_PI, Some((Bsh, g2)))]),
        (Slater, Coulomb) => Some(vec![(FOUR_PI, Some((Bsh, g1)))]),
        (Slater, Slater) => Some(vec![(1.0, Some((Slater, g1 + g2)))]),
        // s(γs) f(γf) = 1/(2γf) [s(γs) - s(γs+γf)]
        (Slater, F12) => Some(sf_expansion(g1, g2)),
        (F12, Slater) => Some(sf_expansion(g2, g1)),
        _ => None,
    }
}

fn fg_expansion(gamma: f64) -> Vec<(f64, Option<(KernelKind, f64)>)> {
    vec![
        (1.0 / (2.0 * gamma), Some((KernelKind::Coulomb, gamma))),
        (
            -2.0 * std::f64::consts::PI / gamma,
            Some((KernelKind::Bsh, gamma)),
        ),
    ]
}

fn sf_expansion(gamma_slater: f64, gamma_f12: f64) -> Vec<(f64, Option<(KernelKind, f64)>)> {
    let w = 1.0 / (2.0 * gamma_f12);
    vec![
        (w, Some((KernelKind::Slater, gamma_slater))),
        (-w, Some((KernelKind::Slater, gamma_slater + gamma_f12))),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use mra::{GridFunction, GridPair};

    type Op = ConvolutionOperator<GridPair>;

    const N: usize = 16;

    fn params() -> KernelParameters {
        KernelParameters {
            lo: 1.0e-6,
            thresh_op: 1.0e-6,
            gamma: 1.0,
        }
    }

    fn orbital(shift: f64) -> GridFunction {
        GridFunction::from_fn(N, |r| (-(r - shift) * (r - shift)).exp())
    }

    fn hole_set(shifts: &[f64]) -> FunctionSet<GridFunction> {
        FunctionSet::from_functions(shifts.iter().map(|&s| orbital(s)).collect(),
            FunctionCategory::Hole)
    }

    fn tagged(shift: f64, index: usize, category: FunctionCategory) -> TaggedFunction<GridFunction> {
        TaggedFunction::new(orbital(shift), index, category)
    }

    fn close(a: &GridFunction, b: &GridFunction, tol: f64) -> bool {
        let mut diff = a.clone();
        diff.accumulate(&b.scaled(-1.0));
        diff.norm2() < tol
    }

    #[test]
    fn cached_apply_matches_direct_recalculation() {
        // Coulomb with lo=1e-6, thresh_op=1e-6 between two identical
        // orbitals: cached and direct evaluation agree to 1e-8.
        let mut op = Op::new(KernelKind::Coulomb, params());
        let holes = hole_set(&[0.0, 1.0]);
        op.update_elements(&holes, &holes);
        for bra in holes.iter() {
            for ket in holes.iter() {
                let cached = op.apply(bra, ket, true);
                let direct = op.apply(bra, ket, false);
                assert!(close(&cached, &direct, 1.0e-8));
            }
        }
        let same = holes.get(1).unwrap();
        let cached = op.apply(same, same, true);
        let direct = op.apply(same, same, false);
        assert!((cached.inner(&cached) - direct.inner(&direct)).abs() < 1.0e-8);
    }

    #[test]
    fn mixed_ket_sums_hole_and_particle_entries() {
        let mut op = Op::new(KernelKind::Slater, params());
        let holes = hole_set(&[0.0, 0.5]);
        let particles = FunctionSet::from_functions(
            vec![orbital(1.0), orbital(1.5)],
            FunctionCategory::Particle,
        );
        op.update_elements(&holes, &holes);
        op.update_elements(&holes, &particles);

        let bra = holes.get(0).unwrap();
        let mixed = tagged(0.7, 1, FunctionCategory::Mixed);
        let got = op.apply(bra, &mixed, true);
        let mut expected = op.apply(bra, holes.get(1).unwrap(), true);
        expected.accumulate(&op.apply(bra, particles.get(1).unwrap(), true));
        assert!(close(&got, &expected, 1.0e-12));
    }

    #[test]
    fn cache_miss_falls_back_to_recalculation() {
        let op = Op::new(KernelKind::Coulomb, params());
        let bra = tagged(0.0, 0, FunctionCategory::Hole);
        let ket = tagged(1.0, 1, FunctionCategory::Particle);
        // nothing cached yet
        let via_cache = op.apply(&bra, &ket, true);
        let direct = op.apply(&bra, &ket, false);
        assert!(close(&via_cache, &direct, 1.0e-12));
    }

    #[test]
    fn stale_cache_is_observable_until_cleared() {
        let mut op = Op::new(KernelKind::Coulomb, params());
        let holes = hole_set(&[0.0]);
        let kets = FunctionSet::from_functions(vec![orbital(1.0)], FunctionCategory::Particle);
        op.update_elements(&holes, &kets);

        let bra = holes.get(0).unwrap();
        let old_ket = kets.get(0).unwrap();
        let stale_value = op.apply(bra, old_ket, true);

        // replace the underlying orbital without invalidating
        let new_ket = tagged(2.0, 0, FunctionCategory::Particle);
        let still_stale = op.apply(bra, &new_ket, true);
        assert!(close(&still_stale, &stale_value, 1.0e-12));
        let fresh = op.apply(bra, &new_ket, false);
        assert!(!close(&fresh, &stale_value, 1.0e-6));

        op.clear_intermediates(FunctionCategory::Particle);
        let after_clear = op.apply(bra, &new_ket, true);
        assert!(close(&after_clear, &fresh, 1.0e-12));
    }

    #[test]
    fn clear_empties_exactly_one_cache() {
        let mut op = Op::new(KernelKind::Slater, params());
        let holes = hole_set(&[0.0, 0.5]);
        let responses =
            FunctionSet::from_functions(vec![orbital(1.0)], FunctionCategory::Response);
        op.update_elements(&holes, &holes);
        op.update_elements(&holes, &responses);
        assert_eq!(op.info().hole, 4);
        assert_eq!(op.info().response, 2);

        op.clear_intermediates(FunctionCategory::Hole);
        let report = op.info();
        assert_eq!(report.hole, 0);
        assert_eq!(report.response, 2);
        assert!(report.nbytes > 0);
    }

    #[test]
    #[should_panic(expected = "must be of category Hole")]
    fn update_with_non_hole_bra_is_fatal() {
        let mut op = Op::new(KernelKind::Coulomb, params());
        let particles =
            FunctionSet::from_functions(vec![orbital(0.0)], FunctionCategory::Particle);
        let holes = hole_set(&[0.0]);
        op.update_elements(&particles, &holes);
    }

    #[test]
    #[should_panic(expected = "cannot store")]
    fn update_with_mixed_ket_is_fatal() {
        let mut op = Op::new(KernelKind::Coulomb, params());
        let holes = hole_set(&[0.0]);
        let mixed = FunctionSet::from_functions(vec![orbital(1.0)], FunctionCategory::Mixed);
        op.update_elements(&holes, &mixed);
    }

    #[test]
    #[should_panic(expected = "are not defined")]
    fn clear_mixed_is_fatal() {
        let mut op = Op::new(KernelKind::Coulomb, params());
        op.clear_intermediates(FunctionCategory::Mixed);
    }

    #[test]
    fn identity_apply_returns_the_ket() {
        let op = Op::new(KernelKind::Identity, params());
        let bra = tagged(0.0, 0, FunctionCategory::Hole);
        let ket = tagged(1.0, 1, FunctionCategory::Hole);
        let result = op.apply(&bra, &ket, false);
        assert!(close(&result, &ket.function, 1.0e-15));
        assert!(close(&op.convolve(&ket.function), &ket.function, 1.0e-15));
    }

    #[test]
    fn combination_table_shapes() {
        let f12 = Op::new(KernelKind::F12, params());
        let g12 = Op::new(KernelKind::Coulomb, params());
        let slater = Op::new(KernelKind::Slater, params());
        let bsh = Op::new(KernelKind::Bsh, params());

        assert!(f12.can_combine(&f12));
        assert!(f12.can_combine(&g12));
        assert!(g12.can_combine(&slater));
        assert!(slater.can_combine(&slater));
        assert!(!g12.can_combine(&g12));
        assert!(!bsh.can_combine(&f12));

        let terms = f12.combine(&f12);
        assert_eq!(terms.len(), 4);
        // the constant term is the identity
        assert!(terms[0].1.is_none());
        let w = 1.0 / (4.0 * params().gamma * params().gamma);
        assert!((terms[0].0 - w).abs() < 1.0e-15);
        assert_eq!(terms[3].1.as_ref().unwrap().kind(), KernelKind::Slater);
        assert!((terms[3].1.as_ref().unwrap().parameters().gamma - 2.0).abs() < 1.0e-15);

        let terms = g12.combine(&slater);
        assert_eq!(terms.len(), 1);
        assert_eq!(terms[0].1.as_ref().unwrap().kind(), KernelKind::Bsh);
    }

    #[test]
    #[should_panic(expected = "cannot combine")]
    fn combining_two_coulomb_kernels_is_fatal() {
        let g12 = Op::new(KernelKind::Coulomb, params());
        let other = Op::new(KernelKind::Coulomb, params());
        g12.combine(&other);
    }
}
