//! Storage for expensive singles-potential contributions.
//!
//! Doubles iterations reuse potential terms computed during the singles
//! update. Only the documented (potential, state) combinations are stored;
//! anything else is a programming error and aborts.

use mra::OneParticleFunction;
use tracing::{debug, warn};

use crate::function::{FunctionCategory, FunctionSet, TaggedFunction};

/// Named potential contributions of the amplitude equations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PotentialType {
    /// Whole singles potential (ground or excited state).
    Singles,
    S2b,
    S2c,
    S4a,
    S4b,
    S4c,
    F3d,
    Ccs,
}

impl PotentialType {
    /// Whether this contribution is kept between iterations. The s4 terms
    /// and f3d are cheap to rebuild and never stored.
    pub fn is_cached(&self) -> bool {
        matches!(
            self,
            PotentialType::Singles | PotentialType::S2b | PotentialType::S2c
        )
    }
}

impl std::fmt::Display for PotentialType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PotentialType::Singles => "singles",
            PotentialType::S2b => "s2b",
            PotentialType::S2c => "s2c",
            PotentialType::S4a => "s4a",
            PotentialType::S4b => "s4b",
            PotentialType::S4c => "s4c",
            PotentialType::F3d => "f3d",
            PotentialType::Ccs => "ccs",
        };
        write!(f, "{name}")
    }
}

/// Potential store with one slot per cached (potential, state) pair.
///
/// Ground-state slots serve both Particle and Mixed amplitudes, excited
/// slots serve Response amplitudes. Stored vectors are indexed by active
/// orbital, i.e. shifted down by the number of frozen orbitals.
#[derive(Debug, Clone)]
pub struct IntermediatePotentials<F> {
    singles_gs: Vec<F>,
    singles_ex: Vec<F>,
    s2b_gs: Vec<F>,
    s2b_ex: Vec<F>,
    s2c_gs: Vec<F>,
    s2c_ex: Vec<F>,
    freeze: usize,
    thresh: f64,
}

impl<F: OneParticleFunction> IntermediatePotentials<F> {
    pub fn new(freeze: usize, thresh: f64) -> Self {
        IntermediatePotentials {
            singles_gs: Vec::new(),
            singles_ex: Vec::new(),
            s2b_gs: Vec::new(),
            s2b_ex: Vec::new(),
            s2c_gs: Vec::new(),
            s2c_ex: Vec::new(),
            freeze,
            thresh,
        }
    }

    fn slot(&self, kind: PotentialType, category: FunctionCategory) -> Option<&Vec<F>> {
        match (kind, category) {
            (PotentialType::Singles, FunctionCategory::Particle | FunctionCategory::Mixed) => {
                Some(&self.singles_gs)
            }
            (PotentialType::Singles, FunctionCategory::Response) => Some(&self.singles_ex),
            (PotentialType::S2b, FunctionCategory::Particle | FunctionCategory::Mixed) => {
                Some(&self.s2b_gs)
            }
            (PotentialType::S2b, FunctionCategory::Response) => Some(&self.s2b_ex),
            (PotentialType::S2c, FunctionCategory::Particle | FunctionCategory::Mixed) => {
                Some(&self.s2c_gs)
            }
            (PotentialType::S2c, FunctionCategory::Response) => Some(&self.s2c_ex),
            _ => None,
        }
    }

    fn slot_mut(&mut self, kind: PotentialType, category: FunctionCategory) -> Option<&mut Vec<F>> {
        match (kind, category) {
            (PotentialType::Singles, FunctionCategory::Particle | FunctionCategory::Mixed) => {
                Some(&mut self.singles_gs)
            }
            (PotentialType::Singles, FunctionCategory::Response) => Some(&mut self.singles_ex),
            (PotentialType::S2b, FunctionCategory::Particle | FunctionCategory::Mixed) => {
                Some(&mut self.s2b_gs)
            }
            (PotentialType::S2b, FunctionCategory::Response) => Some(&mut self.s2b_ex),
            (PotentialType::S2c, FunctionCategory::Particle | FunctionCategory::Mixed) => {
                Some(&mut self.s2c_gs)
            }
            (PotentialType::S2c, FunctionCategory::Response) => Some(&mut self.s2c_ex),
            _ => None,
        }
    }

    /// Stores `functions` as the `kind` potential of the state selected by
    /// `category`. Fatal for empty input and for any slot that is not part
    /// of the documented set.
    pub fn insert(&mut self, functions: Vec<F>, category: FunctionCategory, kind: PotentialType) {
        if functions.is_empty() {
            panic!("refusing to store an empty {kind} potential");
        }
        debug!("storing {} potential for {} state", kind, category);
        match self.slot_mut(kind, category) {
            Some(slot) => *slot = functions,
            None => panic!("a {kind} potential for {category} functions was not supposed to be stored"),
        }
    }

    /// The stored `kind` potential for the state of `functions`.
    ///
    /// Hole functions have no singles potential; the result is a vector of
    /// zero functions of matching shape. An empty slot is reported and
    /// returned as is, callers decide whether to recompute.
    pub fn get(&self, functions: &FunctionSet<F>, kind: PotentialType) -> Vec<F> {
        if functions.category() == FunctionCategory::Hole {
            warn!("requested {} potential for hole states, returning zeros", kind);
            return functions.iter().map(|f| f.function.zeros_like()).collect();
        }
        let slot = match self.slot(kind, functions.category()) {
            Some(slot) => slot,
            None => panic!(
                "a {kind} potential for {} functions was not supposed to be stored",
                functions.category()
            ),
        };
        if slot.is_empty() {
            warn!("requested {} potential for {} state is empty", kind, functions.category());
        }
        slot.clone()
    }

    /// The stored potential belonging to a single amplitude, addressed by
    /// its orbital index minus the frozen core.
    pub fn get_function(&self, function: &TaggedFunction<F>, kind: PotentialType) -> F {
        let slot = match self.slot(kind, function.category) {
            Some(slot) => slot,
            None => panic!(
                "a {kind} potential for {} functions was not supposed to be stored",
                function.category
            ),
        };
        let active = match function.index.checked_sub(self.freeze) {
            Some(i) if i < slot.len() => i,
            _ => panic!(
                "no stored {} potential for {} (freeze {})",
                kind,
                function.name(),
                self.freeze
            ),
        };
        let result = slot[active].clone();
        let norm = result.norm2();
        if norm < self.thresh {
            warn!(
                "stored {} potential for {} is numerically zero (|.| = {:.3e})",
                kind,
                function.name(),
                norm
            );
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mra::GridFunction;

    fn f(v: f64) -> GridFunction {
        GridFunction::new(vec![v, v])
    }

    fn store() -> IntermediatePotentials<GridFunction> {
        IntermediatePotentials::new(0, 1.0e-10)
    }

    #[test]
    fn ground_and_excited_slots_are_distinct() {
        let mut pots = store();
        pots.insert(vec![f(1.0)], FunctionCategory::Particle, PotentialType::S2b);
        pots.insert(vec![f(2.0)], FunctionCategory::Response, PotentialType::S2b);

        let tau = FunctionSet::from_functions(vec![f(0.5)], FunctionCategory::Particle);
        let x = FunctionSet::from_functions(vec![f(0.5)], FunctionCategory::Response);
        assert_eq!(pots.get(&tau, PotentialType::S2b)[0].values()[0], 1.0);
        assert_eq!(pots.get(&x, PotentialType::S2b)[0].values()[0], 2.0);
    }

    #[test]
    fn mixed_amplitudes_share_the_ground_state_slot() {
        let mut pots = store();
        pots.insert(vec![f(3.0)], FunctionCategory::Particle, PotentialType::Singles);
        let t = FunctionSet::from_functions(vec![f(0.5)], FunctionCategory::Mixed);
        assert_eq!(pots.get(&t, PotentialType::Singles)[0].values()[0], 3.0);
    }

    #[test]
    fn hole_states_get_zero_potentials() {
        let pots = store();
        let phi = FunctionSet::from_functions(vec![f(1.0), f(2.0)], FunctionCategory::Hole);
        let zeros = pots.get(&phi, PotentialType::Singles);
        assert_eq!(zeros.len(), 2);
        assert!(zeros.iter().all(|z| z.norm2() == 0.0));
    }

    #[test]
    fn insert_overwrites_the_slot() {
        let mut pots = store();
        pots.insert(vec![f(1.0)], FunctionCategory::Particle, PotentialType::S2c);
        pots.insert(vec![f(4.0)], FunctionCategory::Particle, PotentialType::S2c);
        let tau = FunctionSet::from_functions(vec![f(0.5)], FunctionCategory::Particle);
        assert_eq!(pots.get(&tau, PotentialType::S2c)[0].values()[0], 4.0);
    }

    #[test]
    fn per_function_lookup_respects_the_frozen_core() {
        let mut pots = IntermediatePotentials::new(2, 1.0e-10);
        pots.insert(
            vec![f(1.0), f(2.0)],
            FunctionCategory::Particle,
            PotentialType::S2b,
        );
        let tau3 = TaggedFunction::new(f(0.5), 3, FunctionCategory::Particle);
        assert_eq!(
            pots.get_function(&tau3, PotentialType::S2b).values()[0],
            2.0
        );
    }

    #[test]
    #[should_panic(expected = "no stored")]
    fn per_function_lookup_below_the_frozen_core_is_fatal() {
        let mut pots = IntermediatePotentials::new(2, 1.0e-10);
        pots.insert(vec![f(1.0)], FunctionCategory::Particle, PotentialType::S2b);
        let tau1 = TaggedFunction::new(f(0.5), 1, FunctionCategory::Particle);
        pots.get_function(&tau1, PotentialType::S2b);
    }

    #[test]
    #[should_panic(expected = "refusing to store")]
    fn storing_an_empty_potential_is_fatal() {
        store().insert(Vec::new(), FunctionCategory::Particle, PotentialType::S2b);
    }

    #[test]
    #[should_panic(expected = "not supposed to be stored")]
    fn storing_an_uncached_kind_is_fatal() {
        store().insert(vec![f(1.0)], FunctionCategory::Particle, PotentialType::S4a);
    }

    #[test]
    #[should_panic(expected = "not supposed to be stored")]
    fn querying_an_uncached_kind_is_fatal() {
        let tau = FunctionSet::from_functions(vec![f(1.0)], FunctionCategory::Particle);
        store().get(&tau, PotentialType::S4a);
    }

    #[test]
    #[should_panic(expected = "not supposed to be stored")]
    fn per_function_lookup_of_an_uncached_kind_is_fatal() {
        let tau0 = TaggedFunction::new(f(1.0), 0, FunctionCategory::Particle);
        store().get_function(&tau0, PotentialType::F3d);
    }

    #[test]
    #[should_panic(expected = "not supposed to be stored")]
    fn storing_for_undefined_states_is_fatal() {
        store().insert(vec![f(1.0)], FunctionCategory::Undefined, PotentialType::S2b);
    }

    #[test]
    fn cached_kinds_are_exactly_singles_s2b_s2c() {
        for kind in [
            PotentialType::Singles,
            PotentialType::S2b,
            PotentialType::S2c,
        ] {
            assert!(kind.is_cached());
        }
        for kind in [
            PotentialType::S4a,
            PotentialType::S4b,
            PotentialType::S4c,
            PotentialType::F3d,
            PotentialType::Ccs,
        ] {
            assert!(!kind.is_cached());
        }
    }
}
