//! Category-tagged one-particle functions and ordered sets of them.

use std::collections::BTreeMap;
use std::fmt;

use mra::OneParticleFunction;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Role of a one-particle function in the calculation.
///
/// The category decides which intermediate cache an operator element lands
/// in and which slot of the potential store a potential belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FunctionCategory {
    /// Occupied reference orbital.
    Hole,
    /// Ground-state correlation amplitude.
    Particle,
    /// Hole plus particle amplitude.
    Mixed,
    /// Excitation response vector.
    Response,
    Undefined,
}

impl FunctionCategory {
    /// Conventional short name of the i-th function of this category.
    pub fn short_name(&self, index: usize) -> String {
        match self {
            FunctionCategory::Hole => format!("phi{index}"),
            FunctionCategory::Particle => format!("tau{index}"),
            FunctionCategory::Mixed => format!("t{index}"),
            FunctionCategory::Response => format!("x{index}"),
            FunctionCategory::Undefined => format!("f{index}"),
        }
    }

    /// Conventional name of a whole set of this category.
    pub fn set_name(&self) -> &'static str {
        match self {
            FunctionCategory::Hole => "phi",
            FunctionCategory::Particle => "tau",
            FunctionCategory::Mixed => "t",
            FunctionCategory::Response => "x",
            FunctionCategory::Undefined => "unknown",
        }
    }
}

impl fmt::Display for FunctionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FunctionCategory::Hole => "Hole",
            FunctionCategory::Particle => "Particle",
            FunctionCategory::Mixed => "Mixed",
            FunctionCategory::Response => "Response",
            FunctionCategory::Undefined => "Undefined",
        };
        write!(f, "{name}")
    }
}

/// A one-particle function with its orbital index and category tag.
#[derive(Debug, Clone)]
pub struct TaggedFunction<F> {
    pub function: F,
    pub index: usize,
    pub category: FunctionCategory,
}

impl<F> TaggedFunction<F> {
    pub fn new(function: F, index: usize, category: FunctionCategory) -> Self {
        TaggedFunction {
            function,
            index,
            category,
        }
    }

    pub fn name(&self) -> String {
        self.category.short_name(self.index)
    }
}

impl<F: OneParticleFunction> TaggedFunction<F> {
    pub fn inner(&self, other: &Self) -> f64 {
        self.function.inner(&other.function)
    }
}

/// An ordered set of tagged functions sharing one category, keyed by
/// orbital index.
#[derive(Debug, Clone)]
pub struct FunctionSet<F> {
    functions: BTreeMap<usize, TaggedFunction<F>>,
    category: FunctionCategory,
}

impl<F: OneParticleFunction> FunctionSet<F> {
    pub fn new(category: FunctionCategory) -> Self {
        FunctionSet {
            functions: BTreeMap::new(),
            category,
        }
    }

    /// Builds a set from plain functions, indexed from zero.
    pub fn from_functions(functions: Vec<F>, category: FunctionCategory) -> Self {
        Self::with_offset(functions, category, 0)
    }

    /// Builds a set indexed from `offset` (frozen-core convention).
    pub fn with_offset(functions: Vec<F>, category: FunctionCategory, offset: usize) -> Self {
        let functions = functions
            .into_iter()
            .enumerate()
            .map(|(i, f)| (offset + i, TaggedFunction::new(f, offset + i, category)))
            .collect();
        FunctionSet {
            functions,
            category,
        }
    }

    pub fn category(&self) -> FunctionCategory {
        self.category
    }

    pub fn name(&self) -> &'static str {
        self.category.set_name()
    }

    /// Inserts or replaces the function at its index. The tag has to match
    /// the set's category.
    pub fn insert(&mut self, function: TaggedFunction<F>) {
        if function.category != self.category {
            panic!(
                "cannot insert a {} function into a {} set",
                function.category, self.category
            );
        }
        self.functions.insert(function.index, function);
    }

    pub fn get(&self, index: usize) -> Option<&TaggedFunction<F>> {
        self.functions.get(&index)
    }

    /// Members in index order. The concrete iterator is `Clone`, so callers
    /// can form index cross products.
    pub fn iter(&self) -> std::collections::btree_map::Values<'_, usize, TaggedFunction<F>> {
        self.functions.values()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// The plain functions in index order.
    pub fn to_vec(&self) -> Vec<F> {
        self.functions.values().map(|t| t.function.clone()).collect()
    }

    /// Logs the norm of every member, diagnostics only.
    pub fn log_sizes(&self, msg: &str) {
        if self.functions.is_empty() {
            info!("function set {} ({msg}) is empty", self.name());
            return;
        }
        for f in self.functions.values() {
            info!("|{}| = {:.6e} ({msg})", f.name(), f.function.norm2());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mra::GridFunction;

    fn f(values: Vec<f64>) -> GridFunction {
        GridFunction::new(values)
    }

    #[test]
    fn category_names_follow_convention() {
        assert_eq!(FunctionCategory::Hole.short_name(3), "phi3");
        assert_eq!(FunctionCategory::Particle.short_name(0), "tau0");
        assert_eq!(FunctionCategory::Mixed.short_name(1), "t1");
        assert_eq!(FunctionCategory::Response.short_name(2), "x2");
        assert_eq!(FunctionCategory::Undefined.short_name(7), "f7");
    }

    #[test]
    fn set_indexing_respects_offset() {
        let set = FunctionSet::with_offset(
            vec![f(vec![1.0]), f(vec![2.0])],
            FunctionCategory::Hole,
            2,
        );
        assert_eq!(set.len(), 2);
        assert!(set.get(0).is_none());
        assert_eq!(set.get(2).unwrap().name(), "phi2");
        assert_eq!(set.get(3).unwrap().name(), "phi3");
        let indices: Vec<usize> = set.iter().map(|t| t.index).collect();
        assert_eq!(indices, vec![2, 3]);
    }

    #[test]
    fn member_iterator_is_cloneable() {
        let set = FunctionSet::from_functions(
            vec![f(vec![1.0]), f(vec![2.0])],
            FunctionCategory::Hole,
        );
        let it = set.iter();
        let first: Vec<String> = it.clone().map(|t| t.name()).collect();
        let second: Vec<String> = it.map(|t| t.name()).collect();
        assert_eq!(first, second);
        assert_eq!(first, vec!["phi0", "phi1"]);
    }

    #[test]
    fn insert_replaces_by_index() {
        let mut set = FunctionSet::from_functions(vec![f(vec![1.0])], FunctionCategory::Particle);
        set.insert(TaggedFunction::new(
            f(vec![5.0]),
            0,
            FunctionCategory::Particle,
        ));
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(0).unwrap().function.values()[0], 5.0);
    }

    #[test]
    #[should_panic(expected = "cannot insert")]
    fn insert_with_mismatched_category_is_fatal() {
        let mut set = FunctionSet::<GridFunction>::new(FunctionCategory::Hole);
        set.insert(TaggedFunction::new(
            f(vec![1.0]),
            0,
            FunctionCategory::Response,
        ));
    }
}
