//! Type matching is delegated to a [TypeOracle] supplied by the host, which usually has access to
//! real semantic information about the compiled program. The compiler treats it as a black box.
//!
//! [StructuralTypeOracle] is a simple default implementation working on type names: a type is
//! assignable to itself and to its declared base types, and generic markers unify with any
//! concrete type.

use crate::types::{Substitution, TypeRef};
use fxhash::{FxHashMap, FxHashSet};
#[cfg(test)]
use mockall::automock;

#[cfg(not(feature = "threadsafe"))]
pub type TypeOraclePtr = Box<dyn TypeOracle>;
#[cfg(feature = "threadsafe")]
pub type TypeOraclePtr = Box<dyn TypeOracle + Send + Sync>;

/// Answers type compatibility questions during compilation.
#[cfg_attr(test, automock)]
pub trait TypeOracle {
    /// Checks if an instance of `concrete` can be used where `requested` is expected.
    fn is_assignable(&self, concrete: &TypeRef, requested: &TypeRef) -> bool;

    /// Tries to instantiate open markers of `open` so it becomes equal to `closed`. Returns the
    /// marker assignments on success.
    fn unify(&self, open: &TypeRef, closed: &TypeRef) -> Option<Substitution>;

    /// Checks if given type is a generic marker.
    fn is_marker(&self, ty: &TypeRef) -> bool;
}

/// Checks if given type contains any generic marker.
pub fn is_open(oracle: &dyn TypeOracle, ty: &TypeRef) -> bool {
    ty.any(&|ty| oracle.is_marker(ty))
}

/// Name-based [TypeOracle].
#[derive(Clone, Debug)]
pub struct StructuralTypeOracle {
    markers: FxHashSet<String>,
    base_types: FxHashMap<TypeRef, Vec<TypeRef>>,
}

impl Default for StructuralTypeOracle {
    fn default() -> Self {
        Self {
            markers: ["TT".to_string()]
                .into_iter()
                .chain((1..=9).map(|index| format!("TT{index}")))
                .collect(),
            base_types: Default::default(),
        }
    }
}

impl StructuralTypeOracle {
    /// Registers an additional generic marker name.
    pub fn with_marker<T: ToString>(mut self, name: T) -> Self {
        self.markers.insert(name.to_string());
        self
    }

    /// Declares base types for a concrete type, making it assignable to them.
    pub fn with_base_types(
        mut self,
        ty: TypeRef,
        base_types: impl IntoIterator<Item = TypeRef>,
    ) -> Self {
        self.base_types.entry(ty).or_default().extend(base_types);
        self
    }

    fn unify_into(
        &self,
        open: &TypeRef,
        closed: &TypeRef,
        substitution: &mut Substitution,
    ) -> bool {
        if self.is_marker(open) {
            return match substitution.get(&open.name) {
                Some(existing) => existing == closed,
                None => {
                    substitution.insert(open.name.clone(), closed.clone());
                    true
                }
            };
        }

        open.name == closed.name
            && open.args.len() == closed.args.len()
            && open
                .args
                .iter()
                .zip(&closed.args)
                .all(|(open, closed)| self.unify_into(open, closed, substitution))
    }
}

impl TypeOracle for StructuralTypeOracle {
    fn is_assignable(&self, concrete: &TypeRef, requested: &TypeRef) -> bool {
        let mut pending = vec![concrete];
        let mut seen = FxHashSet::default();

        while let Some(current) = pending.pop() {
            if current == requested {
                return true;
            }

            if !seen.insert(current) {
                continue;
            }

            if let Some(base_types) = self.base_types.get(current) {
                pending.extend(base_types);
            }
        }

        false
    }

    fn unify(&self, open: &TypeRef, closed: &TypeRef) -> Option<Substitution> {
        let mut substitution = Substitution::default();
        if self.unify_into(open, closed, &mut substitution) {
            Some(substitution)
        } else {
            None
        }
    }

    #[inline]
    fn is_marker(&self, ty: &TypeRef) -> bool {
        ty.args.is_empty() && self.markers.contains(&ty.name)
    }
}
