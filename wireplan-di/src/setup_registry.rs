//! Static discovery of setups. Crates declare setups by submitting an
//! [internal::SetupRegisterer]:
//!
//! ```
//! use wireplan_di::setup::Setup;
//! use wireplan_di::setup_registry::internal::{submit, SetupRegisterer};
//!
//! fn composition() -> Setup {
//!     Setup::new("Composition")
//! }
//!
//! submit! {
//!     SetupRegisterer { register: composition }
//! }
//! # fn main() {}
//! ```

use crate::setup::{CompositionKind, Setup};
use fxhash::FxHashMap;
use itertools::Itertools;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Clone, Eq, PartialEq, Debug)]
pub enum SetupRegistryError {
    #[error("Attempted to register a duplicated setup with name: {0}")]
    DuplicateSetupName(String),
}

/// Source of setups to compile.
pub trait SetupRegistry {
    /// Returns a setup with given name.
    fn setup(&self, name: &str) -> Option<&Setup>;

    /// Returns all global setups, ordered by name.
    fn globals(&self) -> Vec<&Setup>;

    /// Returns all non-global setups, ordered by name.
    fn compositions(&self) -> Vec<&Setup>;
}

/// Registry of setups initialized from statically submitted registerers.
#[derive(Clone, Debug, Default)]
pub struct StaticSetupRegistry {
    setups: FxHashMap<String, Setup>,
}

impl StaticSetupRegistry {
    pub fn new() -> Result<Self, SetupRegistryError> {
        Self::from_setups(
            inventory::iter::<internal::SetupRegisterer>
                .into_iter()
                .map(|registerer| (registerer.register)()),
        )
    }

    /// Creates a registry from explicitly given setups.
    pub fn from_setups(setups: impl IntoIterator<Item = Setup>) -> Result<Self, SetupRegistryError> {
        let mut registry = Self::default();
        for setup in setups {
            registry.register(setup)?;
        }

        debug!("Registered {} setup(s).", registry.setups.len());
        Ok(registry)
    }

    pub fn register(&mut self, setup: Setup) -> Result<(), SetupRegistryError> {
        if self.setups.contains_key(&setup.name) {
            return Err(SetupRegistryError::DuplicateSetupName(setup.name));
        }

        self.setups.insert(setup.name.clone(), setup);
        Ok(())
    }

    fn by_kind(&self, global: bool) -> Vec<&Setup> {
        self.setups
            .values()
            .filter(|setup| (setup.kind == CompositionKind::Global) == global)
            .sorted_by(|lhs, rhs| lhs.name.cmp(&rhs.name))
            .collect()
    }
}

impl SetupRegistry for StaticSetupRegistry {
    #[inline]
    fn setup(&self, name: &str) -> Option<&Setup> {
        self.setups.get(name)
    }

    fn globals(&self) -> Vec<&Setup> {
        self.by_kind(true)
    }

    fn compositions(&self) -> Vec<&Setup> {
        self.by_kind(false)
    }
}

#[doc(hidden)]
pub mod internal {
    use crate::setup::Setup;
    use inventory::collect;
    pub use inventory::submit;

    pub struct SetupRegisterer {
        pub register: fn() -> Setup,
    }

    collect!(SetupRegisterer);
}

#[cfg(test)]
mod tests {
    use crate::setup::{CompositionKind, Setup};
    use crate::setup_registry::internal::{submit, SetupRegisterer};
    use crate::setup_registry::{SetupRegistry, SetupRegistryError, StaticSetupRegistry};

    fn registered_composition() -> Setup {
        Setup::new("RegisteredComposition")
    }

    submit! {
        SetupRegisterer {
            register: registered_composition
        }
    }

    #[test]
    fn should_collect_submitted_setups() {
        let registry = StaticSetupRegistry::new().unwrap();

        assert!(registry.setup("RegisteredComposition").is_some());
    }

    #[test]
    fn should_reject_duplicate_names() {
        let result = StaticSetupRegistry::from_setups([Setup::new("A"), Setup::new("A")]);

        assert_eq!(
            result.unwrap_err(),
            SetupRegistryError::DuplicateSetupName("A".to_string())
        );
    }

    #[test]
    fn should_split_globals_from_compositions() {
        let registry = StaticSetupRegistry::from_setups([
            Setup::new("B"),
            Setup::new("Global").with_kind(CompositionKind::Global),
            Setup::new("A"),
        ])
        .unwrap();

        let names = registry
            .compositions()
            .iter()
            .map(|setup| setup.name.clone())
            .collect::<Vec<_>>();

        assert_eq!(names, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(registry.globals().len(), 1);
    }
}
