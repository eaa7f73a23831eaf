//! Compile-time value slots and the ordered plans built from them by the
//! [CodeGraphWalker](crate::walker::CodeGraphWalker).

use crate::binding::BindingKey;
use crate::materialization::MaterializationStep;
use crate::node::{Injection, NodeId};
use fxhash::FxHashMap;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct VariableId(pub usize);

/// One constructed or cached value.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct Variable {
    pub id: VariableId,
    pub node: NodeId,
    /// The injection which produced this variable.
    pub injection: Injection,
    /// Backed by composition-level storage (singletons, scoped instances and args).
    pub is_declared: bool,
    /// The value is already available at this point of the current root.
    pub is_created: bool,
    pub is_block_root: bool,
    /// Storage this variable refers to instead of holding its own value.
    pub link: Option<VariableId>,
}

impl Variable {
    /// Variable holding the actual value.
    #[inline]
    pub fn storage(&self) -> VariableId {
        self.link.unwrap_or(self.id)
    }
}

/// Lookup key of reusable variables.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum VariableKey {
    /// Singleton, scoped, per-resolve or arg storage.
    Binding(BindingKey),
    /// Transient or per-block value shared by every use within one block.
    Hoisted {
        binding: BindingKey,
        block: VariableId,
    },
}

/// Owned arena of all variables created while walking a composition. The walker mutates it in
/// place; cloning gives a snapshot which can be restored later.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct VariableArena {
    variables: Vec<Variable>,
    map: FxHashMap<VariableKey, VariableId>,
}

impl VariableArena {
    #[inline]
    pub fn variable(&self, id: VariableId) -> &Variable {
        &self.variables[id.0]
    }

    #[inline]
    pub(crate) fn variable_mut(&mut self, id: VariableId) -> &mut Variable {
        &mut self.variables[id.0]
    }

    #[inline]
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// Returns the variable currently mapped for a key.
    #[inline]
    pub fn lookup(&self, key: &VariableKey) -> Option<VariableId> {
        self.map.get(key).copied()
    }

    /// Checks if any variable is mapped for given binding storage.
    #[inline]
    pub fn contains(&self, binding: BindingKey) -> bool {
        self.map.contains_key(&VariableKey::Binding(binding))
    }

    pub(crate) fn allocate(
        &mut self,
        node: NodeId,
        injection: Injection,
        link: Option<VariableId>,
    ) -> VariableId {
        let id = VariableId(self.variables.len());
        self.variables.push(Variable {
            id,
            node,
            injection,
            is_declared: false,
            is_created: false,
            is_block_root: false,
            link,
        });

        id
    }

    pub(crate) fn insert(&mut self, key: VariableKey, variable: VariableId) {
        self.map.insert(key, variable);
    }

    /// Removes mappings for which `retain` returns false and marks every remaining variable as not
    /// yet created.
    pub(crate) fn evict(&mut self, retain: impl Fn(&Variable) -> bool) {
        let variables = &self.variables;
        self.map.retain(|_, id| retain(&variables[id.0]));

        let remaining = self.map.values().copied().collect::<Vec<_>>();
        for id in remaining {
            self.variables[id.0].is_created = false;
        }
    }
}

/// Variable passed to an instantiation for one of its slots.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct Argument {
    pub slot: usize,
    pub injection: Injection,
    pub variable: VariableId,
}

/// Creation of one variable from already created arguments.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct Instantiation {
    pub target: VariableId,
    pub arguments: Vec<Argument>,
}

impl Instantiation {
    /// Returns the variable passed for given slot, if the slot was resolved.
    pub fn argument(&self, slot: usize) -> Option<VariableId> {
        self.arguments
            .iter()
            .find(|argument| argument.slot == slot)
            .map(|argument| argument.variable)
    }
}

/// Dependency-first sequence of instantiations creating one block root.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct Block {
    pub root: VariableId,
    pub instantiations: Vec<Instantiation>,
    pub steps: Vec<MaterializationStep>,
}

/// Ordered blocks of a single composition root. Blocks come in dependency-first order, so the last
/// one creates the root variable.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct RootPlan {
    pub name: String,
    pub variable: VariableId,
    pub blocks: Vec<Block>,
}
