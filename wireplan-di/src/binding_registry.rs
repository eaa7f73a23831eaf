//! Canonicalization of raw binding declarations. The [BindingRegistry] expands multi-contract
//! declarations into one [Binding] per contract and lazily specializes generic bindings against
//! the closed types actually requested by the graph.

use crate::binding::{Binding, BindingId, BindingKey, FactoryDescriptor, Implementation};
use crate::diagnostic::{log_id, Diagnostic};
use crate::node::Injection;
use crate::oracle::{is_open, TypeOracle};
use crate::setup::{FallbackDescriptor, RawBinding, Setup};
use crate::types::{Lifetime, Substitution, Tag, TypeRef};
use fxhash::FxHashMap;
use itertools::Itertools;
use tracing::{debug, trace, warn};

type SubstitutionKey = Vec<(String, TypeRef)>;

fn substitution_key(substitution: &Substitution) -> SubstitutionKey {
    substitution
        .iter()
        .map(|(marker, ty)| (marker.clone(), ty.clone()))
        .sorted()
        .collect_vec()
}

/// Registry of canonical bindings of a single setup.
#[derive(Clone, Debug, Default)]
pub struct BindingRegistry {
    bindings: Vec<Binding>,
    declared: usize,
    keys: FxHashMap<(usize, SubstitutionKey), BindingKey>,
    specializations: FxHashMap<(BindingId, SubstitutionKey), BindingId>,
    fallback_bindings: FxHashMap<(String, Injection), BindingId>,
    diagnostics: Vec<Diagnostic>,
}

impl BindingRegistry {
    /// Canonicalizes all bindings declared by the setup, in declaration order.
    pub fn register(setup: &Setup, oracle: &dyn TypeOracle) -> Self {
        let mut registry = Self::default();

        for (declaration, raw) in setup.bindings.iter().enumerate() {
            let contracts = Self::contracts(raw);
            if contracts.is_empty() {
                debug!(
                    "Skipping declaration {} without any contract in {}.",
                    declaration, setup.name
                );
                continue;
            }

            let key = registry.key_for(declaration, &Default::default());
            for contract in contracts {
                registry.push(Binding {
                    id: BindingId(registry.bindings.len()),
                    key,
                    declaration,
                    contract,
                    tags: raw.tags.clone(),
                    lifetime: raw.lifetime.unwrap_or_default(),
                    implementation: raw.implementation.clone(),
                    location: raw.location.clone(),
                    specialized_from: None,
                });
            }
        }

        registry.declared = registry.bindings.len();
        registry.report_overrides(oracle);

        debug!(
            "Registered {} bindings for {}.",
            registry.declared, setup.name
        );

        registry
    }

    fn contracts(raw: &RawBinding) -> Vec<TypeRef> {
        if !raw.contracts.is_empty() {
            return raw.contracts.iter().cloned().unique().collect();
        }

        match &raw.implementation {
            Implementation::Constructor(descriptor) => [descriptor.ty.clone()]
                .into_iter()
                .chain(descriptor.base_types.iter().cloned())
                .unique()
                .collect(),
            Implementation::Factory(factory) => vec![factory.ty.clone()],
            Implementation::Arg(arg) => vec![arg.ty.clone()],
            Implementation::Construct(_) => vec![],
        }
    }

    fn key_for(&mut self, declaration: usize, substitution: &Substitution) -> BindingKey {
        let next = BindingKey(self.keys.len());
        *self
            .keys
            .entry((declaration, substitution_key(substitution)))
            .or_insert(next)
    }

    fn push(&mut self, binding: Binding) -> BindingId {
        let id = binding.id;
        self.bindings.push(binding);
        id
    }

    fn report_overrides(&mut self, oracle: &dyn TypeOracle) {
        let mut seen: FxHashMap<(TypeRef, Vec<Tag>), BindingId> = FxHashMap::default();
        for binding in self.bindings.iter().filter(|binding| !is_open(oracle, &binding.contract)) {
            let tags = binding.tags.iter().cloned().sorted().collect_vec();
            if let Some(previous) = seen.insert((binding.contract.clone(), tags), binding.id) {
                let previous = &self.bindings[previous.0];
                if previous.declaration == binding.declaration {
                    continue;
                }

                warn!(
                    "Binding of {} at {} overrides the one at {}.",
                    binding.contract, binding.location, previous.location
                );
                self.diagnostics.push(Diagnostic::warning(
                    log_id::WARNING_OVERRIDDEN_BINDING,
                    format!(
                        "The binding of {} has been overridden by a later binding.",
                        previous.contract
                    ),
                    previous.location.clone(),
                ));
            }
        }
    }

    /// All bindings, including specialized and synthesized ones.
    #[inline]
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Bindings declared directly by the setup.
    #[inline]
    pub fn declared_bindings(&self) -> &[Binding] {
        &self.bindings[..self.declared]
    }

    #[inline]
    pub fn binding(&self, id: BindingId) -> &Binding {
        &self.bindings[id.0]
    }

    /// Warnings produced while registering.
    #[inline]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Checks if the binding still contains unspecialized generic markers.
    pub fn is_generic(&self, id: BindingId, oracle: &dyn TypeOracle) -> bool {
        is_open(oracle, &self.binding(id).contract)
    }

    /// Returns a binding with markers of `id` replaced according to the substitution. Repeated
    /// specializations with the same substitution return the same binding.
    pub fn specialize(&mut self, id: BindingId, substitution: &Substitution) -> BindingId {
        let cache_key = (id, substitution_key(substitution));
        if let Some(specialized) = self.specializations.get(&cache_key) {
            return *specialized;
        }

        let source = self.binding(id).clone();
        let key = self.key_for(source.declaration, substitution);
        let specialized = self.push(Binding {
            id: BindingId(self.bindings.len()),
            key,
            declaration: source.declaration,
            contract: source.contract.substitute(substitution),
            tags: source.tags.clone(),
            lifetime: source.lifetime,
            implementation: source.implementation.substitute(substitution),
            location: source.location.clone(),
            specialized_from: Some(id),
        });

        trace!(
            "Specialized {} as {}.",
            source.contract,
            self.binding(specialized).contract
        );

        self.specializations.insert(cache_key, specialized);
        specialized
    }

    /// Returns a transient factory binding which delegates the request to a fallback handler.
    pub fn fallback_binding(
        &mut self,
        handler: &FallbackDescriptor,
        injection: &Injection,
    ) -> BindingId {
        let cache_key = (handler.name.clone(), injection.clone());
        if let Some(binding) = self.fallback_bindings.get(&cache_key) {
            return *binding;
        }

        let declaration = usize::MAX - self.fallback_bindings.len();
        let key = self.key_for(declaration, &Default::default());
        let binding = self.push(Binding {
            id: BindingId(self.bindings.len()),
            key,
            declaration,
            contract: injection.ty.clone(),
            tags: vec![injection.tag.clone()],
            lifetime: Lifetime::Transient,
            implementation: Implementation::Factory(FactoryDescriptor {
                is_fallback: true,
                ..FactoryDescriptor::new(handler.name.clone(), injection.ty.clone())
            }),
            location: handler.location.clone(),
            specialized_from: None,
        });

        self.fallback_bindings.insert(cache_key, binding);
        binding
    }
}
