//! [Setup] is the canonical input of the compiler: raw binding declarations, composition roots and
//! auxiliary metadata describing a single composition.

use crate::binding::Implementation;
use crate::metadata::AttributeSpec;
use crate::types::{Lifetime, Location, Tag, TypeRef};
use std::collections::BTreeMap;

/// Name of the hint controlling thread-safety of generated code.
pub const THREAD_SAFE_HINT: &str = "ThreadSafe";

/// Kind of the generated composition.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum CompositionKind {
    #[default]
    Public,
    Internal,
    /// Global setups are merged into every other composition.
    Global,
}

/// Binding declaration before canonicalization. One declaration can bind multiple contracts.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct RawBinding {
    /// Contracts bound to the implementation. If empty, the implementation type and its base
    /// types are bound.
    pub contracts: Vec<TypeRef>,
    pub tags: Vec<Tag>,
    pub lifetime: Option<Lifetime>,
    pub implementation: Implementation,
    pub location: Location,
}

impl RawBinding {
    pub fn new(contracts: impl IntoIterator<Item = TypeRef>, implementation: Implementation) -> Self {
        Self {
            contracts: contracts.into_iter().collect(),
            tags: vec![],
            lifetime: None,
            implementation,
            location: Default::default(),
        }
    }

    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tags.push(tag);
        self
    }

    pub fn with_lifetime(mut self, lifetime: Lifetime) -> Self {
        self.lifetime = Some(lifetime);
        self
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = location;
        self
    }
}

/// Opaque flags describing how a root should be exposed. Only the emitter interprets them.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct RootKind {
    pub is_public: bool,
    pub is_static: bool,
    pub is_method: bool,
    pub is_partial: bool,
}

impl Default for RootKind {
    fn default() -> Self {
        Self {
            is_public: true,
            is_static: false,
            is_method: false,
            is_partial: false,
        }
    }
}

/// Named resolution entry point.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct RootDescriptor {
    pub name: String,
    pub ty: TypeRef,
    pub tag: Tag,
    pub kind: RootKind,
    pub location: Location,
}

impl RootDescriptor {
    pub fn new<T: Into<String>>(name: T, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            tag: Tag::Untagged,
            kind: Default::default(),
            location: Default::default(),
        }
    }

    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tag = tag;
        self
    }

    pub fn with_kind(mut self, kind: RootKind) -> Self {
        self.kind = kind;
        self
    }
}

/// Side collection gathering created instances assignable to `captured`, e.g. disposables.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct Accumulator {
    pub name: String,
    pub captured: TypeRef,
    pub accumulator_type: TypeRef,
    pub lifetimes: Vec<Lifetime>,
    /// Root accumulators also capture instances with shared lifetimes.
    pub is_root: bool,
}

impl Accumulator {
    pub fn new<T: Into<String>>(
        name: T,
        captured: TypeRef,
        accumulator_type: TypeRef,
        lifetimes: impl IntoIterator<Item = Lifetime>,
    ) -> Self {
        Self {
            name: name.into(),
            captured,
            accumulator_type,
            lifetimes: lifetimes.into_iter().collect(),
            is_root: false,
        }
    }

    pub(crate) fn captures_lifetime(&self, lifetime: Lifetime) -> bool {
        self.lifetimes.contains(&lifetime) && (self.is_root || !lifetime.is_shared())
    }
}

/// Last-resort handler invoked at runtime for requests which no binding satisfies. A generic
/// marker as `ty` and [Tag::Any] as `tag` match everything.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct FallbackDescriptor {
    pub name: String,
    pub ty: TypeRef,
    pub tag: Tag,
    pub location: Location,
}

impl FallbackDescriptor {
    pub fn new<T: Into<String>>(name: T, ty: TypeRef, tag: Tag) -> Self {
        Self {
            name: name.into(),
            ty,
            tag,
            location: Default::default(),
        }
    }
}

/// Behavioral hints. Apart from [THREAD_SAFE_HINT], hints are passed untouched to the emitter.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct Hints {
    values: BTreeMap<String, String>,
}

impl Hints {
    pub fn set<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Generated code is thread-safe unless explicitly turned off.
    pub fn is_thread_safe(&self) -> bool {
        !matches!(self.get(THREAD_SAFE_HINT), Some(value) if value.eq_ignore_ascii_case("off"))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub(crate) fn merge(&mut self, other: &Hints) {
        self.values
            .extend(other.values.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
}

/// Declarative description of one composition.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct Setup {
    pub name: String,
    pub kind: CompositionKind,
    pub bindings: Vec<RawBinding>,
    pub roots: Vec<RootDescriptor>,
    pub hints: Hints,
    pub accumulators: Vec<Accumulator>,
    pub fallbacks: Vec<FallbackDescriptor>,
    pub attributes: Vec<AttributeSpec>,
    /// Names of other setups merged before this one.
    pub depends_on: Vec<String>,
    pub location: Location,
}

impl Setup {
    pub fn new<T: Into<String>>(name: T) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_kind(mut self, kind: CompositionKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_binding(mut self, binding: RawBinding) -> Self {
        self.bindings.push(binding);
        self
    }

    pub fn with_root(mut self, root: RootDescriptor) -> Self {
        self.roots.push(root);
        self
    }

    pub fn with_hint<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.hints.set(key, value);
        self
    }

    pub fn with_accumulator(mut self, accumulator: Accumulator) -> Self {
        self.accumulators.push(accumulator);
        self
    }

    pub fn with_fallback(mut self, fallback: FallbackDescriptor) -> Self {
        self.fallbacks.push(fallback);
        self
    }

    pub fn with_attribute(mut self, attribute: AttributeSpec) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn depends_on<T: Into<String>>(mut self, name: T) -> Self {
        self.depends_on.push(name.into());
        self
    }

    /// Appends declarations of `other` to this setup. Since later bindings and fallbacks win,
    /// declarations already present here take precedence only if merged last.
    pub(crate) fn merge_from(&mut self, other: &Setup) {
        self.bindings.extend(other.bindings.iter().cloned());
        self.roots.extend(other.roots.iter().cloned());
        self.hints.merge(&other.hints);
        self.accumulators.extend(other.accumulators.iter().cloned());
        self.fallbacks.extend(other.fallbacks.iter().cloned());
        self.attributes.extend(other.attributes.iter().cloned());
    }
}

#[cfg(test)]
mod tests {
    use crate::setup::{Accumulator, Hints, THREAD_SAFE_HINT};
    use crate::types::{Lifetime, TypeRef};

    #[test]
    fn should_default_to_thread_safe() {
        let mut hints = Hints::default();
        assert!(hints.is_thread_safe());

        hints.set(THREAD_SAFE_HINT, "Off");
        assert!(!hints.is_thread_safe());
    }

    #[test]
    fn should_filter_shared_lifetimes_for_non_root_accumulators() {
        let mut accumulator = Accumulator::new(
            "disposables",
            TypeRef::new("IDisposable"),
            TypeRef::new("Owned"),
            [Lifetime::Transient, Lifetime::Singleton],
        );

        assert!(accumulator.captures_lifetime(Lifetime::Transient));
        assert!(!accumulator.captures_lifetime(Lifetime::Singleton));
        assert!(!accumulator.captures_lifetime(Lifetime::PerBlock));

        accumulator.is_root = true;
        assert!(accumulator.captures_lifetime(Lifetime::Singleton));
    }
}
