//! Canonical bindings. A [Binding] maps a single contract type (with tags) to an
//! [Implementation] and a [Lifetime]. Bindings are produced by the
//! [BindingRegistry](crate::binding_registry::BindingRegistry) from raw setup declarations.

use crate::metadata::TypeDescriptor;
use crate::types::{Lifetime, Location, Substitution, Tag, TypeRef};

/// Index of a binding within its registry.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct BindingId(pub usize);

/// Storage identity of instances created from a binding. Contracts expanded from one declaration
/// share the key, so a singleton bound to multiple contracts is still created once.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct BindingKey(pub usize);

/// Dependency requested by a factory.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct FactoryInjection {
    pub ty: TypeRef,
    pub tag: Tag,
}

impl FactoryInjection {
    pub fn new(ty: TypeRef, tag: Tag) -> Self {
        Self { ty, tag }
    }
}

/// User-supplied factory producing instances of `ty`.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct FactoryDescriptor {
    pub name: String,
    pub ty: TypeRef,
    pub injections: Vec<FactoryInjection>,
    /// Deferred factories only resolve their dependencies when the produced value is invoked
    /// (e.g. `Func<T>`), which makes them an indirection boundary for cycle detection.
    pub deferred: bool,
    /// Synthesized from a fallback handler.
    pub is_fallback: bool,
}

impl FactoryDescriptor {
    pub fn new<T: Into<String>>(name: T, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            injections: vec![],
            deferred: false,
            is_fallback: false,
        }
    }

    pub fn with_injection(mut self, ty: TypeRef, tag: Tag) -> Self {
        self.injections.push(FactoryInjection::new(ty, tag));
        self
    }

    pub fn deferred(mut self) -> Self {
        self.deferred = true;
        self
    }

    fn substitute(&self, substitution: &Substitution) -> Self {
        Self {
            ty: self.ty.substitute(substitution),
            injections: self
                .injections
                .iter()
                .map(|injection| {
                    FactoryInjection::new(injection.ty.substitute(substitution), injection.tag.clone())
                })
                .collect(),
            ..self.clone()
        }
    }
}

/// Value passed from the outside when creating the composition or calling a root.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct ArgDescriptor {
    pub name: String,
    pub ty: TypeRef,
}

impl ArgDescriptor {
    pub fn new<T: Into<String>>(name: T, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Built-in constructs, which are created by the compiler itself rather than user code.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum ConstructKind {
    /// Lazily evaluated sequence of all bindings of the element type.
    Enumerable,
    /// Array of all bindings of the element type.
    Array,
    /// Stack-allocated span of all bindings of the element type.
    Span,
    /// The composition instance itself.
    Composition,
    /// Runtime fallback used instead of failing compilation on unresolved dependencies.
    OnCannotResolve,
}

impl ConstructKind {
    /// Collection constructs gather every binding of their element type.
    #[inline]
    pub fn is_collection(self) -> bool {
        matches!(
            self,
            ConstructKind::Enumerable | ConstructKind::Array | ConstructKind::Span
        )
    }
}

/// The way instances of a binding are created.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum Implementation {
    Constructor(TypeDescriptor),
    Factory(FactoryDescriptor),
    Arg(ArgDescriptor),
    Construct(ConstructKind),
}

impl Implementation {
    pub(crate) fn substitute(&self, substitution: &Substitution) -> Self {
        match self {
            Implementation::Constructor(descriptor) => {
                Implementation::Constructor(descriptor.substitute(substitution))
            }
            Implementation::Factory(factory) => {
                Implementation::Factory(factory.substitute(substitution))
            }
            Implementation::Arg(arg) => Implementation::Arg(ArgDescriptor {
                name: arg.name.clone(),
                ty: arg.ty.substitute(substitution),
            }),
            Implementation::Construct(kind) => Implementation::Construct(*kind),
        }
    }
}

/// Canonical binding of one contract.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Binding {
    pub id: BindingId,
    pub key: BindingKey,
    /// Index of the declaration this binding was expanded from.
    pub declaration: usize,
    pub contract: TypeRef,
    /// Tags this binding answers to. Empty means untagged.
    pub tags: Vec<Tag>,
    pub lifetime: Lifetime,
    pub implementation: Implementation,
    pub location: Location,
    /// Set for bindings created by specializing a generic binding.
    pub specialized_from: Option<BindingId>,
}

impl Binding {
    /// Type of the created instances, which can differ from the contract.
    pub fn instance_type(&self) -> &TypeRef {
        match &self.implementation {
            Implementation::Constructor(descriptor) => &descriptor.ty,
            Implementation::Factory(factory) => &factory.ty,
            Implementation::Arg(arg) => &arg.ty,
            Implementation::Construct(_) => &self.contract,
        }
    }

    #[inline]
    pub fn is_arg(&self) -> bool {
        matches!(self.implementation, Implementation::Arg(_))
    }

    /// Ranks how well this binding's tags match a requested tag: 0 for the specific tag, 1 for a
    /// wildcard and 2 for an untagged default. `None` means the binding doesn't match.
    pub fn tag_rank(&self, requested: &Tag) -> Option<u8> {
        let untagged = self.tags.is_empty() || self.tags.contains(&Tag::Untagged);
        if self.tags.contains(requested) || (untagged && *requested == Tag::Untagged) {
            Some(0)
        } else if self.tags.contains(&Tag::Any) {
            Some(1)
        } else if untagged {
            Some(2)
        } else {
            None
        }
    }
}
