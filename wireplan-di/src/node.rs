//! Dependency nodes - concrete ways of satisfying bindings. A binding with multiple constructors
//! owns multiple ranked nodes (variants), while factories, args and constructs always own exactly
//! one.

use crate::binding::{BindingId, BindingKey, ConstructKind};
use crate::types::{Accessibility, Lifetime, Location, Tag, TypeRef};
use std::fmt::{Display, Formatter};

/// Index of a node within a [DependencyGraph](crate::graph::DependencyGraph).
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct NodeId(pub usize);

/// Request for a (contract, tag) pair made by a node member.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct Injection {
    pub ty: TypeRef,
    pub tag: Tag,
}

impl Injection {
    pub fn new(ty: TypeRef, tag: Tag) -> Self {
        Self { ty, tag }
    }

    pub fn untagged(ty: TypeRef) -> Self {
        Self::new(ty, Tag::Untagged)
    }
}

impl Display for Injection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.tag {
            Tag::Untagged => write!(f, "{}", self.ty),
            tag => write!(f, "{}({})", self.ty, tag),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct DpParameter {
    pub name: String,
    pub injection: Injection,
    pub has_default: bool,
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct DpMethod {
    pub name: String,
    pub accessibility: Accessibility,
    pub ordinal: Option<i64>,
    pub parameters: Vec<DpParameter>,
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct DpField {
    pub name: String,
    pub ordinal: Option<i64>,
    pub is_required: bool,
    pub injection: Injection,
    /// Discovery position among all injected members.
    pub position: usize,
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct DpProperty {
    pub name: String,
    pub ordinal: Option<i64>,
    /// Required and init-only properties must be supplied at construction.
    pub is_required: bool,
    pub injection: Injection,
    pub position: usize,
}

/// One constructor of an implementation type together with its injected members.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct DpImplementation {
    pub ty: TypeRef,
    pub constructor: DpMethod,
    pub methods: Vec<DpMethod>,
    pub fields: Vec<DpField>,
    pub properties: Vec<DpProperty>,
}

impl DpImplementation {
    /// Total number of injections made by this implementation.
    pub fn injection_count(&self) -> usize {
        self.constructor.parameters.len()
            + self.fields.len()
            + self.properties.len()
            + self
                .methods
                .iter()
                .map(|method| method.parameters.len())
                .sum::<usize>()
    }
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct DpFactory {
    pub name: String,
    pub ty: TypeRef,
    pub injections: Vec<Injection>,
    pub deferred: bool,
    pub is_fallback: bool,
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct DpArg {
    pub name: String,
    pub ty: TypeRef,
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct DpConstruct {
    pub kind: ConstructKind,
    pub ty: TypeRef,
    /// Collection items, each pinned to the binding it was gathered from.
    pub items: Vec<(Injection, BindingId)>,
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum NodeKind {
    Implementation(DpImplementation),
    Factory(DpFactory),
    Arg(DpArg),
    Construct(DpConstruct),
}

/// Positional injection made by a node.
#[derive(Copy, Clone, Debug)]
pub struct InjectionSlot<'a> {
    pub index: usize,
    pub injection: &'a Injection,
    /// Optional slots can stay unresolved, e.g. parameters with default values.
    pub is_optional: bool,
    pub pinned: Option<BindingId>,
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct DependencyNode {
    pub id: NodeId,
    pub binding: BindingId,
    pub key: BindingKey,
    /// Rank of this node among the variants of its binding. 0 is the primary one.
    pub variant: usize,
    pub lifetime: Lifetime,
    pub contract: TypeRef,
    pub kind: NodeKind,
    pub location: Location,
}

impl DependencyNode {
    /// Returns all injections in slot order: constructor parameters, fields, properties and method
    /// parameters for implementations.
    pub fn slots(&self) -> Vec<InjectionSlot<'_>> {
        let mut slots: Vec<(&Injection, bool, Option<BindingId>)> = vec![];

        match &self.kind {
            NodeKind::Implementation(implementation) => {
                slots.extend(
                    implementation
                        .constructor
                        .parameters
                        .iter()
                        .map(|parameter| (&parameter.injection, parameter.has_default, None)),
                );
                slots.extend(
                    implementation
                        .fields
                        .iter()
                        .map(|field| (&field.injection, false, None)),
                );
                slots.extend(
                    implementation
                        .properties
                        .iter()
                        .map(|property| (&property.injection, false, None)),
                );
                slots.extend(
                    implementation
                        .methods
                        .iter()
                        .flat_map(|method| method.parameters.iter())
                        .map(|parameter| (&parameter.injection, parameter.has_default, None)),
                );
            }
            NodeKind::Factory(factory) => {
                slots.extend(
                    factory
                        .injections
                        .iter()
                        .map(|injection| (injection, false, None)),
                );
            }
            NodeKind::Construct(construct) => {
                slots.extend(
                    construct
                        .items
                        .iter()
                        .map(|(injection, binding)| (injection, false, Some(*binding))),
                );
            }
            NodeKind::Arg(_) => {}
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(index, (injection, is_optional, pinned))| InjectionSlot {
                index,
                injection,
                is_optional,
                pinned,
            })
            .collect()
    }

    pub fn instance_type(&self) -> &TypeRef {
        match &self.kind {
            NodeKind::Implementation(implementation) => &implementation.ty,
            NodeKind::Factory(factory) => &factory.ty,
            NodeKind::Arg(arg) => &arg.ty,
            NodeKind::Construct(construct) => &construct.ty,
        }
    }

    #[inline]
    pub fn is_factory(&self) -> bool {
        matches!(self.kind, NodeKind::Factory(_))
    }

    /// Dependencies of deferred factories are resolved lazily, which breaks dependency cycles.
    #[inline]
    pub fn is_deferred(&self) -> bool {
        matches!(&self.kind, NodeKind::Factory(factory) if factory.deferred)
    }

    #[inline]
    pub fn is_arg(&self) -> bool {
        matches!(self.kind, NodeKind::Arg(_))
    }

    pub fn construct_kind(&self) -> Option<ConstructKind> {
        match &self.kind {
            NodeKind::Construct(construct) => Some(construct.kind),
            _ => None,
        }
    }
}

impl Display for DependencyNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.instance_type())
    }
}
