//! Expansion of bindings into [DependencyNode]s. Implementation bindings produce one node per
//! usable constructor, ranked so that the first one is the primary variant.

use crate::binding::{Binding, Implementation};
use crate::error::CompileError;
use crate::metadata::{
    AttributeRole, AttributeSpec, AttributeUsage, AttributeValue, MethodDescriptor,
    ParameterDescriptor, TypeDescriptor,
};
use crate::node::{
    DependencyNode, DpArg, DpConstruct, DpFactory, DpField, DpImplementation, DpMethod,
    DpParameter, DpProperty, Injection, NodeId, NodeKind,
};
use crate::types::{Location, Tag, TypeRef};
use itertools::Itertools;
use std::cmp::Reverse;
use tracing::trace;

/// Builds dependency nodes using attribute specs declared by a setup.
#[derive(Clone, Debug, Default)]
pub struct DependencyNodeBuilder {
    attributes: Vec<AttributeSpec>,
}

struct Candidate {
    constructor: DpMethod,
    resolvable: usize,
}

impl DependencyNodeBuilder {
    pub fn new(attributes: Vec<AttributeSpec>) -> Self {
        Self { attributes }
    }

    /// Creates all nodes of a binding, starting at `first_id`. `can_resolve` tells if an
    /// injection has any candidate binding and is used to rank constructors.
    pub fn build(
        &self,
        binding: &Binding,
        first_id: NodeId,
        can_resolve: &dyn Fn(&Injection) -> bool,
    ) -> Result<Vec<DependencyNode>, Vec<CompileError>> {
        let kinds = match &binding.implementation {
            Implementation::Constructor(descriptor) => {
                self.build_implementations(descriptor, &binding.location, can_resolve)?
            }
            Implementation::Factory(factory) => vec![NodeKind::Factory(DpFactory {
                name: factory.name.clone(),
                ty: factory.ty.clone(),
                injections: factory
                    .injections
                    .iter()
                    .map(|injection| Injection::new(injection.ty.clone(), injection.tag.clone()))
                    .collect(),
                deferred: factory.deferred,
                is_fallback: factory.is_fallback,
            })],
            Implementation::Arg(arg) => vec![NodeKind::Arg(DpArg {
                name: arg.name.clone(),
                ty: arg.ty.clone(),
            })],
            Implementation::Construct(kind) => vec![NodeKind::Construct(DpConstruct {
                kind: *kind,
                ty: binding.contract.clone(),
                items: vec![],
            })],
        };

        trace!(
            "Built {} node(s) for {}.",
            kinds.len(),
            binding.instance_type()
        );

        Ok(kinds
            .into_iter()
            .enumerate()
            .map(|(variant, kind)| DependencyNode {
                id: NodeId(first_id.0 + variant),
                binding: binding.id,
                key: binding.key,
                variant,
                lifetime: binding.lifetime,
                contract: binding.contract.clone(),
                kind,
                location: binding.location.clone(),
            })
            .collect())
    }

    fn build_implementations(
        &self,
        descriptor: &TypeDescriptor,
        location: &Location,
        can_resolve: &dyn Fn(&Injection) -> bool,
    ) -> Result<Vec<NodeKind>, Vec<CompileError>> {
        if descriptor.is_abstract {
            return Err(vec![CompileError::AbstractImplementation {
                ty: descriptor.ty.clone(),
                location: location.clone(),
            }]);
        }

        let mut errors = vec![];

        let constructors = descriptor
            .constructors
            .iter()
            .filter(|constructor| constructor.accessibility.is_accessible() && !constructor.is_static)
            .filter_map(|constructor| {
                self.build_method(constructor, &descriptor.ty, location)
                    .map_err(|error| errors.push(error))
                    .ok()
            })
            .collect_vec();

        let members = self.build_members(descriptor, location);
        let (methods, fields, properties) = match members {
            Ok(members) => members,
            Err(mut member_errors) => {
                errors.append(&mut member_errors);
                Default::default()
            }
        };

        if !errors.is_empty() {
            return Err(errors);
        }

        if constructors.is_empty() {
            return Err(vec![CompileError::NoAccessibleConstructor {
                ty: descriptor.ty.clone(),
                location: location.clone(),
            }]);
        }

        Ok(Self::rank(constructors, can_resolve)
            .into_iter()
            .map(|constructor| {
                NodeKind::Implementation(DpImplementation {
                    ty: descriptor.ty.clone(),
                    constructor,
                    methods: methods.clone(),
                    fields: fields.clone(),
                    properties: properties.clone(),
                })
            })
            .collect())
    }

    fn rank(
        constructors: Vec<DpMethod>,
        can_resolve: &dyn Fn(&Injection) -> bool,
    ) -> Vec<DpMethod> {
        let candidates = constructors
            .into_iter()
            .map(|constructor| Candidate {
                resolvable: constructor
                    .parameters
                    .iter()
                    .filter(|parameter| can_resolve(&parameter.injection))
                    .count(),
                constructor,
            })
            .collect_vec();

        let ordered = candidates
            .iter()
            .any(|candidate| candidate.constructor.ordinal.is_some());

        if ordered {
            candidates
                .into_iter()
                .filter(|candidate| candidate.constructor.ordinal.is_some())
                .sorted_by_key(|candidate| {
                    (candidate.constructor.ordinal, Reverse(candidate.resolvable))
                })
                .map(|candidate| candidate.constructor)
                .collect()
        } else {
            candidates
                .into_iter()
                .sorted_by_key(|candidate| {
                    (
                        Reverse(candidate.resolvable),
                        Reverse(candidate.constructor.accessibility),
                    )
                })
                .map(|candidate| candidate.constructor)
                .collect()
        }
    }

    #[allow(clippy::type_complexity)]
    fn build_members(
        &self,
        descriptor: &TypeDescriptor,
        location: &Location,
    ) -> Result<(Vec<DpMethod>, Vec<DpField>, Vec<DpProperty>), Vec<CompileError>> {
        let mut errors = vec![];
        let mut position = 0;

        let mut fields = vec![];
        for field in descriptor
            .fields
            .iter()
            .filter(|field| field.accessibility.is_accessible() && !field.is_static && !field.is_read_only)
        {
            let result = self.ordinal(&field.attributes, &field.name, &descriptor.ty, location).and_then(
                |ordinal| {
                    self.injection(&field.ty, &field.attributes, &field.name, &descriptor.ty, location)
                        .map(|injection| (ordinal, injection))
                },
            );

            match result {
                Ok((ordinal, injection)) if ordinal.is_some() || field.is_required => {
                    fields.push(DpField {
                        name: field.name.clone(),
                        ordinal,
                        is_required: field.is_required,
                        injection,
                        position,
                    });
                    position += 1;
                }
                Ok(_) => {}
                Err(error) => errors.push(error),
            }
        }

        let mut properties = vec![];
        for property in descriptor.properties.iter().filter(|property| {
            property.accessibility.is_accessible() && !property.is_static && property.has_setter
        }) {
            let result = self
                .ordinal(&property.attributes, &property.name, &descriptor.ty, location)
                .and_then(|ordinal| {
                    self.injection(
                        &property.ty,
                        &property.attributes,
                        &property.name,
                        &descriptor.ty,
                        location,
                    )
                    .map(|injection| (ordinal, injection))
                });

            let is_required = property.is_required || property.is_init_only;
            match result {
                Ok((ordinal, injection)) if ordinal.is_some() || is_required => {
                    properties.push(DpProperty {
                        name: property.name.clone(),
                        ordinal,
                        is_required,
                        injection,
                        position,
                    });
                    position += 1;
                }
                Ok(_) => {}
                Err(error) => errors.push(error),
            }
        }

        let mut methods = vec![];
        for method in descriptor
            .methods
            .iter()
            .filter(|method| method.accessibility.is_accessible() && !method.is_static)
        {
            match self.build_method(method, &descriptor.ty, location) {
                Ok(method) if method.ordinal.is_some() => methods.push(method),
                Ok(_) => {}
                Err(error) => errors.push(error),
            }
        }

        if errors.is_empty() {
            Ok((methods, fields, properties))
        } else {
            Err(errors)
        }
    }

    fn build_method(
        &self,
        method: &MethodDescriptor,
        ty: &TypeRef,
        location: &Location,
    ) -> Result<DpMethod, CompileError> {
        Ok(DpMethod {
            name: method.name.clone(),
            accessibility: method.accessibility,
            ordinal: self.ordinal(&method.attributes, &method.name, ty, location)?,
            parameters: method
                .parameters
                .iter()
                .map(|parameter| self.build_parameter(parameter, ty, location))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn build_parameter(
        &self,
        parameter: &ParameterDescriptor,
        ty: &TypeRef,
        location: &Location,
    ) -> Result<DpParameter, CompileError> {
        Ok(DpParameter {
            name: parameter.name.clone(),
            injection: self.injection(
                &parameter.ty,
                &parameter.attributes,
                &parameter.name,
                ty,
                location,
            )?,
            has_default: parameter.has_default,
        })
    }

    fn ordinal(
        &self,
        attributes: &[AttributeUsage],
        member: &str,
        ty: &TypeRef,
        location: &Location,
    ) -> Result<Option<i64>, CompileError> {
        Ok(self
            .attribute_value(AttributeRole::Ordinal, attributes, member, ty, location)?
            .and_then(AttributeValue::as_ordinal))
    }

    fn injection(
        &self,
        member_type: &TypeRef,
        attributes: &[AttributeUsage],
        member: &str,
        ty: &TypeRef,
        location: &Location,
    ) -> Result<Injection, CompileError> {
        let injected_type = self
            .attribute_value(AttributeRole::Type, attributes, member, ty, location)?
            .and_then(AttributeValue::as_type)
            .unwrap_or(member_type)
            .clone();

        let tag = self
            .attribute_value(AttributeRole::Tag, attributes, member, ty, location)?
            .and_then(AttributeValue::as_tag)
            .unwrap_or(Tag::Untagged);

        Ok(Injection::new(injected_type, tag))
    }

    fn attribute_value<'u>(
        &self,
        role: AttributeRole,
        attributes: &'u [AttributeUsage],
        member: &str,
        ty: &TypeRef,
        location: &Location,
    ) -> Result<Option<&'u AttributeValue>, CompileError> {
        let matching = self
            .attributes
            .iter()
            .filter(|spec| spec.role == role)
            .flat_map(|spec| {
                attributes
                    .iter()
                    .filter(move |usage| usage.attribute_type == spec.attribute_type)
                    .map(move |usage| (spec, usage))
            })
            .collect_vec();

        match matching.as_slice() {
            [] => Ok(None),
            [(spec, usage)] => usage
                .args
                .get(spec.argument_position)
                .map(Some)
                .ok_or_else(|| CompileError::AttributePosition {
                    attribute: spec.attribute_type.clone(),
                    position: spec.argument_position,
                    count: usage.args.len(),
                    location: spec.location.clone(),
                }),
            _ => Err(CompileError::ConflictingAttributes {
                member: member.to_string(),
                ty: ty.clone(),
                location: location.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::binding::{
        ArgDescriptor, Binding, BindingId, BindingKey, ConstructKind, Implementation,
    };
    use crate::error::CompileError;
    use crate::metadata::{
        AttributeRole, AttributeSpec, AttributeUsage, AttributeValue, FieldDescriptor,
        MethodDescriptor, ParameterDescriptor, PropertyDescriptor, TypeDescriptor,
    };
    use crate::node::{NodeId, NodeKind};
    use crate::node_builder::DependencyNodeBuilder;
    use crate::types::{Accessibility, Lifetime, Tag, TypeRef};

    fn ty(name: &str) -> TypeRef {
        TypeRef::new(name)
    }

    fn ordinal_attribute(ordinal: i64) -> AttributeUsage {
        AttributeUsage::new(ty("Ordinal"), [AttributeValue::Int(ordinal)])
    }

    fn create_builder() -> DependencyNodeBuilder {
        DependencyNodeBuilder::new(vec![
            AttributeSpec::new(AttributeRole::Ordinal, ty("Ordinal")),
            AttributeSpec::new(AttributeRole::Tag, ty("Tag")),
            AttributeSpec::new(AttributeRole::Type, ty("Type")),
        ])
    }

    fn create_binding(implementation: Implementation) -> Binding {
        Binding {
            id: BindingId(0),
            key: BindingKey(0),
            declaration: 0,
            contract: ty("IService"),
            tags: vec![],
            lifetime: Lifetime::Transient,
            implementation,
            location: Default::default(),
            specialized_from: None,
        }
    }

    fn constructor(parameters: usize) -> MethodDescriptor {
        MethodDescriptor::constructor(
            (0..parameters).map(|index| ParameterDescriptor::new(format!("p{index}"), ty("Dep"))),
        )
    }

    fn parameter_counts(kinds: &[NodeKind]) -> Vec<usize> {
        kinds
            .iter()
            .map(|kind| match kind {
                NodeKind::Implementation(implementation) => {
                    implementation.constructor.parameters.len()
                }
                _ => panic!("expected an implementation"),
            })
            .collect()
    }

    #[test]
    fn should_rank_constructors_by_resolvable_count() {
        let binding = create_binding(Implementation::Constructor(
            TypeDescriptor::new(ty("Service")).with_constructors([
                constructor(2),
                constructor(1),
                constructor(3),
            ]),
        ));

        let nodes = create_builder()
            .build(&binding, NodeId(5), &|_| true)
            .unwrap();

        let kinds = nodes.iter().map(|node| node.kind.clone()).collect::<Vec<_>>();
        assert_eq!(parameter_counts(&kinds), vec![3, 2, 1]);
        assert_eq!(nodes[0].id, NodeId(5));
        assert_eq!(nodes[2].variant, 2);
    }

    #[test]
    fn should_prefer_ordinal_constructors() {
        let binding = create_binding(Implementation::Constructor(
            TypeDescriptor::new(ty("Service")).with_constructors([
                constructor(3),
                constructor(1).with_attribute(ordinal_attribute(2)),
                constructor(2).with_attribute(ordinal_attribute(1)),
            ]),
        ));

        let nodes = create_builder().build(&binding, NodeId(0), &|_| true).unwrap();

        let kinds = nodes.iter().map(|node| node.kind.clone()).collect::<Vec<_>>();
        assert_eq!(parameter_counts(&kinds), vec![2, 1]);
    }

    #[test]
    fn should_prefer_more_accessible_constructors_on_tie() {
        let binding = create_binding(Implementation::Constructor(
            TypeDescriptor::new(ty("Service")).with_constructors([
                constructor(1)
                    .with_accessibility(Accessibility::Internal)
                    .with_parameter(ParameterDescriptor::new("internal", ty("Internal"))),
                constructor(1).with_parameter(ParameterDescriptor::new("public", ty("Public"))),
                constructor(1).with_accessibility(Accessibility::Private),
            ]),
        ));

        let nodes = create_builder().build(&binding, NodeId(0), &|_| true).unwrap();

        assert_eq!(nodes.len(), 2);
        match &nodes[0].kind {
            NodeKind::Implementation(implementation) => {
                assert_eq!(implementation.constructor.accessibility, Accessibility::Public)
            }
            _ => panic!("expected an implementation"),
        }
    }

    #[test]
    fn should_report_abstract_implementation() {
        let binding = create_binding(Implementation::Constructor(TypeDescriptor::abstract_type(
            ty("Base"),
        )));

        let errors = create_builder()
            .build(&binding, NodeId(0), &|_| true)
            .unwrap_err();

        assert!(matches!(
            errors.as_slice(),
            [CompileError::AbstractImplementation { .. }]
        ));
    }

    #[test]
    fn should_report_missing_accessible_constructor() {
        let binding = create_binding(Implementation::Constructor(
            TypeDescriptor::new(ty("Service"))
                .with_constructors([constructor(0).with_accessibility(Accessibility::Private)]),
        ));

        let errors = create_builder()
            .build(&binding, NodeId(0), &|_| true)
            .unwrap_err();

        assert!(matches!(
            errors.as_slice(),
            [CompileError::NoAccessibleConstructor { .. }]
        ));
    }

    #[test]
    fn should_select_injected_members() {
        let binding = create_binding(Implementation::Constructor(
            TypeDescriptor::new(ty("Service"))
                .with_field(FieldDescriptor::new("ignored", ty("Dep")))
                .with_field(FieldDescriptor::new("required", ty("Dep")).required())
                .with_property(PropertyDescriptor::new("init", ty("Dep")).init_only())
                .with_property(
                    PropertyDescriptor::new("ordered", ty("Dep"))
                        .with_attribute(ordinal_attribute(3)),
                )
                .with_method(
                    MethodDescriptor::new("Initialize")
                        .with_attribute(ordinal_attribute(0))
                        .with_parameter(ParameterDescriptor::new("value", ty("Dep"))),
                )
                .with_method(MethodDescriptor::new("Ignored")),
        ));

        let nodes = create_builder().build(&binding, NodeId(0), &|_| true).unwrap();

        match &nodes[0].kind {
            NodeKind::Implementation(implementation) => {
                assert_eq!(implementation.fields.len(), 1);
                assert_eq!(implementation.properties.len(), 2);
                assert!(implementation.properties[0].is_required);
                assert_eq!(implementation.properties[1].ordinal, Some(3));
                assert_eq!(implementation.properties[1].position, 2);
                assert_eq!(implementation.methods.len(), 1);
                assert_eq!(implementation.injection_count(), 4);
            }
            _ => panic!("expected an implementation"),
        }
    }

    #[test]
    fn should_apply_tag_and_type_attributes() {
        let binding = create_binding(Implementation::Constructor(
            TypeDescriptor::new(ty("Service")).with_constructors([MethodDescriptor::constructor([
                ParameterDescriptor::new("dep", ty("object"))
                    .with_attribute(AttributeUsage::new(
                        ty("Tag"),
                        [AttributeValue::Str("a".to_string())],
                    ))
                    .with_attribute(AttributeUsage::new(
                        ty("Type"),
                        [AttributeValue::Type(ty("Dep"))],
                    )),
            ])]),
        ));

        let nodes = create_builder().build(&binding, NodeId(0), &|_| true).unwrap();
        let slots = nodes[0].slots();

        assert_eq!(slots[0].injection.ty, ty("Dep"));
        assert_eq!(slots[0].injection.tag, Tag::named("a"));
    }

    #[test]
    fn should_report_conflicting_attributes() {
        let binding = create_binding(Implementation::Constructor(
            TypeDescriptor::new(ty("Service")).with_field(
                FieldDescriptor::new("dep", ty("Dep"))
                    .with_attribute(ordinal_attribute(1))
                    .with_attribute(ordinal_attribute(2)),
            ),
        ));

        let errors = create_builder()
            .build(&binding, NodeId(0), &|_| true)
            .unwrap_err();

        assert!(matches!(
            errors.as_slice(),
            [CompileError::ConflictingAttributes { .. }]
        ));
    }

    #[test]
    fn should_report_attribute_position_out_of_range() {
        let builder = DependencyNodeBuilder::new(vec![AttributeSpec::new(
            AttributeRole::Ordinal,
            ty("Ordinal"),
        )
        .with_argument_position(1)]);
        let binding = create_binding(Implementation::Constructor(
            TypeDescriptor::new(ty("Service"))
                .with_field(FieldDescriptor::new("dep", ty("Dep")).with_attribute(ordinal_attribute(1))),
        ));

        let errors = builder.build(&binding, NodeId(0), &|_| true).unwrap_err();

        assert!(matches!(
            errors.as_slice(),
            [CompileError::AttributePosition {
                position: 1,
                count: 1,
                ..
            }]
        ));
    }

    #[test]
    fn should_build_single_node_for_non_constructors() {
        let builder = create_builder();

        let arg = builder
            .build(
                &create_binding(Implementation::Arg(ArgDescriptor::new("name", ty("String")))),
                NodeId(0),
                &|_| true,
            )
            .unwrap();
        let construct = builder
            .build(
                &create_binding(Implementation::Construct(ConstructKind::Composition)),
                NodeId(0),
                &|_| true,
            )
            .unwrap();

        assert_eq!(arg.len(), 1);
        assert!(arg[0].is_arg());
        assert_eq!(construct[0].construct_kind(), Some(ConstructKind::Composition));
    }
}
