//! Handler set used by emitters to render compiled compositions. Instantiations are dispatched by
//! exhaustively matching on the kind of their node.

use crate::binding::ConstructKind;
use crate::graph::DependencyGraph;
use crate::node::{
    DpArg, DpConstruct, DpFactory, DpField, DpImplementation, DpMethod, DpProperty, NodeKind,
};
use crate::variable::{Block, Instantiation, RootPlan, VariableArena, VariableId};
use itertools::Itertools;

/// Everything a handler can look at while rendering one instantiation.
#[derive(Copy, Clone, Debug)]
pub struct VisitContext<'a> {
    pub graph: &'a DependencyGraph,
    pub variables: &'a VariableArena,
    pub root: &'a RootPlan,
    pub block: &'a Block,
}

/// Member injected into a constructed instance.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum MemberInjection {
    Field {
        /// Index into [DpImplementation::fields].
        index: usize,
        variable: VariableId,
    },
    Property {
        /// Index into [DpImplementation::properties].
        index: usize,
        variable: VariableId,
    },
    Method {
        /// Index into [DpImplementation::methods].
        index: usize,
        arguments: Vec<Option<VariableId>>,
    },
}

/// Ordered arguments of an implementation instantiation.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct ImplementationPlan {
    /// `None` means the parameter keeps its default value.
    pub constructor_arguments: Vec<Option<VariableId>>,
    /// Required fields and properties supplied together with the constructor call.
    pub required_members: Vec<MemberInjection>,
    /// Optional members injected after construction.
    pub post_construction: Vec<MemberInjection>,
}

impl ImplementationPlan {
    pub fn new(implementation: &DpImplementation, instantiation: &Instantiation) -> Self {
        let mut slot = 0;
        let mut next = || {
            let current = instantiation.argument(slot);
            slot += 1;
            current
        };

        let constructor_arguments = implementation
            .constructor
            .parameters
            .iter()
            .map(|_| next())
            .collect_vec();

        // (is required, ordinal, position, member)
        let mut members = vec![];
        for (index, field) in implementation.fields.iter().enumerate() {
            if let Some(variable) = next() {
                members.push((
                    field.is_required,
                    field.ordinal,
                    field.position,
                    MemberInjection::Field { index, variable },
                ));
            }
        }

        for (index, property) in implementation.properties.iter().enumerate() {
            if let Some(variable) = next() {
                members.push((
                    property.is_required,
                    property.ordinal,
                    property.position,
                    MemberInjection::Property { index, variable },
                ));
            }
        }

        let member_count = implementation.fields.len() + implementation.properties.len();
        for (index, method) in implementation.methods.iter().enumerate() {
            let arguments = method.parameters.iter().map(|_| next()).collect_vec();
            members.push((
                false,
                method.ordinal,
                member_count + index,
                MemberInjection::Method { index, arguments },
            ));
        }

        let (required, optional): (Vec<_>, Vec<_>) =
            members.into_iter().partition(|(is_required, ..)| *is_required);

        Self {
            constructor_arguments,
            required_members: Self::order(required),
            post_construction: Self::order(optional),
        }
    }

    /// Orders by ordinal with unordered members last, keeping discovery order among equals.
    fn order(members: Vec<(bool, Option<i64>, usize, MemberInjection)>) -> Vec<MemberInjection> {
        members
            .into_iter()
            .sorted_by_key(|(_, ordinal, position, _)| (ordinal.is_none(), *ordinal, *position))
            .map(|(.., member)| member)
            .collect()
    }
}

/// Emitter handlers. Every handler does nothing by default.
#[allow(unused_variables)]
pub trait InstantiationVisitor {
    fn visit_block(&mut self, context: &VisitContext<'_>) {}

    fn visit_constructor(
        &mut self,
        context: &VisitContext<'_>,
        instantiation: &Instantiation,
        implementation: &DpImplementation,
        plan: &ImplementationPlan,
    ) {
    }

    fn visit_field(
        &mut self,
        context: &VisitContext<'_>,
        instantiation: &Instantiation,
        field: &DpField,
        variable: VariableId,
    ) {
    }

    fn visit_property(
        &mut self,
        context: &VisitContext<'_>,
        instantiation: &Instantiation,
        property: &DpProperty,
        variable: VariableId,
    ) {
    }

    fn visit_method(
        &mut self,
        context: &VisitContext<'_>,
        instantiation: &Instantiation,
        method: &DpMethod,
        arguments: &[Option<VariableId>],
    ) {
    }

    fn visit_factory(
        &mut self,
        context: &VisitContext<'_>,
        instantiation: &Instantiation,
        factory: &DpFactory,
    ) {
    }

    fn visit_arg(&mut self, context: &VisitContext<'_>, instantiation: &Instantiation, arg: &DpArg) {}

    fn visit_enumerable_construct(
        &mut self,
        context: &VisitContext<'_>,
        instantiation: &Instantiation,
        construct: &DpConstruct,
    ) {
    }

    fn visit_array_construct(
        &mut self,
        context: &VisitContext<'_>,
        instantiation: &Instantiation,
        construct: &DpConstruct,
    ) {
    }

    fn visit_span_construct(
        &mut self,
        context: &VisitContext<'_>,
        instantiation: &Instantiation,
        construct: &DpConstruct,
    ) {
    }

    fn visit_composition_construct(
        &mut self,
        context: &VisitContext<'_>,
        instantiation: &Instantiation,
        construct: &DpConstruct,
    ) {
    }

    fn visit_on_cannot_resolve(
        &mut self,
        context: &VisitContext<'_>,
        instantiation: &Instantiation,
        construct: &DpConstruct,
    ) {
    }
}

/// Walks all plans and dispatches every instantiation to the visitor.
pub(crate) fn dispatch(
    graph: &DependencyGraph,
    variables: &VariableArena,
    plans: &[RootPlan],
    visitor: &mut dyn InstantiationVisitor,
) {
    for root in plans {
        for block in &root.blocks {
            let context = VisitContext {
                graph,
                variables,
                root,
                block,
            };

            visitor.visit_block(&context);
            for instantiation in &block.instantiations {
                dispatch_instantiation(&context, instantiation, visitor);
            }
        }
    }
}

fn dispatch_instantiation(
    context: &VisitContext<'_>,
    instantiation: &Instantiation,
    visitor: &mut dyn InstantiationVisitor,
) {
    let node = context
        .graph
        .node(context.variables.variable(instantiation.target).node);

    match &node.kind {
        NodeKind::Implementation(implementation) => {
            let plan = ImplementationPlan::new(implementation, instantiation);
            visitor.visit_constructor(context, instantiation, implementation, &plan);

            for member in &plan.post_construction {
                match member {
                    MemberInjection::Field { index, variable } => visitor.visit_field(
                        context,
                        instantiation,
                        &implementation.fields[*index],
                        *variable,
                    ),
                    MemberInjection::Property { index, variable } => visitor.visit_property(
                        context,
                        instantiation,
                        &implementation.properties[*index],
                        *variable,
                    ),
                    MemberInjection::Method { index, arguments } => visitor.visit_method(
                        context,
                        instantiation,
                        &implementation.methods[*index],
                        arguments,
                    ),
                }
            }
        }
        NodeKind::Factory(factory) => visitor.visit_factory(context, instantiation, factory),
        NodeKind::Arg(arg) => visitor.visit_arg(context, instantiation, arg),
        NodeKind::Construct(construct) => match construct.kind {
            ConstructKind::Enumerable => {
                visitor.visit_enumerable_construct(context, instantiation, construct)
            }
            ConstructKind::Array => visitor.visit_array_construct(context, instantiation, construct),
            ConstructKind::Span => visitor.visit_span_construct(context, instantiation, construct),
            ConstructKind::Composition => {
                visitor.visit_composition_construct(context, instantiation, construct)
            }
            ConstructKind::OnCannotResolve => {
                visitor.visit_on_cannot_resolve(context, instantiation, construct)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use crate::node::{DpField, DpImplementation, DpMethod, DpProperty, Injection};
    use crate::types::{Accessibility, TypeRef};
    use crate::variable::{Argument, Instantiation, VariableId};
    use crate::visitor::{ImplementationPlan, MemberInjection};

    fn injection() -> Injection {
        Injection::untagged(TypeRef::new("Dep"))
    }

    fn method(name: &str, ordinal: Option<i64>) -> DpMethod {
        DpMethod {
            name: name.to_string(),
            accessibility: Accessibility::Public,
            ordinal,
            parameters: vec![],
        }
    }

    #[test]
    fn should_order_members() {
        let implementation = DpImplementation {
            ty: TypeRef::new("Service"),
            constructor: method(".ctor", None),
            methods: vec![method("Init", Some(0)), method("Last", None)],
            fields: vec![
                DpField {
                    name: "required".to_string(),
                    ordinal: Some(2),
                    is_required: true,
                    injection: injection(),
                    position: 0,
                },
                DpField {
                    name: "optional".to_string(),
                    ordinal: Some(1),
                    is_required: false,
                    injection: injection(),
                    position: 1,
                },
            ],
            properties: vec![DpProperty {
                name: "required".to_string(),
                ordinal: Some(1),
                is_required: true,
                injection: injection(),
                position: 2,
            }],
        };
        let instantiation = Instantiation {
            target: VariableId(0),
            arguments: (0..3)
                .map(|slot| Argument {
                    slot,
                    injection: injection(),
                    variable: VariableId(slot + 1),
                })
                .collect(),
        };

        let plan = ImplementationPlan::new(&implementation, &instantiation);

        assert_eq!(
            plan.required_members,
            vec![
                MemberInjection::Property {
                    index: 0,
                    variable: VariableId(3)
                },
                MemberInjection::Field {
                    index: 0,
                    variable: VariableId(1)
                },
            ]
        );
        assert_eq!(
            plan.post_construction,
            vec![
                MemberInjection::Method {
                    index: 0,
                    arguments: vec![]
                },
                MemberInjection::Field {
                    index: 1,
                    variable: VariableId(2)
                },
                MemberInjection::Method {
                    index: 1,
                    arguments: vec![]
                },
            ]
        );
    }
}
