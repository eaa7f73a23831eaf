use wireplan_di::binding::{FactoryDescriptor, Implementation};
use wireplan_di::compiler::{Composition, CompilerBuilder};
use wireplan_di::defaults::ORDINAL_ATTRIBUTE;
use wireplan_di::diagnostic::log_id;
use wireplan_di::error::CompileError;
use wireplan_di::materialization::MaterializationStep;
use wireplan_di::metadata::{
    AttributeUsage, AttributeValue, FieldDescriptor, MethodDescriptor, ParameterDescriptor,
    PropertyDescriptor, TypeDescriptor,
};
use wireplan_di::node::{DpConstruct, DpFactory, DpField, DpImplementation, DpProperty};
use wireplan_di::setup::{FallbackDescriptor, RawBinding, RootDescriptor, Setup};
use wireplan_di::types::{Lifetime, Tag, TypeRef};
use wireplan_di::variable::{Instantiation, VariableId};
use wireplan_di::visitor::{ImplementationPlan, InstantiationVisitor, VisitContext};

fn ty(name: &str) -> TypeRef {
    TypeRef::new(name)
}

fn service(name: &str, dependencies: &[TypeRef], lifetime: Lifetime) -> RawBinding {
    RawBinding::new(
        [ty(name)],
        Implementation::Constructor(TypeDescriptor::new(ty(name)).with_constructors([
            MethodDescriptor::constructor(dependencies.iter().enumerate().map(
                |(index, dependency)| ParameterDescriptor::new(format!("p{index}"), dependency.clone()),
            )),
        ])),
    )
    .with_lifetime(lifetime)
}

fn factory(contract: &str, name: &str) -> RawBinding {
    RawBinding::new(
        [ty(contract)],
        Implementation::Factory(FactoryDescriptor::new(name, ty(contract))),
    )
}

fn compile(setup: &Setup) -> Composition {
    CompilerBuilder::new().build().compile(setup).unwrap()
}

#[derive(Default)]
struct RecordingVisitor {
    constructed: Vec<(String, String)>,
    factories: Vec<(String, String, bool)>,
    members: Vec<String>,
    plans: Vec<ImplementationPlan>,
    collections: Vec<usize>,
}

impl InstantiationVisitor for RecordingVisitor {
    fn visit_constructor(
        &mut self,
        context: &VisitContext<'_>,
        _instantiation: &Instantiation,
        implementation: &DpImplementation,
        plan: &ImplementationPlan,
    ) {
        self.constructed
            .push((context.root.name.clone(), implementation.ty.to_string()));
        self.plans.push(plan.clone());
    }

    fn visit_field(
        &mut self,
        _context: &VisitContext<'_>,
        _instantiation: &Instantiation,
        field: &DpField,
        _variable: VariableId,
    ) {
        self.members.push(field.name.clone());
    }

    fn visit_property(
        &mut self,
        _context: &VisitContext<'_>,
        _instantiation: &Instantiation,
        property: &DpProperty,
        _variable: VariableId,
    ) {
        self.members.push(property.name.clone());
    }

    fn visit_factory(
        &mut self,
        context: &VisitContext<'_>,
        _instantiation: &Instantiation,
        factory: &DpFactory,
    ) {
        self.factories.push((
            context.root.name.clone(),
            factory.name.clone(),
            factory.is_fallback,
        ));
    }

    fn visit_enumerable_construct(
        &mut self,
        _context: &VisitContext<'_>,
        instantiation: &Instantiation,
        _construct: &DpConstruct,
    ) {
        self.collections.push(instantiation.arguments.len());
    }
}

fn record(composition: &Composition) -> RecordingVisitor {
    let mut visitor = RecordingVisitor::default();
    composition.accept(&mut visitor);
    visitor
}

fn constructed_in(visitor: &RecordingVisitor, root: &str, ty: &str) -> usize {
    visitor
        .constructed
        .iter()
        .filter(|(visited_root, visited_ty)| visited_root == root && visited_ty == ty)
        .count()
}

#[test]
fn should_compile_deterministically() {
    let setup = Setup::new("Composition")
        .with_binding(service("A", &[ty("B"), ty("C")], Lifetime::Transient))
        .with_binding(service("B", &[ty("C")], Lifetime::Singleton))
        .with_binding(service("C", &[], Lifetime::PerResolve))
        .with_root(RootDescriptor::new("Root", ty("A")));

    let first = compile(&setup);
    let second = compile(&setup);

    assert_eq!(first.roots(), second.roots());
    assert_eq!(first.variables(), second.variables());
}

#[test]
fn should_create_singleton_once_per_composition() {
    let setup = Setup::new("Composition")
        .with_binding(service("A", &[ty("S")], Lifetime::Transient))
        .with_binding(service("S", &[], Lifetime::Singleton))
        .with_root(RootDescriptor::new("First", ty("A")))
        .with_root(RootDescriptor::new("Second", ty("S")));

    let composition = compile(&setup);
    let variables = composition.variables();

    let storages = composition
        .roots()
        .iter()
        .flat_map(|root| root.blocks.iter())
        .filter(|block| block.steps.first() == Some(&MaterializationStep::CheckCreated))
        .map(|block| variables.variable(block.root).storage())
        .collect::<Vec<_>>();

    assert_eq!(storages.len(), 2);
    assert_eq!(storages[0], storages[1]);
}

#[test]
fn should_create_per_resolve_once_per_root() {
    let setup = Setup::new("Composition")
        .with_binding(service("A", &[ty("P"), ty("B")], Lifetime::Transient))
        .with_binding(service("B", &[ty("P")], Lifetime::Transient))
        .with_binding(service("P", &[], Lifetime::PerResolve))
        .with_root(RootDescriptor::new("First", ty("A")))
        .with_root(RootDescriptor::new("Second", ty("A")));

    let visitor = record(&compile(&setup));

    assert_eq!(constructed_in(&visitor, "First", "P"), 1);
    assert_eq!(constructed_in(&visitor, "Second", "P"), 1);
}

#[test]
fn should_hoist_transient_used_twice() {
    let setup = Setup::new("Composition")
        .with_binding(service("A", &[ty("T"), ty("T")], Lifetime::Transient))
        .with_binding(service("T", &[], Lifetime::Transient))
        .with_root(RootDescriptor::new("Root", ty("A")));

    let visitor = record(&compile(&setup));

    assert_eq!(constructed_in(&visitor, "Root", "T"), 1);
    assert_eq!(constructed_in(&visitor, "Root", "A"), 1);
}

#[test]
fn should_prefer_last_and_tagged_bindings() {
    let setup = Setup::new("Composition")
        .with_binding(factory("Service", "first"))
        .with_binding(factory("Service", "second"))
        .with_binding(factory("Service", "tagged").with_tag(Tag::named("special")))
        .with_root(RootDescriptor::new("Default", ty("Service")))
        .with_root(RootDescriptor::new("Special", ty("Service")).with_tag(Tag::named("special")));

    let composition = compile(&setup);
    let visitor = record(&composition);

    assert_eq!(
        visitor.factories,
        vec![
            ("Default".to_string(), "second".to_string(), false),
            ("Special".to_string(), "tagged".to_string(), false),
        ]
    );
    assert!(composition
        .diagnostics()
        .iter()
        .any(|diagnostic| diagnostic.id == log_id::WARNING_OVERRIDDEN_BINDING));
}

#[test]
fn should_report_cycles() {
    let setup = Setup::new("Composition")
        .with_binding(service("A", &[ty("B")], Lifetime::Transient))
        .with_binding(service("B", &[ty("A")], Lifetime::Transient))
        .with_root(RootDescriptor::new("Root", ty("A")));

    let error = CompilerBuilder::new()
        .build()
        .compile(&setup)
        .unwrap_err();

    assert!(error
        .errors
        .iter()
        .any(|error| matches!(error, CompileError::Cycle { .. })));
}

#[test]
fn should_break_cycles_with_deferred_factories() {
    let setup = Setup::new("Composition")
        .with_binding(service("A", &[ty("B")], Lifetime::Transient))
        .with_binding(service(
            "B",
            &[TypeRef::generic("Func", [ty("A")])],
            Lifetime::Transient,
        ))
        .with_root(RootDescriptor::new("Root", ty("A")));

    let composition = compile(&setup);
    let visitor = record(&composition);

    assert_eq!(composition.roots()[0].blocks.len(), 2);
    assert!(visitor
        .factories
        .iter()
        .any(|(_, name, _)| name == "Func"));
}

#[test]
fn should_report_all_missing_bindings() {
    let setup = Setup::new("Composition")
        .with_root(RootDescriptor::new("First", ty("Missing1")))
        .with_root(RootDescriptor::new("Second", ty("Missing2")));

    let error = CompilerBuilder::new()
        .build()
        .compile(&setup)
        .unwrap_err();

    assert_eq!(error.errors.len(), 2);
    assert!(error
        .errors
        .iter()
        .all(|error| matches!(error, CompileError::MissingBinding { .. })));
}

#[test]
fn should_use_last_fallback_for_unresolved_dependencies() {
    let setup = Setup::new("Composition")
        .with_binding(service("A", &[ty("Missing")], Lifetime::Transient))
        .with_fallback(FallbackDescriptor::new("first", ty("TT"), Tag::Any))
        .with_fallback(FallbackDescriptor::new("second", ty("TT"), Tag::Any))
        .with_root(RootDescriptor::new("Root", ty("A")));

    let visitor = record(&compile(&setup));

    assert_eq!(
        visitor.factories,
        vec![("Root".to_string(), "second".to_string(), true)]
    );
}

#[test]
fn should_prefer_bindings_over_fallbacks() {
    let setup = Setup::new("Composition")
        .with_binding(service("A", &[ty("Dependency")], Lifetime::Transient))
        .with_binding(factory("Dependency", "bound"))
        .with_fallback(FallbackDescriptor::new("fallback", ty("TT"), Tag::Any))
        .with_root(RootDescriptor::new("Root", ty("A")));

    let visitor = record(&compile(&setup));

    assert_eq!(
        visitor.factories,
        vec![("Root".to_string(), "bound".to_string(), false)]
    );
}

#[test]
fn should_order_injected_members() {
    let ordinal =
        |value: i64| AttributeUsage::new(ty(ORDINAL_ATTRIBUTE), [AttributeValue::Int(value)]);
    let setup = Setup::new("Composition")
        .with_binding(RawBinding::new(
            [ty("Service")],
            Implementation::Constructor(
                TypeDescriptor::new(ty("Service"))
                    .with_field(FieldDescriptor::new("second", ty("Dependency")).with_attribute(ordinal(2)))
                    .with_field(FieldDescriptor::new("first", ty("Dependency")).with_attribute(ordinal(1)))
                    .with_field(FieldDescriptor::new("ignored", ty("Dependency")))
                    .with_property(PropertyDescriptor::new("required", ty("Dependency")).required()),
            ),
        ))
        .with_binding(service("Dependency", &[], Lifetime::Singleton))
        .with_root(RootDescriptor::new("Root", ty("Service")));

    let visitor = record(&compile(&setup));
    let plan = visitor
        .constructed
        .iter()
        .position(|(_, ty)| ty == "Service")
        .map(|index| &visitor.plans[index])
        .unwrap();

    assert_eq!(plan.required_members.len(), 1);
    assert_eq!(visitor.members, vec!["first".to_string(), "second".to_string()]);
}

#[test]
fn should_collect_enumerable_items() {
    let setup = Setup::new("Composition")
        .with_binding(factory("IPlugin", "first"))
        .with_binding(factory("IPlugin", "second").with_tag(Tag::named("other")))
        .with_root(RootDescriptor::new(
            "Plugins",
            TypeRef::generic("IEnumerable", [ty("IPlugin")]),
        ));

    let visitor = record(&compile(&setup));

    assert_eq!(visitor.collections, vec![2]);
}

#[test]
fn should_create_singleton_once_when_also_enumerated() {
    let sequence = TypeRef::generic("IEnumerable", [ty("S")]);
    let setup = Setup::new("Composition")
        .with_binding(service("S", &[], Lifetime::Singleton))
        .with_binding(service("Y", &[ty("S")], Lifetime::Transient))
        .with_binding(service("X", &[sequence], Lifetime::Transient))
        .with_binding(service("A", &[ty("Y"), ty("X")], Lifetime::Transient))
        .with_binding(service("B", &[ty("X"), ty("Y")], Lifetime::Transient))
        .with_root(RootDescriptor::new("First", ty("A")))
        .with_root(RootDescriptor::new("Second", ty("B")));

    let composition = compile(&setup);
    let visitor = record(&composition);

    assert_eq!(constructed_in(&visitor, "First", "S"), 1);
    assert_eq!(constructed_in(&visitor, "Second", "S"), 1);
    assert!(composition
        .roots()
        .iter()
        .all(|root| root.blocks.last().map(|block| block.root) == Some(root.variable)));
}

#[test]
fn should_create_scoped_once_per_root() {
    let setup = Setup::new("Composition")
        .with_binding(service("A", &[ty("Sc"), ty("B")], Lifetime::Transient))
        .with_binding(service("B", &[ty("Sc")], Lifetime::Transient))
        .with_binding(service("Sc", &[], Lifetime::Scoped))
        .with_root(RootDescriptor::new("First", ty("A")))
        .with_root(RootDescriptor::new("Second", ty("Sc")));

    let composition = compile(&setup);
    let variables = composition.variables();
    let visitor = record(&composition);

    let storages = composition
        .roots()
        .iter()
        .flat_map(|root| root.blocks.iter())
        .filter(|block| block.steps.first() == Some(&MaterializationStep::CheckCreated))
        .map(|block| variables.variable(block.root).storage())
        .collect::<Vec<_>>();

    assert_eq!(constructed_in(&visitor, "First", "Sc"), 1);
    assert_eq!(constructed_in(&visitor, "Second", "Sc"), 1);
    assert_eq!(storages.len(), 2);
    assert_ne!(storages[0], storages[1]);
}

#[test]
fn should_stop_when_cancelled() {
    let compiler = CompilerBuilder::new().build();
    let setup = Setup::new("Composition")
        .with_binding(service("A", &[], Lifetime::Singleton))
        .with_root(RootDescriptor::new("Root", ty("A")));

    assert!(compiler.compile(&setup).is_ok());

    compiler.cancellation().cancel();

    assert!(compiler.compile(&setup).unwrap_err().is_cancelled());
}

#[test]
fn should_report_unknown_dependencies() {
    let setup = Setup::new("Composition").depends_on("Unknown");

    let error = CompilerBuilder::new()
        .build()
        .compile(&setup)
        .unwrap_err();

    assert!(matches!(
        error.errors.as_slice(),
        [CompileError::UnknownDependency { dependency, .. }] if dependency == "Unknown"
    ));
}
