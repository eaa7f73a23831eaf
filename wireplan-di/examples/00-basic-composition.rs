use wireplan_di::binding::Implementation;
use wireplan_di::compiler::CompilerBuilder;
use wireplan_di::metadata::{MethodDescriptor, ParameterDescriptor, TypeDescriptor};
use wireplan_di::node::{DpFactory, DpImplementation};
use wireplan_di::setup::{RawBinding, RootDescriptor, Setup};
use wireplan_di::types::{Lifetime, TypeRef};
use wireplan_di::variable::Instantiation;
use wireplan_di::visitor::{ImplementationPlan, InstantiationVisitor, VisitContext};

// an emitter which prints pseudo-code instead of generating real sources
struct PrintingEmitter;

impl PrintingEmitter {
    fn name(context: &VisitContext<'_>, instantiation: &Instantiation) -> String {
        let variable = context.variables.variable(instantiation.target);
        format!("v{}", variable.storage().0)
    }
}

impl InstantiationVisitor for PrintingEmitter {
    fn visit_block(&mut self, context: &VisitContext<'_>) {
        println!("// block of {} ({:?})", context.root.name, context.block.steps);
    }

    fn visit_constructor(
        &mut self,
        context: &VisitContext<'_>,
        instantiation: &Instantiation,
        implementation: &DpImplementation,
        plan: &ImplementationPlan,
    ) {
        let arguments = plan
            .constructor_arguments
            .iter()
            .map(|argument| match argument {
                Some(variable) => format!(
                    "v{}",
                    context.variables.variable(*variable).storage().0
                ),
                None => "default".to_string(),
            })
            .collect::<Vec<_>>()
            .join(", ");

        println!(
            "let {} = new {}({});",
            Self::name(context, instantiation),
            implementation.ty,
            arguments
        );
    }

    fn visit_factory(
        &mut self,
        context: &VisitContext<'_>,
        instantiation: &Instantiation,
        factory: &DpFactory,
    ) {
        println!(
            "let {} = {}();",
            Self::name(context, instantiation),
            factory.name
        );
    }
}

fn service(name: &str, dependencies: &[&str]) -> TypeDescriptor {
    TypeDescriptor::new(TypeRef::new(name)).with_constructors([MethodDescriptor::constructor(
        dependencies
            .iter()
            .map(|dependency| ParameterDescriptor::new(dependency.to_lowercase(), TypeRef::new(*dependency))),
    )])
}

fn main() {
    // a setup is normally produced by a front-end analyzing user sources; here it's declared by
    // hand: a shop service using a repository and a clock
    let setup = Setup::new("ShopComposition")
        .with_binding(RawBinding::new(
            [TypeRef::new("IShop")],
            Implementation::Constructor(service("Shop", &["IRepository", "IClock"])),
        ))
        .with_binding(
            RawBinding::new(
                [TypeRef::new("IRepository")],
                Implementation::Constructor(service("Repository", &["IClock"])),
            )
            .with_lifetime(Lifetime::Singleton),
        )
        .with_binding(
            RawBinding::new(
                [TypeRef::new("IClock")],
                Implementation::Constructor(service("Clock", &[])),
            )
            .with_lifetime(Lifetime::PerResolve),
        )
        .with_root(RootDescriptor::new("Shop", TypeRef::new("IShop")));

    let compiler = CompilerBuilder::new().build();

    // note: for the sake of simplicity, errors are unwrapped, rather than gracefully handled
    let composition = compiler
        .compile(&setup)
        .expect("unable to compile composition");

    composition.accept(&mut PrintingEmitter);
}
