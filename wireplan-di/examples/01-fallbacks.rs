use wireplan_di::binding::Implementation;
use wireplan_di::compiler::CompilerBuilder;
use wireplan_di::metadata::{MethodDescriptor, ParameterDescriptor, TypeDescriptor};
use wireplan_di::setup::{FallbackDescriptor, RawBinding, RootDescriptor, Setup};
use wireplan_di::types::{Tag, TypeRef};

fn main() {
    // "IGreeter" is not bound anywhere
    let setup = Setup::new("GreetingComposition")
        .with_binding(RawBinding::new(
            [TypeRef::new("App")],
            Implementation::Constructor(TypeDescriptor::new(TypeRef::new("App")).with_constructors(
                [MethodDescriptor::constructor([ParameterDescriptor::new(
                    "greeter",
                    TypeRef::new("IGreeter"),
                )])],
            )),
        ))
        .with_root(RootDescriptor::new("App", TypeRef::new("App")));

    let compiler = CompilerBuilder::new().build();

    // without a fallback, compilation fails with a located error
    if let Err(error) = compiler.compile(&setup) {
        for diagnostic in error.diagnostics() {
            println!("{diagnostic:?}");
        }
    }

    // a fallback handler for any type ("TT" is a type marker) resolves the greeter at runtime
    let setup = setup.with_fallback(FallbackDescriptor::new(
        "Resolve",
        TypeRef::new("TT"),
        Tag::Any,
    ));

    match compiler.compile(&setup) {
        Ok(composition) => println!(
            "Compiled {} with {} block(s).",
            composition.name(),
            composition.roots()[0].blocks.len()
        ),
        Err(error) => println!("{error}"),
    }
}
