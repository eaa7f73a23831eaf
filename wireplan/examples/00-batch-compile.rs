use wireplan::application;
use wireplan::emitter::{CompositionEmitter, ErrorPtr};
use wireplan_di::binding::{FactoryDescriptor, Implementation};
use wireplan_di::compiler::Composition;
use wireplan_di::setup::{RawBinding, RootDescriptor, Setup};
use wireplan_di::setup_registry::internal::{submit, SetupRegisterer};
use wireplan_di::types::{Lifetime, TypeRef};

// setups are discovered statically, so they can be declared anywhere in the dependency tree
fn clock_setup() -> Setup {
    Setup::new("ClockComposition")
        .with_binding(
            RawBinding::new(
                [TypeRef::new("IClock")],
                Implementation::Factory(FactoryDescriptor::new("system_clock", TypeRef::new("IClock"))),
            )
            .with_lifetime(Lifetime::Singleton),
        )
        .with_root(RootDescriptor::new("Clock", TypeRef::new("IClock")))
}

submit! {
    SetupRegisterer {
        register: clock_setup
    }
}

struct SummaryEmitter;

impl CompositionEmitter for SummaryEmitter {
    fn emit(&self, composition: &Composition) -> Result<(), ErrorPtr> {
        for root in composition.roots() {
            println!(
                "{}::{} - {} block(s)",
                composition.name(),
                root.name,
                root.blocks.len()
            );
        }

        Ok(())
    }
}

// note: for the sake of simplicity, errors are unwrapped, rather than gracefully handled
#[tokio::main]
async fn main() {
    let mut application = application::create_default(Box::new(SummaryEmitter))
        .expect("unable to create default application");

    // prints "ClockComposition::Clock - 1 block(s)"
    application.run().await.expect("error running application");
}
