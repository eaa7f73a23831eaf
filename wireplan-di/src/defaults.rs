//! Built-in global setup, merged into every composition unless disabled in the
//! [CompilerBuilder](crate::compiler::CompilerBuilder).

use crate::binding::{ConstructKind, FactoryDescriptor, Implementation};
use crate::metadata::{AttributeRole, AttributeSpec};
use crate::setup::{Accumulator, CompositionKind, RawBinding, Setup};
use crate::types::{Lifetime, Tag, TypeRef};

pub const DEFAULT_SETUP_NAME: &str = "Default";

pub const ORDINAL_ATTRIBUTE: &str = "OrdinalAttribute";
pub const TAG_ATTRIBUTE: &str = "TagAttribute";
pub const TYPE_ATTRIBUTE: &str = "TypeAttribute";

fn marker() -> TypeRef {
    TypeRef::new("TT")
}

fn of_marker(name: &str) -> TypeRef {
    TypeRef::generic(name, [marker()])
}

fn construct(name: &str, kind: ConstructKind) -> RawBinding {
    RawBinding::new([of_marker(name)], Implementation::Construct(kind)).with_lifetime(Lifetime::PerBlock)
}

/// Returns the setup with attribute specs and bindings every composition can rely on: deferred
/// `Func<TT>`, `Lazy<TT>`, the `IEnumerable<TT>`, `Array<TT>` and `Span<TT>` collections and
/// an accumulator of disposable instances.
pub fn default_setup() -> Setup {
    Setup::new(DEFAULT_SETUP_NAME)
        .with_kind(CompositionKind::Global)
        .with_attribute(AttributeSpec::new(
            AttributeRole::Ordinal,
            TypeRef::new(ORDINAL_ATTRIBUTE),
        ))
        .with_attribute(AttributeSpec::new(AttributeRole::Tag, TypeRef::new(TAG_ATTRIBUTE)))
        .with_attribute(AttributeSpec::new(AttributeRole::Type, TypeRef::new(TYPE_ATTRIBUTE)))
        .with_accumulator(Accumulator::new(
            "disposables",
            TypeRef::new("IDisposable"),
            TypeRef::new("Owned"),
            [Lifetime::Transient, Lifetime::PerResolve, Lifetime::PerBlock],
        ))
        .with_binding(
            RawBinding::new(
                [of_marker("Func")],
                Implementation::Factory(
                    FactoryDescriptor::new("Func", of_marker("Func"))
                        .with_injection(marker(), Tag::Untagged)
                        .deferred(),
                ),
            )
            .with_lifetime(Lifetime::PerBlock),
        )
        .with_binding(RawBinding::new(
            [of_marker("Lazy")],
            Implementation::Factory(
                FactoryDescriptor::new("Lazy", of_marker("Lazy"))
                    .with_injection(of_marker("Func"), Tag::Untagged),
            ),
        ))
        .with_binding(construct("IEnumerable", ConstructKind::Enumerable))
        .with_binding(construct("Array", ConstructKind::Array))
        .with_binding(construct("Span", ConstructKind::Span))
}

#[cfg(test)]
mod tests {
    use crate::binding::{BindingId, Implementation};
    use crate::binding_registry::BindingRegistry;
    use crate::defaults::default_setup;
    use crate::oracle::StructuralTypeOracle;
    use crate::setup::CompositionKind;

    #[test]
    fn should_provide_deferred_func() {
        let setup = default_setup();
        let registry = BindingRegistry::register(&setup, &StructuralTypeOracle::default());

        assert_eq!(setup.kind, CompositionKind::Global);
        assert_eq!(setup.attributes.len(), 3);
        assert!(matches!(
            &registry.binding(BindingId(0)).implementation,
            Implementation::Factory(factory) if factory.deferred
        ));
        assert_eq!(registry.bindings().len(), 5);
    }
}
