//! Emitters render compiled compositions, usually by passing an
//! [InstantiationVisitor](wireplan_di::visitor::InstantiationVisitor) to
//! [Composition::accept].

#[cfg(test)]
use mockall::automock;
use std::error::Error;
use std::sync::Arc;
use wireplan_di::compiler::Composition;

pub type ErrorPtr = Arc<dyn Error + Send + Sync>;

#[cfg(feature = "threadsafe")]
pub type CompositionEmitterPtr = dyn CompositionEmitter + Send + Sync;

#[cfg(not(feature = "threadsafe"))]
pub type CompositionEmitterPtr = dyn CompositionEmitter;

/// Receives every successfully compiled composition from the
/// [Application](crate::application::Application), in setup name order.
#[cfg_attr(test, automock)]
pub trait CompositionEmitter {
    fn emit(&self, composition: &Composition) -> Result<(), ErrorPtr>;
}
