//! Ordered chain of last-resort handlers. Handlers are keyed by (type, tag) and a later handler
//! replaces every earlier one with an equal key.

use crate::node::Injection;
use crate::oracle::TypeOracle;
use crate::setup::FallbackDescriptor;
use crate::types::Tag;
use tracing::debug;

#[derive(Clone, Debug, Default)]
pub struct FallbackChain {
    handlers: Vec<FallbackDescriptor>,
}

impl FallbackChain {
    pub fn new<'a>(handlers: impl IntoIterator<Item = &'a FallbackDescriptor>) -> Self {
        let mut chain = Self::default();
        for handler in handlers {
            chain.register(handler.clone());
        }

        chain
    }

    pub fn register(&mut self, handler: FallbackDescriptor) {
        let before = self.handlers.len();
        self.handlers
            .retain(|existing| existing.ty != handler.ty || existing.tag != handler.tag);

        if self.handlers.len() != before {
            debug!(
                "Fallback {} replaces previous handlers for {}.",
                handler.name, handler.ty
            );
        }

        self.handlers.push(handler);
    }

    /// Returns the most recently registered handler able to serve the injection.
    pub fn find(&self, injection: &Injection, oracle: &dyn TypeOracle) -> Option<&FallbackDescriptor> {
        self.handlers.iter().rev().find(|handler| {
            let type_matches = oracle.is_marker(&handler.ty)
                || handler.ty == injection.ty
                || oracle.unify(&handler.ty, &injection.ty).is_some();
            let tag_matches = handler.tag == Tag::Any || handler.tag == injection.tag;

            type_matches && tag_matches
        })
    }
}
