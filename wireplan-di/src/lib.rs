//! Static dependency injection composition compiler.
//!
//! Declarative [Setup](setup::Setup)s bind contracts to implementations, factories, arguments and
//! built-in constructs. The [Compiler](compiler::Compiler) turns a setup into a validated
//! dependency graph and, for every composition root, an ordered list of construction blocks with
//! the variables holding created instances. Rendering the result into source code is left to an
//! external emitter, which receives every instantiation through an
//! [InstantiationVisitor](visitor::InstantiationVisitor).
//!
//! Type information comes from a [TypeOracle](oracle::TypeOracle), so the compiler does not
//! depend on any particular front-end.
//!
//! ### Features
//!
//! * `threadsafe` - require `Send + Sync` type oracles, so a compiler can be shared between threads

pub mod binding;
pub mod binding_registry;
pub mod cancellation;
pub mod compiler;
pub mod defaults;
pub mod diagnostic;
pub mod error;
pub mod fallback;
pub mod graph;
pub mod materialization;
pub mod metadata;
pub mod node;
pub mod node_builder;
pub mod oracle;
pub mod resolver;
pub mod setup;
pub mod setup_registry;
pub mod types;
pub mod variable;
pub mod visitor;
pub mod walker;

pub use compiler::{Compiler, CompilerBuilder, Composition};
pub use error::{CompilationError, CompileError};
