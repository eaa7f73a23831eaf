//! Driver for the [wireplan_di] composition compiler.
//!
//! Setups are usually declared across many crates and registered statically. This crate provides
//! an entrypoint in the form of [Application](application::Application), which loads
//! [configuration](config::CompilerConfig), installs a logger, compiles every registered setup and
//! hands the resulting compositions to a [CompositionEmitter](emitter::CompositionEmitter).
//!
//! ### Features
//!
//! * `threadsafe` - use `Send + Sync` trait bounds for emitters and type oracles
//! * `async` - compile setups concurrently on blocking tokio tasks

pub mod application;
pub mod config;
pub mod emitter;
