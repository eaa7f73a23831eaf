//! Batch compilation of registered setups.

use crate::config::CompilerConfig;
use crate::emitter::{CompositionEmitterPtr, ErrorPtr};
use config::ConfigError;
use derive_more::Constructor;
use itertools::Itertools;
use thiserror::Error;
use tracing::subscriber::DefaultGuard;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use wireplan_di::compiler::{Compiler, CompilerBuilder, Composition};
use wireplan_di::error::CompilationError;
use wireplan_di::setup::Setup;
use wireplan_di::setup_registry::{SetupRegistry, SetupRegistryError, StaticSetupRegistry};

#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("Error loading configuration: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Error retrieving setups: {0}")]
    RegistryError(#[from] SetupRegistryError),
    #[error("Compilation failed: {}", .0.iter().join(" "))]
    CompilationError(Vec<CompilationError>),
    #[error("Emitter error: {0}")]
    EmitterError(ErrorPtr),
    #[cfg(feature = "async")]
    #[error("Compilation task failed: {0}")]
    JoinError(#[from] tokio::task::JoinError),
}

/// Creates an application with config loaded from the environment and statically registered
/// setups.
pub fn create_default(
    emitter: Box<CompositionEmitterPtr>,
) -> Result<Application<StaticSetupRegistry>, ApplicationError> {
    let config = CompilerConfig::init_from_environment()?;
    let registry = StaticSetupRegistry::new()?;
    Ok(Application::new(config, registry, emitter))
}

/// Main entrypoint for the driver. Compiles all non-global setups from the registry and passes the
/// resulting compositions to the emitter, but only if every compilation succeeded.
#[derive(Constructor)]
pub struct Application<R: SetupRegistry> {
    config: CompilerConfig,
    registry: R,
    emitter: Box<CompositionEmitterPtr>,
}

impl<R: SetupRegistry> Application<R> {
    #[cfg(feature = "async")]
    pub async fn run(&mut self) -> Result<(), ApplicationError> {
        use futures::future::join_all;
        use std::sync::Arc;
        use tracing::Dispatch;

        let _guard = self.install_logger();

        let setups = self.setups();
        info!("Compiling {} setup(s)...", setups.len());

        let compiler = Arc::new(self.compiler());
        let fail_fast = self.config.fail_fast;
        let dispatch = tracing::dispatcher::get_default(Dispatch::clone);

        let tasks = setups.into_iter().map(|setup| {
            let compiler = compiler.clone();
            let dispatch = dispatch.clone();

            tokio::task::spawn_blocking(move || {
                tracing::dispatcher::with_default(&dispatch, || {
                    compile(&compiler, &setup, fail_fast)
                })
            })
        });

        let results = join_all(tasks)
            .await
            .into_iter()
            .collect::<Result<Vec<_>, _>>()?;

        self.emit(results)
    }

    #[cfg(not(feature = "async"))]
    pub fn run(&mut self) -> Result<(), ApplicationError> {
        let _guard = self.install_logger();

        let setups = self.setups();
        info!("Compiling {} setup(s)...", setups.len());

        let compiler = self.compiler();
        let results = setups
            .iter()
            .map(|setup| compile(&compiler, setup, self.config.fail_fast))
            .collect_vec();

        self.emit(results)
    }

    fn install_logger(&self) -> Option<DefaultGuard> {
        self.config.install_tracing_logger.then(|| {
            tracing::subscriber::set_default(
                tracing_subscriber::fmt()
                    .with_env_filter(EnvFilter::from_default_env())
                    .finish(),
            )
        })
    }

    fn compiler(&self) -> Compiler {
        CompilerBuilder::new()
            .with_default_setup(self.config.include_default_setup)
            .with_setup_registry(&self.registry)
            .build()
    }

    fn setups(&self) -> Vec<Setup> {
        self.registry
            .compositions()
            .into_iter()
            .cloned()
            .collect()
    }

    fn emit(
        &self,
        results: Vec<Result<Composition, CompilationError>>,
    ) -> Result<(), ApplicationError> {
        let (compositions, errors): (Vec<_>, Vec<_>) = results.into_iter().partition_result();
        if !errors.is_empty() {
            return Err(ApplicationError::CompilationError(failures(errors)));
        }

        info!("Emitting {} composition(s)...", compositions.len());

        for composition in &compositions {
            for diagnostic in composition.diagnostics() {
                warn!(id = diagnostic.id, "{}", diagnostic.lines.join(" "));
            }

            self.emitter
                .emit(composition)
                .map_err(ApplicationError::EmitterError)?;
        }

        Ok(())
    }
}

fn compile(
    compiler: &Compiler,
    setup: &Setup,
    fail_fast: bool,
) -> Result<Composition, CompilationError> {
    let result = compiler.compile(setup);
    if fail_fast && matches!(&result, Err(error) if !error.is_cancelled()) {
        warn!(
            "Compilation of {} failed, cancelling pending compilations.",
            setup.name
        );
        compiler.cancellation().cancel();
    }

    result
}

/// Cancellations caused by another failure are dropped.
fn failures(errors: Vec<CompilationError>) -> Vec<CompilationError> {
    if errors.iter().all(CompilationError::is_cancelled) {
        errors
    } else {
        errors
            .into_iter()
            .filter(|error| !error.is_cancelled())
            .collect()
    }
}
