//! Entry point of the compilation pipeline. A [Compiler] merges global and depended-on setups into
//! the compiled one, then runs registration, node building, resolution, walking and
//! materialization planning, producing a [Composition].

use crate::binding::{ConstructKind, Implementation};
use crate::binding_registry::BindingRegistry;
use crate::cancellation::CancellationToken;
use crate::defaults::default_setup;
use crate::diagnostic::Diagnostic;
use crate::error::{CompilationError, CompileError};
use crate::fallback::FallbackChain;
use crate::graph::DependencyGraph;
use crate::materialization::MaterializationPlanner;
use crate::node_builder::DependencyNodeBuilder;
use crate::oracle::{StructuralTypeOracle, TypeOracle, TypeOraclePtr};
use crate::resolver::GraphResolver;
use crate::setup::{CompositionKind, RawBinding, Setup};
use crate::setup_registry::SetupRegistry;
use crate::types::TypeRef;
use crate::variable::{RootPlan, VariableArena};
use crate::visitor::{dispatch, InstantiationVisitor};
use derivative::Derivative;
use fxhash::{FxHashMap, FxHashSet};
use tracing::debug;

/// Builder for [Compiler].
#[derive(Derivative)]
#[derivative(Debug)]
pub struct CompilerBuilder {
    #[derivative(Debug = "ignore")]
    oracle: TypeOraclePtr,
    include_default_setup: bool,
    global_setups: Vec<Setup>,
    catalog: FxHashMap<String, Setup>,
    cancellation: CancellationToken,
}

impl Default for CompilerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CompilerBuilder {
    /// Creates a new builder with a [StructuralTypeOracle] and the default global setup.
    pub fn new() -> Self {
        Self {
            oracle: Box::<StructuralTypeOracle>::default(),
            include_default_setup: true,
            global_setups: vec![],
            catalog: Default::default(),
            cancellation: Default::default(),
        }
    }

    /// Sets new [TypeOracle].
    pub fn with_oracle(mut self, oracle: TypeOraclePtr) -> Self {
        self.oracle = oracle;
        self
    }

    /// Controls merging of the built-in [default_setup].
    pub fn with_default_setup(mut self, include_default_setup: bool) -> Self {
        self.include_default_setup = include_default_setup;
        self
    }

    pub fn without_default_setup(self) -> Self {
        self.with_default_setup(false)
    }

    /// Adds a setup merged into every compiled composition.
    pub fn with_global_setup(mut self, setup: Setup) -> Self {
        self.global_setups.push(setup);
        self
    }

    /// Adds a setup which other setups can depend on by name.
    pub fn with_setup(mut self, setup: Setup) -> Self {
        self.catalog.insert(setup.name.clone(), setup);
        self
    }

    /// Adds all setups from a registry: global ones are merged everywhere, others become available
    /// as dependencies.
    pub fn with_setup_registry(mut self, registry: &dyn SetupRegistry) -> Self {
        for setup in registry.globals() {
            self.global_setups.push(setup.clone());
        }

        for setup in registry.compositions() {
            self.catalog.insert(setup.name.clone(), setup.clone());
        }

        self
    }

    /// Sets the token used to cancel compilations.
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Builds resulting [Compiler].
    pub fn build(self) -> Compiler {
        let mut global_setups = vec![];
        if self.include_default_setup {
            global_setups.push(default_setup());
        }

        global_setups.extend(self.global_setups);

        Compiler {
            oracle: self.oracle,
            global_setups,
            catalog: self.catalog,
            cancellation: self.cancellation,
        }
    }
}

/// Compiles setups into [Composition]s. A single compiler can be shared between threads when the
/// `threadsafe` feature is enabled.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Compiler {
    #[derivative(Debug = "ignore")]
    oracle: TypeOraclePtr,
    global_setups: Vec<Setup>,
    catalog: FxHashMap<String, Setup>,
    cancellation: CancellationToken,
}

impl Compiler {
    #[inline]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    #[inline]
    fn oracle(&self) -> &dyn TypeOracle {
        self.oracle.as_ref()
    }

    /// Compiles given setup. Every error found is reported at once.
    pub fn compile(&self, setup: &Setup) -> Result<Composition, CompilationError> {
        debug!("Compiling {}.", setup.name);

        let fail = |errors: Vec<CompileError>| CompilationError::new(setup.name.clone(), errors);

        self.cancellation
            .check(&setup.name)
            .map_err(|error| fail(vec![error]))?;

        let merged = self.merge(setup).map_err(fail)?;

        let registry = BindingRegistry::register(&merged, self.oracle());
        let diagnostics = registry.diagnostics().to_vec();

        let graph = GraphResolver::new(
            registry,
            DependencyNodeBuilder::new(merged.attributes.clone()),
            FallbackChain::new(&merged.fallbacks),
            self.oracle(),
        )
        .resolve(&merged)
        .map_err(fail)?;

        let mut variables = VariableArena::default();
        let mut roots = crate::walker::CodeGraphWalker::new(&graph, self.cancellation.clone())
            .visit(&mut variables)
            .map_err(|error| fail(vec![error]))?;

        MaterializationPlanner::new(self.oracle(), graph.hints().is_thread_safe()).annotate(
            &graph,
            &variables,
            &mut roots,
        );

        debug!(
            "Compiled {} with {} root(s) and {} variable(s).",
            setup.name,
            roots.len(),
            variables.variables().len()
        );

        Ok(Composition {
            name: setup.name.clone(),
            graph,
            variables,
            roots,
            diagnostics,
        })
    }

    /// Merges globals, then dependencies in depth-first order and finally the setup itself, so
    /// its own declarations take precedence.
    fn merge(&self, setup: &Setup) -> Result<Setup, Vec<CompileError>> {
        let mut merged = Setup {
            name: setup.name.clone(),
            kind: setup.kind,
            depends_on: setup.depends_on.clone(),
            location: setup.location.clone(),
            ..Default::default()
        };

        merged = merged.with_binding(
            RawBinding::new(
                [TypeRef::new(setup.name.clone())],
                Implementation::Construct(ConstructKind::Composition),
            )
            .with_location(setup.location.clone()),
        );

        for global in self
            .global_setups
            .iter()
            .filter(|global| global.name != setup.name)
        {
            merged.merge_from(global);
        }

        let mut errors = vec![];
        let mut visited = FxHashSet::default();
        visited.insert(setup.name.clone());
        self.merge_dependencies(setup, &mut merged, &mut visited, &mut errors);

        if !errors.is_empty() {
            return Err(errors);
        }

        merged.merge_from(setup);
        Ok(merged)
    }

    fn merge_dependencies(
        &self,
        setup: &Setup,
        merged: &mut Setup,
        visited: &mut FxHashSet<String>,
        errors: &mut Vec<CompileError>,
    ) {
        for dependency in &setup.depends_on {
            if !visited.insert(dependency.clone()) {
                continue;
            }

            match self.catalog.get(dependency) {
                Some(dependency) if dependency.kind != CompositionKind::Global => {
                    self.merge_dependencies(dependency, merged, visited, errors);
                    merged.merge_from(dependency);
                }
                Some(_) => {}
                None => errors.push(CompileError::UnknownDependency {
                    setup: setup.name.clone(),
                    dependency: dependency.clone(),
                    location: setup.location.clone(),
                }),
            }
        }
    }
}

/// Result of a successful compilation: the validated graph, all variables and ordered blocks of
/// every root.
#[derive(Clone, Debug)]
pub struct Composition {
    name: String,
    graph: DependencyGraph,
    variables: VariableArena,
    roots: Vec<RootPlan>,
    diagnostics: Vec<Diagnostic>,
}

impl Composition {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    #[inline]
    pub fn variables(&self) -> &VariableArena {
        &self.variables
    }

    /// Plans of all roots in declaration order.
    #[inline]
    pub fn roots(&self) -> &[RootPlan] {
        &self.roots
    }

    pub fn root(&self, name: &str) -> Option<&RootPlan> {
        self.roots.iter().find(|root| root.name == name)
    }

    /// Non-fatal diagnostics, e.g. overridden bindings.
    #[inline]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Dispatches every instantiation of every root to the visitor.
    pub fn accept(&self, visitor: &mut dyn InstantiationVisitor) {
        dispatch(&self.graph, &self.variables, &self.roots, visitor);
    }
}

#[cfg(test)]
mod tests {
    use crate::binding::{FactoryDescriptor, Implementation};
    use crate::cancellation::CancellationToken;
    use crate::compiler::CompilerBuilder;
    use crate::error::CompileError;
    use crate::metadata::TypeDescriptor;
    use crate::node::DpFactory;
    use crate::setup::{RawBinding, RootDescriptor, Setup};
    use crate::types::TypeRef;
    use crate::variable::Instantiation;
    use crate::visitor::{InstantiationVisitor, VisitContext};

    #[derive(Default)]
    struct FactoryCollector {
        factories: Vec<String>,
    }

    impl InstantiationVisitor for FactoryCollector {
        fn visit_factory(
            &mut self,
            _context: &VisitContext<'_>,
            _instantiation: &Instantiation,
            factory: &DpFactory,
        ) {
            self.factories.push(factory.name.clone());
        }
    }

    fn service(name: &str) -> RawBinding {
        RawBinding::new(
            [TypeRef::new(name)],
            Implementation::Constructor(TypeDescriptor::new(TypeRef::new(name))),
        )
    }

    #[test]
    fn should_merge_dependencies_before_own_bindings() {
        let compiler = CompilerBuilder::new()
            .with_setup(Setup::new("Base").with_binding(RawBinding::new(
                [TypeRef::new("Service")],
                Implementation::Factory(FactoryDescriptor::new("base", TypeRef::new("Service"))),
            )))
            .build();

        let setup = Setup::new("Composition")
            .depends_on("Base")
            .with_binding(RawBinding::new(
                [TypeRef::new("Service")],
                Implementation::Factory(FactoryDescriptor::new("own", TypeRef::new("Service"))),
            ))
            .with_root(RootDescriptor::new("Root", TypeRef::new("Service")));

        let composition = compiler.compile(&setup).unwrap();
        let mut collector = FactoryCollector::default();
        composition.accept(&mut collector);

        assert_eq!(collector.factories, vec!["own".to_string()]);
        assert_eq!(composition.diagnostics().len(), 1);
    }

    #[test]
    fn should_report_unknown_dependency() {
        let compiler = CompilerBuilder::new().build();
        let setup = Setup::new("Composition").depends_on("Missing");

        let error = compiler.compile(&setup).unwrap_err();

        assert!(matches!(
            error.errors.as_slice(),
            [CompileError::UnknownDependency { dependency, .. }] if dependency == "Missing"
        ));
    }

    #[test]
    fn should_resolve_composition_itself() {
        let compiler = CompilerBuilder::new().without_default_setup().build();
        let setup = Setup::new("Composition")
            .with_binding(service("Service"))
            .with_root(RootDescriptor::new("Root", TypeRef::new("Composition")));

        let composition = compiler.compile(&setup).unwrap();

        assert_eq!(composition.roots().len(), 1);
        assert!(composition.root("Root").is_some());
    }

    #[test]
    fn should_fail_when_cancelled() {
        let cancellation = CancellationToken::new();
        cancellation.cancel();
        let compiler = CompilerBuilder::new()
            .with_cancellation(cancellation)
            .build();

        let error = compiler
            .compile(&Setup::new("Composition"))
            .unwrap_err();

        assert!(error.is_cancelled());
    }
}
