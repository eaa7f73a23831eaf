use crate::diagnostic::{log_id, Diagnostic, Severity};
use crate::node::Injection;
use crate::types::{Location, TypeRef};
use itertools::Itertools;
use thiserror::Error;

/// Classification of compilation errors.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ErrorKind {
    Configuration,
    Resolution,
    Cycle,
    AttributePosition,
    Cancelled,
}

/// Fatal error found while compiling a setup. Every variant is located.
#[derive(Error, Clone, Eq, PartialEq, Hash, Debug)]
pub enum CompileError {
    #[error("The {ty} cannot be constructed due to being an abstract type.")]
    AbstractImplementation { ty: TypeRef, location: Location },
    #[error("The instance of {ty} cannot be instantiated due to no accessible constructor available.")]
    NoAccessibleConstructor { ty: TypeRef, location: Location },
    #[error("{member} of the type {ty} cannot be processed because it is marked with multiple mutually exclusive attributes.")]
    ConflictingAttributes {
        member: String,
        ty: TypeRef,
        location: Location,
    },
    #[error("The argument position {position} of attribute {attribute} is out of range [0..{count}].")]
    AttributePosition {
        attribute: TypeRef,
        position: usize,
        count: usize,
        location: Location,
    },
    #[error("Unable to resolve \"{injection}\" in {requester}.")]
    MissingBinding {
        injection: Injection,
        requester: String,
        location: Location,
    },
    #[error("Cyclic dependency has been found: {}.", path.iter().join(" -> "))]
    Cycle { path: Vec<String>, location: Location },
    #[error("Setup {setup} depends on an unknown setup {dependency}.")]
    UnknownDependency {
        setup: String,
        dependency: String,
        location: Location,
    },
    #[error("Compilation of {setup} has been cancelled.")]
    Cancelled { setup: String },
}

impl CompileError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CompileError::AbstractImplementation { .. }
            | CompileError::NoAccessibleConstructor { .. }
            | CompileError::ConflictingAttributes { .. }
            | CompileError::UnknownDependency { .. } => ErrorKind::Configuration,
            CompileError::AttributePosition { .. } => ErrorKind::AttributePosition,
            CompileError::MissingBinding { .. } => ErrorKind::Resolution,
            CompileError::Cycle { .. } => ErrorKind::Cycle,
            CompileError::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    pub fn location(&self) -> Option<&Location> {
        match self {
            CompileError::AbstractImplementation { location, .. }
            | CompileError::NoAccessibleConstructor { location, .. }
            | CompileError::ConflictingAttributes { location, .. }
            | CompileError::AttributePosition { location, .. }
            | CompileError::MissingBinding { location, .. }
            | CompileError::Cycle { location, .. }
            | CompileError::UnknownDependency { location, .. } => Some(location),
            CompileError::Cancelled { .. } => None,
        }
    }

    /// Converts this error into a structured diagnostic record.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let id = match self.kind() {
            ErrorKind::Configuration | ErrorKind::AttributePosition => {
                log_id::ERROR_INVALID_METADATA
            }
            ErrorKind::Resolution => log_id::ERROR_UNABLE_TO_RESOLVE,
            ErrorKind::Cycle => log_id::ERROR_CYCLIC_DEPENDENCY,
            ErrorKind::Cancelled => log_id::ERROR_CANCELLED,
        };

        Diagnostic {
            severity: Severity::Error,
            lines: vec![self.to_string()],
            location: self.location().cloned(),
            id,
        }
    }
}

/// Failure of a whole compilation, carrying every collected error.
#[derive(Error, Clone, Eq, PartialEq, Debug)]
#[error("Compilation of {setup} failed: {}", errors.iter().join(" "))]
pub struct CompilationError {
    pub setup: String,
    pub errors: Vec<CompileError>,
}

impl CompilationError {
    pub fn new<T: Into<String>>(setup: T, errors: Vec<CompileError>) -> Self {
        Self {
            setup: setup.into(),
            errors,
        }
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.errors.iter().map(CompileError::to_diagnostic).collect()
    }

    pub fn is_cancelled(&self) -> bool {
        self.errors
            .iter()
            .any(|error| error.kind() == ErrorKind::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use crate::diagnostic::{log_id, Severity};
    use crate::error::{CompileError, ErrorKind};
    use crate::types::{Location, TypeRef};

    #[test]
    fn should_report_full_cycle_path() {
        let error = CompileError::Cycle {
            path: vec!["A".to_string(), "B".to_string(), "A".to_string()],
            location: Location::new("setup.rs", 1, 1),
        };

        assert_eq!(
            error.to_string(),
            "Cyclic dependency has been found: A -> B -> A."
        );
        assert_eq!(error.kind(), ErrorKind::Cycle);
    }

    #[test]
    fn should_convert_to_located_diagnostic() {
        let location = Location::new("setup.rs", 10, 4);
        let error = CompileError::AbstractImplementation {
            ty: TypeRef::new("Base"),
            location: location.clone(),
        };

        let diagnostic = error.to_diagnostic();
        assert_eq!(diagnostic.severity, Severity::Error);
        assert_eq!(diagnostic.location, Some(location));
        assert_eq!(diagnostic.id, log_id::ERROR_INVALID_METADATA);
    }
}
