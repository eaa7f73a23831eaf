//! Structured diagnostics. The compiler never formats or prints them - presentation is up to the
//! host.

use crate::types::Location;
use itertools::Itertools;
use std::fmt::{Display, Formatter};

/// Stable diagnostic identifiers.
pub mod log_id {
    pub const ERROR_INVALID_METADATA: &str = "DIE001";
    pub const ERROR_CYCLIC_DEPENDENCY: &str = "DIE002";
    pub const ERROR_UNABLE_TO_RESOLVE: &str = "DIE003";
    pub const ERROR_CANCELLED: &str = "DIE004";
    pub const WARNING_OVERRIDDEN_BINDING: &str = "DIW001";
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    pub lines: Vec<String>,
    pub location: Option<Location>,
    pub id: &'static str,
}

impl Diagnostic {
    pub fn warning(id: &'static str, message: String, location: Location) -> Self {
        Self {
            severity: Severity::Warning,
            lines: vec![message],
            location: Some(location),
            id,
        }
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} {}: {}", self.severity, self.id, self.lines.iter().join(" "))
    }
}
