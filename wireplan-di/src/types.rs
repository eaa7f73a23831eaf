//! Basic vocabulary shared by all compilation stages: structural type references, tags and
//! lifetimes.

use fxhash::FxHashMap;
use itertools::Itertools;
use std::fmt::{Display, Formatter};

/// Mapping from generic marker names to the concrete types they were instantiated with.
pub type Substitution = FxHashMap<String, TypeRef>;

/// Structural reference to a type, e.g. `Box<TT>`. Generic markers are ordinary type references
/// recognized by the [TypeOracle](crate::oracle::TypeOracle).
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct TypeRef {
    pub name: String,
    pub args: Vec<TypeRef>,
}

impl TypeRef {
    /// Creates a non-generic type reference.
    pub fn new<T: Into<String>>(name: T) -> Self {
        Self {
            name: name.into(),
            args: vec![],
        }
    }

    /// Creates a generic type reference with given arguments.
    pub fn generic<T: Into<String>>(name: T, args: impl IntoIterator<Item = TypeRef>) -> Self {
        Self {
            name: name.into(),
            args: args.into_iter().collect(),
        }
    }

    /// Replaces every occurrence of a substituted marker with its concrete type.
    pub fn substitute(&self, substitution: &Substitution) -> TypeRef {
        if self.args.is_empty() {
            if let Some(concrete) = substitution.get(&self.name) {
                return concrete.clone();
            }
        }

        Self {
            name: self.name.clone(),
            args: self
                .args
                .iter()
                .map(|arg| arg.substitute(substitution))
                .collect(),
        }
    }

    /// Checks if this type or any of its arguments satisfy the predicate.
    pub fn any(&self, predicate: &impl Fn(&TypeRef) -> bool) -> bool {
        predicate(self) || self.args.iter().any(|arg| arg.any(predicate))
    }

    /// Returns the first generic argument, which is the element type for collection-like types.
    #[inline]
    pub fn element(&self) -> Option<&TypeRef> {
        self.args.first()
    }
}

impl Display for TypeRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.args.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}<{}>", self.name, self.args.iter().join(", "))
        }
    }
}

/// Tag distinguishing multiple bindings of the same contract.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub enum Tag {
    #[default]
    Untagged,
    Named(String),
    /// Wildcard matching any requested tag.
    Any,
}

impl Tag {
    pub fn named<T: Into<String>>(name: T) -> Self {
        Tag::Named(name.into())
    }
}

impl Display for Tag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Tag::Untagged => write!(f, "null"),
            Tag::Named(name) => write!(f, "\"{name}\""),
            Tag::Any => write!(f, "*"),
        }
    }
}

/// Reuse policy for constructed instances.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub enum Lifetime {
    #[default]
    Transient,
    PerBlock,
    PerResolve,
    Scoped,
    Singleton,
}

impl Lifetime {
    /// Singleton and scoped instances live as long as the composition instance.
    #[inline]
    pub fn is_composition_wide(self) -> bool {
        matches!(self, Lifetime::Singleton | Lifetime::Scoped)
    }

    /// Lifetimes which share a single instance between multiple requests.
    #[inline]
    pub fn is_shared(self) -> bool {
        matches!(
            self,
            Lifetime::Singleton | Lifetime::Scoped | Lifetime::PerResolve
        )
    }
}

impl Display for Lifetime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Lifetime::Transient => "Transient",
            Lifetime::PerBlock => "PerBlock",
            Lifetime::PerResolve => "PerResolve",
            Lifetime::Scoped => "Scoped",
            Lifetime::Singleton => "Singleton",
        };

        write!(f, "{name}")
    }
}

/// Declared accessibility of a member. Ordering follows visibility, so `Public` is the greatest.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub enum Accessibility {
    Private,
    Protected,
    Internal,
    #[default]
    Public,
}

impl Accessibility {
    /// Only internal and public members can be used by generated code.
    #[inline]
    pub fn is_accessible(self) -> bool {
        matches!(self, Accessibility::Internal | Accessibility::Public)
    }
}

/// Position in a source file, used to locate diagnostics.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct Location {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn new<T: Into<String>>(file: T, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}
