//! Code Index - the boundary to the external code model
//!
//! The engine never parses source itself. Everything it knows about
//! declarations comes through [`CodeIndex`], which an embedder implements on top
//! of its own incrementally reparsed model. [`memory::InMemoryIndex`] is a
//! complete in-process implementation used by tests.

pub mod memory;

pub use memory::InMemoryIndex;

use crate::decl::{ConstValue, Declaration};
use crate::handle::ElementHandle;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A source file (or other compilation unit) that schema queries are made from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceUnit {
    /// Path relative to the project root
    pub path: String,
    /// Module the unit belongs to
    pub module: String,
}

impl SourceUnit {
    pub fn new(module: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            module: module.into(),
        }
    }
}

impl fmt::Display for SourceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module, self.path)
    }
}

/// Opaque structural-change token.
///
/// Advances whenever the shape of declarations visible to a unit may have
/// changed. Formatting or expression-body edits do not advance it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct StructuralVersion(pub u64);

impl fmt::Display for StructuralVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// The set of modules whose declarations are visible from a source unit.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SearchScope {
    modules: BTreeSet<String>,
}

impl SearchScope {
    pub fn new<I, S>(modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            modules: modules.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, module: &str) -> bool {
        self.modules.contains(module)
    }

    pub fn modules(&self) -> impl Iterator<Item = &str> {
        self.modules.iter().map(String::as_str)
    }
}

/// Lookup primitives the engine consumes from the host's code model.
///
/// Implementations are called from arbitrary threads against a point-in-time
/// view of the model and must not block on the engine.
pub trait CodeIndex: Send + Sync {
    /// Scope visible from `unit`; `None` if the unit is unknown to the model
    fn resolve_scope(&self, unit: &SourceUnit) -> Option<SearchScope>;

    /// Type declarations with this fully qualified name inside `scope`
    fn find_types_by_qualified_name(&self, name: &str, scope: &SearchScope) -> Vec<ElementHandle>;

    /// Declarations annotated with `annotation_type`, expanded to subclasses and
    /// implementors of the annotated declarations
    fn search_annotated_elements(
        &self,
        annotation_type: &ElementHandle,
        scope: &SearchScope,
    ) -> Vec<ElementHandle>;

    /// Fold an expression to a literal, if it is a compile-time constant
    fn evaluate_constant_expression(&self, expression: &ElementHandle) -> Option<ConstValue>;

    /// Current structural-change version for `unit`
    fn current_structural_version(&self, unit: &SourceUnit) -> StructuralVersion;

    /// Re-resolve a handle; `None` if the declaration no longer exists
    fn declaration(&self, handle: &ElementHandle) -> Option<Declaration>;

    /// All fields of a type, inherited ones included, own fields first
    fn fields_of(&self, type_handle: &ElementHandle) -> Vec<ElementHandle>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_membership() {
        let scope = SearchScope::new(["app", "room-runtime"]);
        assert!(scope.contains("app"));
        assert!(!scope.contains("feature"));
        assert_eq!(scope.modules().count(), 2);
    }

    #[test]
    fn test_version_ordering() {
        assert!(StructuralVersion(2) > StructuralVersion(1));
        assert_eq!(StructuralVersion::default(), StructuralVersion(0));
        assert_eq!(StructuralVersion(5).to_string(), "v5");
    }
}
