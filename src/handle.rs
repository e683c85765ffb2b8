//! Element handles - revalidating references into the code model
//!
//! Format: `decl://<kind>/<id>`
//!
//! Examples:
//! - `decl://type/42`
//! - `decl://field/7`
//!
//! A handle never owns the declaration it points at. The code model hands out
//! identities, and every dereference goes back through [`CodeIndex`] so that a
//! removed or reparsed-away declaration resolves to `None` instead of dangling.

use crate::decl::{Declaration, ExprDecl, FieldDecl, TypeDecl};
use crate::index::CodeIndex;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identity of a declaration inside the code model.
///
/// Identities survive reparsing as long as the model considers the declaration
/// to be the same one. Two declarations at the same text offset in different
/// revisions may still carry different identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclId(pub u64);

impl fmt::Display for DeclId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What kind of declaration a handle points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    /// Class, interface or other type declaration
    Type,
    /// Field or property of a type
    Field,
    /// Expression, e.g. an annotation attribute value
    Expression,
}

impl ElementKind {
    /// Get the string representation of the element kind
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Type => "type",
            ElementKind::Field => "field",
            ElementKind::Expression => "expression",
        }
    }
}

impl FromStr for ElementKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "type" | "class" | "interface" => Ok(ElementKind::Type),
            "field" | "property" => Ok(ElementKind::Field),
            "expression" | "expr" => Ok(ElementKind::Expression),
            _ => Err(Error::InvalidHandle(format!("Unknown element kind: {}", s))),
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lightweight, revalidating locator for a declaration.
///
/// Equality is identity equality: two handles are equal only when they name the
/// same declaration identity, regardless of where it currently sits in the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementHandle {
    /// Kind of the target declaration
    pub kind: ElementKind,
    /// Identity assigned by the code model
    pub id: DeclId,
}

impl ElementHandle {
    /// Create a new handle
    pub fn new(kind: ElementKind, id: DeclId) -> Self {
        Self { kind, id }
    }

    /// Handle to a type declaration
    pub fn of_type(id: u64) -> Self {
        Self::new(ElementKind::Type, DeclId(id))
    }

    /// Handle to a field declaration
    pub fn of_field(id: u64) -> Self {
        Self::new(ElementKind::Field, DeclId(id))
    }

    /// Handle to an expression
    pub fn of_expression(id: u64) -> Self {
        Self::new(ElementKind::Expression, DeclId(id))
    }

    /// Re-resolve the handle against the live code model.
    ///
    /// Returns `None` when the target is gone or now has a different kind.
    pub fn resolve(&self, index: &dyn CodeIndex) -> Option<Declaration> {
        let decl = index.declaration(self)?;
        (decl.kind() == self.kind).then_some(decl)
    }

    /// Resolve to a type declaration
    pub fn resolve_type(&self, index: &dyn CodeIndex) -> Option<TypeDecl> {
        match self.resolve(index)? {
            Declaration::Type(ty) => Some(ty),
            _ => None,
        }
    }

    /// Resolve to a field declaration
    pub fn resolve_field(&self, index: &dyn CodeIndex) -> Option<FieldDecl> {
        match self.resolve(index)? {
            Declaration::Field(field) => Some(field),
            _ => None,
        }
    }

    /// Resolve to an expression
    pub fn resolve_expression(&self, index: &dyn CodeIndex) -> Option<ExprDecl> {
        match self.resolve(index)? {
            Declaration::Expression(expr) => Some(expr),
            _ => None,
        }
    }

    /// Parse a handle string
    ///
    /// Expected format: `decl://<kind>/<id>`
    pub fn parse(handle: &str) -> Result<Self> {
        let rest = handle
            .strip_prefix("decl://")
            .ok_or_else(|| Error::InvalidHandle("Handle must start with decl://".to_string()))?;

        let (kind_str, id_str) = rest
            .split_once('/')
            .ok_or_else(|| Error::InvalidHandle("Handle must contain kind/id".to_string()))?;

        let kind = ElementKind::from_str(kind_str)?;
        let id: u64 = id_str
            .parse()
            .map_err(|_| Error::InvalidHandle(format!("Invalid declaration id: {}", id_str)))?;

        Ok(Self::new(kind, DeclId(id)))
    }

    /// Convert to handle string
    pub fn to_handle_string(&self) -> String {
        format!("decl://{}/{}", self.kind.as_str(), self.id)
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_handle_string())
    }
}

impl FromStr for ElementHandle {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for ElementHandle {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_handle_string())
    }
}

impl<'de> Deserialize<'de> for ElementHandle {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ElementHandle::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::memory::InMemoryIndex;

    #[test]
    fn test_handle_string_form() {
        let handle = ElementHandle::of_field(7);
        assert_eq!(handle.to_handle_string(), "decl://field/7");
        assert_eq!(ElementHandle::parse("decl://field/7").unwrap(), handle);
        assert_eq!("decl://class/3".parse::<ElementHandle>().unwrap(), ElementHandle::of_type(3));
    }

    #[test]
    fn test_invalid_handle() {
        assert!(ElementHandle::parse("invalid").is_err());
        assert!(ElementHandle::parse("decl://type").is_err()); // missing id
        assert!(ElementHandle::parse("decl://widget/1").is_err());
        assert!(ElementHandle::parse("decl://type/abc").is_err());
    }

    #[test]
    fn test_identity_not_location() {
        // Same numeric id under a different kind is a different declaration.
        assert_ne!(ElementHandle::of_type(1), ElementHandle::of_field(1));
    }

    #[test]
    fn test_resolve_fails_softly_after_removal() {
        let index = InMemoryIndex::new();
        let ty = index.add_type("app", "com.example.User");
        assert!(ty.resolve_type(&index).is_some());

        index.remove(&ty);
        assert!(ty.resolve(&index).is_none());
        assert!(ty.resolve_type(&index).is_none());
    }

    #[test]
    fn test_resolve_checks_kind() {
        let index = InMemoryIndex::new();
        let ty = index.add_type("app", "com.example.User");
        let wrong_kind = ElementHandle::new(ElementKind::Field, ty.id);
        assert!(wrong_kind.resolve(&index).is_none());
    }
}
