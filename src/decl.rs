//! Declaration views - read-only snapshots handed out by the code index
//!
//! Everything here is a point-in-time copy of what the code model knew when the
//! handle was resolved. Cross references between declarations are always
//! [`ElementHandle`]s, never nested declarations, so a view never keeps a
//! reparsed-away declaration alive.

use crate::handle::{ElementHandle, ElementKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Literal value produced by constant evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConstValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Char(char),
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Str(s) => write!(f, "{}", s),
            ConstValue::Int(i) => write!(f, "{}", i),
            ConstValue::Float(x) => write!(f, "{:?}", x),
            ConstValue::Bool(b) => write!(f, "{}", b),
            ConstValue::Char(c) => write!(f, "{}", c),
        }
    }
}

impl From<&str> for ConstValue {
    fn from(s: &str) -> Self {
        ConstValue::Str(s.to_string())
    }
}

impl From<i64> for ConstValue {
    fn from(i: i64) -> Self {
        ConstValue::Int(i)
    }
}

/// Value of an annotation attribute as written in source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttributeValue {
    /// Any expression; constant evaluation decides whether it has a value
    Expression { expression: ElementHandle },
    /// `Foo.class`, with the operand's type if it resolves
    ClassLiteral {
        expression: ElementHandle,
        operand: Option<ElementHandle>,
    },
    /// `{a, b, c}`
    Array { elements: Vec<AttributeValue> },
}

impl AttributeValue {
    /// The expression element backing this value, if it is a single expression
    pub fn expression(&self) -> Option<&ElementHandle> {
        match self {
            AttributeValue::Expression { expression } => Some(expression),
            AttributeValue::ClassLiteral { expression, .. } => Some(expression),
            AttributeValue::Array { .. } => None,
        }
    }
}

/// An annotation applied to a declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    /// Fully qualified name as written/resolved in source
    pub qualified_name: String,
    /// Attributes explicitly declared at the use site, in source order
    pub attributes: Vec<(String, AttributeValue)>,
}

impl Annotation {
    pub fn new(qualified_name: impl Into<String>) -> Self {
        Self {
            qualified_name: qualified_name.into(),
            attributes: Vec::new(),
        }
    }

    /// Add a declared attribute
    pub fn with_attribute(mut self, name: impl Into<String>, value: AttributeValue) -> Self {
        self.attributes.push((name.into(), value));
        self
    }

    /// Look up an attribute declared at the use site (defaults are not reported)
    pub fn find_declared_attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes
            .iter()
            .find(|(attr, _)| attr == name)
            .map(|(_, value)| value)
    }
}

/// Declarations that carry a name and a list of annotations.
pub trait Annotated {
    /// Handle the declaration was resolved from
    fn handle(&self) -> ElementHandle;

    /// Own identifier; `None` for anonymous declarations
    fn name(&self) -> Option<&str>;

    fn annotations(&self) -> &[Annotation];

    /// First annotation matching any of the accepted spellings, tried in order
    fn find_annotation<S: AsRef<str>>(&self, spellings: &[S]) -> Option<&Annotation> {
        spellings.iter().find_map(|spelling| {
            self.annotations()
                .iter()
                .find(|a| a.qualified_name == spelling.as_ref())
        })
    }
}

/// Class-like type declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDecl {
    pub handle: ElementHandle,
    /// Simple name; `None` for anonymous classes
    pub name: Option<String>,
    pub qualified_name: Option<String>,
    /// Module (library or source set) the declaration belongs to
    pub module: String,
    pub annotations: Vec<Annotation>,
    /// Direct supertypes that resolved
    pub supertypes: Vec<ElementHandle>,
}

impl Annotated for TypeDecl {
    fn handle(&self) -> ElementHandle {
        self.handle
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }
}

/// Field declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub handle: ElementHandle,
    pub name: Option<String>,
    /// Declaring type
    pub owner: ElementHandle,
    pub is_static: bool,
    pub is_final: bool,
    pub annotations: Vec<Annotation>,
    /// Declared type, when it resolves to a concrete class
    pub type_ref: Option<ElementHandle>,
    pub initializer: Option<ElementHandle>,
}

impl Annotated for FieldDecl {
    fn handle(&self) -> ElementHandle {
        self.handle
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }
}

/// Shape of an expression, as far as constant evaluation cares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExprKind {
    Literal { value: ConstValue },
    /// Reference to a field, e.g. `Tables.USERS`
    Reference { target: Option<ElementHandle> },
    /// `a + b + ...`, folded left to right: numeric addition until the
    /// first string operand, string concatenation after it
    Concat { operands: Vec<ElementHandle> },
    /// `Foo.class`
    ClassLiteral { operand: Option<ElementHandle> },
    /// Anything the model cannot fold (method calls, array initializers, ...)
    Opaque { text: String },
}

/// Expression element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExprDecl {
    pub handle: ElementHandle,
    pub expr: ExprKind,
}

/// Any declaration the index can resolve a handle to.
#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    Type(TypeDecl),
    Field(FieldDecl),
    Expression(ExprDecl),
}

impl Declaration {
    pub fn kind(&self) -> ElementKind {
        match self {
            Declaration::Type(_) => ElementKind::Type,
            Declaration::Field(_) => ElementKind::Field,
            Declaration::Expression(_) => ElementKind::Expression,
        }
    }

    pub fn handle(&self) -> ElementHandle {
        match self {
            Declaration::Type(ty) => ty.handle,
            Declaration::Field(field) => field.handle,
            Declaration::Expression(expr) => expr.handle,
        }
    }
}
