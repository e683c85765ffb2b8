//! Constant Name Resolver - Resolves the declared name of a type or field
//!
//! Resolution order:
//! 1. Annotation attribute (e.g. `@Entity(tableName = ...)`) if declared and
//!    constant-evaluable; the name source is the attribute value expression
//! 2. The declaration's own identifier; the name source is the declaration
//! 3. Nothing: anonymous declarations contribute no record

use crate::annotations::{AnnotationSet, FrameworkAnnotation};
use crate::decl::{Annotated, Annotation};
use crate::handle::ElementHandle;
use crate::index::CodeIndex;

/// A resolved name and the element it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedName {
    pub name: String,
    pub source: ElementHandle,
}

pub struct NameResolver<'a> {
    index: &'a dyn CodeIndex,
    annotations: &'a AnnotationSet,
}

impl<'a> NameResolver<'a> {
    pub fn new(index: &'a dyn CodeIndex, annotations: &'a AnnotationSet) -> Self {
        Self { index, annotations }
    }

    /// Find `annotation` on `decl` under any accepted spelling
    pub fn find_annotation<'d, D: Annotated>(&self, decl: &'d D, annotation: FrameworkAnnotation) -> Option<&'d Annotation> {
        decl.find_annotation(self.annotations.spellings(annotation))
    }

    pub fn has_annotation<D: Annotated>(&self, decl: &D, annotation: FrameworkAnnotation) -> bool {
        self.find_annotation(decl, annotation).is_some()
    }

    /// Constant string value of a declared attribute, with its expression
    pub fn constant_attribute(&self, annotation: &Annotation, attribute: &str) -> Option<ResolvedName> {
        let expression = annotation.find_declared_attribute(attribute)?.expression()?;
        let value = self.index.evaluate_constant_expression(expression)?;
        Some(ResolvedName {
            name: value.to_string(),
            source: *expression,
        })
    }

    /// Resolve the name of `decl` from `annotation.attribute`, falling back to
    /// its identifier
    pub fn resolve_name<D: Annotated>(
        &self,
        decl: &D,
        annotation: FrameworkAnnotation,
        attribute: &str,
    ) -> Option<ResolvedName> {
        let from_attribute = self
            .find_annotation(decl, annotation)
            .and_then(|a| self.constant_attribute(a, attribute));
        if from_attribute.is_some() {
            return from_attribute;
        }

        decl.name().map(|name| ResolvedName {
            name: name.to_string(),
            source: decl.handle(),
        })
    }
}
