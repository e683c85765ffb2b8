//! Embedded Field Flattener
//!
//! Walks the fields of an entity type (inherited ones included). A field that
//! embeds a value object contributes that object's columns, prefixed, instead
//! of a column of its own. Prefixes accumulate left to right down the chain:
//! `a_` embedding `b_` embedding column `c` yields `a_b_c`.

use super::Column;
use crate::annotations::FrameworkAnnotation;
use crate::decl::{Annotated, Annotation, FieldDecl};
use crate::handle::{DeclId, ElementHandle};
use crate::index::CodeIndex;
use crate::resolver::NameResolver;
use std::collections::{BTreeSet, HashSet};

const COLUMN_NAME_ATTRIBUTE: &str = "name";
const EMBEDDED_PREFIX_ATTRIBUTE: &str = "prefix";

pub struct ColumnFlattener<'a> {
    index: &'a dyn CodeIndex,
    names: &'a NameResolver<'a>,
}

impl<'a> ColumnFlattener<'a> {
    pub fn new(index: &'a dyn CodeIndex, names: &'a NameResolver<'a>) -> Self {
        Self { index, names }
    }

    /// All columns of `entity_type`, starting from an empty prefix
    pub fn columns_of(&self, entity_type: &ElementHandle) -> BTreeSet<Column> {
        let mut columns = BTreeSet::new();
        let mut chain = HashSet::from([entity_type.id]);
        self.collect(entity_type, "", &mut chain, &mut columns);
        columns
    }

    /// `chain` holds the types currently being expanded, the entity type
    /// included. An embedded field whose type is already on the chain is
    /// skipped; siblings embedding the same type each expand once.
    fn collect(&self, ty: &ElementHandle, prefix: &str, chain: &mut HashSet<DeclId>, out: &mut BTreeSet<Column>) {
        for handle in self.index.fields_of(ty) {
            let Some(field) = handle.resolve_field(self.index) else {
                tracing::debug!("Skipping stale field {}", handle);
                continue;
            };
            if field.is_static || self.names.has_annotation(&field, FrameworkAnnotation::Ignore) {
                continue;
            }

            if let Some(embedded) = self.embedded_annotation(&field) {
                let Some(target) = field.type_ref else {
                    tracing::debug!("Skipping embedded field {} with unresolved type", handle);
                    continue;
                };
                if !chain.insert(target.id) {
                    tracing::debug!("Skipping cyclic embedding of {} through {}", target, handle);
                    continue;
                }
                let nested = self.nested_prefix(prefix, &embedded);
                self.collect(&target, &nested, chain, out);
                chain.remove(&target.id);
                continue;
            }

            match self
                .names
                .resolve_name(&field, FrameworkAnnotation::ColumnInfo, COLUMN_NAME_ATTRIBUTE)
            {
                Some(resolved) => {
                    out.insert(Column {
                        field: field.handle,
                        name: format!("{}{}", prefix, resolved.name),
                        name_source: resolved.source,
                    });
                }
                None => tracing::debug!("Skipping unnamed field {}", handle),
            }
        }
    }

    /// The embedded annotation governing `field`: on the field itself, else on
    /// the field's declared type
    fn embedded_annotation(&self, field: &FieldDecl) -> Option<Annotation> {
        if let Some(annotation) = self.names.find_annotation(field, FrameworkAnnotation::Embedded) {
            return Some(annotation.clone());
        }
        let declared = field.type_ref?.resolve_type(self.index)?;
        self.names
            .find_annotation(&declared, FrameworkAnnotation::Embedded)
            .cloned()
    }

    /// Prefix for an embedded object's columns. A prefix that does not fold to
    /// a constant leaves the current prefix unchanged.
    fn nested_prefix(&self, current: &str, embedded: &Annotation) -> String {
        match self.names.constant_attribute(embedded, EMBEDDED_PREFIX_ATTRIBUTE) {
            Some(resolved) => format!("{}{}", current, resolved.name),
            None => current.to_string(),
        }
    }
}
