//! Schema Builder - assembles entities, databases and DAOs for one source unit
//!
//! The three annotation searches are independent; an empty or failed search for
//! one kind never stops the others. Individual declarations that cannot be
//! mapped (stale handles, anonymous types) are dropped without aborting the
//! build. The only fatal outcome is the code model moving to a newer structural
//! version mid-build, which surfaces as [`Error::Cancelled`].

use super::flatten::ColumnFlattener;
use super::{Dao, Database, Entity, Schema};
use crate::annotations::{AnnotationSet, FrameworkAnnotation};
use crate::decl::{AttributeValue, TypeDecl};
use crate::handle::ElementHandle;
use crate::index::{CodeIndex, SearchScope, SourceUnit, StructuralVersion};
use crate::locator::AnnotationLocator;
use crate::resolver::NameResolver;
use crate::{Error, Result};
use std::collections::BTreeSet;

const TABLE_NAME_ATTRIBUTE: &str = "tableName";
const DATABASE_ENTITIES_ATTRIBUTE: &str = "entities";

pub struct SchemaBuilder<'a> {
    index: &'a dyn CodeIndex,
    unit: &'a SourceUnit,
    started: StructuralVersion,
    locator: AnnotationLocator<'a>,
    names: NameResolver<'a>,
}

impl<'a> SchemaBuilder<'a> {
    /// Create a builder pinned to the unit's current structural version
    pub fn new(index: &'a dyn CodeIndex, annotations: &'a AnnotationSet, unit: &'a SourceUnit) -> Self {
        Self {
            index,
            unit,
            started: index.current_structural_version(unit),
            locator: AnnotationLocator::new(index, annotations),
            names: NameResolver::new(index, annotations),
        }
    }

    /// Structural version the build is attributed to
    pub fn version(&self) -> StructuralVersion {
        self.started
    }

    /// Build the schema visible from the unit.
    ///
    /// `Ok(None)` means the framework is not in use in the unit's scope.
    pub fn build(&self) -> Result<Option<Schema>> {
        let Some(scope) = self.index.resolve_scope(self.unit) else {
            self.ensure_current()?;
            tracing::debug!("No scope for unit {}", self.unit);
            return Ok(None);
        };
        if !self.locator.is_framework_present(&scope) {
            self.ensure_current()?;
            return Ok(None);
        }

        tracing::debug!("Recalculating schema for unit {} at {}", self.unit, self.started);

        let entity_decls = self.find(FrameworkAnnotation::Entity, &scope)?;
        let database_decls = self.find(FrameworkAnnotation::Database, &scope)?;
        let dao_decls = self.find(FrameworkAnnotation::Dao, &scope)?;

        let entities: BTreeSet<Entity> = self
            .resolve_all(&entity_decls)
            .filter_map(|decl| self.build_entity(&decl))
            .collect();
        self.ensure_current()?;

        let databases: BTreeSet<Database> = self
            .resolve_all(&database_decls)
            .map(|decl| self.build_database(&decl))
            .collect();
        let daos: BTreeSet<Dao> = self
            .resolve_all(&dao_decls)
            .map(|decl| self.build_dao(&decl))
            .collect();
        self.ensure_current()?;

        Ok(Some(Schema::new(databases, entities, daos)))
    }

    /// Entity record for an entity declaration; `None` if it has no usable name
    pub fn build_entity(&self, decl: &TypeDecl) -> Option<Entity> {
        let Some(table) = self
            .names
            .resolve_name(decl, FrameworkAnnotation::Entity, TABLE_NAME_ATTRIBUTE)
        else {
            tracing::debug!("Skipping unnamed entity {}", decl.handle);
            return None;
        };

        let flattener = ColumnFlattener::new(self.index, &self.names);
        Some(Entity {
            declaration: decl.handle,
            table_name: table.name,
            table_name_source: table.source,
            columns: flattener.columns_of(&decl.handle),
        })
    }

    /// Database record with the entity types listed as class literals
    pub fn build_database(&self, decl: &TypeDecl) -> Database {
        let entities = self
            .names
            .find_annotation(decl, FrameworkAnnotation::Database)
            .and_then(|a| a.find_declared_attribute(DATABASE_ENTITIES_ATTRIBUTE))
            .map(|value| self.class_literal_types(value))
            .unwrap_or_default();

        Database {
            declaration: decl.handle,
            entities,
        }
    }

    pub fn build_dao(&self, decl: &TypeDecl) -> Dao {
        Dao {
            declaration: decl.handle,
        }
    }

    fn find(&self, annotation: FrameworkAnnotation, scope: &SearchScope) -> Result<BTreeSet<ElementHandle>> {
        let found = self.locator.find_annotated(annotation, scope);
        self.ensure_current()?;
        Ok(found)
    }

    fn resolve_all<'s>(&'s self, handles: &'s BTreeSet<ElementHandle>) -> impl Iterator<Item = TypeDecl> + 's {
        handles.iter().filter_map(move |handle| {
            let decl = handle.resolve_type(self.index);
            if decl.is_none() {
                tracing::debug!("Skipping stale declaration {}", handle);
            }
            decl
        })
    }

    /// Types named by `{A.class, B.class}`; anything else contributes nothing
    fn class_literal_types(&self, value: &AttributeValue) -> BTreeSet<ElementHandle> {
        let AttributeValue::Array { elements } = value else {
            return BTreeSet::new();
        };
        elements
            .iter()
            .filter_map(|element| match element {
                AttributeValue::ClassLiteral { operand: Some(operand), .. } => {
                    operand.resolve_type(self.index).map(|ty| ty.handle)
                }
                _ => None,
            })
            .collect()
    }

    fn ensure_current(&self) -> Result<()> {
        let current = self.index.current_structural_version(self.unit);
        if current != self.started {
            return Err(Error::Cancelled {
                started: self.started,
                current,
            });
        }
        Ok(())
    }
}
