//! Schema records - the derived structure consumers query
//!
//! A [`Schema`] is an immutable snapshot produced by one build. Records compare
//! by value including their handles, so two entities sharing a table name but
//! declared by different types are both kept.

pub mod builder;
pub mod flatten;

pub use builder::SchemaBuilder;
pub use flatten::ColumnFlattener;

use crate::handle::ElementHandle;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// One column of an entity, possibly reached through embedded fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Column {
    /// Field the column is read from
    pub field: ElementHandle,
    /// Column name with all embedding prefixes applied
    pub name: String,
    /// Element the unprefixed name came from
    pub name_source: ElementHandle,
}

/// A mapped table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Entity {
    pub declaration: ElementHandle,
    pub table_name: String,
    pub table_name_source: ElementHandle,
    pub columns: BTreeSet<Column>,
}

impl Entity {
    /// Column by name (ASCII case-insensitive, as SQL identifiers are)
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn column_names(&self) -> BTreeSet<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// A database declaration and the entity types it lists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Database {
    pub declaration: ElementHandle,
    /// Entity *declarations* named in the database annotation; not checked
    /// against the entity set
    pub entities: BTreeSet<ElementHandle>,
}

/// A data-access object declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Dao {
    pub declaration: ElementHandle,
}

/// Everything the framework's annotations describe in one scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Schema {
    pub databases: BTreeSet<Database>,
    pub entities: BTreeSet<Entity>,
    pub daos: BTreeSet<Dao>,
}

impl Schema {
    pub fn new(databases: BTreeSet<Database>, entities: BTreeSet<Entity>, daos: BTreeSet<Dao>) -> Self {
        Self {
            databases,
            entities,
            daos,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.databases.is_empty() && self.entities.is_empty() && self.daos.is_empty()
    }

    /// Entities mapped to `table_name` (ASCII case-insensitive). More than one
    /// result is a naming conflict for consumers to report.
    pub fn entities_by_table_name(&self, table_name: &str) -> Vec<&Entity> {
        self.entities
            .iter()
            .filter(|e| e.table_name.eq_ignore_ascii_case(table_name))
            .collect()
    }

    pub fn entity_for(&self, declaration: &ElementHandle) -> Option<&Entity> {
        self.entities.iter().find(|e| e.declaration == *declaration)
    }

    pub fn database_for(&self, declaration: &ElementHandle) -> Option<&Database> {
        self.databases.iter().find(|d| d.declaration == *declaration)
    }

    pub fn dao_for(&self, declaration: &ElementHandle) -> Option<&Dao> {
        self.daos.iter().find(|d| d.declaration == *declaration)
    }

    /// Entity records for the members a database lists; members that are not
    /// entities in this schema are left out
    pub fn database_entities(&self, database: &Database) -> Vec<&Entity> {
        database
            .entities
            .iter()
            .filter_map(|member| self.entity_for(member))
            .collect()
    }

    pub fn stats(&self) -> SchemaStats {
        SchemaStats {
            databases: self.databases.len(),
            entities: self.entities.len(),
            columns: self.entities.iter().map(|e| e.columns.len()).sum(),
            daos: self.daos.len(),
        }
    }
}

/// Record counts of a schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SchemaStats {
    pub databases: usize,
    pub entities: usize,
    pub columns: usize,
    pub daos: usize,
}

impl fmt::Display for SchemaStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Schema Statistics:")?;
        writeln!(f, "  Databases: {}", self.databases)?;
        writeln!(f, "  Entities: {} ({} columns)", self.entities, self.columns)?;
        writeln!(f, "  DAOs: {}", self.daos)
    }
}
