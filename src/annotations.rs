//! Framework annotations and their accepted spellings
//!
//! The framework moved packages once, so every annotation has a legacy and a
//! current fully qualified name. Both are accepted everywhere; the legacy one is
//! tried first.

use crate::config::SpellingOverrides;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const LEGACY_PACKAGE: &str = "android.arch.persistence.room";
const CURRENT_PACKAGE: &str = "androidx.room";

/// Annotation identities the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameworkAnnotation {
    /// Marks a type mapped to a table
    Entity,
    /// Marks a database declaration listing its entities
    Database,
    /// Marks a data-access object
    Dao,
    /// Column naming on a field
    ColumnInfo,
    /// Field flattened into its container's columns
    Embedded,
    /// Field excluded from the mapping
    Ignore,
}

impl FrameworkAnnotation {
    /// Simple (unqualified) annotation name
    pub fn simple_name(&self) -> &'static str {
        match self {
            FrameworkAnnotation::Entity => "Entity",
            FrameworkAnnotation::Database => "Database",
            FrameworkAnnotation::Dao => "Dao",
            FrameworkAnnotation::ColumnInfo => "ColumnInfo",
            FrameworkAnnotation::Embedded => "Embedded",
            FrameworkAnnotation::Ignore => "Ignore",
        }
    }

    /// Get all annotation identities
    pub fn all() -> &'static [FrameworkAnnotation] {
        &[
            FrameworkAnnotation::Entity,
            FrameworkAnnotation::Database,
            FrameworkAnnotation::Dao,
            FrameworkAnnotation::ColumnInfo,
            FrameworkAnnotation::Embedded,
            FrameworkAnnotation::Ignore,
        ]
    }

    /// Built-in spellings, legacy first
    pub fn default_spellings(&self) -> Vec<String> {
        vec![
            format!("{}.{}", LEGACY_PACKAGE, self.simple_name()),
            format!("{}.{}", CURRENT_PACKAGE, self.simple_name()),
        ]
    }
}

impl FromStr for FrameworkAnnotation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "entity" => Ok(FrameworkAnnotation::Entity),
            "database" => Ok(FrameworkAnnotation::Database),
            "dao" => Ok(FrameworkAnnotation::Dao),
            "column_info" | "columninfo" | "column" => Ok(FrameworkAnnotation::ColumnInfo),
            "embedded" => Ok(FrameworkAnnotation::Embedded),
            "ignore" => Ok(FrameworkAnnotation::Ignore),
            _ => Err(Error::UnknownAnnotation(s.to_string())),
        }
    }
}

impl fmt::Display for FrameworkAnnotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.simple_name())
    }
}

/// Accepted spellings for every [`FrameworkAnnotation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationSet {
    entity: Vec<String>,
    database: Vec<String>,
    dao: Vec<String>,
    column_info: Vec<String>,
    embedded: Vec<String>,
    ignore: Vec<String>,
}

impl AnnotationSet {
    /// Spellings with config overrides applied on top of the built-ins
    pub fn from_overrides(overrides: &SpellingOverrides) -> Self {
        let pick = |annotation: FrameworkAnnotation, custom: &Option<Vec<String>>| {
            custom.clone().unwrap_or_else(|| annotation.default_spellings())
        };
        Self {
            entity: pick(FrameworkAnnotation::Entity, &overrides.entity),
            database: pick(FrameworkAnnotation::Database, &overrides.database),
            dao: pick(FrameworkAnnotation::Dao, &overrides.dao),
            column_info: pick(FrameworkAnnotation::ColumnInfo, &overrides.column_info),
            embedded: pick(FrameworkAnnotation::Embedded, &overrides.embedded),
            ignore: pick(FrameworkAnnotation::Ignore, &overrides.ignore),
        }
    }

    /// Accepted qualified names for `annotation`, in lookup order
    pub fn spellings(&self, annotation: FrameworkAnnotation) -> &[String] {
        match annotation {
            FrameworkAnnotation::Entity => &self.entity,
            FrameworkAnnotation::Database => &self.database,
            FrameworkAnnotation::Dao => &self.dao,
            FrameworkAnnotation::ColumnInfo => &self.column_info,
            FrameworkAnnotation::Embedded => &self.embedded,
            FrameworkAnnotation::Ignore => &self.ignore,
        }
    }

    /// Which annotation a qualified name spells, if any
    pub fn identify(&self, qualified_name: &str) -> Option<FrameworkAnnotation> {
        FrameworkAnnotation::all()
            .iter()
            .copied()
            .find(|a| self.spellings(*a).iter().any(|s| s == qualified_name))
    }
}

impl Default for AnnotationSet {
    fn default() -> Self {
        Self::from_overrides(&SpellingOverrides::default())
    }
}
