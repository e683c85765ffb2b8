//! Schema Manager - the entry point consumers query
//!
//! Looks up the unit's cache entry for the current structural version and
//! builds on a miss. Builds run without any lock held; concurrent queries for
//! the same unit and version may build redundantly, and the first installed
//! result is the one everybody sees.

use crate::annotations::AnnotationSet;
use crate::cache::{CacheStats, SchemaCache};
use crate::config::EngineConfig;
use crate::index::{CodeIndex, SourceUnit};
use crate::schema::{Schema, SchemaBuilder};
use crate::Result;
use std::sync::Arc;

pub struct SchemaManager {
    index: Arc<dyn CodeIndex>,
    annotations: AnnotationSet,
    config: EngineConfig,
    cache: SchemaCache,
}

impl SchemaManager {
    /// Create a manager with the default configuration
    pub fn new(index: Arc<dyn CodeIndex>) -> Self {
        let config = EngineConfig::default();
        Self {
            index,
            annotations: AnnotationSet::from_overrides(&config.spellings),
            config,
            cache: SchemaCache::new(),
        }
    }

    /// Create a manager with a validated configuration
    pub fn with_config(index: Arc<dyn CodeIndex>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            index,
            annotations: AnnotationSet::from_overrides(&config.spellings),
            config,
            cache: SchemaCache::new(),
        })
    }

    /// Schema visible from `unit`, or `None` if the framework is not used there.
    ///
    /// Never fails: a unit whose builds keep getting invalidated reads as
    /// having no schema for this call.
    pub fn get_schema(&self, unit: &SourceUnit) -> Option<Arc<Schema>> {
        match self.try_get_schema(unit) {
            Ok(schema) => schema,
            Err(e) => {
                tracing::warn!("No schema for {}: {}", unit, e);
                None
            }
        }
    }

    /// Like [`get_schema`](Self::get_schema), but reports
    /// [`Error::Cancelled`](crate::Error::Cancelled) once every attempt was
    /// invalidated mid-build
    pub fn try_get_schema(&self, unit: &SourceUnit) -> Result<Option<Arc<Schema>>> {
        let max_attempts = self.config.max_build_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;

            let version = self.index.current_structural_version(unit);
            if let Some(cached) = self.cache.get(unit, version) {
                tracing::debug!("Schema cache hit for {} at {}", unit, version);
                return Ok(cached);
            }

            let builder = SchemaBuilder::new(self.index.as_ref(), &self.annotations, unit);
            match builder.build() {
                Ok(schema) => {
                    return Ok(self.cache.install(unit, builder.version(), schema.map(Arc::new)));
                }
                Err(e) if e.is_retryable() => {
                    self.cache.record_discarded();
                    if attempt >= max_attempts {
                        tracing::warn!("Giving up on schema for {} after {} attempts", unit, attempt);
                        return Err(e);
                    }
                    tracing::warn!("Discarding schema build for {}: {}", unit, e);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Forget the cached schema of a unit its owner has discarded
    pub fn discard(&self, unit: &SourceUnit) -> bool {
        self.cache.discard(unit)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn annotations(&self) -> &AnnotationSet {
        &self.annotations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SpellingOverrides, parse_config};
    use crate::decl::{Annotation, ConstValue, Declaration};
    use crate::handle::ElementHandle;
    use crate::index::{InMemoryIndex, SearchScope, StructuralVersion};
    use crate::Error;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn init_logging() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn room_project() -> Arc<InMemoryIndex> {
        let index = InMemoryIndex::new();
        index.add_dependency("app", "room");
        index.add_dependency("feature", "room");
        for name in ["Entity", "Database", "Dao", "ColumnInfo", "Embedded", "Ignore"] {
            index.add_type("room", &format!("androidx.room.{}", name));
        }
        Arc::new(index)
    }

    fn entity(index: &InMemoryIndex, module: &str, name: &str) -> ElementHandle {
        let ty = index.add_type(module, name);
        index.annotate(&ty, Annotation::new("androidx.room.Entity"));
        index.add_field(&ty, "id");
        ty
    }

    fn main_unit() -> SourceUnit {
        SourceUnit::new("app", "src/Main.java")
    }

    /// Moves the structural version the first `moves` times the engine
    /// searches for annotated elements, simulating edits racing a build.
    struct RacingIndex {
        inner: Arc<InMemoryIndex>,
        moves: AtomicU32,
    }

    impl CodeIndex for RacingIndex {
        fn resolve_scope(&self, unit: &SourceUnit) -> Option<SearchScope> {
            self.inner.resolve_scope(unit)
        }

        fn find_types_by_qualified_name(&self, name: &str, scope: &SearchScope) -> Vec<ElementHandle> {
            self.inner.find_types_by_qualified_name(name, scope)
        }

        fn search_annotated_elements(&self, annotation_type: &ElementHandle, scope: &SearchScope) -> Vec<ElementHandle> {
            let raced = self
                .moves
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |m| m.checked_sub(1))
                .is_ok();
            if raced {
                self.inner.bump_version();
            }
            self.inner.search_annotated_elements(annotation_type, scope)
        }

        fn evaluate_constant_expression(&self, expression: &ElementHandle) -> Option<ConstValue> {
            self.inner.evaluate_constant_expression(expression)
        }

        fn current_structural_version(&self, unit: &SourceUnit) -> StructuralVersion {
            self.inner.current_structural_version(unit)
        }

        fn declaration(&self, handle: &ElementHandle) -> Option<Declaration> {
            self.inner.declaration(handle)
        }

        fn fields_of(&self, type_handle: &ElementHandle) -> Vec<ElementHandle> {
            self.inner.fields_of(type_handle)
        }
    }

    #[test]
    fn test_no_schema_without_framework() {
        let index = Arc::new(InMemoryIndex::new());
        let user = index.add_type("app", "com.example.User");
        index.annotate(&user, Annotation::new("androidx.room.Entity"));
        let manager = SchemaManager::new(index);
        assert!(manager.get_schema(&main_unit()).is_none());
    }

    #[test]
    fn test_repeated_queries_do_not_rebuild() {
        init_logging();
        let index = room_project();
        entity(&index, "app", "com.example.User");
        let manager = SchemaManager::new(index.clone());

        let first = manager.get_schema(&main_unit()).unwrap();
        let second = manager.get_schema(&main_unit()).unwrap();
        assert_eq!(first, second);
        assert!(Arc::ptr_eq(&first, &second));

        let stats = manager.cache_stats();
        assert_eq!(stats.builds, 1);
        assert_eq!(stats.hits, 1);
    }

    #[test]
    fn test_version_bump_picks_up_new_entity() {
        let index = room_project();
        entity(&index, "app", "com.example.User");
        let manager = SchemaManager::new(index.clone());
        let unit = main_unit();

        let before = manager.get_schema(&unit).unwrap();
        assert_eq!(before.entities.len(), 1);

        // add_type and annotate each advance the structural version
        let book = entity(&index, "app", "com.example.Book");
        let after = manager.get_schema(&unit).unwrap();
        assert_eq!(after.entities.len(), 2);
        assert!(after.entity_for(&book).is_some());
        assert!(before.entity_for(&book).is_none());
        assert_eq!(manager.cache_stats().builds, 2);
    }

    #[test]
    fn test_expression_edit_keeps_cached_schema() {
        let index = room_project();
        let user = index.add_type("app", "com.example.User");
        let value = index.literal_attribute("users");
        let expression = *value.expression().unwrap();
        index.annotate(&user, Annotation::new("androidx.room.Entity").with_attribute("tableName", value));
        let manager = SchemaManager::new(index.clone());
        let unit = main_unit();

        assert_eq!(manager.get_schema(&unit).unwrap().entity_for(&user).unwrap().table_name, "users");

        index.replace_expression(
            &expression,
            crate::decl::ExprKind::Literal { value: ConstValue::from("people") },
        );
        // Not a structural change: the snapshot stays until the next bump.
        assert_eq!(manager.get_schema(&unit).unwrap().entity_for(&user).unwrap().table_name, "users");

        index.bump_version();
        assert_eq!(manager.get_schema(&unit).unwrap().entity_for(&user).unwrap().table_name, "people");
    }

    #[test]
    fn test_units_built_independently() {
        let index = room_project();
        entity(&index, "app", "com.example.User");
        entity(&index, "feature", "com.example.feature.Item");
        let manager = SchemaManager::new(index.clone());

        let app = manager.get_schema(&main_unit()).unwrap();
        let feature = manager.get_schema(&SourceUnit::new("feature", "src/Item.java")).unwrap();
        assert_eq!(app.entities.len(), 1);
        assert_eq!(feature.entities.len(), 1);
        assert_ne!(app, feature);
        assert_eq!(manager.cache_stats().builds, 2);

        assert!(manager.discard(&main_unit()));
        manager.get_schema(&main_unit());
        assert_eq!(manager.cache_stats().builds, 3);
    }

    #[test]
    fn test_dual_spelling_entities_discovered_once() {
        let index = room_project();
        index.add_type("room", "android.arch.persistence.room.Entity");
        let legacy = index.add_type("app", "com.example.Legacy");
        index.annotate(&legacy, Annotation::new("android.arch.persistence.room.Entity"));
        let both = index.add_type("app", "com.example.Both");
        index.annotate(&both, Annotation::new("android.arch.persistence.room.Entity"));
        index.annotate(&both, Annotation::new("androidx.room.Entity"));

        let manager = SchemaManager::new(index.clone());
        let schema = manager.get_schema(&main_unit()).unwrap();
        assert_eq!(schema.entities.len(), 2);
        assert!(schema.entity_for(&legacy).is_some());
        assert_eq!(schema.entities_by_table_name("Both").len(), 1);
    }

    #[test]
    fn test_stale_handles_resolve_to_none_after_removal() {
        let index = room_project();
        let user = entity(&index, "app", "com.example.User");
        let manager = SchemaManager::new(index.clone());
        let schema = manager.get_schema(&main_unit()).unwrap();

        index.remove(&user);
        let record = schema.entity_for(&user).unwrap();
        assert!(record.declaration.resolve(&*index).is_none());
        assert!(record.columns.iter().all(|c| c.field.resolve(&*index).is_none()));

        let fresh = manager.get_schema(&main_unit()).unwrap();
        assert!(fresh.entities.is_empty());
    }

    #[test]
    fn test_racing_edit_discards_build_and_retries() {
        let inner = room_project();
        entity(&inner, "app", "com.example.User");
        let racing = Arc::new(RacingIndex {
            inner: inner.clone(),
            moves: AtomicU32::new(1),
        });
        let manager = SchemaManager::new(racing);
        let unit = main_unit();

        let schema = manager.get_schema(&unit).unwrap();
        assert_eq!(schema.entities.len(), 1);

        let stats = manager.cache_stats();
        assert_eq!(stats.discarded, 1);
        assert_eq!(stats.builds, 1);
        assert_eq!(manager.cache.cached_version(&unit), Some(inner.version()));
    }

    #[test]
    fn test_retries_exhausted() {
        let inner = room_project();
        entity(&inner, "app", "com.example.User");
        let racing = Arc::new(RacingIndex {
            inner: inner.clone(),
            moves: AtomicU32::new(u32::MAX),
        });
        let config = parse_config("max_build_attempts = 2").unwrap();
        let manager = SchemaManager::with_config(racing, config).unwrap();
        let unit = main_unit();

        assert!(matches!(manager.try_get_schema(&unit), Err(Error::Cancelled { .. })));
        assert!(manager.get_schema(&unit).is_none());
        assert_eq!(manager.cache_stats().discarded, 4);
        assert_eq!(manager.cache.cached_version(&unit), None);
    }

    #[test]
    fn test_concurrent_queries_agree() {
        let index = room_project();
        for i in 0..10 {
            entity(&index, "app", &format!("com.example.Entity{}", i));
        }
        let manager = SchemaManager::new(index.clone());
        let unit = main_unit();

        let schemas: Vec<Arc<Schema>> = crossbeam::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|_| manager.get_schema(&unit).unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        })
        .unwrap();

        assert!(schemas.iter().all(|s| s.entities.len() == 10));
        let installed = manager.get_schema(&unit).unwrap();
        assert!(schemas.iter().all(|s| **s == *installed));
    }

    #[test]
    fn test_custom_spellings() {
        let index = Arc::new(InMemoryIndex::new());
        index.add_type("app", "com.fork.room.Entity");
        let user = index.add_type("app", "com.example.User");
        index.annotate(&user, Annotation::new("com.fork.room.Entity"));

        let default_manager = SchemaManager::new(index.clone());
        assert!(default_manager.get_schema(&main_unit()).is_none());

        let config = EngineConfig {
            spellings: SpellingOverrides {
                entity: Some(vec!["com.fork.room.Entity".to_string()]),
                ..Default::default()
            },
            ..Default::default()
        };
        let manager = SchemaManager::with_config(index.clone(), config).unwrap();
        let schema = manager.get_schema(&main_unit()).unwrap();
        assert!(schema.entity_for(&user).is_some());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let index = Arc::new(InMemoryIndex::new());
        let config = EngineConfig {
            max_build_attempts: 0,
            ..Default::default()
        };
        assert!(matches!(SchemaManager::with_config(index, config), Err(Error::Config(_))));
    }
}
