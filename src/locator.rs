//! Annotation Locator
//!
//! Finds declarations carrying a framework annotation by asking the index once
//! per accepted spelling and unioning the hits. The index's annotated-element
//! search already expands to subclasses and implementors, so a `@Dao` base
//! interface brings its implementations along.

use crate::annotations::{AnnotationSet, FrameworkAnnotation};
use crate::handle::ElementHandle;
use crate::index::{CodeIndex, SearchScope};
use std::collections::BTreeSet;

pub struct AnnotationLocator<'a> {
    index: &'a dyn CodeIndex,
    annotations: &'a AnnotationSet,
}

impl<'a> AnnotationLocator<'a> {
    pub fn new(index: &'a dyn CodeIndex, annotations: &'a AnnotationSet) -> Self {
        Self { index, annotations }
    }

    /// Annotation type declarations visible in `scope`, across all spellings
    pub fn annotation_types(&self, annotation: FrameworkAnnotation, scope: &SearchScope) -> Vec<ElementHandle> {
        self.annotations
            .spellings(annotation)
            .iter()
            .flat_map(|name| self.index.find_types_by_qualified_name(name, scope))
            .collect()
    }

    /// True iff some spelling of the entity annotation resolves in `scope`
    pub fn is_framework_present(&self, scope: &SearchScope) -> bool {
        self.annotations
            .spellings(FrameworkAnnotation::Entity)
            .iter()
            .any(|name| !self.index.find_types_by_qualified_name(name, scope).is_empty())
    }

    /// Declarations annotated with any spelling of `annotation`, de-duplicated
    /// by identity
    pub fn find_annotated(&self, annotation: FrameworkAnnotation, scope: &SearchScope) -> BTreeSet<ElementHandle> {
        let mut found = BTreeSet::new();
        for annotation_type in self.annotation_types(annotation, scope) {
            found.extend(self.index.search_annotated_elements(&annotation_type, scope));
        }
        tracing::debug!("Found {} declarations annotated with {}", found.len(), annotation);
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decl::Annotation;
    use crate::index::InMemoryIndex;

    fn scope() -> SearchScope {
        SearchScope::new(["app", "room"])
    }

    #[test]
    fn test_framework_absent_without_entity_type() {
        let index = InMemoryIndex::new();
        index.add_type("room", "androidx.room.Dao");
        let annotations = AnnotationSet::default();
        let locator = AnnotationLocator::new(&index, &annotations);
        assert!(!locator.is_framework_present(&scope()));
    }

    #[test]
    fn test_framework_present_with_either_spelling() {
        let annotations = AnnotationSet::default();
        for spelling in ["android.arch.persistence.room.Entity", "androidx.room.Entity"] {
            let index = InMemoryIndex::new();
            index.add_type("room", spelling);
            let locator = AnnotationLocator::new(&index, &annotations);
            assert!(locator.is_framework_present(&scope()), "{}", spelling);
            assert!(!locator.is_framework_present(&SearchScope::new(["app"])));
        }
    }

    #[test]
    fn test_dual_spelling_union_without_duplicates() {
        let index = InMemoryIndex::new();
        index.add_type("room", "android.arch.persistence.room.Entity");
        index.add_type("room", "androidx.room.Entity");

        let legacy = index.add_type("app", "com.example.Legacy");
        index.annotate(&legacy, Annotation::new("android.arch.persistence.room.Entity"));
        let current = index.add_type("app", "com.example.Current");
        index.annotate(&current, Annotation::new("androidx.room.Entity"));
        let both = index.add_type("app", "com.example.Both");
        index.annotate(&both, Annotation::new("android.arch.persistence.room.Entity"));
        index.annotate(&both, Annotation::new("androidx.room.Entity"));

        let annotations = AnnotationSet::default();
        let locator = AnnotationLocator::new(&index, &annotations);
        let found = locator.find_annotated(FrameworkAnnotation::Entity, &scope());
        assert_eq!(found, BTreeSet::from([legacy, current, both]));
    }

    #[test]
    fn test_subclasses_of_annotated_base_are_found() {
        let index = InMemoryIndex::new();
        index.add_type("room", "androidx.room.Database");
        let base = index.add_type("app", "com.example.BaseDatabase");
        index.annotate(&base, Annotation::new("androidx.room.Database"));
        let concrete = index.add_type("app", "com.example.AppDatabase");
        index.add_supertype(&concrete, &base);

        let annotations = AnnotationSet::default();
        let locator = AnnotationLocator::new(&index, &annotations);
        let found = locator.find_annotated(FrameworkAnnotation::Database, &scope());
        assert!(found.contains(&concrete));
        assert!(found.contains(&base));
    }
}
