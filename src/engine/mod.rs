//! Validation engine for marker combinations
//!
//! Architectural Principle: Domain Services - the engine applies the structural rules
//! - Each type is checked on its own markers and its direct fields, nothing else
//! - Diagnostics stream to a sink as they are found; the engine keeps no state between calls

use crate::domain::declarations::{FieldDeclaration, TypeDeclaration};
use crate::domain::diagnostics::{Diagnostic, DiagnosticKind, Severity, ValidationReport};
use crate::markers::{MarkerCatalog, MarkerKind, MarkerSet};
use std::sync::Arc;

/// Receiver for diagnostics, typically presenting them at the target's source position
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: Diagnostic);
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

impl DiagnosticSink for ValidationReport {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.add_diagnostic(diagnostic);
    }
}

/// Sink that logs every diagnostic through `tracing` and keeps a count
#[derive(Debug, Default)]
pub struct TracingSink {
    pub reported: usize,
}

impl DiagnosticSink for TracingSink {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.reported += 1;
        match diagnostic.severity {
            Severity::Error => tracing::error!("{}", diagnostic.format_display()),
            Severity::Warning => tracing::warn!("{}", diagnostic.format_display()),
            Severity::Info => tracing::info!("{}", diagnostic.format_display()),
        }
    }
}

/// Applies the four marker rules to batches of type declarations
#[derive(Debug, Clone)]
pub struct ValidationEngine {
    catalog: Arc<MarkerCatalog>,
}

impl ValidationEngine {
    pub fn new(catalog: Arc<MarkerCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &MarkerCatalog {
        &self.catalog
    }

    /// Validate a batch and collect its diagnostics in traversal order
    pub fn validate(&self, declarations: &[TypeDeclaration]) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        self.validate_into(declarations, &mut diagnostics);
        diagnostics
    }

    /// Validate a batch, streaming diagnostics to `sink`
    pub fn validate_into(&self, declarations: &[TypeDeclaration], sink: &mut dyn DiagnosticSink) {
        for declaration in declarations {
            self.validate_type(declaration, sink);
        }
    }

    /// Class-level rules for one type, then field rules for each of its fields
    pub fn validate_type(&self, declaration: &TypeDeclaration, sink: &mut dyn DiagnosticSink) {
        let markers = self.catalog.classify(&declaration.markers);
        let is_singleton = markers.contains(MarkerKind::SingletonEntity);
        let is_collection = markers.contains(MarkerKind::EntityCollection);

        if is_singleton && is_collection {
            sink.report(Diagnostic::new(
                DiagnosticKind::ClassAnnotationDuplicate,
                declaration.target(),
            ));
        }

        if is_collection && !self.has_id_field(declaration) {
            sink.report(Diagnostic::new(
                DiagnosticKind::EntityCollectionHasNoId,
                declaration.target(),
            ));
        }

        for field in &declaration.fields {
            self.check_field(field, declaration, markers, sink);
        }
    }

    /// Field rules for a single field. A field without an owner yields nothing.
    pub fn validate_field(
        &self,
        field: &FieldDeclaration,
        owner: Option<&TypeDeclaration>,
        sink: &mut dyn DiagnosticSink,
    ) {
        match owner {
            Some(owner) => {
                let owner_markers = self.catalog.classify(&owner.markers);
                self.check_field(field, owner, owner_markers, sink);
            }
            None => {
                tracing::debug!("Field '{}' has no enclosing type, skipping", field.name);
            }
        }
    }

    fn check_field(
        &self,
        field: &FieldDeclaration,
        owner: &TypeDeclaration,
        owner_markers: MarkerSet,
        sink: &mut dyn DiagnosticSink,
    ) {
        let markers = self.catalog.classify(&field.markers);
        if markers.is_empty() {
            return;
        }

        let owner_is_collection = owner_markers.contains(MarkerKind::EntityCollection);
        let owner_has_role = owner_markers.iter().any(MarkerKind::is_class_marker);

        if markers.contains(MarkerKind::Id) && !owner_is_collection {
            sink.report(Diagnostic::new(
                DiagnosticKind::IdHasNoEntityCollection,
                owner.field_target(field),
            ));
        }

        if markers.contains(MarkerKind::BinaryData) && !owner_has_role {
            sink.report(Diagnostic::new(
                DiagnosticKind::BinaryDataHasNoClassAnnotation,
                owner.field_target(field),
            ));
        }
    }

    fn has_id_field(&self, declaration: &TypeDeclaration) -> bool {
        declaration
            .fields
            .iter()
            .any(|field| self.catalog.classify(&field.markers).contains(MarkerKind::Id))
    }
}

impl Default for ValidationEngine {
    fn default() -> Self {
        Self::new(Arc::new(MarkerCatalog::with_defaults()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MarkerConfig;
    use crate::domain::declarations::DeclarationKind;
    use rstest::rstest;
    use std::collections::HashMap;

    const SINGLETON: &str = "hawthorne::singleton_entity";
    const COLLECTION: &str = "hawthorne::entity_collection";
    const ID: &str = "hawthorne::id";
    const BINARY: &str = "hawthorne::binary_data";

    fn marked_type(name: &str, markers: &[&str]) -> TypeDeclaration {
        markers
            .iter()
            .fold(TypeDeclaration::new(name), |ty, m| ty.with_marker(*m))
    }

    fn marked_field(name: &str, markers: &[&str]) -> FieldDeclaration {
        markers
            .iter()
            .fold(FieldDeclaration::new(name), |field, m| field.with_marker(*m))
    }

    fn codes(diagnostics: &[Diagnostic]) -> Vec<(&'static str, String)> {
        diagnostics
            .iter()
            .map(|d| (d.kind.code(), d.target.qualified_name.clone()))
            .collect()
    }

    #[test]
    fn test_collection_with_id_is_clean() {
        let order = marked_type("Order", &[COLLECTION]).with_field(marked_field("id", &[ID]));

        assert!(ValidationEngine::default().validate(&[order]).is_empty());
    }

    #[test]
    fn test_collection_without_id() {
        let order = marked_type("Order", &[COLLECTION])
            .with_field(marked_field("total", &[]))
            .with_field(marked_field("customer", &[]));

        let diagnostics = ValidationEngine::default().validate(&[order]);

        assert_eq!(
            codes(&diagnostics),
            vec![("ENTITY_COLLECTION_HAS_NO_ID", "Order".to_string())]
        );
        assert_eq!(diagnostics[0].target.kind, DeclarationKind::Type);
        assert_eq!(diagnostics[0].severity, Severity::Error);
    }

    #[test]
    fn test_both_class_markers_with_binary_field() {
        let settings = marked_type("Settings", &[SINGLETON, COLLECTION])
            .with_field(marked_field("blob", &[BINARY]));

        let diagnostics = ValidationEngine::default().validate(&[settings]);

        // The collection marker also makes the missing id an error
        assert_eq!(
            codes(&diagnostics),
            vec![
                ("CLASS_ANNOTATION_DUPLICATE", "Settings".to_string()),
                ("ENTITY_COLLECTION_HAS_NO_ID", "Settings".to_string()),
            ]
        );
        assert!(diagnostics
            .iter()
            .all(|d| d.target.kind == DeclarationKind::Type));
    }

    #[test]
    fn test_unmarked_owner_with_marked_fields() {
        let plain = marked_type("Plain", &[])
            .with_field(marked_field("token", &[ID]))
            .with_field(marked_field("payload", &[BINARY]));

        let diagnostics = ValidationEngine::default().validate(&[plain]);

        assert_eq!(
            codes(&diagnostics),
            vec![
                ("ID_HAS_NO_ENTITY_COLLECTION", "Plain.token".to_string()),
                ("BINARY_DATA_HAS_NO_CLASS_ANNOTATION", "Plain.payload".to_string()),
            ]
        );
        assert!(diagnostics
            .iter()
            .all(|d| d.target.kind == DeclarationKind::Field));
    }

    #[rstest]
    #[case::no_markers(&[], &[], &[])]
    #[case::singleton_only(&[SINGLETON], &[], &[])]
    #[case::collection_with_id(&[COLLECTION], &[ID], &[])]
    #[case::collection_without_id(&[COLLECTION], &[], &["ENTITY_COLLECTION_HAS_NO_ID"])]
    #[case::duplicate_with_id(&[SINGLETON, COLLECTION], &[ID], &["CLASS_ANNOTATION_DUPLICATE"])]
    #[case::id_in_singleton(&[SINGLETON], &[ID], &["ID_HAS_NO_ENTITY_COLLECTION"])]
    #[case::binary_in_singleton(&[SINGLETON], &[BINARY], &[])]
    #[case::binary_in_collection(&[COLLECTION], &[ID, BINARY], &[])]
    #[case::binary_in_plain(&[], &[BINARY], &["BINARY_DATA_HAS_NO_CLASS_ANNOTATION"])]
    #[case::id_and_binary_in_plain(
        &[],
        &[ID, BINARY],
        &["ID_HAS_NO_ENTITY_COLLECTION", "BINARY_DATA_HAS_NO_CLASS_ANNOTATION"]
    )]
    fn test_rule_table(
        #[case] type_markers: &[&str],
        #[case] field_markers: &[&str],
        #[case] expected: &[&str],
    ) {
        let ty = marked_type("T", type_markers).with_field(marked_field("f", field_markers));

        let diagnostics = ValidationEngine::default().validate(&[ty]);
        let found: Vec<_> = diagnostics.iter().map(|d| d.kind.code()).collect();

        assert_eq!(found, expected);
    }

    #[test]
    fn test_each_id_field_reported_separately() {
        let ty = marked_type("Twice", &[])
            .with_field(marked_field("a", &[ID]))
            .with_field(marked_field("b", &[ID]));

        let diagnostics = ValidationEngine::default().validate(&[ty]);

        assert_eq!(
            codes(&diagnostics),
            vec![
                ("ID_HAS_NO_ENTITY_COLLECTION", "Twice.a".to_string()),
                ("ID_HAS_NO_ENTITY_COLLECTION", "Twice.b".to_string()),
            ]
        );
    }

    #[test]
    fn test_multiple_id_fields_in_collection_are_allowed() {
        let ty = marked_type("Keys", &[COLLECTION])
            .with_field(marked_field("a", &[ID]))
            .with_field(marked_field("b", &[ID]));

        assert!(ValidationEngine::default().validate(&[ty]).is_empty());
    }

    #[test]
    fn test_batch_order_does_not_change_diagnostic_set() {
        let batch = vec![
            marked_type("Order", &[COLLECTION]),
            marked_type("Plain", &[]).with_field(marked_field("token", &[ID])),
            marked_type("Settings", &[SINGLETON, COLLECTION]).with_field(marked_field("id", &[ID])),
        ];
        let mut reversed = batch.clone();
        reversed.reverse();

        let engine = ValidationEngine::default();
        let count = |diagnostics: Vec<Diagnostic>| {
            let mut counts = HashMap::new();
            for d in diagnostics {
                *counts.entry(d).or_insert(0usize) += 1;
            }
            counts
        };

        let first = engine.validate(&batch);
        assert_eq!(first, engine.validate(&batch));
        assert_eq!(count(first), count(engine.validate(&reversed)));
    }

    #[test]
    fn test_field_without_owner_is_ignored() {
        let mut sink = Vec::new();
        ValidationEngine::default().validate_field(
            &marked_field("orphan", &[ID, BINARY]),
            None,
            &mut sink,
        );

        assert!(sink.is_empty());
    }

    #[test]
    fn test_validate_field_uses_owner_markers() {
        let owner = marked_type("Profile", &[SINGLETON]);
        let mut sink = Vec::new();
        let engine = ValidationEngine::default();

        engine.validate_field(&marked_field("avatar", &[BINARY]), Some(&owner), &mut sink);
        engine.validate_field(&marked_field("id", &[ID]), Some(&owner), &mut sink);

        assert_eq!(
            codes(&sink),
            vec![("ID_HAS_NO_ENTITY_COLLECTION", "Profile.id".to_string())]
        );
    }

    #[test]
    fn test_unresolved_marker_never_matches() {
        let config = MarkerConfig {
            entity_collection: "::".to_string(),
            ..Default::default()
        };
        let engine = ValidationEngine::new(Arc::new(MarkerCatalog::resolve(&config)));

        // The collection marker cannot be recognized, so the type reads as unmarked
        let order = marked_type("Order", &[COLLECTION]).with_field(marked_field("id", &[ID]));
        let diagnostics = engine.validate(&[order]);

        assert_eq!(
            codes(&diagnostics),
            vec![("ID_HAS_NO_ENTITY_COLLECTION", "Order.id".to_string())]
        );
    }

    #[test]
    fn test_report_sink_counts_errors() {
        let mut report = ValidationReport::new();
        ValidationEngine::default().validate_into(&[marked_type("Order", &[COLLECTION])], &mut report);

        assert!(report.has_errors());
        assert_eq!(report.summary.diagnostics_by_severity.error, 1);

        let mut sink = TracingSink::default();
        ValidationEngine::default().validate_into(&[marked_type("Order", &[COLLECTION])], &mut sink);
        assert_eq!(sink.reported, 1);
    }
}
