//! Hawthorne Guard - Structural validation of persistence markers on Rust types
//!
//! Architecture: Clean Architecture - Library interface serves as the application layer
//! - Marker catalog and validation engine are pure domain logic
//! - Declaration discovery, path filtering and reporting are infrastructure around them
//! - Hosts either hand over declarations directly or let the validator read source files

pub mod analyzer;
pub mod config;
pub mod domain;
pub mod engine;
pub mod markers;
pub mod paths;
pub mod report;

// Re-export main types for convenient access
pub use domain::declarations::{
    DeclarationKind, DeclarationTarget, FieldDeclaration, MarkerPath, SourceLocation,
    TypeDeclaration, TypeKind,
};
pub use domain::diagnostics::{
    Diagnostic, DiagnosticKind, HawthorneError, HawthorneResult, Severity, ValidationReport,
    ValidationSummary,
};

pub use config::{ConfigBuilder, HawthorneConfig, MarkerConfig};

pub use analyzer::{AnalysisOptions, Analyzer, FileOutcome};

pub use engine::{DiagnosticSink, TracingSink, ValidationEngine};

pub use markers::{MarkerCatalog, MarkerKind, MarkerSet};

pub use report::{OutputFormat, ReportFormatter, ReportOptions};

use std::path::{Path, PathBuf};

/// Main validator providing high-level validation operations
pub struct HawthorneValidator {
    analyzer: Analyzer,
    report_formatter: ReportFormatter,
}

impl HawthorneValidator {
    /// Create a validator with default marker names
    pub fn new() -> HawthorneResult<Self> {
        Self::new_with_config(HawthorneConfig::default())
    }

    pub fn new_with_config(config: HawthorneConfig) -> HawthorneResult<Self> {
        let analyzer = Analyzer::new(config)?;

        Ok(Self {
            analyzer,
            report_formatter: ReportFormatter::default(),
        })
    }

    /// Create a validator loading configuration from file
    pub fn from_config_file<P: AsRef<Path>>(path: P) -> HawthorneResult<Self> {
        let config = HawthorneConfig::load_from_file(path)?;
        Self::new_with_config(config)
    }

    /// Set custom report formatter
    pub fn with_report_formatter(mut self, formatter: ReportFormatter) -> Self {
        self.report_formatter = formatter;
        self
    }

    /// Validate declarations built by the host, without touching the filesystem
    pub fn validate_declarations(&self, declarations: &[TypeDeclaration]) -> ValidationReport {
        let mut report = ValidationReport::new();
        self.analyzer.engine().validate_into(declarations, &mut report);
        report.add_types_validated(declarations.len());
        report.set_config_fingerprint(self.analyzer.config_fingerprint());
        report
    }

    /// Validate source text as if it were the file at `file_path`
    pub fn validate_source<P: AsRef<Path>>(
        &self,
        file_path: P,
        content: &str,
    ) -> HawthorneResult<ValidationReport> {
        let outcome = self.analyzer.analyze_source(file_path.as_ref(), content)?;
        Ok(Self::single_file_report(outcome, self.analyzer.config_fingerprint()))
    }

    /// Validate a single file
    pub fn validate_file<P: AsRef<Path>>(&self, file_path: P) -> HawthorneResult<ValidationReport> {
        let outcome = self.analyzer.analyze_file(file_path)?;
        Ok(Self::single_file_report(outcome, self.analyzer.config_fingerprint()))
    }

    /// Validate files and directory trees as one round
    pub fn validate_paths<P: AsRef<Path>>(
        &self,
        paths: &[P],
        options: &AnalysisOptions,
    ) -> HawthorneResult<ValidationReport> {
        self.analyzer.analyze_paths(paths, options)
    }

    /// Validate entire directory tree
    pub fn validate_directory<P: AsRef<Path>>(
        &self,
        root: P,
        options: &AnalysisOptions,
    ) -> HawthorneResult<ValidationReport> {
        self.analyzer.analyze_directory(root, options)
    }

    /// Write a formatted report, e.g. to stdout
    pub fn write_report<W: std::io::Write>(
        &self,
        report: &ValidationReport,
        format: OutputFormat,
        writer: W,
    ) -> HawthorneResult<()> {
        self.report_formatter.write_report(report, format, writer)
    }

    /// Format a validation report for output
    pub fn format_report(
        &self,
        report: &ValidationReport,
        format: OutputFormat,
    ) -> HawthorneResult<String> {
        self.report_formatter.format_report(report, format)
    }

    pub fn catalog(&self) -> &MarkerCatalog {
        self.analyzer.catalog()
    }

    pub fn engine(&self) -> &ValidationEngine {
        self.analyzer.engine()
    }

    pub fn config(&self) -> &HawthorneConfig {
        self.analyzer.config()
    }

    fn single_file_report(outcome: FileOutcome, fingerprint: String) -> ValidationReport {
        let mut report = ValidationReport::new();
        report.add_types_validated(outcome.types);
        for diagnostic in outcome.diagnostics {
            report.add_diagnostic(diagnostic);
        }
        report.set_files_analyzed(1);
        report.set_config_fingerprint(fingerprint);
        report.sort_diagnostics();
        report
    }
}

/// Convenience function to create a validator with default settings
pub fn create_validator() -> HawthorneResult<HawthorneValidator> {
    HawthorneValidator::new()
}

/// Convenience function to validate a directory with default settings
pub fn validate_directory<P: AsRef<Path>>(directory: P) -> HawthorneResult<ValidationReport> {
    let validator = HawthorneValidator::new()?;
    validator.validate_directory(directory, &AnalysisOptions::default())
}

/// Validate files off the async runtime's worker threads
pub async fn validate_files(files: Vec<PathBuf>) -> HawthorneResult<ValidationReport> {
    tokio::task::spawn_blocking(move || {
        let validator = HawthorneValidator::new()?;
        validator.validate_paths(&files, &AnalysisOptions::default())
    })
    .await
    .map_err(|e| HawthorneError::from(std::io::Error::other(e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn codes(report: &ValidationReport) -> Vec<&'static str> {
        report.diagnostics.iter().map(|d| d.kind.code()).collect()
    }

    #[test]
    fn test_validator_creation() {
        let validator = HawthorneValidator::new().unwrap();
        assert!(validator.catalog().unresolved().is_empty());
        assert_eq!(
            validator.catalog().qualified_name(MarkerKind::Id),
            Some("hawthorne::id")
        );
    }

    #[test]
    fn test_unresolved_marker_does_not_block_creation() {
        let config = ConfigBuilder::new()
            .marker(MarkerKind::BinaryData, "")
            .build()
            .unwrap();
        let validator = HawthorneValidator::new_with_config(config).unwrap();

        assert_eq!(validator.catalog().unresolved(), vec![MarkerKind::BinaryData]);
        let report = validator
            .validate_source("src/blob.rs", "struct Blob { #[hawthorne::binary_data] b: Vec<u8> }")
            .unwrap();
        assert!(!report.has_diagnostics());
    }

    #[test]
    fn test_duplicate_class_markers() {
        let source = r#"
#[hawthorne::singleton_entity]
#[hawthorne::entity_collection]
pub struct Settings {
    #[hawthorne::id]
    pub key: String,
}
"#;
        let report = HawthorneValidator::new()
            .unwrap()
            .validate_source("src/settings.rs", source)
            .unwrap();

        assert_eq!(codes(&report), ["CLASS_ANNOTATION_DUPLICATE"]);
        assert_eq!(report.diagnostics[0].target.qualified_name, "Settings");
    }

    #[test]
    fn test_collection_without_id() {
        let source = r#"
use hawthorne::entity_collection;

#[entity_collection]
pub struct Order {
    pub total: u64,
}
"#;
        let report = HawthorneValidator::new()
            .unwrap()
            .validate_source("src/order.rs", source)
            .unwrap();

        assert_eq!(codes(&report), ["ENTITY_COLLECTION_HAS_NO_ID"]);
        assert_eq!(report.diagnostics[0].location().unwrap().line, 5);
    }

    #[test]
    fn test_id_outside_collection() {
        let source = r#"
pub struct Draft {
    #[hawthorne::id]
    pub key: u64,
    pub body: String,
}
"#;
        let report = HawthorneValidator::new()
            .unwrap()
            .validate_source("src/draft.rs", source)
            .unwrap();

        assert_eq!(codes(&report), ["ID_HAS_NO_ENTITY_COLLECTION"]);
        assert_eq!(report.diagnostics[0].target.qualified_name, "Draft.key");
        assert_eq!(report.diagnostics[0].target.kind, DeclarationKind::Field);
    }

    #[test]
    fn test_binary_data_without_class_marker() {
        let source = r#"
pub struct Attachment {
    #[hawthorne::binary_data]
    pub payload: Vec<u8>,
}

#[hawthorne::singleton_entity]
pub struct Avatar {
    #[hawthorne::binary_data]
    pub image: Vec<u8>,
}
"#;
        let report = HawthorneValidator::new()
            .unwrap()
            .validate_source("src/blobs.rs", source)
            .unwrap();

        assert_eq!(codes(&report), ["BINARY_DATA_HAS_NO_CLASS_ANNOTATION"]);
        assert_eq!(report.diagnostics[0].target.qualified_name, "Attachment.payload");
        assert_eq!(report.summary.total_types, 2);
    }

    #[test]
    fn test_validate_declarations_without_sources() {
        let declarations = vec![
            TypeDeclaration::new("Order")
                .with_marker("hawthorne::entity_collection")
                .with_field(
                    FieldDeclaration::new("id")
                        .with_type("u64")
                        .with_marker("hawthorne::id"),
                ),
            TypeDeclaration::new("Loose")
                .with_kind(TypeKind::Union)
                .with_field(
                    FieldDeclaration::new("id")
                        .with_type("u32")
                        .with_marker("hawthorne::id"),
                ),
        ];

        let validator = HawthorneValidator::new().unwrap();
        let report = validator.validate_declarations(&declarations);

        assert_eq!(codes(&report), ["ID_HAS_NO_ENTITY_COLLECTION"]);
        assert!(report.diagnostics[0].location().is_none());
        assert_eq!(report.summary.total_types, 2);
        assert!(report.config_fingerprint.is_some());
    }

    #[test]
    fn test_directory_validation_and_formatting() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(
            root.join("src/model.rs"),
            "#[hawthorne::entity_collection]\npub struct Order { pub total: u64 }\n",
        )
        .unwrap();
        fs::write(root.join("src/main.rs"), "fn main() {}").unwrap();

        let report = validate_directory(root).unwrap();
        assert_eq!(report.summary.total_files, 2);
        assert!(report.has_errors());

        let validator = create_validator().unwrap().with_report_formatter(ReportFormatter::new(
            ReportOptions {
                use_colors: false,
                ..Default::default()
            },
        ));
        let human = validator.format_report(&report, OutputFormat::Human).unwrap();
        assert!(human.contains("Marker Violations Found"));

        let json = validator.format_report(&report, OutputFormat::Json).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(parsed["diagnostics"].is_array());
    }

    #[test]
    fn test_config_file_with_custom_markers() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("hawthorne.yaml");
        fs::write(
            &config_path,
            "markers:\n  entity_collection: store::table\n  id: store::key\n",
        )
        .unwrap();

        let validator = HawthorneValidator::from_config_file(&config_path).unwrap();
        let report = validator
            .validate_source(
                "src/lib.rs",
                "#[store::table]\nstruct User { #[store::key] id: u64 }\n",
            )
            .unwrap();

        assert!(!report.has_diagnostics());
    }

    #[tokio::test]
    async fn test_validate_files_async() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("draft.rs");
        fs::write(&file, "struct Draft { #[hawthorne::id] key: u64 }").unwrap();

        let report = validate_files(vec![file]).await.unwrap();
        assert_eq!(codes(&report), ["ID_HAS_NO_ENTITY_COLLECTION"]);
    }
}
