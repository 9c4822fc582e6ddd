//! Diagnostics produced by marker validation and the reports that aggregate them
//!
//! Architecture: Rich Domain Models - a diagnostic knows its own code, message and target
//! - DiagnosticKind is the closed set of structural rule violations
//! - ValidationReport is the aggregate root collecting diagnostics for one round

use crate::domain::declarations::{DeclarationTarget, SourceLocation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity levels a diagnostic sink can present
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational notes
    Info,
    /// Problems that do not fail the build
    Warning,
    /// Violations that fail the build
    Error,
}

impl Severity {
    /// Whether this severity level should cause validation to fail
    pub fn is_blocking(self) -> bool {
        matches!(self, Self::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// The structural rules enforced on marked declarations
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticKind {
    /// A field marked as identifier lives in a type without the collection marker
    IdHasNoEntityCollection,
    /// A collection type has no field marked as identifier
    EntityCollectionHasNoId,
    /// A binary payload field lives in a type without a role marker
    BinaryDataHasNoClassAnnotation,
    /// A type carries both the singleton and the collection marker
    ClassAnnotationDuplicate,
}

impl DiagnosticKind {
    /// All rule kinds, in declaration order
    pub const ALL: [DiagnosticKind; 4] = [
        Self::IdHasNoEntityCollection,
        Self::EntityCollectionHasNoId,
        Self::BinaryDataHasNoClassAnnotation,
        Self::ClassAnnotationDuplicate,
    ];

    /// Stable code used in reports and on the command line
    pub fn code(self) -> &'static str {
        match self {
            Self::IdHasNoEntityCollection => "ID_HAS_NO_ENTITY_COLLECTION",
            Self::EntityCollectionHasNoId => "ENTITY_COLLECTION_HAS_NO_ID",
            Self::BinaryDataHasNoClassAnnotation => "BINARY_DATA_HAS_NO_CLASS_ANNOTATION",
            Self::ClassAnnotationDuplicate => "CLASS_ANNOTATION_DUPLICATE",
        }
    }

    /// Message text. Existing tooling matches on these strings, keep them verbatim.
    pub fn message(self) -> &'static str {
        match self {
            Self::IdHasNoEntityCollection => {
                "The @Id annotation must only be present in classes marked with the @EntityCollection annotation."
            }
            Self::EntityCollectionHasNoId => {
                "Classes marked with the @EntityCollection must have also a field annotated with @Id."
            }
            Self::BinaryDataHasNoClassAnnotation => {
                "The @BinaryData annotation must only be present in classes marked with the @SingletonEntity or @EntityCollection annotation."
            }
            Self::ClassAnnotationDuplicate => {
                "A class cannot have the @SingletonEntity and @EntityCollection annotations at the same time."
            }
        }
    }

    pub fn severity(self) -> Severity {
        Severity::Error
    }

    /// Suggested fix shown by the human formatter and `explain`
    pub fn suggestion(self) -> &'static str {
        match self {
            Self::IdHasNoEntityCollection => {
                "Mark the enclosing type as an entity collection or remove the id marker"
            }
            Self::EntityCollectionHasNoId => "Mark one of the type's fields as the record id",
            Self::BinaryDataHasNoClassAnnotation => {
                "Mark the enclosing type as a singleton entity or an entity collection"
            }
            Self::ClassAnnotationDuplicate => {
                "Keep either the singleton entity marker or the entity collection marker"
            }
        }
    }

    /// Parse a rule code, case-insensitively
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.code().eq_ignore_ascii_case(code.trim()))
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A single rule violation targeted at one declaration
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub message: String,
    pub target: DeclarationTarget,
}

impl Diagnostic {
    /// Create the diagnostic for `kind` at `target`
    pub fn new(kind: DiagnosticKind, target: DeclarationTarget) -> Self {
        Self {
            kind,
            severity: kind.severity(),
            message: kind.message().to_string(),
            target,
        }
    }

    pub fn location(&self) -> Option<&SourceLocation> {
        self.target.location.as_ref()
    }

    pub fn is_blocking(&self) -> bool {
        self.severity.is_blocking()
    }

    /// Format the diagnostic on one line, compiler style
    pub fn format_display(&self) -> String {
        let location = match self.location() {
            Some(location) => format!("{location}: "),
            None => String::new(),
        };

        format!(
            "{}{} [{}] {}: {}",
            location,
            self.severity.as_str(),
            self.kind.code(),
            self.target.qualified_name,
            self.message
        )
    }
}

/// Summary statistics for a validation report
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationSummary {
    /// Number of source files analyzed
    pub total_files: usize,
    /// Number of type declarations handed to the engine
    pub total_types: usize,
    pub diagnostics_by_severity: DiagnosticCounts,
    pub execution_time_ms: u64,
    pub validated_at: DateTime<Utc>,
}

/// Count of diagnostics by severity level
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagnosticCounts {
    pub error: usize,
    pub warning: usize,
    pub info: usize,
}

impl DiagnosticCounts {
    pub fn total(&self) -> usize {
        self.error + self.warning + self.info
    }

    pub fn has_blocking(&self) -> bool {
        self.error > 0
    }

    pub fn add(&mut self, severity: Severity) {
        match severity {
            Severity::Error => self.error += 1,
            Severity::Warning => self.warning += 1,
            Severity::Info => self.info += 1,
        }
    }
}

/// All diagnostics of one validation round plus metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub diagnostics: Vec<Diagnostic>,
    pub summary: ValidationSummary,
    /// Fingerprint of the configuration used for this round
    pub config_fingerprint: Option<String>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            diagnostics: Vec::new(),
            summary: ValidationSummary {
                validated_at: Utc::now(),
                ..Default::default()
            },
            config_fingerprint: None,
        }
    }

    pub fn add_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.summary.diagnostics_by_severity.add(diagnostic.severity);
        self.diagnostics.push(diagnostic);
    }

    pub fn has_diagnostics(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    /// Whether the report contains blocking diagnostics (errors)
    pub fn has_errors(&self) -> bool {
        self.summary.diagnostics_by_severity.has_blocking()
    }

    pub fn set_files_analyzed(&mut self, count: usize) {
        self.summary.total_files = count;
    }

    pub fn add_types_validated(&mut self, count: usize) {
        self.summary.total_types += count;
    }

    pub fn set_execution_time(&mut self, duration_ms: u64) {
        self.summary.execution_time_ms = duration_ms;
    }

    pub fn set_config_fingerprint(&mut self, fingerprint: impl Into<String>) {
        self.config_fingerprint = Some(fingerprint.into());
    }

    /// Sort by file, line, column and code so parallel runs print identically
    pub fn sort_diagnostics(&mut self) {
        self.diagnostics.sort_by(|a, b| {
            let key = |d: &Diagnostic| {
                d.location()
                    .map(|l| (Some(l.file.clone()), l.line, l.column))
                    .unwrap_or((None, 0, 0))
            };
            key(a)
                .cmp(&key(b))
                .then_with(|| a.target.qualified_name.cmp(&b.target.qualified_name))
                .then_with(|| a.kind.cmp(&b.kind))
        });
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Infrastructure errors. Rule violations are diagnostics, never errors.
#[derive(Debug, thiserror::Error)]
pub enum HawthorneError {
    /// Configuration file could not be loaded or parsed
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// A path filter pattern did not compile
    #[error("Pattern error: {message}")]
    Pattern { message: String },

    /// Declarations could not be collected from a file
    #[error("Discovery error in {file}: {message}")]
    Discovery { file: String, message: String },

    /// A report could not be rendered
    #[error("Report error: {message}")]
    Report { message: String },
}

impl HawthorneError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn pattern(message: impl Into<String>) -> Self {
        Self::Pattern {
            message: message.into(),
        }
    }

    pub fn discovery(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Discovery {
            file: file.into(),
            message: message.into(),
        }
    }

    pub fn report(message: impl Into<String>) -> Self {
        Self::Report {
            message: message.into(),
        }
    }
}

pub type HawthorneResult<T> = Result<T, HawthorneError>;
