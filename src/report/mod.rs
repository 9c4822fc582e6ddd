//! Report generation with multiple output formats
//!
//! CDD Principle: Anti-Corruption Layer - Formatters translate domain objects to external formats
//! - ValidationReport (domain) is converted to various external representations
//! - Each formatter encapsulates the rules for its specific output format

use crate::domain::diagnostics::{
    Diagnostic, DiagnosticKind, HawthorneError, HawthorneResult, Severity, ValidationReport,
};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::io::Write;
use std::str::FromStr;

/// Supported output formats for validation reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable format with colors and suggestions
    Human,
    Json,
    /// JUnit XML for CI test result panels
    Junit,
    /// SARIF 2.1.0 for code scanning tools
    Sarif,
    /// GitHub Actions workflow annotations
    GitHub,
}

impl OutputFormat {
    pub fn all_formats() -> &'static [&'static str] {
        &["human", "json", "junit", "sarif", "github"]
    }
}

impl FromStr for OutputFormat {
    type Err = HawthorneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            "junit" => Ok(Self::Junit),
            "sarif" => Ok(Self::Sarif),
            "github" => Ok(Self::GitHub),
            other => Err(HawthorneError::report(format!(
                "Unknown output format '{}', expected one of: {}",
                other,
                Self::all_formats().join(", ")
            ))),
        }
    }
}

/// Options for customizing report output
#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub use_colors: bool,
    pub show_suggestions: bool,
    /// Maximum number of diagnostics to include
    pub max_diagnostics: Option<usize>,
    /// Hide diagnostics below this severity
    pub min_severity: Option<Severity>,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            use_colors: true,
            show_suggestions: true,
            max_diagnostics: None,
            min_severity: None,
        }
    }
}

#[derive(Clone, Copy)]
enum Style {
    Red,
    Yellow,
    Cyan,
    Green,
    Dim,
    Bold,
}

#[cfg(feature = "colors")]
fn paint(text: &str, style: Style) -> String {
    use colored::Colorize;
    match style {
        Style::Red => text.red().to_string(),
        Style::Yellow => text.yellow().to_string(),
        Style::Cyan => text.cyan().to_string(),
        Style::Green => text.green().to_string(),
        Style::Dim => text.dimmed().to_string(),
        Style::Bold => text.bold().to_string(),
    }
}

#[cfg(not(feature = "colors"))]
fn paint(text: &str, _style: Style) -> String {
    text.to_string()
}

fn severity_style(severity: Severity) -> Style {
    match severity {
        Severity::Error => Style::Red,
        Severity::Warning => Style::Yellow,
        Severity::Info => Style::Cyan,
    }
}

/// Main report formatter that dispatches to specific formatters
#[derive(Debug, Clone, Default)]
pub struct ReportFormatter {
    options: ReportOptions,
}

impl ReportFormatter {
    pub fn new(options: ReportOptions) -> Self {
        Self { options }
    }

    pub fn format_report(
        &self,
        report: &ValidationReport,
        format: OutputFormat,
    ) -> HawthorneResult<String> {
        let diagnostics = self.filter_diagnostics(&report.diagnostics);

        match format {
            OutputFormat::Human => Ok(self.format_human(report, &diagnostics)),
            OutputFormat::Json => self.format_json(report, &diagnostics),
            OutputFormat::Junit => Ok(self.format_junit(report, &diagnostics)),
            OutputFormat::Sarif => self.format_sarif(&diagnostics),
            OutputFormat::GitHub => Ok(self.format_github(&diagnostics)),
        }
    }

    /// Render the report to `writer`, always ending with a newline
    pub fn write_report<W: Write>(
        &self,
        report: &ValidationReport,
        format: OutputFormat,
        mut writer: W,
    ) -> HawthorneResult<()> {
        let formatted = self.format_report(report, format)?;
        writer.write_all(formatted.as_bytes())?;
        if !formatted.ends_with('\n') {
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(())
    }

    fn filter_diagnostics<'a>(&self, diagnostics: &'a [Diagnostic]) -> Vec<&'a Diagnostic> {
        let mut filtered: Vec<&Diagnostic> = diagnostics
            .iter()
            .filter(|d| self.options.min_severity.map_or(true, |min| d.severity >= min))
            .collect();

        if let Some(max) = self.options.max_diagnostics {
            filtered.truncate(max);
        }
        filtered
    }

    fn style(&self, text: &str, style: Style) -> String {
        if self.options.use_colors {
            paint(text, style)
        } else {
            text.to_string()
        }
    }

    fn format_human(&self, report: &ValidationReport, diagnostics: &[&Diagnostic]) -> String {
        let mut output = String::new();

        if diagnostics.is_empty() {
            output.push_str(&format!(
                "✅ {}\n",
                self.style("No marker violations found", Style::Green)
            ));
        } else {
            output.push_str(&format!(
                "❌ {}\n\n",
                self.style("Marker Violations Found", Style::Red)
            ));

            // Group by file; declarations without a location come last
            let mut by_file: BTreeMap<Option<String>, Vec<&Diagnostic>> = BTreeMap::new();
            for diagnostic in diagnostics {
                let file = diagnostic.location().map(|l| l.file.display().to_string());
                by_file.entry(file).or_default().push(diagnostic);
            }
            let (unlocated, located): (Vec<_>, Vec<_>) =
                by_file.into_iter().partition(|(file, _)| file.is_none());

            for (file, group) in located.into_iter().chain(unlocated) {
                let heading = file.unwrap_or_else(|| "<no source location>".to_string());
                output.push_str(&format!("📁 {heading}\n"));

                for diagnostic in group {
                    let position = diagnostic
                        .location()
                        .map(|l| format!("{}:{}", l.line, l.column))
                        .unwrap_or_else(|| "?".to_string());

                    output.push_str(&format!(
                        "  {} [{}] {} {}\n",
                        self.style(&format!("{}:{}", position, diagnostic.kind.code()), Style::Dim),
                        self.style(diagnostic.severity.as_str(), severity_style(diagnostic.severity)),
                        diagnostic.target.qualified_name,
                        diagnostic.message
                    ));

                    if self.options.show_suggestions {
                        output.push_str(&format!(
                            "    💡 {}\n",
                            self.style(diagnostic.kind.suggestion(), Style::Green)
                        ));
                    }
                }
                output.push('\n');
            }
        }

        output.push_str(&self.format_summary(report));
        output
    }

    fn format_json(
        &self,
        report: &ValidationReport,
        diagnostics: &[&Diagnostic],
    ) -> HawthorneResult<String> {
        let json_diagnostics: Vec<JsonValue> = diagnostics
            .iter()
            .map(|d| {
                serde_json::json!({
                    "code": d.kind.code(),
                    "severity": d.severity.as_str(),
                    "message": d.message,
                    "target": {
                        "kind": d.target.kind.as_str(),
                        "name": d.target.qualified_name,
                    },
                    "file_path": d.location().map(|l| l.file.display().to_string()),
                    "line_number": d.location().map(|l| l.line),
                    "column_number": d.location().map(|l| l.column),
                })
            })
            .collect();

        let json_report = serde_json::json!({
            "diagnostics": json_diagnostics,
            "summary": {
                "total_files": report.summary.total_files,
                "total_types": report.summary.total_types,
                "diagnostics_by_severity": {
                    "error": report.summary.diagnostics_by_severity.error,
                    "warning": report.summary.diagnostics_by_severity.warning,
                    "info": report.summary.diagnostics_by_severity.info
                },
                "execution_time_ms": report.summary.execution_time_ms,
                "validated_at": report.summary.validated_at.to_rfc3339()
            },
            "config_fingerprint": report.config_fingerprint
        });

        serde_json::to_string_pretty(&json_report)
            .map_err(|e| HawthorneError::report(format!("JSON serialization failed: {e}")))
    }

    fn format_junit(&self, report: &ValidationReport, diagnostics: &[&Diagnostic]) -> String {
        let failures = diagnostics.iter().filter(|d| d.is_blocking()).count();
        let execution_time = (report.summary.execution_time_ms as f64) / 1000.0;

        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        xml.push_str(&format!(
            "<testsuite name=\"hawthorne-guard\" tests=\"{}\" failures=\"{}\" errors=\"0\" time=\"{:.3}\">\n",
            diagnostics.len(),
            failures,
            execution_time
        ));

        for diagnostic in diagnostics {
            xml.push_str(&format!(
                "  <testcase classname=\"{}\" name=\"{}\">\n",
                diagnostic.kind.code(),
                escape_xml(&diagnostic.target.qualified_name)
            ));

            if diagnostic.is_blocking() {
                xml.push_str(&format!(
                    "    <failure message=\"{}\">\n",
                    escape_xml(&diagnostic.message)
                ));
                if let Some(location) = diagnostic.location() {
                    xml.push_str(&format!("      File: {}\n", escape_xml(&location.to_string())));
                }
                xml.push_str("    </failure>\n");
            }

            xml.push_str("  </testcase>\n");
        }

        xml.push_str("</testsuite>\n");
        xml
    }

    fn format_sarif(&self, diagnostics: &[&Diagnostic]) -> HawthorneResult<String> {
        let rules: Vec<JsonValue> = DiagnosticKind::ALL
            .iter()
            .map(|kind| {
                serde_json::json!({
                    "id": kind.code(),
                    "shortDescription": { "text": kind.message() },
                    "help": { "text": kind.suggestion() }
                })
            })
            .collect();

        let results: Vec<JsonValue> = diagnostics
            .iter()
            .map(|d| {
                let level = match d.severity {
                    Severity::Error => "error",
                    Severity::Warning => "warning",
                    Severity::Info => "note",
                };
                let locations: Vec<JsonValue> = d
                    .location()
                    .map(|l| {
                        serde_json::json!({
                            "physicalLocation": {
                                "artifactLocation": { "uri": l.file.display().to_string() },
                                "region": { "startLine": l.line, "startColumn": l.column }
                            },
                            "logicalLocations": [{
                                "fullyQualifiedName": d.target.qualified_name,
                                "kind": d.target.kind.as_str()
                            }]
                        })
                    })
                    .into_iter()
                    .collect();

                serde_json::json!({
                    "ruleId": d.kind.code(),
                    "level": level,
                    "message": { "text": d.message },
                    "locations": locations
                })
            })
            .collect();

        let sarif_report = serde_json::json!({
            "version": "2.1.0",
            "$schema": "https://json.schemastore.org/sarif-2.1.0.json",
            "runs": [{
                "tool": {
                    "driver": {
                        "name": "hawthorne-guard",
                        "version": env!("CARGO_PKG_VERSION"),
                        "rules": rules
                    }
                },
                "results": results
            }]
        });

        serde_json::to_string_pretty(&sarif_report)
            .map_err(|e| HawthorneError::report(format!("SARIF serialization failed: {e}")))
    }

    fn format_github(&self, diagnostics: &[&Diagnostic]) -> String {
        let mut output = String::new();

        for diagnostic in diagnostics {
            let level = match diagnostic.severity {
                Severity::Error => "error",
                Severity::Warning => "warning",
                Severity::Info => "notice",
            };

            let position = diagnostic
                .location()
                .map(|l| format!(" file={},line={},col={},", l.file.display(), l.line, l.column))
                .unwrap_or_else(|| " ".to_string());

            output.push_str(&format!(
                "::{}{}title={}::{}: {}\n",
                level,
                position,
                diagnostic.kind.code(),
                diagnostic.target.qualified_name,
                diagnostic.message
            ));
        }

        output
    }

    fn format_summary(&self, report: &ValidationReport) -> String {
        let counts = &report.summary.diagnostics_by_severity;
        let execution_time = (report.summary.execution_time_ms as f64) / 1000.0;

        let findings = if counts.total() == 0 {
            self.style("0 violations", Style::Green)
        } else {
            let mut parts = Vec::new();
            if counts.error > 0 {
                let text = format!("{} error{}", counts.error, plural(counts.error));
                parts.push(self.style(&text, Style::Red));
            }
            if counts.warning > 0 {
                let text = format!("{} warning{}", counts.warning, plural(counts.warning));
                parts.push(self.style(&text, Style::Yellow));
            }
            if counts.info > 0 {
                parts.push(self.style(&format!("{} info", counts.info), Style::Cyan));
            }
            parts.join(", ")
        };

        format!(
            "📊 {} {} in {} types across {} files ({:.1}s)\n",
            self.style("Summary:", Style::Bold),
            findings,
            report.summary.total_types,
            report.summary.total_files,
            execution_time
        )
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::declarations::{FieldDeclaration, SourceLocation, TypeDeclaration};
    use std::path::PathBuf;

    fn create_test_report() -> ValidationReport {
        let order = TypeDeclaration::new("Order")
            .with_location(SourceLocation::new(PathBuf::from("src/model.rs"), 42, 12));
        let plain = TypeDeclaration::new("Plain");
        let token = FieldDeclaration::new("token");

        let mut report = ValidationReport::new();
        report.add_diagnostic(Diagnostic::new(
            DiagnosticKind::EntityCollectionHasNoId,
            order.target(),
        ));
        report.add_diagnostic(Diagnostic::new(
            DiagnosticKind::IdHasNoEntityCollection,
            plain.field_target(&token),
        ));
        report.set_files_analyzed(3);
        report.add_types_validated(5);
        report.set_execution_time(1200);
        report
    }

    fn plain_formatter() -> ReportFormatter {
        ReportFormatter::new(ReportOptions {
            use_colors: false,
            ..Default::default()
        })
    }

    #[test]
    fn test_human_format() {
        let output = plain_formatter()
            .format_report(&create_test_report(), OutputFormat::Human)
            .unwrap();

        assert!(output.contains("Marker Violations Found"));
        assert!(output.contains("📁 src/model.rs"));
        assert!(output.contains("42:12:ENTITY_COLLECTION_HAS_NO_ID [error] Order"));
        assert!(output.contains("📁 <no source location>"));
        assert!(output.contains("Plain.token"));
        assert!(output.contains("Summary: 2 errors in 5 types across 3 files (1.2s)"));
    }

    #[test]
    fn test_json_format() {
        let output = plain_formatter()
            .format_report(&create_test_report(), OutputFormat::Json)
            .unwrap();

        let json: JsonValue = serde_json::from_str(&output).unwrap();
        assert_eq!(json["diagnostics"].as_array().unwrap().len(), 2);
        assert_eq!(json["diagnostics"][0]["code"], "ENTITY_COLLECTION_HAS_NO_ID");
        assert_eq!(json["diagnostics"][0]["line_number"], 42);
        assert_eq!(json["diagnostics"][1]["target"]["kind"], "field");
        assert!(json["diagnostics"][1]["file_path"].is_null());
        assert_eq!(json["summary"]["total_types"], 5);
    }

    #[test]
    fn test_junit_format() {
        let output = plain_formatter()
            .format_report(&create_test_report(), OutputFormat::Junit)
            .unwrap();

        assert!(output.starts_with("<?xml version=\"1.0\""));
        assert!(output.contains("tests=\"2\" failures=\"2\""));
        assert!(output.contains("classname=\"ID_HAS_NO_ENTITY_COLLECTION\" name=\"Plain.token\""));
        assert!(output.contains("File: src/model.rs:42:12"));
    }

    #[test]
    fn test_sarif_format() {
        let output = plain_formatter()
            .format_report(&create_test_report(), OutputFormat::Sarif)
            .unwrap();

        let json: JsonValue = serde_json::from_str(&output).unwrap();
        let run = &json["runs"][0];
        assert_eq!(run["tool"]["driver"]["rules"].as_array().unwrap().len(), 4);
        assert_eq!(run["results"][0]["ruleId"], "ENTITY_COLLECTION_HAS_NO_ID");
        assert_eq!(
            run["results"][0]["locations"][0]["physicalLocation"]["region"]["startLine"],
            42
        );
        assert!(run["results"][1]["locations"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_github_format() {
        let output = plain_formatter()
            .format_report(&create_test_report(), OutputFormat::GitHub)
            .unwrap();

        let lines: Vec<_> = output.lines().collect();
        assert_eq!(
            lines[0],
            "::error file=src/model.rs,line=42,col=12,title=ENTITY_COLLECTION_HAS_NO_ID::Order: Classes marked with the @EntityCollection must have also a field annotated with @Id."
        );
        assert!(lines[1].starts_with("::error title=ID_HAS_NO_ENTITY_COLLECTION::Plain.token"));
    }

    #[test]
    fn test_empty_report_and_limits() {
        let output = plain_formatter()
            .format_report(&ValidationReport::new(), OutputFormat::Human)
            .unwrap();
        assert!(output.contains("No marker violations found"));

        let limited = ReportFormatter::new(ReportOptions {
            max_diagnostics: Some(1),
            ..Default::default()
        });
        let output = limited
            .format_report(&create_test_report(), OutputFormat::GitHub)
            .unwrap();
        assert_eq!(output.lines().count(), 1);
    }

    #[test]
    fn test_min_severity_hides_lower_levels() {
        let mut report = create_test_report();
        report.diagnostics[1].severity = Severity::Info;

        let formatter = ReportFormatter::new(ReportOptions {
            use_colors: false,
            min_severity: Some(Severity::Warning),
            ..Default::default()
        });
        let output = formatter.format_report(&report, OutputFormat::GitHub).unwrap();

        assert_eq!(output.lines().count(), 1);
        assert!(output.contains("ENTITY_COLLECTION_HAS_NO_ID"));
    }

    #[test]
    fn test_write_report_terminates_output() {
        let mut buffer = Vec::new();
        plain_formatter()
            .write_report(&create_test_report(), OutputFormat::Json, &mut buffer)
            .unwrap();

        let written = String::from_utf8(buffer).unwrap();
        assert!(written.ends_with("}\n"));
        let json: JsonValue = serde_json::from_str(&written).unwrap();
        assert_eq!(json["diagnostics"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_parse_format() {
        assert_eq!("SARIF".parse::<OutputFormat>().unwrap(), OutputFormat::Sarif);
        assert!("xml".parse::<OutputFormat>().is_err());
    }
}
