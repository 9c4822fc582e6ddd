//! Main analysis orchestrator for Hawthorne Guard
//!
//! CDD Principle: Domain Services - Analyzer drives one validation round over source files
//! - Coordinates path filtering, declaration discovery and the validation engine
//! - Each file is validated on its own, so files can be processed in parallel
//! - Unreadable files are logged and skipped unless fail-fast is requested

pub mod rust;

use crate::analyzer::rust::RustAnalyzer;
use crate::config::HawthorneConfig;
use crate::domain::declarations::TypeDeclaration;
use crate::domain::diagnostics::{Diagnostic, HawthorneError, HawthorneResult, ValidationReport};
use crate::engine::ValidationEngine;
use crate::markers::MarkerCatalog;
use crate::paths::PathFilter;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Front end turning a source file into type declarations
pub trait FileAnalyzer {
    fn discover(&self, file_path: &Path, content: &str) -> HawthorneResult<Vec<TypeDeclaration>>;

    fn handles_file(&self, file_path: &Path) -> bool;
}

/// Options for customizing analysis behavior
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    pub parallel: bool,
    /// Maximum number of files to analyze
    pub max_files: Option<usize>,
    /// Stop at the first file that cannot be analyzed
    pub fail_fast: bool,
    /// Extra exclusion patterns for this run only
    pub exclude_patterns: Vec<String>,
    /// Skip `.hawthorneignore` lookup
    pub ignore_ignore_files: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            parallel: true,
            max_files: None,
            fail_fast: false,
            exclude_patterns: Vec::new(),
            ignore_ignore_files: false,
        }
    }
}

/// Result of validating one file
#[derive(Debug, Default)]
pub struct FileOutcome {
    /// Number of type declarations found
    pub types: usize,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct Analyzer {
    config: HawthorneConfig,
    engine: ValidationEngine,
    path_filter: PathFilter,
    rust_analyzer: RustAnalyzer,
}

impl Analyzer {
    pub fn new(config: HawthorneConfig) -> HawthorneResult<Self> {
        config.validate()?;

        let catalog = Arc::new(MarkerCatalog::resolve(&config.markers));
        let path_filter = PathFilter::from_config(&config.paths)
            .map_err(|e| HawthorneError::config(format!("Failed to create path filter: {e}")))?;
        let rust_analyzer = RustAnalyzer {
            include_tests: config.analysis.include_tests,
        };

        Ok(Self {
            engine: ValidationEngine::new(catalog),
            path_filter,
            rust_analyzer,
            config,
        })
    }

    pub fn with_defaults() -> HawthorneResult<Self> {
        Self::new(HawthorneConfig::default())
    }

    pub fn engine(&self) -> &ValidationEngine {
        &self.engine
    }

    pub fn catalog(&self) -> &MarkerCatalog {
        self.engine.catalog()
    }

    pub fn config(&self) -> &HawthorneConfig {
        &self.config
    }

    /// Validate in-memory source text as if it were `file_path`
    pub fn analyze_source(&self, file_path: &Path, content: &str) -> HawthorneResult<FileOutcome> {
        let declarations = self.rust_analyzer.discover(file_path, content)?;

        Ok(FileOutcome {
            types: declarations.len(),
            diagnostics: self.engine.validate(&declarations),
        })
    }

    /// Validate one file; files the front end does not handle yield nothing
    pub fn analyze_file<P: AsRef<Path>>(&self, file_path: P) -> HawthorneResult<FileOutcome> {
        let file_path = file_path.as_ref();
        if !self.rust_analyzer.handles_file(file_path) {
            return Ok(FileOutcome::default());
        }

        let content = fs::read_to_string(file_path).map_err(|e| {
            HawthorneError::discovery(
                file_path.display().to_string(),
                format!("Failed to read file: {e}"),
            )
        })?;

        self.analyze_source(file_path, &content)
    }

    /// Validate files and directory trees as one round. Every given path must exist.
    pub fn analyze_paths<P: AsRef<Path>>(
        &self,
        paths: &[P],
        options: &AnalysisOptions,
    ) -> HawthorneResult<ValidationReport> {
        let start_time = Instant::now();
        let files = self.collect_files(paths, options)?;

        let outcomes: Vec<(&PathBuf, HawthorneResult<FileOutcome>)> =
            if options.parallel && files.len() > 1 {
                files.par_iter().map(|file| (file, self.analyze_file(file))).collect()
            } else {
                files.iter().map(|file| (file, self.analyze_file(file))).collect()
            };

        let mut report = ValidationReport::new();
        for (file_path, outcome) in outcomes {
            match outcome {
                Ok(outcome) => {
                    report.add_types_validated(outcome.types);
                    for diagnostic in outcome.diagnostics {
                        report.add_diagnostic(diagnostic);
                    }
                }
                Err(e) if options.fail_fast => return Err(e),
                Err(e) => tracing::warn!("Failed to analyze {}: {}", file_path.display(), e),
            }
        }

        report.set_files_analyzed(files.len());
        report.set_execution_time(start_time.elapsed().as_millis() as u64);
        report.set_config_fingerprint(self.config.fingerprint());
        report.sort_diagnostics();

        tracing::info!(
            "Validated {} types in {} files: {} diagnostics",
            report.summary.total_types,
            report.summary.total_files,
            report.diagnostics.len()
        );
        Ok(report)
    }

    pub fn analyze_directory<P: AsRef<Path>>(
        &self,
        root: P,
        options: &AnalysisOptions,
    ) -> HawthorneResult<ValidationReport> {
        self.analyze_paths(&[root.as_ref()], options)
    }

    pub fn config_fingerprint(&self) -> String {
        self.config.fingerprint()
    }

    fn collect_files<P: AsRef<Path>>(
        &self,
        paths: &[P],
        options: &AnalysisOptions,
    ) -> HawthorneResult<Vec<PathBuf>> {
        let mut filter = self.path_filter.clone();
        if options.ignore_ignore_files {
            filter = filter.without_ignore_files();
        }
        for pattern in &options.exclude_patterns {
            filter.add_pattern(pattern)?;
        }

        let mut files = Vec::new();
        for path in paths {
            let path = path.as_ref();
            if path.is_file() {
                files.push(path.to_path_buf());
            } else if path.is_dir() {
                files.extend(
                    filter
                        .find_files(path)?
                        .into_iter()
                        .filter(|file| self.rust_analyzer.handles_file(file)),
                );
            } else {
                return Err(HawthorneError::discovery(
                    path.display().to_string(),
                    "Path does not exist or is not a file or directory",
                ));
            }
        }

        if let Some(max_files) = options.max_files {
            files.truncate(max_files);
        }
        Ok(files)
    }
}
