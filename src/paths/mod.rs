//! Source file selection using .gitignore-style patterns
//!
//! Architectural Principle: Service Layer - PathFilter decides which files a round covers
//! - Configured patterns apply in order, later matches win, `!` re-includes
//! - `.hawthorneignore` files in parent directories are honored the same way

use crate::config::PathConfig;
use crate::domain::diagnostics::{HawthorneError, HawthorneResult};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct PathFilter {
    patterns: Vec<FilterPattern>,
    /// Ignore file name; `None` disables ignore file lookup
    ignore_filename: Option<String>,
}

#[derive(Debug, Clone)]
struct FilterPattern {
    pattern: glob::Pattern,
    /// Pattern started with `!`
    is_include: bool,
    /// Pattern ended with `/` and only matches directories
    directory_only: bool,
    /// Pattern contains a `/` and is matched against the whole path
    anchored: bool,
}

impl FilterPattern {
    fn parse(raw: &str) -> Result<Self, glob::PatternError> {
        let (is_include, rest) = match raw.strip_prefix('!') {
            Some(stripped) => (true, stripped),
            None => (false, raw),
        };
        let directory_only = rest.ends_with('/');
        let body = rest.trim_end_matches('/');
        let body = body.strip_prefix('/').unwrap_or(body);

        Ok(Self {
            pattern: glob::Pattern::new(body)?,
            is_include,
            directory_only,
            anchored: body.contains('/'),
        })
    }

    fn matches_component(&self, path: &Path) -> bool {
        if self.anchored {
            self.pattern.matches_path(path)
        } else {
            path.file_name()
                .map(|name| self.pattern.matches(&name.to_string_lossy()))
                .unwrap_or(false)
        }
    }

    /// `path` is relative to the scan root; directories above the root are never tested
    fn matches(&self, path: &Path) -> bool {
        if self.directory_only {
            // A directory pattern excludes everything below a matching directory
            path.ancestors()
                .skip(1)
                .filter(|dir| !dir.as_os_str().is_empty())
                .any(|dir| self.matches_component(dir))
        } else {
            self.matches_component(path)
        }
    }
}

impl PathFilter {
    pub fn new(patterns: Vec<String>, ignore_filename: Option<String>) -> HawthorneResult<Self> {
        let patterns = patterns
            .iter()
            .map(|raw| {
                FilterPattern::parse(raw).map_err(|e| {
                    HawthorneError::pattern(format!("Invalid pattern '{raw}': {e}"))
                })
            })
            .collect::<HawthorneResult<Vec<_>>>()?;

        Ok(Self {
            patterns,
            ignore_filename: ignore_filename.filter(|name| !name.is_empty()),
        })
    }

    pub fn from_config(config: &PathConfig) -> HawthorneResult<Self> {
        Self::new(config.patterns.clone(), config.ignore_file.clone())
    }

    /// Stop reading ignore files
    pub fn without_ignore_files(mut self) -> Self {
        self.ignore_filename = None;
        self
    }

    /// Whether a file should be validated, with `path` relative to the working directory
    pub fn should_analyze<P: AsRef<Path>>(&self, path: P) -> HawthorneResult<bool> {
        let path = path.as_ref();
        let path = path.strip_prefix(".").unwrap_or(path);
        self.should_analyze_under(Path::new(""), path)
    }

    /// Whether a file below `root` should be validated. Patterns see the path
    /// relative to `root`, so directories above the root never exclude it.
    pub fn should_analyze_under<P: AsRef<Path>>(
        &self,
        root: &Path,
        path: P,
    ) -> HawthorneResult<bool> {
        let path = path.as_ref();
        let relative = path.strip_prefix(root).unwrap_or(path);

        let mut included = true;
        for pattern in &self.patterns {
            if pattern.matches(relative) {
                included = pattern.is_include;
            }
        }

        if !included {
            return Ok(false);
        }

        if self.ignore_filename.is_some() && self.is_ignored_by_files(root, relative)? {
            return Ok(false);
        }

        Ok(true)
    }

    /// Apply every ignore file from `root` down to the file's directory; nearer files win
    fn is_ignored_by_files(&self, root: &Path, relative: &Path) -> HawthorneResult<bool> {
        let Some(filename) = &self.ignore_filename else {
            return Ok(false);
        };

        let mut directories: Vec<&Path> = relative.ancestors().skip(1).collect();
        // Outermost first so inner ignore files override outer ones
        directories.reverse();

        let mut ignored = false;
        for dir in directories {
            let ignore_file = root.join(dir).join(filename);
            if !ignore_file.is_file() {
                continue;
            }

            let Ok(below) = relative.strip_prefix(dir) else {
                continue;
            };
            for pattern in self.load_ignore_file(&ignore_file)? {
                if pattern.matches(below) {
                    ignored = !pattern.is_include;
                }
            }
        }

        Ok(ignored)
    }

    fn load_ignore_file(&self, path: &Path) -> HawthorneResult<Vec<FilterPattern>> {
        let content = fs::read_to_string(path).map_err(|e| {
            HawthorneError::config(format!(
                "Failed to read ignore file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let mut patterns = Vec::new();
        for line in content.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            match FilterPattern::parse(line) {
                Ok(pattern) => patterns.push(pattern),
                Err(e) => {
                    tracing::warn!("Invalid pattern '{}' in {}: {}", line, path.display(), e);
                }
            }
        }

        Ok(patterns)
    }

    /// All files under `root` that pass the filter
    pub fn find_files<P: AsRef<Path>>(&self, root: P) -> HawthorneResult<Vec<PathBuf>> {
        let root = root.as_ref();
        let mut files = Vec::new();

        for entry in WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if entry.file_type().is_file() && self.should_analyze_under(root, path)? {
                files.push(path.to_path_buf());
            }
        }

        Ok(files)
    }

    /// Keep the paths below `root` that pass the filter
    pub fn filter_paths<P: AsRef<Path>>(
        &self,
        root: &Path,
        paths: &[P],
    ) -> HawthorneResult<Vec<PathBuf>> {
        let mut filtered = Vec::new();
        for path in paths {
            if self.should_analyze_under(root, path)? {
                filtered.push(path.as_ref().to_path_buf());
            }
        }
        Ok(filtered)
    }

    /// Append a pattern; it takes precedence over earlier ones
    pub fn add_pattern(&mut self, pattern: &str) -> HawthorneResult<()> {
        let parsed = FilterPattern::parse(pattern)
            .map_err(|e| HawthorneError::pattern(format!("Invalid pattern '{pattern}': {e}")))?;
        self.patterns.push(parsed);
        Ok(())
    }
}
