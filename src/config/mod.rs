//! Configuration loading and management for Hawthorne Guard
//!
//! Architecture: Anti-Corruption Layer - Configuration translates external YAML formats
//! - Raw YAML structures are converted to clean domain objects
//! - Every section has embedded defaults, so an empty file is a valid configuration

use crate::domain::diagnostics::{HawthorneError, HawthorneResult};
use crate::markers::MarkerKind;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

/// File names probed, in order, when no configuration path is given
pub const DEFAULT_CONFIG_FILES: [&str; 3] = ["hawthorne.yaml", "hawthorne.yml", ".hawthorne.yaml"];

const SUPPORTED_VERSIONS: [&str; 1] = ["1.0"];

/// Main configuration structure for Hawthorne Guard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HawthorneConfig {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub markers: MarkerConfig,
    #[serde(default)]
    pub paths: PathConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

/// Fully-qualified names of the four role markers
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    pub singleton_entity: String,
    pub entity_collection: String,
    pub id: String,
    pub binary_data: String,
}

impl MarkerConfig {
    pub fn name_for(&self, kind: MarkerKind) -> &str {
        match kind {
            MarkerKind::SingletonEntity => &self.singleton_entity,
            MarkerKind::EntityCollection => &self.entity_collection,
            MarkerKind::Id => &self.id,
            MarkerKind::BinaryData => &self.binary_data,
        }
    }
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            singleton_entity: "hawthorne::singleton_entity".to_string(),
            entity_collection: "hawthorne::entity_collection".to_string(),
            id: "hawthorne::id".to_string(),
            binary_data: "hawthorne::binary_data".to_string(),
        }
    }
}

/// Path filtering configuration
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathConfig {
    /// Include/exclude patterns (gitignore-style)
    #[serde(default)]
    pub patterns: Vec<String>,
    /// Optional ignore file name looked up in parent directories
    #[serde(default)]
    pub ignore_file: Option<String>,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            patterns: vec![
                "target/".to_string(),
                "**/.git/".to_string(),
                "**/*.generated.*".to_string(),
            ],
            ignore_file: Some(".hawthorneignore".to_string()),
        }
    }
}

/// Discovery settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Also validate declarations inside `#[cfg(test)]` code
    #[serde(default)]
    pub include_tests: bool,
}

impl HawthorneConfig {
    /// Load configuration from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> HawthorneResult<Self> {
        let contents = fs::read_to_string(&path).map_err(|e| {
            HawthorneError::config(format!(
                "Failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let config: Self = serde_yaml::from_str(&contents).map_err(|e| {
            HawthorneError::config(format!(
                "Failed to parse config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from string content
    pub fn load_from_str(content: &str) -> HawthorneResult<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| HawthorneError::config(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Load the first default config file found in `dir`, or the built-in defaults
    pub fn discover_in<P: AsRef<Path>>(dir: P) -> HawthorneResult<Self> {
        for name in DEFAULT_CONFIG_FILES {
            let candidate = dir.as_ref().join(name);
            if candidate.is_file() {
                tracing::debug!("Using configuration {}", candidate.display());
                return Self::load_from_file(candidate);
            }
        }

        Ok(Self::default())
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> HawthorneResult<()> {
        if !SUPPORTED_VERSIONS.contains(&self.version.as_str()) {
            return Err(HawthorneError::config(format!(
                "Unsupported configuration version: {}. Supported versions: {}",
                self.version,
                SUPPORTED_VERSIONS.join(", ")
            )));
        }

        // Two kinds sharing a name would make classification ambiguous
        for (i, first) in MarkerKind::ALL.iter().enumerate() {
            for second in &MarkerKind::ALL[i + 1..] {
                let a = self.markers.name_for(*first).trim();
                let b = self.markers.name_for(*second).trim();
                if !a.is_empty() && a == b {
                    return Err(HawthorneError::config(format!(
                        "Markers '{first}' and '{second}' share the name '{a}'"
                    )));
                }
            }
        }

        for pattern in &self.paths.patterns {
            let pattern = pattern.strip_prefix('!').unwrap_or(pattern);
            glob::Pattern::new(pattern).map_err(|e| {
                HawthorneError::config(format!("Invalid path pattern '{pattern}': {e}"))
            })?;
        }

        Ok(())
    }

    /// SHA-256 over the canonical JSON form, recorded in reports
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        match serde_json::to_vec(self) {
            Ok(bytes) => hasher.update(&bytes),
            Err(e) => {
                tracing::warn!("Config fingerprint falls back to debug form: {}", e);
                hasher.update(format!("{self:?}").as_bytes());
            }
        }
        let digest = hasher.finalize();
        format!("{digest:x}").chars().take(16).collect()
    }
}

impl Default for HawthorneConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            markers: MarkerConfig::default(),
            paths: PathConfig::default(),
            analysis: AnalysisConfig::default(),
        }
    }
}

fn default_version() -> String {
    "1.0".to_string()
}

/// Configuration builder for programmatic construction
pub struct ConfigBuilder {
    config: HawthorneConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self { config: HawthorneConfig::default() }
    }

    /// Set the fully-qualified name of one marker kind
    pub fn marker(mut self, kind: MarkerKind, name: impl Into<String>) -> Self {
        let name = name.into();
        match kind {
            MarkerKind::SingletonEntity => self.config.markers.singleton_entity = name,
            MarkerKind::EntityCollection => self.config.markers.entity_collection = name,
            MarkerKind::Id => self.config.markers.id = name,
            MarkerKind::BinaryData => self.config.markers.binary_data = name,
        }
        self
    }

    pub fn add_path_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.config.paths.patterns.push(pattern.into());
        self
    }

    pub fn ignore_file(mut self, filename: impl Into<String>) -> Self {
        self.config.paths.ignore_file = Some(filename.into());
        self
    }

    pub fn include_tests(mut self, include: bool) -> Self {
        self.config.analysis.include_tests = include;
        self
    }

    pub fn build(self) -> HawthorneResult<HawthorneConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
