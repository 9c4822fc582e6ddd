//! Marker catalog: the four role markers the validator recognizes
//!
//! The catalog is resolved once from configured fully-qualified names and is
//! read-only afterwards. A kind whose name does not resolve never matches.

use crate::config::MarkerConfig;
use crate::domain::declarations::MarkerPath;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

lazy_static! {
    /// `segment(::segment)*`, each segment a Rust identifier
    static ref MARKER_PATH: Regex =
        Regex::new(r"^(?:r#)?[A-Za-z_][A-Za-z0-9_]*(?:::(?:r#)?[A-Za-z_][A-Za-z0-9_]*)*$")
            .expect("marker path regex is valid");
}

/// Role marker identities, in catalog order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerKind {
    /// Type is a single persisted record
    SingletonEntity,
    /// Type is a collection of records keyed by an id field
    EntityCollection,
    /// Field is the record identifier
    Id,
    /// Field holds a binary payload
    BinaryData,
}

impl MarkerKind {
    pub const ALL: [MarkerKind; 4] = [
        Self::SingletonEntity,
        Self::EntityCollection,
        Self::Id,
        Self::BinaryData,
    ];

    fn index(self) -> usize {
        match self {
            Self::SingletonEntity => 0,
            Self::EntityCollection => 1,
            Self::Id => 2,
            Self::BinaryData => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SingletonEntity => "singleton_entity",
            Self::EntityCollection => "entity_collection",
            Self::Id => "id",
            Self::BinaryData => "binary_data",
        }
    }

    /// Whether the marker applies to types rather than fields
    pub fn is_class_marker(self) -> bool {
        matches!(self, Self::SingletonEntity | Self::EntityCollection)
    }
}

impl fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of marker kinds attached to one declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MarkerSet(u8);

impl MarkerSet {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, kind: MarkerKind) {
        self.0 |= 1 << kind.index();
    }

    pub fn contains(self, kind: MarkerKind) -> bool {
        self.0 & (1 << kind.index()) != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = MarkerKind> {
        MarkerKind::ALL.into_iter().filter(move |kind| self.contains(*kind))
    }
}

impl FromIterator<MarkerKind> for MarkerSet {
    fn from_iter<I: IntoIterator<Item = MarkerKind>>(iter: I) -> Self {
        let mut set = Self::new();
        for kind in iter {
            set.insert(kind);
        }
        set
    }
}

/// Resolved marker identities
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerCatalog {
    names: [Option<String>; 4],
}

impl MarkerCatalog {
    /// Resolve every configured name. Unresolvable names are logged and left empty.
    pub fn resolve(config: &MarkerConfig) -> Self {
        let mut names: [Option<String>; 4] = Default::default();

        for kind in MarkerKind::ALL {
            let configured = config.name_for(kind);
            let normalized = normalize(configured);

            if MARKER_PATH.is_match(normalized) {
                tracing::debug!("Resolved marker {} to '{}'", kind, normalized);
                names[kind.index()] = Some(normalized.to_string());
            } else {
                tracing::warn!(
                    "Marker {} name '{}' does not resolve to a path; it will never match",
                    kind,
                    configured
                );
            }
        }

        Self { names }
    }

    /// Catalog with the default Hawthorne marker names
    pub fn with_defaults() -> Self {
        Self::resolve(&MarkerConfig::default())
    }

    /// Marker kind named by `path`, if any
    pub fn kind_of(&self, path: &str) -> Option<MarkerKind> {
        let path = normalize(path);
        MarkerKind::ALL
            .into_iter()
            .find(|kind| self.names[kind.index()].as_deref() == Some(path))
    }

    /// Classify a declaration's markers; paths outside the catalog are ignored
    pub fn classify(&self, markers: &[MarkerPath]) -> MarkerSet {
        markers
            .iter()
            .filter_map(|marker| self.kind_of(marker.as_str()))
            .collect()
    }

    pub fn qualified_name(&self, kind: MarkerKind) -> Option<&str> {
        self.names[kind.index()].as_deref()
    }

    pub fn is_resolved(&self, kind: MarkerKind) -> bool {
        self.names[kind.index()].is_some()
    }

    pub fn unresolved(&self) -> Vec<MarkerKind> {
        MarkerKind::ALL
            .into_iter()
            .filter(|kind| !self.is_resolved(*kind))
            .collect()
    }
}

impl Default for MarkerCatalog {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn normalize(path: &str) -> &str {
    let path = path.trim();
    path.strip_prefix("::").unwrap_or(path)
}
