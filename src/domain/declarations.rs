//! Read-only view of declared types and their fields
//!
//! Architecture: Value Objects - declarations are snapshots supplied by a discovery front end
//! - A TypeDeclaration owns its fields, so every field has exactly one enclosing type
//! - Markers are carried as fully-qualified paths and classified by the marker catalog

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Position of a declaration in a source file (1-indexed)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(file: PathBuf, line: u32, column: u32) -> Self {
        Self { file, line, column }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file.display(), self.line, self.column)
    }
}

/// Fully-qualified path of a marker attached to a declaration, e.g. `hawthorne::id`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarkerPath(String);

impl MarkerPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MarkerPath {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl fmt::Display for MarkerPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Syntactic form of a type declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    #[default]
    Struct,
    Enum,
    Union,
}

/// A class-like declaration with its markers and directly enclosed fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDeclaration {
    pub name: String,
    /// Inline modules enclosing the type, outermost first
    #[serde(default)]
    pub module_path: Vec<String>,
    #[serde(default)]
    pub kind: TypeKind,
    pub location: Option<SourceLocation>,
    #[serde(default)]
    pub markers: Vec<MarkerPath>,
    #[serde(default)]
    pub fields: Vec<FieldDeclaration>,
}

impl TypeDeclaration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            module_path: Vec::new(),
            kind: TypeKind::Struct,
            location: None,
            markers: Vec::new(),
            fields: Vec::new(),
        }
    }

    pub fn with_kind(mut self, kind: TypeKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_module_path(mut self, module_path: Vec<String>) -> Self {
        self.module_path = module_path;
        self
    }

    pub fn with_location(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_marker(mut self, marker: impl Into<MarkerPath>) -> Self {
        self.markers.push(marker.into());
        self
    }

    pub fn with_field(mut self, field: FieldDeclaration) -> Self {
        self.fields.push(field);
        self
    }

    /// Name including enclosing modules, e.g. `models::Order`
    pub fn qualified_name(&self) -> String {
        if self.module_path.is_empty() {
            self.name.clone()
        } else {
            format!("{}::{}", self.module_path.join("::"), self.name)
        }
    }

    pub fn target(&self) -> DeclarationTarget {
        DeclarationTarget {
            kind: DeclarationKind::Type,
            qualified_name: self.qualified_name(),
            location: self.location.clone(),
        }
    }

    /// Target for one of this type's fields
    pub fn field_target(&self, field: &FieldDeclaration) -> DeclarationTarget {
        DeclarationTarget {
            kind: DeclarationKind::Field,
            qualified_name: format!("{}.{}", self.qualified_name(), field.name),
            location: field.location.clone(),
        }
    }
}

/// A named member of exactly one type declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDeclaration {
    /// Field ident, or the positional index for tuple fields
    pub name: String,
    /// Rendered field type, informational only
    #[serde(default)]
    pub ty: Option<String>,
    pub location: Option<SourceLocation>,
    #[serde(default)]
    pub markers: Vec<MarkerPath>,
}

impl FieldDeclaration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: None,
            location: None,
            markers: Vec::new(),
        }
    }

    pub fn with_type(mut self, ty: impl Into<String>) -> Self {
        self.ty = Some(ty.into());
        self
    }

    pub fn with_location(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_marker(mut self, marker: impl Into<MarkerPath>) -> Self {
        self.markers.push(marker.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclarationKind {
    Type,
    Field,
}

impl DeclarationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Type => "type",
            Self::Field => "field",
        }
    }
}

/// The declaration a diagnostic points at
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeclarationTarget {
    pub kind: DeclarationKind,
    /// `Type`, `module::Type` or `module::Type.field`
    pub qualified_name: String,
    pub location: Option<SourceLocation>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualified_names() {
        let order = TypeDeclaration::new("Order")
            .with_module_path(vec!["shop".to_string(), "model".to_string()])
            .with_field(FieldDeclaration::new("id"));

        assert_eq!(order.qualified_name(), "shop::model::Order");

        let target = order.field_target(&order.fields[0]);
        assert_eq!(target.kind, DeclarationKind::Field);
        assert_eq!(target.qualified_name, "shop::model::Order.id");
    }

    #[test]
    fn test_declarations_deserialize_with_defaults() {
        let json = r#"{
            "name": "Order",
            "location": null,
            "markers": ["hawthorne::entity_collection"],
            "fields": [{ "name": "id", "location": null, "markers": ["hawthorne::id"] }]
        }"#;

        let order: TypeDeclaration = serde_json::from_str(json).unwrap();
        assert_eq!(order.kind, TypeKind::Struct);
        assert!(order.module_path.is_empty());
        assert_eq!(order.markers[0].as_str(), "hawthorne::entity_collection");
        assert_eq!(order.fields[0].ty, None);
    }
}
