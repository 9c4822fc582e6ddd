//! Declaration discovery for Rust sources using syn
//!
//! Code Quality Principle: Specialized Analysis Services - discovery turns syntax into declarations
//! - Implements FileAnalyzer so other front ends can feed the same engine
//! - Resolves attribute and derive paths through the module's `use` declarations
//! - Knows nothing about the rules; it only reports which markers sit where

use crate::analyzer::FileAnalyzer;
use crate::domain::declarations::{
    FieldDeclaration, MarkerPath, SourceLocation, TypeDeclaration, TypeKind,
};
use crate::domain::diagnostics::HawthorneResult;
use proc_macro2::Span;
use quote::ToTokens;
use std::collections::HashMap;
use std::path::Path;
use syn::punctuated::Punctuated;
use syn::spanned::Spanned;
use syn::visit::Visit;

/// Collects type declarations from `.rs` files
#[derive(Debug, Default, Clone)]
pub struct RustAnalyzer {
    /// Whether to collect declarations from `#[cfg(test)]` code
    pub include_tests: bool,
}

impl RustAnalyzer {
    pub fn new() -> Self {
        Self { include_tests: false }
    }

    pub fn with_tests() -> Self {
        Self { include_tests: true }
    }
}

impl FileAnalyzer for RustAnalyzer {
    fn discover(&self, file_path: &Path, content: &str) -> HawthorneResult<Vec<TypeDeclaration>> {
        let syntax_tree = match syn::parse_file(content) {
            Ok(tree) => tree,
            Err(e) => {
                // The compiler reports syntax errors; there is nothing to validate yet
                tracing::debug!("Failed to parse Rust file {}: {}", file_path.display(), e);
                return Ok(Vec::new());
            }
        };

        let mut collector = DeclarationCollector {
            file_path,
            include_tests: self.include_tests,
            module_path: Vec::new(),
            scopes: vec![ImportScope::from_items(&syntax_tree.items)],
            declarations: Vec::new(),
        };
        collector.visit_file(&syntax_tree);

        tracing::debug!(
            "Discovered {} type declarations in {}",
            collector.declarations.len(),
            file_path.display()
        );
        Ok(collector.declarations)
    }

    fn handles_file(&self, file_path: &Path) -> bool {
        file_path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext == "rs")
            .unwrap_or(false)
    }
}

/// Names brought into one module by its `use` items
#[derive(Debug, Default)]
struct ImportScope {
    /// Local name to full path, e.g. `id` -> `hawthorne::id`
    aliases: HashMap<String, String>,
    /// Prefixes of glob imports, e.g. `hawthorne`
    globs: Vec<String>,
}

impl ImportScope {
    fn from_items(items: &[syn::Item]) -> Self {
        let mut scope = Self::default();
        for item in items {
            if let syn::Item::Use(item_use) = item {
                scope.collect(&mut Vec::new(), &item_use.tree);
            }
        }
        scope
    }

    fn collect(&mut self, prefix: &mut Vec<String>, tree: &syn::UseTree) {
        match tree {
            syn::UseTree::Path(path) => {
                prefix.push(path.ident.to_string());
                self.collect(prefix, &path.tree);
                prefix.pop();
            }
            syn::UseTree::Name(name) => {
                if name.ident == "self" {
                    if let Some(last) = prefix.last() {
                        self.aliases.insert(last.clone(), prefix.join("::"));
                    }
                } else {
                    let full = join(prefix, &name.ident.to_string());
                    self.aliases.insert(name.ident.to_string(), full);
                }
            }
            syn::UseTree::Rename(rename) => {
                if rename.rename == "_" {
                    return;
                }
                let full = if rename.ident == "self" {
                    prefix.join("::")
                } else {
                    join(prefix, &rename.ident.to_string())
                };
                self.aliases.insert(rename.rename.to_string(), full);
            }
            syn::UseTree::Glob(_) => {
                if !prefix.is_empty() {
                    self.globs.push(prefix.join("::"));
                }
            }
            syn::UseTree::Group(group) => {
                for item in &group.items {
                    self.collect(prefix, item);
                }
            }
        }
    }

    /// Every full path `path` may name in this scope
    fn candidates(&self, path: &syn::Path) -> Vec<MarkerPath> {
        let segments: Vec<String> = path.segments.iter().map(|s| s.ident.to_string()).collect();
        let Some((first, rest)) = segments.split_first() else {
            return Vec::new();
        };

        if path.leading_colon.is_some() {
            return vec![MarkerPath::new(segments.join("::"))];
        }

        if let Some(full) = self.aliases.get(first) {
            let mut resolved = full.clone();
            for segment in rest {
                resolved.push_str("::");
                resolved.push_str(segment);
            }
            return vec![MarkerPath::new(resolved)];
        }

        let mut candidates = vec![MarkerPath::new(segments.join("::"))];
        if rest.is_empty() {
            candidates.extend(self.globs.iter().map(|glob| MarkerPath::new(join_str(glob, first))));
        }
        candidates
    }
}

fn join(prefix: &[String], last: &str) -> String {
    if prefix.is_empty() {
        last.to_string()
    } else {
        format!("{}::{}", prefix.join("::"), last)
    }
}

fn join_str(prefix: &str, last: &str) -> String {
    format!("{prefix}::{last}")
}

/// Visitor building a TypeDeclaration for every struct, enum and union
struct DeclarationCollector<'a> {
    file_path: &'a Path,
    include_tests: bool,
    module_path: Vec<String>,
    /// Innermost module last; imports do not leak into child modules
    scopes: Vec<ImportScope>,
    declarations: Vec<TypeDeclaration>,
}

impl DeclarationCollector<'_> {
    fn skips(&self, attrs: &[syn::Attribute]) -> bool {
        !self.include_tests && attrs.iter().any(is_test_attribute)
    }

    fn location(&self, span: Span) -> SourceLocation {
        let start = span.start();
        SourceLocation::new(
            self.file_path.to_path_buf(),
            start.line as u32,
            start.column as u32 + 1,
        )
    }

    fn markers(&self, attrs: &[syn::Attribute]) -> Vec<MarkerPath> {
        let Some(scope) = self.scopes.last() else {
            return Vec::new();
        };

        let mut markers = Vec::new();
        for attr in attrs {
            if attr.path().is_ident("derive") {
                match attr.parse_args_with(Punctuated::<syn::Path, syn::Token![,]>::parse_terminated) {
                    Ok(paths) => {
                        for path in &paths {
                            markers.extend(scope.candidates(path));
                        }
                    }
                    Err(e) => tracing::debug!("Unreadable derive list: {}", e),
                }
            } else {
                markers.extend(scope.candidates(attr.path()));
            }
        }
        markers
    }

    fn fields<'f>(&self, fields: impl Iterator<Item = &'f syn::Field>) -> Vec<FieldDeclaration> {
        fields
            .enumerate()
            .map(|(index, field)| {
                let (name, span) = match &field.ident {
                    Some(ident) => (ident.to_string(), ident.span()),
                    None => (index.to_string(), field.ty.span()),
                };
                FieldDeclaration {
                    name,
                    ty: Some(field.ty.to_token_stream().to_string()),
                    location: Some(self.location(span)),
                    markers: self.markers(&field.attrs),
                }
            })
            .collect()
    }

    fn push_type(
        &mut self,
        ident: &syn::Ident,
        kind: TypeKind,
        attrs: &[syn::Attribute],
        fields: Vec<FieldDeclaration>,
    ) {
        let declaration = TypeDeclaration {
            name: ident.to_string(),
            module_path: self.module_path.clone(),
            kind,
            location: Some(self.location(ident.span())),
            markers: self.markers(attrs),
            fields,
        };
        self.declarations.push(declaration);
    }
}

impl<'ast> Visit<'ast> for DeclarationCollector<'_> {
    fn visit_item_mod(&mut self, item: &'ast syn::ItemMod) {
        if self.skips(&item.attrs) {
            return;
        }
        // Out-of-line modules are separate files and are discovered on their own
        let Some((_, items)) = &item.content else {
            return;
        };

        self.module_path.push(item.ident.to_string());
        self.scopes.push(ImportScope::from_items(items));
        syn::visit::visit_item_mod(self, item);
        self.scopes.pop();
        self.module_path.pop();
    }

    fn visit_item_fn(&mut self, func: &'ast syn::ItemFn) {
        if self.skips(&func.attrs) {
            return;
        }
        syn::visit::visit_item_fn(self, func);
    }

    fn visit_item_struct(&mut self, item: &'ast syn::ItemStruct) {
        if self.skips(&item.attrs) {
            return;
        }
        let fields = self.fields(item.fields.iter());
        self.push_type(&item.ident, TypeKind::Struct, &item.attrs, fields);
    }

    fn visit_item_enum(&mut self, item: &'ast syn::ItemEnum) {
        if self.skips(&item.attrs) {
            return;
        }
        // Variant fields are not direct fields of the enum
        self.push_type(&item.ident, TypeKind::Enum, &item.attrs, Vec::new());
    }

    fn visit_item_union(&mut self, item: &'ast syn::ItemUnion) {
        if self.skips(&item.attrs) {
            return;
        }
        let fields = self.fields(item.fields.named.iter());
        self.push_type(&item.ident, TypeKind::Union, &item.attrs, fields);
    }
}

/// `#[cfg(test)]`, `#[cfg(all(test, ..))]`, `#[test]` or a `::test` attribute such as `#[tokio::test]`
fn is_test_attribute(attr: &syn::Attribute) -> bool {
    let path = attr.path();
    if path.is_ident("cfg") {
        return attr
            .parse_args::<syn::Meta>()
            .map(|meta| cfg_requires_test(&meta))
            .unwrap_or(false);
    }
    path.segments
        .last()
        .map(|segment| segment.ident == "test")
        .unwrap_or(false)
}

/// Whether a cfg predicate can only hold in test builds
fn cfg_requires_test(meta: &syn::Meta) -> bool {
    match meta {
        syn::Meta::Path(path) => path.is_ident("test"),
        syn::Meta::List(list) if list.path.is_ident("all") => list
            .parse_args_with(Punctuated::<syn::Meta, syn::Token![,]>::parse_terminated)
            .map(|predicates| predicates.iter().any(cfg_requires_test))
            .unwrap_or(false),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn discover(content: &str) -> Vec<TypeDeclaration> {
        RustAnalyzer::new()
            .discover(Path::new("src/model.rs"), content)
            .unwrap()
    }

    fn marker_names(markers: &[MarkerPath]) -> Vec<&str> {
        markers.iter().map(MarkerPath::as_str).collect()
    }

    #[test]
    fn test_handles_only_rust_files() {
        let analyzer = RustAnalyzer::new();
        assert!(analyzer.handles_file(Path::new("src/lib.rs")));
        assert!(!analyzer.handles_file(Path::new("README.md")));
        assert!(!analyzer.handles_file(Path::new("Cargo.toml")));
    }

    #[test]
    fn test_qualified_attributes_and_fields() {
        let declarations = discover(
            r#"
#[hawthorne::entity_collection]
pub struct Order {
    #[hawthorne::id]
    pub id: u64,
    pub total: u32,
}
"#,
        );

        assert_eq!(declarations.len(), 1);
        let order = &declarations[0];
        assert_eq!(order.name, "Order");
        assert_eq!(marker_names(&order.markers), ["hawthorne::entity_collection"]);
        assert_eq!(order.fields.len(), 2);
        assert_eq!(order.fields[0].name, "id");
        assert_eq!(order.fields[0].ty.as_deref(), Some("u64"));
        assert_eq!(marker_names(&order.fields[0].markers), ["hawthorne::id"]);
        assert!(order.fields[1].markers.is_empty());

        let location = order.location.as_ref().unwrap();
        assert_eq!(location.line, 3);
        assert_eq!(location.column, 12);
        assert_eq!(order.fields[0].location.as_ref().unwrap().line, 5);
    }

    #[test]
    fn test_use_imports_resolve_short_attributes() {
        let declarations = discover(
            r#"
use hawthorne::{entity_collection, id as key};
use hawthorne::*;
use serde as s;

#[entity_collection]
#[derive(Debug, s::Serialize)]
struct Order {
    #[key]
    id: u64,
    #[binary_data]
    blob: Vec<u8>,
}
"#,
        );

        let order = &declarations[0];
        assert_eq!(
            marker_names(&order.markers),
            ["hawthorne::entity_collection", "Debug", "hawthorne::Debug", "serde::Serialize"]
        );
        assert_eq!(marker_names(&order.fields[0].markers), ["hawthorne::id"]);
        assert_eq!(
            marker_names(&order.fields[1].markers),
            ["binary_data", "hawthorne::binary_data"]
        );
    }

    #[test]
    fn test_imports_are_scoped_to_their_module() {
        let declarations = discover(
            r#"
use hawthorne::singleton_entity;

mod store {
    #[singleton_entity]
    pub struct Settings;
}
"#,
        );

        let settings = &declarations[0];
        assert_eq!(settings.qualified_name(), "store::Settings");
        assert_eq!(marker_names(&settings.markers), ["singleton_entity"]);
    }

    #[test]
    fn test_tuple_unions_and_enums() {
        let declarations = discover(
            r#"
#[hawthorne::singleton_entity]
struct Blob(#[hawthorne::binary_data] Vec<u8>);

#[hawthorne::entity_collection]
enum Shape { Circle { id: u64 } }

union Raw { #[hawthorne::id] a: u32, b: f32 }
"#,
        );

        assert_eq!(declarations.len(), 3);
        assert_eq!(declarations[0].fields[0].name, "0");
        assert_eq!(declarations[1].kind, TypeKind::Enum);
        assert!(declarations[1].fields.is_empty());
        assert_eq!(declarations[2].kind, TypeKind::Union);
        assert_eq!(marker_names(&declarations[2].fields[0].markers), ["hawthorne::id"]);
    }

    #[test]
    fn test_test_code_is_skipped_unless_requested() {
        let content = r#"
struct Live;

#[cfg(test)]
mod tests {
    #[hawthorne::entity_collection]
    struct Fixture;
}

#[test]
fn builds_fixture() {
    #[hawthorne::entity_collection]
    struct Local;
}
"#;

        let names: Vec<_> = discover(content).into_iter().map(|d| d.name).collect();
        assert_eq!(names, ["Live"]);

        let with_tests = RustAnalyzer::with_tests()
            .discover(Path::new("src/model.rs"), content)
            .unwrap();
        let names: Vec<_> = with_tests.into_iter().map(|d| d.qualified_name()).collect();
        assert_eq!(names, ["Live", "tests::Fixture", "Local"]);
    }

    #[test]
    fn test_compound_test_cfg_is_skipped() {
        let content = r#"
#[cfg(all(test, feature = "store"))]
mod fixtures {
    struct Fixture { #[hawthorne::id] id: u64 }
}

#[cfg(any(test, feature = "store"))]
struct Shared;

#[cfg(not(test))]
struct Release;
"#;

        let names: Vec<_> = discover(content).into_iter().map(|d| d.name).collect();
        assert_eq!(names, ["Shared", "Release"]);
    }

    #[test]
    fn test_invalid_syntax_yields_nothing() {
        assert!(discover("this is not valid rust syntax {{{ %%% @@@").is_empty());
    }
}
