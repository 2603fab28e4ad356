use std::path::Path;

use anyhow::{Context, Result};
use tree_sitter::{Language, Node, Parser, Query, QueryCursor, StreamingIterator};

use codecity_core::analyzer::{LanguageAnalyzer, ParsedFile};
use codecity_core::error::SourceError;
use codecity_core::lines::LineTable;
use codecity_core::types::*;

/// Go language frontend using tree-sitter.
pub struct GoAnalyzer {
    language: Language,
    package_query: Query,
}

impl GoAnalyzer {
    pub fn new() -> Result<Self> {
        let language: Language = tree_sitter_go::LANGUAGE.into();

        let package_query = Query::new(
            &language,
            r#"
            (source_file
              (package_clause
                (package_identifier) @package))
            "#,
        )
        .context("failed to compile package query")?;

        Ok(Self {
            language,
            package_query,
        })
    }

    fn package_name(&self, parsed: &ParsedFile) -> Option<String> {
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(
            &self.package_query,
            parsed.tree.root_node(),
            parsed.content.as_bytes(),
        );
        let m = matches.next()?;
        m.captures
            .first()
            .map(|capture| node_text(capture.node, &parsed.content))
    }
}

impl LanguageAnalyzer for GoAnalyzer {
    fn language(&self) -> &'static str {
        "go"
    }

    fn file_extensions(&self) -> &[&str] {
        &["go"]
    }

    fn parse_file(&self, path: &Path, content: &str) -> Result<ParsedFile> {
        let mut parser = Parser::new();
        parser
            .set_language(&self.language)
            .context("failed to set Go language")?;
        let tree = parser
            .parse(content, None)
            .context("failed to parse Go file")?;

        let root = tree.root_node();
        if root.has_error() {
            let line = first_error(root).map_or(1, |n| n.start_position().row + 1);
            return Err(SourceError::Syntax {
                path: path.to_path_buf(),
                line,
            }
            .into());
        }

        Ok(ParsedFile {
            path: path.to_path_buf(),
            tree,
            content: content.to_string(),
        })
    }

    fn compilation_unit(&self, parsed: &ParsedFile, unit_path: &str) -> Result<CompilationUnit> {
        let package = self
            .package_name(parsed)
            .ok_or_else(|| SourceError::MissingPackage {
                path: parsed.path.clone(),
            })?;

        Ok(CompilationUnit {
            context: UnitContext::new(unit_path, &package),
            declarations: lower_declarations(parsed.tree.root_node(), &parsed.content),
            lines: LineTable::new(&parsed.content),
        })
    }
}

/// Top-level declarations of a `source_file`, in document order.
fn lower_declarations(root: Node, source: &str) -> Vec<Declaration> {
    let mut declarations = Vec::new();
    let mut cursor = root.walk();

    for node in root.named_children(&mut cursor) {
        match node.kind() {
            "type_declaration" => {
                let mut specs = node.walk();
                for spec in node.named_children(&mut specs) {
                    if matches!(spec.kind(), "type_spec" | "type_alias") {
                        if let Some(decl) = lower_type_spec(spec, source) {
                            declarations.push(Declaration::Type(decl));
                        }
                    }
                }
            }
            "var_declaration" | "const_declaration" => {
                collect_value_specs(node, &mut declarations);
            }
            "function_declaration" => {
                declarations.push(Declaration::Function(FunctionDeclaration {
                    name: field_text(node, "name", source),
                    receiver: None,
                    body: body_span(node),
                }));
            }
            "method_declaration" => {
                let receiver = node
                    .child_by_field_name("receiver")
                    .map_or(Receiver::Unresolved, |list| receiver_of(list, source));
                declarations.push(Declaration::Function(FunctionDeclaration {
                    name: field_text(node, "name", source),
                    receiver: Some(receiver),
                    body: body_span(node),
                }));
            }
            _ => {}
        }
    }

    declarations
}

fn lower_type_spec(spec: Node, source: &str) -> Option<TypeDeclaration> {
    let name = spec.child_by_field_name("name")?;
    let ty = spec.child_by_field_name("type")?;

    let shape = if ty.kind() == "struct_type" {
        TypeShape::Record {
            fields: struct_field_count(ty),
            body: span_of(ty),
        }
    } else {
        TypeShape::Other
    };

    Some(TypeDeclaration {
        name: node_text(name, source),
        shape,
    })
}

/// Number of entries in a struct's field list; `A, B int` is one entry.
fn struct_field_count(struct_type: Node) -> usize {
    let mut cursor = struct_type.walk();
    let Some(list) = struct_type
        .named_children(&mut cursor)
        .find(|c| c.kind() == "field_declaration_list")
    else {
        return 0;
    };
    let mut fields = list.walk();
    let count = list
        .named_children(&mut fields)
        .filter(|c| c.kind() == "field_declaration")
        .count();
    count
}

/// One value declaration per spec, looking through `var ( ... )` groups.
fn collect_value_specs(node: Node, declarations: &mut Vec<Declaration>) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "var_spec" | "const_spec" => {
                declarations.push(Declaration::Value(ValueDeclaration {
                    span: span_of(child),
                }));
            }
            "var_spec_list" => collect_value_specs(child, declarations),
            _ => {}
        }
    }
}

/// Receiver type from the first parameter of a method's receiver list.
fn receiver_of(list: Node, source: &str) -> Receiver {
    let mut cursor = list.walk();
    let first = list
        .named_children(&mut cursor)
        .find(|c| c.kind() == "parameter_declaration");
    first
        .and_then(|param| param.child_by_field_name("type"))
        .map_or(Receiver::Unresolved, |ty| receiver_type(ty, source))
}

fn receiver_type(ty: Node, source: &str) -> Receiver {
    match ty.kind() {
        "type_identifier" => Receiver::Named(node_text(ty, source)),
        "pointer_type" => match ty.named_child(0) {
            Some(inner) => Receiver::Indirect(Box::new(receiver_type(inner, source))),
            None => Receiver::Unresolved,
        },
        "parenthesized_type" => ty
            .named_child(0)
            .map_or(Receiver::Unresolved, |inner| receiver_type(inner, source)),
        "generic_type" => ty
            .child_by_field_name("type")
            .filter(|base| base.kind() == "type_identifier")
            .map_or(Receiver::Unresolved, |base| {
                Receiver::Named(node_text(base, source))
            }),
        _ => Receiver::Unresolved,
    }
}

fn body_span(node: Node) -> Option<Span> {
    node.child_by_field_name("body").map(span_of)
}

fn span_of(node: Node) -> Span {
    Span::new(node.start_byte(), node.end_byte())
}

fn field_text(node: Node, field: &str, source: &str) -> String {
    node.child_by_field_name(field)
        .map(|n| node_text(n, source))
        .unwrap_or_default()
}

/// First error or missing node in document order.
fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_error)
}

/// Extract text from a tree-sitter node.
fn node_text(node: Node, source: &str) -> String {
    source[node.byte_range()].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn lower(content: &str) -> CompilationUnit {
        let analyzer = GoAnalyzer::new().unwrap();
        let path = PathBuf::from("example/example.go");
        let parsed = analyzer.parse_file(&path, content).unwrap();
        analyzer
            .compilation_unit(&parsed, "example/example.go")
            .unwrap()
    }

    fn aggregate_source(content: &str) -> codecity_core::Aggregate {
        let unit = lower(content);
        codecity_core::aggregate(&unit.declarations, &unit.context, &unit.lines)
    }

    fn id(name: &str) -> ObjectId {
        ObjectId::new("example/example.go", "example", name)
    }

    const EXAMPLE: &str = r#"package example

import "fmt"

type AliasExample int

type Example struct {
	Value string
}

func (e *Example) Print() {
	fmt.Println(e.Value)
}

func (e *Example) Print2() {
	fmt.Println(e.Value)
}

func Print(values ...string) {
	for value := range values {
		fmt.Println(" ", value)
	}
}

func Print2(values ...string) {
	for value := range values {
		fmt.Println(" ", value)
	}
}
"#;

    #[test]
    fn test_package_and_path() {
        let unit = lower(EXAMPLE);
        assert_eq!(unit.context.package, "example");
        assert_eq!(unit.context.path, "example/example.go");
    }

    #[test]
    fn test_lowering_in_document_order() {
        let unit = lower(EXAMPLE);
        let kinds: Vec<&str> = unit
            .declarations
            .iter()
            .map(|d| match d {
                Declaration::Type(_) => "type",
                Declaration::Value(_) => "value",
                Declaration::Function(f) if f.receiver.is_some() => "method",
                Declaration::Function(_) => "func",
            })
            .collect();
        assert_eq!(
            kinds,
            vec!["type", "type", "method", "method", "func", "func"]
        );

        assert!(matches!(
            &unit.declarations[0],
            Declaration::Type(TypeDeclaration { name, shape: TypeShape::Other }) if name == "AliasExample"
        ));
    }

    #[test]
    fn test_example_metrics() {
        let result = aggregate_source(EXAMPLE);
        assert_eq!(result.len(), 2, "Example plus the residual bucket");

        let example = result.get(&id("Example")).expect("Example record");
        assert_eq!(example.name, "Example");
        assert_eq!(example.attributes, 1);
        assert_eq!(example.methods, 2);
        // struct body 3 lines + two 3-line method bodies
        assert_eq!(example.lines, 3 + 3 + 3);

        let residual = result.get(&id("")).expect("residual record");
        assert_eq!(residual.methods, 2);
        assert_eq!(residual.attributes, 0);
        assert_eq!(residual.lines, 5 + 5);
    }

    #[test]
    fn test_receiver_forms() {
        let content = r#"package shapes

type Box[T any] struct {
	Item T
}

func (b Box[T]) Get() T { return b.Item }

func (b *Box[T]) Set(item T) { b.Item = item }

func (p *(Point)) Move() {}

type Point struct{ X, Y int }

func (Point) Origin() bool { return true }
"#;
        let unit = lower(content);
        let receivers: Vec<Receiver> = unit
            .declarations
            .iter()
            .filter_map(|d| match d {
                Declaration::Function(f) => f.receiver.clone(),
                _ => None,
            })
            .collect();

        assert_eq!(receivers[0], Receiver::Named("Box".to_string()));
        assert_eq!(
            receivers[1],
            Receiver::Indirect(Box::new(Receiver::Named("Box".to_string())))
        );
        assert_eq!(receivers[2].type_name(), "Point");
        assert_eq!(receivers[3], Receiver::Named("Point".to_string()));

        let result = codecity_core::aggregate(&unit.declarations, &unit.context, &unit.lines);
        let point = result
            .get(&ObjectId::new("example/example.go", "shapes", "Point"))
            .unwrap();
        assert_eq!(point.methods, 2);
        assert_eq!(point.attributes, 1, "`X, Y int` is one field entry");
        assert_eq!(point.lines, 1 + 1 + 1);
    }

    #[test]
    fn test_grouped_values_count_per_spec() {
        let content = r#"package config

var (
	host, port = "localhost", 8080
	debug      bool
)

const Version = "1.0"

var single = 1

func main() {
	var local = 2
	_ = local
}
"#;
        let result = aggregate_source(content);
        let residual = result
            .get(&ObjectId::new("example/example.go", "config", ""))
            .unwrap();
        assert_eq!(residual.attributes, 4, "two grouped specs, one const, one var");
        assert_eq!(residual.methods, 1);
        assert_eq!(residual.lines, 4);
    }

    #[test]
    fn test_grouped_types() {
        let content = r#"package model

type (
	User struct {
		ID   string
		Name string
	}

	Role string

	Team struct{}
)
"#;
        let result = aggregate_source(content);
        let user = result
            .get(&ObjectId::new("example/example.go", "model", "User"))
            .unwrap();
        assert_eq!(user.attributes, 2);
        assert_eq!(user.lines, 4);

        let team = result
            .get(&ObjectId::new("example/example.go", "model", "Team"))
            .unwrap();
        assert_eq!(team.attributes, 0);
        assert_eq!(team.lines, 1);

        assert!(result
            .get(&ObjectId::new("example/example.go", "model", "Role"))
            .is_none());
    }

    #[test]
    fn test_struct_alias_is_a_record() {
        let content = r#"package model

type Point = struct {
	X, Y int
	Label string
}

type ID = string
"#;
        let result = aggregate_source(content);
        let point = result
            .get(&ObjectId::new("example/example.go", "model", "Point"))
            .unwrap();
        assert_eq!(point.attributes, 2);
        assert_eq!(point.lines, 4);
        assert!(result
            .get(&ObjectId::new("example/example.go", "model", "ID"))
            .is_none());
    }

    #[test]
    fn test_embedded_fields_count() {
        let content = r#"package store

type Store struct {
	sync.Mutex
	*Cache
	items map[string]int
}
"#;
        let result = aggregate_source(content);
        let store = result
            .get(&ObjectId::new("example/example.go", "store", "Store"))
            .unwrap();
        assert_eq!(store.attributes, 3);
    }

    #[test]
    fn test_bodyless_function() {
        let content = r#"package asm

func add(a, b int) int

func (v *Vec) Len() int
"#;
        let unit = lower(content);
        for decl in &unit.declarations {
            if let Declaration::Function(f) = decl {
                assert!(f.body.is_none(), "{} has no body", f.name);
            }
        }
        let result = codecity_core::aggregate(&unit.declarations, &unit.context, &unit.lines);
        let vec = result
            .get(&ObjectId::new("example/example.go", "asm", "Vec"))
            .unwrap();
        assert_eq!((vec.methods, vec.lines), (1, 0));
    }

    #[test]
    fn test_syntax_error_is_reported() {
        let analyzer = GoAnalyzer::new().unwrap();
        let content = "package broken\n\nfunc f( {\n";
        let err = analyzer
            .parse_file(&PathBuf::from("broken.go"), content)
            .err()
            .expect("parse should fail");
        assert!(matches!(
            err.downcast_ref::<SourceError>(),
            Some(SourceError::Syntax { .. })
        ));
    }

    #[test]
    fn test_missing_package_clause() {
        let analyzer = GoAnalyzer::new().unwrap();
        let parsed = analyzer
            .parse_file(&PathBuf::from("nopkg.go"), "func f() {}\n")
            .unwrap();
        let err = analyzer.compilation_unit(&parsed, "nopkg.go").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SourceError>(),
            Some(SourceError::MissingPackage { .. })
        ));
    }
}
