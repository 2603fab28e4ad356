use std::collections::btree_map::{self, BTreeMap};

use serde::Serialize;

use crate::lines::{line_span, LineResolver};
use crate::types::{
    CompilationUnit, Declaration, FunctionDeclaration, MetricsRecord, ObjectId, TypeDeclaration,
    TypeShape, UnitContext,
};

/// Immutable result of an aggregation pass: one record per object identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Aggregate {
    records: BTreeMap<ObjectId, MetricsRecord>,
}

impl Aggregate {
    pub fn get(&self, id: &ObjectId) -> Option<&MetricsRecord> {
        self.records.get(id)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, ObjectId, MetricsRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_inner(self) -> BTreeMap<ObjectId, MetricsRecord> {
        self.records
    }

    /// Combine with a result computed independently, as if `other`'s
    /// declarations had been visited after `self`'s.
    ///
    /// Lines and methods add. A record-shape declaration in `other` overwrites
    /// the attribute count; otherwise attribute counts add.
    pub fn merge(mut self, other: Aggregate) -> Aggregate {
        for (id, incoming) in other.records {
            match self.records.entry(id) {
                btree_map::Entry::Vacant(slot) => {
                    slot.insert(incoming);
                }
                btree_map::Entry::Occupied(mut slot) => {
                    let current = slot.get_mut();
                    current.lines += incoming.lines;
                    current.methods += incoming.methods;
                    if incoming.fields_declared {
                        current.attributes = incoming.attributes;
                        current.fields_declared = true;
                    } else {
                        current.attributes += incoming.attributes;
                    }
                    if !incoming.name.is_empty() {
                        current.name = incoming.name;
                    }
                }
            }
        }
        self
    }
}

impl<'a> IntoIterator for &'a Aggregate {
    type Item = (&'a ObjectId, &'a MetricsRecord);
    type IntoIter = btree_map::Iter<'a, ObjectId, MetricsRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Aggregate the declarations of a single compilation unit.
pub fn aggregate<'a, I, R>(declarations: I, context: &UnitContext, resolver: &R) -> Aggregate
where
    I: IntoIterator<Item = &'a Declaration>,
    R: LineResolver + ?Sized,
{
    let mut builder = Builder::default();
    builder.visit_all(declarations, context, resolver);
    builder.finish()
}

/// Aggregate several compilation units in sequence through one builder.
pub fn aggregate_units<'a, I>(units: I) -> Aggregate
where
    I: IntoIterator<Item = &'a CompilationUnit>,
{
    let mut builder = Builder::default();
    for unit in units {
        builder.visit_all(&unit.declarations, &unit.context, &unit.lines);
    }
    builder.finish()
}

#[derive(Default)]
struct Builder {
    records: BTreeMap<ObjectId, MetricsRecord>,
}

impl Builder {
    fn visit_all<'a, I, R>(&mut self, declarations: I, context: &UnitContext, resolver: &R)
    where
        I: IntoIterator<Item = &'a Declaration>,
        R: LineResolver + ?Sized,
    {
        for declaration in declarations {
            self.visit(declaration, context, resolver);
        }
    }

    fn visit<R: LineResolver + ?Sized>(
        &mut self,
        declaration: &Declaration,
        context: &UnitContext,
        resolver: &R,
    ) {
        match declaration {
            Declaration::Type(decl) => self.visit_type(decl, context, resolver),
            Declaration::Value(_) => {
                self.record(context.object_id(""), "").attributes += 1;
            }
            Declaration::Function(decl) => self.visit_function(decl, context, resolver),
        }
    }

    fn visit_type<R: LineResolver + ?Sized>(
        &mut self,
        decl: &TypeDeclaration,
        context: &UnitContext,
        resolver: &R,
    ) {
        let TypeShape::Record { fields, body } = decl.shape else {
            return;
        };
        let record = self.record(context.object_id(&decl.name), &decl.name);
        record.name.clone_from(&decl.name);
        record.attributes = fields;
        record.fields_declared = true;
        record.lines += line_span(resolver, body);
    }

    fn visit_function<R: LineResolver + ?Sized>(
        &mut self,
        decl: &FunctionDeclaration,
        context: &UnitContext,
        resolver: &R,
    ) {
        let owner = decl.receiver.as_ref().map_or("", |r| r.type_name());
        let record = self.record(context.object_id(owner), owner);
        record.methods += 1;
        if let Some(body) = decl.body {
            record.lines += line_span(resolver, body);
        }
    }

    /// Record for `id`, created with `name` on first reference.
    fn record(&mut self, id: ObjectId, name: &str) -> &mut MetricsRecord {
        self.records
            .entry(id)
            .or_insert_with(|| MetricsRecord::named(name))
    }

    fn finish(self) -> Aggregate {
        Aggregate {
            records: self.records,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lines::LineTable;
    use crate::types::{Receiver, Span, ValueDeclaration};

    /// Resolver where byte offset N sits on line N.
    struct OffsetIsLine;

    impl LineResolver for OffsetIsLine {
        fn line(&self, pos: usize) -> usize {
            pos
        }
    }

    fn ctx(path: &str) -> UnitContext {
        UnitContext::new(path, "example")
    }

    fn record_type(name: &str, fields: usize, start: usize, end: usize) -> Declaration {
        Declaration::Type(TypeDeclaration {
            name: name.to_string(),
            shape: TypeShape::Record {
                fields,
                body: Span::new(start, end),
            },
        })
    }

    fn method(receiver: Receiver, body: Option<(usize, usize)>) -> Declaration {
        Declaration::Function(FunctionDeclaration {
            name: "Do".to_string(),
            receiver: Some(receiver),
            body: body.map(|(s, e)| Span::new(s, e)),
        })
    }

    fn free_function(body: Option<(usize, usize)>) -> Declaration {
        Declaration::Function(FunctionDeclaration {
            name: "helper".to_string(),
            receiver: None,
            body: body.map(|(s, e)| Span::new(s, e)),
        })
    }

    fn value() -> Declaration {
        Declaration::Value(ValueDeclaration {
            span: Span::new(1, 1),
        })
    }

    fn pointer_to(name: &str) -> Receiver {
        Receiver::Indirect(Box::new(Receiver::Named(name.to_string())))
    }

    #[test]
    fn test_struct_sets_fields_and_lines() {
        let decls = vec![record_type("User", 3, 4, 8)];
        let result = aggregate(&decls, &ctx("user.go"), &OffsetIsLine);

        let user = result
            .get(&ObjectId::new("user.go", "example", "User"))
            .expect("User record");
        assert_eq!(user.name, "User");
        assert_eq!(user.attributes, 3);
        assert_eq!(user.lines, 5);
        assert_eq!(user.methods, 0);
        assert!(user.has_declaration());
    }

    #[test]
    fn test_body_line_spans() {
        let decls = vec![free_function(Some((10, 10))), free_function(Some((10, 15)))];
        let result = aggregate(&decls, &ctx("f.go"), &OffsetIsLine);
        let bucket = result.get(&ObjectId::new("f.go", "example", "")).unwrap();
        assert_eq!(bucket.lines, 1 + 6);
    }

    #[test]
    fn test_free_function_and_value_collapse() {
        let decls = vec![free_function(Some((3, 5))), value()];
        let result = aggregate(&decls, &ctx("main.go"), &OffsetIsLine);

        assert_eq!(result.len(), 1, "one merged residual record");
        let bucket = result.get(&ObjectId::new("main.go", "example", "")).unwrap();
        assert_eq!(bucket.name, "");
        assert_eq!(bucket.methods, 1);
        assert_eq!(bucket.attributes, 1);
        assert_eq!(bucket.lines, 3);
    }

    #[test]
    fn test_value_does_not_touch_lines_or_methods() {
        let decls = vec![value(), value(), value()];
        let result = aggregate(&decls, &ctx("vars.go"), &OffsetIsLine);
        let bucket = result.get(&ObjectId::new("vars.go", "example", "")).unwrap();
        assert_eq!(bucket.attributes, 3);
        assert_eq!(bucket.lines, 0);
        assert_eq!(bucket.methods, 0);
    }

    #[test]
    fn test_methods_bind_to_receiver_through_pointer() {
        let decls = vec![
            record_type("Example", 1, 1, 3),
            method(pointer_to("Example"), Some((5, 7))),
            method(Receiver::Named("Example".to_string()), Some((9, 9))),
        ];
        let result = aggregate(&decls, &ctx("example.go"), &OffsetIsLine);

        let example = result
            .get(&ObjectId::new("example.go", "example", "Example"))
            .unwrap();
        assert_eq!(example.methods, 2);
        assert_eq!(example.lines, 3 + 3 + 1);
        assert_eq!(example.attributes, 1);
    }

    #[test]
    fn test_bodyless_method_counts_without_lines() {
        let decls = vec![method(Receiver::Named("Ext".to_string()), None)];
        let result = aggregate(&decls, &ctx("asm.go"), &OffsetIsLine);
        let ext = result.get(&ObjectId::new("asm.go", "example", "Ext")).unwrap();
        assert_eq!(ext.methods, 1);
        assert_eq!(ext.lines, 0);
        assert_eq!(ext.name, "Ext");
        assert!(!ext.has_declaration());
    }

    #[test]
    fn test_unresolved_receiver_falls_into_residual_bucket() {
        let decls = vec![
            method(Receiver::Unresolved, Some((1, 2))),
            method(Receiver::Indirect(Box::new(Receiver::Unresolved)), None),
        ];
        let result = aggregate(&decls, &ctx("odd.go"), &OffsetIsLine);
        assert_eq!(result.len(), 1);
        let bucket = result.get(&ObjectId::new("odd.go", "example", "")).unwrap();
        assert_eq!(bucket.methods, 2);
        assert_eq!(bucket.lines, 2);
    }

    #[test]
    fn test_non_record_type_is_ignored() {
        let decls = vec![Declaration::Type(TypeDeclaration {
            name: "AliasExample".to_string(),
            shape: TypeShape::Other,
        })];
        let result = aggregate(&decls, &ctx("alias.go"), &OffsetIsLine);
        assert!(result.is_empty());
    }

    #[test]
    fn test_cross_file_method_produces_two_records() {
        let type_unit = vec![record_type("T", 2, 1, 4)];
        let method_unit = vec![method(pointer_to("T"), Some((1, 3)))];

        let merged = aggregate(&type_unit, &ctx("a.go"), &OffsetIsLine).merge(aggregate(
            &method_unit,
            &ctx("b.go"),
            &OffsetIsLine,
        ));

        assert_eq!(merged.len(), 2);
        let in_a = merged.get(&ObjectId::new("a.go", "example", "T")).unwrap();
        let in_b = merged.get(&ObjectId::new("b.go", "example", "T")).unwrap();
        assert_eq!((in_a.attributes, in_a.methods), (2, 0));
        assert_eq!((in_b.attributes, in_b.methods), (0, 1));
    }

    #[test]
    fn test_replay_overwrites_fields_but_adds_methods() {
        let decls = vec![
            record_type("T", 4, 1, 6),
            record_type("T", 4, 1, 6),
            method(pointer_to("T"), Some((8, 9))),
            method(pointer_to("T"), Some((8, 9))),
        ];
        let result = aggregate(&decls, &ctx("t.go"), &OffsetIsLine);
        let t = result.get(&ObjectId::new("t.go", "example", "T")).unwrap();
        assert_eq!(t.attributes, 4, "field count is overwritten, not doubled");
        assert_eq!(t.methods, 2, "method count is additive");
    }

    #[test]
    fn test_aggregation_is_deterministic() {
        let decls = vec![
            value(),
            record_type("B", 2, 3, 5),
            record_type("A", 1, 6, 8),
            method(pointer_to("A"), Some((9, 12))),
            free_function(None),
        ];
        let first = aggregate(&decls, &ctx("d.go"), &OffsetIsLine);
        let second = aggregate(&decls, &ctx("d.go"), &OffsetIsLine);
        assert_eq!(first, second);
    }

    #[test]
    fn test_merge_matches_sequential_aggregation() {
        let first = vec![record_type("T", 2, 1, 3), value()];
        let second = vec![record_type("T", 5, 10, 16), method(pointer_to("T"), None), value()];
        let context = ctx("same.go");

        let mut sequential = first.clone();
        sequential.extend(second.iter().cloned());
        let expected = aggregate(&sequential, &context, &OffsetIsLine);

        let merged = aggregate(&first, &context, &OffsetIsLine).merge(aggregate(
            &second,
            &context,
            &OffsetIsLine,
        ));

        assert_eq!(merged, expected);
        let t = merged.get(&context.object_id("T")).unwrap();
        assert_eq!(t.attributes, 5);
        assert_eq!(t.lines, 3 + 7);
        assert_eq!(merged.get(&context.object_id("")).unwrap().attributes, 2);
    }

    #[test]
    fn test_aggregate_units_with_line_table() {
        let source = "type T struct {\n\tA int\n\tB int\n}\n";
        let unit = CompilationUnit {
            context: ctx("t.go"),
            declarations: vec![Declaration::Type(TypeDeclaration {
                name: "T".to_string(),
                shape: TypeShape::Record {
                    fields: 2,
                    body: Span::new(7, source.rfind('}').unwrap() + 1),
                },
            })],
            lines: LineTable::new(source),
        };
        let result = aggregate_units([&unit]);
        let t = result.get(&ObjectId::new("t.go", "example", "T")).unwrap();
        assert_eq!(t.lines, 4);
        assert_eq!(t.attributes, 2);
    }
}
