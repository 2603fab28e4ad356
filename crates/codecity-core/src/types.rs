use serde::{Deserialize, Serialize};
use std::fmt;

use crate::lines::LineTable;

/// Identity of a metrics bucket: (compilation-unit path, package, object name).
///
/// The name is empty for the residual bucket that collects a file's free
/// functions and package-scoped values. Ordering is path, then package, then
/// name.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId {
    pub path: String,
    pub package: String,
    pub name: String,
}

impl ObjectId {
    pub fn new(path: &str, package: &str, name: &str) -> Self {
        Self {
            path: path.to_string(),
            package: package.to_string(),
            name: name.to_string(),
        }
    }

    /// True for the per-file bucket of free functions and values.
    pub fn is_residual(&self) -> bool {
        self.name.is_empty()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "{} ({})", self.path, self.package)
        } else {
            write!(f, "{} ({}).{}", self.path, self.package, self.name)
        }
    }
}

/// Byte range of a syntax node; `end` is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// The type a method is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Receiver {
    Named(String),
    /// Pointer or reference to another receiver form.
    Indirect(Box<Receiver>),
    /// The receiver type could not be determined.
    Unresolved,
}

impl Receiver {
    /// Receiver type name with indirections peeled, or `""` when unresolved.
    pub fn type_name(&self) -> &str {
        match self {
            Receiver::Named(name) => name,
            Receiver::Indirect(inner) => inner.type_name(),
            Receiver::Unresolved => "",
        }
    }
}

/// Underlying shape of a type declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeShape {
    /// Record type with `fields` entries in its field list and the span of its body.
    Record { fields: usize, body: Span },
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDeclaration {
    pub name: String,
    pub shape: TypeShape,
}

/// One package-scoped value spec. A spec declaring several names is still one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueDeclaration {
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub receiver: Option<Receiver>,
    pub body: Option<Span>,
}

/// A top-level declaration node of a compilation unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Declaration {
    Type(TypeDeclaration),
    Value(ValueDeclaration),
    Function(FunctionDeclaration),
}

/// Path and package a declaration stream belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitContext {
    pub path: String,
    pub package: String,
}

impl UnitContext {
    pub fn new(path: &str, package: &str) -> Self {
        Self {
            path: path.to_string(),
            package: package.to_string(),
        }
    }

    pub fn object_id(&self, name: &str) -> ObjectId {
        ObjectId::new(&self.path, &self.package, name)
    }
}

/// One parsed source file lowered into declarations, with its line table.
#[derive(Debug, Clone)]
pub struct CompilationUnit {
    pub context: UnitContext,
    pub declarations: Vec<Declaration>,
    pub lines: LineTable,
}

/// Per-identity metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub name: String,
    pub lines: usize,
    pub methods: usize,
    pub attributes: usize,
    /// Set once a record-shaped type declaration has overwritten `attributes`.
    #[serde(skip)]
    pub(crate) fields_declared: bool,
}

impl MetricsRecord {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// True when a struct declaration (not only methods) was seen for this identity.
    pub fn has_declaration(&self) -> bool {
        self.fields_declared
    }
}
