use std::path::{Path, PathBuf};

use anyhow::Result;
use tree_sitter::Tree;

use crate::types::CompilationUnit;

/// A parsed source file with its tree-sitter AST and original content.
pub struct ParsedFile {
    pub path: PathBuf,
    pub tree: Tree,
    pub content: String,
}

/// Trait that each language frontend must implement.
pub trait LanguageAnalyzer: Send + Sync {
    /// Language name (e.g., "go")
    fn language(&self) -> &'static str;

    /// File extensions this analyzer handles (e.g., &["go"])
    fn file_extensions(&self) -> &[&str];

    /// Parse a source file into a ParsedFile.
    fn parse_file(&self, path: &Path, content: &str) -> Result<ParsedFile>;

    /// Lower the top-level declarations of a parsed file into a compilation unit.
    /// `unit_path` is the stable path used for object identities.
    fn compilation_unit(&self, parsed: &ParsedFile, unit_path: &str) -> Result<CompilationUnit>;
}
