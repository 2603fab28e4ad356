use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::aggregate::{aggregate, Aggregate};
use crate::analyzer::LanguageAnalyzer;
use crate::config::Config;
use crate::error::SourceError;
use crate::storage::compute_hash;

/// Output of a full project analysis.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub aggregate: Aggregate,
    pub files_analyzed: usize,
    /// Digest of every analyzed file's path and content.
    pub fingerprint: String,
}

/// Reusable analysis pipeline: walk, parse, lower and aggregate a project.
pub struct AnalysisPipeline {
    analyzers: Vec<Box<dyn LanguageAnalyzer>>,
    excludes: GlobSet,
}

struct FileResult {
    unit_path: String,
    hash: String,
    aggregate: Aggregate,
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .with_context(|| format!("invalid exclude pattern '{pattern}'"))?;
        builder.add(glob);
    }
    builder.build().context("failed to compile exclude patterns")
}

/// Project-relative, `/`-separated path used as the compilation-unit path.
fn unit_path(project_root: &Path, file_path: &Path) -> String {
    file_path
        .strip_prefix(project_root)
        .unwrap_or(file_path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn read_source(file_path: &Path) -> Result<String> {
    let content = std::fs::read_to_string(file_path).map_err(|source| SourceError::Read {
        path: file_path.to_path_buf(),
        source,
    })?;
    Ok(content)
}

fn fingerprint_of(digests: &[(String, String)]) -> String {
    let mut hasher = Sha256::new();
    for (path, hash) in digests {
        hasher.update(path.as_bytes());
        hasher.update([0u8]);
        hasher.update(hash.as_bytes());
        hasher.update([b'\n']);
    }
    format!("{:x}", hasher.finalize())
}

impl AnalysisPipeline {
    pub fn new(analyzers: Vec<Box<dyn LanguageAnalyzer>>, config: &Config) -> Result<Self> {
        let excludes = build_globset(&config.project.exclude_patterns)?;
        Ok(Self {
            analyzers,
            excludes,
        })
    }

    /// Run a full analysis on the given project path.
    ///
    /// Any unreadable directory or file, and any unparseable file, fails the
    /// whole analysis.
    pub fn analyze(&self, project_path: &Path) -> Result<Analysis> {
        if !project_path.exists() {
            return Err(SourceError::NotFound(project_path.to_path_buf()).into());
        }

        let mut result = Aggregate::default();
        let mut digests = Vec::new();

        for analyzer in &self.analyzers {
            let source_files = self.source_files(project_path, analyzer.file_extensions())?;
            if source_files.is_empty() {
                continue;
            }

            let per_file: Vec<FileResult> = source_files
                .par_iter()
                .map(|file_path| self.analyze_file(analyzer.as_ref(), project_path, file_path))
                .collect::<Result<_>>()?;

            for file in per_file {
                digests.push((file.unit_path, file.hash));
                result = result.merge(file.aggregate);
            }
        }

        tracing::info!(
            project = %project_path.display(),
            files = digests.len(),
            objects = result.len(),
            "analysis complete"
        );

        Ok(Analysis {
            aggregate: result,
            files_analyzed: digests.len(),
            fingerprint: fingerprint_of(&digests),
        })
    }

    /// Digest of the files `analyze` would read, without parsing them.
    pub fn fingerprint(&self, project_path: &Path) -> Result<String> {
        if !project_path.exists() {
            return Err(SourceError::NotFound(project_path.to_path_buf()).into());
        }

        let mut digests = Vec::new();
        for analyzer in &self.analyzers {
            for file_path in self.source_files(project_path, analyzer.file_extensions())? {
                let content = read_source(&file_path)?;
                digests.push((unit_path(project_path, &file_path), compute_hash(&content)));
            }
        }
        Ok(fingerprint_of(&digests))
    }

    fn analyze_file(
        &self,
        analyzer: &dyn LanguageAnalyzer,
        project_path: &Path,
        file_path: &Path,
    ) -> Result<FileResult> {
        let content = read_source(file_path)?;
        let parsed = analyzer.parse_file(file_path, &content)?;
        let unit = analyzer.compilation_unit(&parsed, &unit_path(project_path, file_path))?;

        tracing::debug!(
            path = %unit.context.path,
            package = %unit.context.package,
            declarations = unit.declarations.len(),
            "aggregating compilation unit"
        );

        Ok(FileResult {
            aggregate: aggregate(&unit.declarations, &unit.context, &unit.lines),
            hash: compute_hash(&content),
            unit_path: unit.context.path,
        })
    }

    fn is_excluded(&self, project_path: &Path, path: &Path) -> bool {
        self.excludes.is_match(unit_path(project_path, path))
    }

    /// Source files under `project_path` with one of `extensions`, sorted by path.
    ///
    /// A walk error outside the excluded paths fails the listing.
    fn source_files(&self, project_path: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(project_path) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err.path().unwrap_or(project_path).to_path_buf();
                    if path != project_path && self.is_excluded(project_path, &path) {
                        tracing::debug!(path = %path.display(), "skipping excluded entry: {err}");
                        continue;
                    }
                    return Err(SourceError::Walk { path, source: err }.into());
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let has_extension = entry
                .path()
                .extension()
                .is_some_and(|ext| extensions.iter().any(|x| ext == *x));
            if has_extension && !self.is_excluded(project_path, entry.path()) {
                files.push(entry.into_path());
            }
        }
        files.sort();
        Ok(files)
    }
}
