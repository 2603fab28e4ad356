use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use regex::Regex;

use crate::cache::ResultCache;
use crate::error::SourceError;
use crate::pipeline::{Analysis, AnalysisPipeline};
use crate::storage::{spawn_write_behind, Storage};

/// Serializes a finished analysis for a project key.
pub type Encoder = dyn Fn(&str, &Analysis) -> Result<Vec<u8>> + Send + Sync;

const GITHUB_PATTERN: &str =
    r"^(?:https?://)?(?:www\.)?github\.com/([A-Za-z0-9_.-]+)/([A-Za-z0-9_.-]+?)(?:\.git)?(?:/.*)?$";

/// A project reference, normalized for use as a cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectLocator {
    /// `github.com/owner/repo`
    Remote(String),
    Local(PathBuf),
}

impl ProjectLocator {
    pub fn key(&self) -> String {
        match self {
            ProjectLocator::Remote(key) => key.clone(),
            ProjectLocator::Local(path) => path.to_string_lossy().into_owned(),
        }
    }
}

/// Canonicalize a GitHub URL or a local path.
pub fn project_key(locator: &str) -> Result<ProjectLocator> {
    let github = Regex::new(GITHUB_PATTERN).context("failed to compile locator pattern")?;
    let trimmed = locator.trim().trim_end_matches('/');
    if let Some(caps) = github.captures(trimmed) {
        return Ok(ProjectLocator::Remote(format!(
            "github.com/{}/{}",
            &caps[1], &caps[2]
        )));
    }

    let path = Path::new(trimmed);
    let canonical = path
        .canonicalize()
        .map_err(|_| SourceError::NotFound(path.to_path_buf()))?;
    Ok(ProjectLocator::Local(canonical))
}

/// Full-pipeline caller behind the result cache, with optional durable storage.
pub struct AnalysisService {
    pipeline: Arc<AnalysisPipeline>,
    cache: ResultCache<Arc<Vec<u8>>>,
    storage: Option<Arc<dyn Storage>>,
    encode: Arc<Encoder>,
}

impl AnalysisService {
    pub fn new(
        pipeline: AnalysisPipeline,
        cache: ResultCache<Arc<Vec<u8>>>,
        storage: Option<Arc<dyn Storage>>,
        encode: Arc<Encoder>,
    ) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            cache,
            storage,
            encode,
        }
    }

    /// Serialized analysis for `locator`. An empty body means the project had
    /// no analyzable declarations.
    ///
    /// A stored body is reused only while the project's sources are unchanged.
    pub async fn analyze(&self, locator: &str) -> Result<Arc<Vec<u8>>> {
        let project = project_key(locator)?;
        let ProjectLocator::Local(path) = &project else {
            return Err(SourceError::RemoteUnsupported(project.key()).into());
        };
        let key = project.key();

        let pipeline = Arc::clone(&self.pipeline);
        let storage = self.storage.clone();
        let encode = Arc::clone(&self.encode);
        let path = path.clone();
        let flight_key = key.clone();

        let body = self
            .cache
            .get_or_compute(&key, move || async move {
                compute(pipeline, storage, encode, flight_key, path).await
            })
            .await?;
        Ok(body)
    }
}

async fn compute(
    pipeline: Arc<AnalysisPipeline>,
    storage: Option<Arc<dyn Storage>>,
    encode: Arc<Encoder>,
    key: String,
    path: PathBuf,
) -> Result<Arc<Vec<u8>>> {
    if let Some(storage) = &storage {
        let stored = {
            let storage = Arc::clone(storage);
            let pipeline = Arc::clone(&pipeline);
            let key = key.clone();
            let path = path.clone();
            tokio::task::spawn_blocking(move || -> Result<Option<Vec<u8>>> {
                let fingerprint = pipeline.fingerprint(&path)?;
                storage.get(&key, &fingerprint)
            })
            .await
            .context("storage lookup task failed")??
        };
        if let Some(data) = stored.filter(|d| !d.is_empty()) {
            tracing::debug!(key = %key, "using stored analysis result");
            return Ok(Arc::new(data));
        }
    }

    let analysis = tokio::task::spawn_blocking(move || pipeline.analyze(&path))
        .await
        .context("analysis task failed")??;
    let body = Arc::new(encode(&key, &analysis)?);

    if let Some(storage) = storage {
        spawn_write_behind(storage, key, analysis.fingerprint, Arc::clone(&body));
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_github_locators_share_a_key() {
        let expected = ProjectLocator::Remote("github.com/rodrigo-brito/gocity".to_string());
        for locator in [
            "https://github.com/rodrigo-brito/gocity",
            "http://www.github.com/rodrigo-brito/gocity/",
            "github.com/rodrigo-brito/gocity.git",
            "https://github.com/rodrigo-brito/gocity/tree/master/analyzer",
        ] {
            assert_eq!(project_key(locator).unwrap(), expected, "{locator}");
        }
    }

    #[test]
    fn test_local_path_is_canonicalized() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a");
        std::fs::create_dir(&nested).unwrap();
        let dotted = nested.join("..").join("a");

        let key = project_key(dotted.to_str().unwrap()).unwrap();
        assert_eq!(key, ProjectLocator::Local(nested.canonicalize().unwrap()));
    }

    #[test]
    fn test_missing_local_path() {
        let err = project_key("/no/such/project/here").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SourceError>(),
            Some(SourceError::NotFound(_))
        ));
    }
}
