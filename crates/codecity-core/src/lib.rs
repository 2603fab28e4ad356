pub mod aggregate;
pub mod analyzer;
pub mod cache;
pub mod config;
pub mod error;
pub mod lines;
pub mod pipeline;
pub mod service;
pub mod storage;
pub mod types;

pub use aggregate::{aggregate, aggregate_units, Aggregate};
pub use analyzer::{LanguageAnalyzer, ParsedFile};
pub use cache::{CacheError, ResultCache};
pub use config::Config;
pub use error::SourceError;
pub use lines::{line_span, LineResolver, LineTable};
pub use pipeline::{Analysis, AnalysisPipeline};
pub use service::{AnalysisService, ProjectLocator};
pub use storage::{FileStorage, Storage};
pub use types::*;
