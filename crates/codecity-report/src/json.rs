use anyhow::{Context, Result};

use codecity_core::pipeline::Analysis;

use crate::city::CityDocument;

/// Format a city document as JSON.
pub fn format_report(doc: &CityDocument, compact: bool) -> String {
    if compact {
        serde_json::to_string(doc).expect("CityDocument should be serializable")
    } else {
        serde_json::to_string_pretty(doc).expect("CityDocument should be serializable")
    }
}

/// Body stored and cached for a finished analysis. A project without
/// analyzable declarations encodes to an empty body.
pub fn encode_analysis(project: &str, analysis: &Analysis) -> Result<Vec<u8>> {
    if analysis.aggregate.is_empty() {
        return Ok(Vec::new());
    }
    let doc = CityDocument::new(project, &analysis.aggregate);
    serde_json::to_vec(&doc).context("failed to serialize city document")
}

/// Inverse of [`encode_analysis`]; `None` for an empty body.
pub fn decode_body(body: &[u8]) -> Result<Option<CityDocument>> {
    if body.is_empty() {
        return Ok(None);
    }
    let doc = serde_json::from_slice(body).context("failed to parse stored city document")?;
    Ok(Some(doc))
}
