//! Sample test cases for a problem

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A fixed (input, expected output) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub input: String,
    pub output: String,
}

/// Accepted sample file layouts
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SampleDocument {
    List(Vec<Sample>),
    /// `{"tests": [...]}` as sent by the Competitive Companion extension
    Companion { tests: Vec<Sample> },
}

/// Parse samples from JSON, preserving their order
pub fn parse_samples(json: &str) -> Result<Vec<Sample>> {
    let document: SampleDocument =
        serde_json::from_str(json).context("Failed to parse sample file")?;

    Ok(match document {
        SampleDocument::Companion { tests } => tests,
        SampleDocument::List(samples) => samples,
    })
}

/// Load samples from a JSON file
pub async fn load_samples(path: impl AsRef<Path>) -> Result<Vec<Sample>> {
    let path = path.as_ref();
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read sample file {}", path.display()))?;

    parse_samples(&contents)
}
