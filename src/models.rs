use std::collections::BTreeMap;

use serde::Serialize;

/// Interpretation of one score vector: the winning label, its probability,
/// and the full per-label distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    pub label: String,
    pub confidence: f32,
    pub scores: BTreeMap<String, f32>,
}

#[derive(Debug, Serialize)]
pub struct ClassifyResponse {
    pub label: String,
    pub confidence: f32,
    pub allow: bool,
    pub scores: BTreeMap<String, f32>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
