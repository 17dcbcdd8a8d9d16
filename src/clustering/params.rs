//! Seismic method parameters and their validation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{ClusteringError, ClusteringResult};

pub const N_POSTINGS_FIELD: &str = "n_postings";
pub const CLUSTER_RATIO_FIELD: &str = "cluster_ratio";
pub const SUMMARY_PRUNE_RATIO_FIELD: &str = "summary_prune_ratio";
pub const APPROXIMATE_THRESHOLD_FIELD: &str = "approximate_threshold";

pub const DEFAULT_CLUSTER_RATIO: f32 = 0.1;
pub const DEFAULT_SUMMARY_PRUNE_RATIO: f32 = 0.4;
pub const DEFAULT_APPROXIMATE_THRESHOLD: usize = 0;

/// Fraction of the document count kept per posting list when `n_postings` is automatic.
pub const POSTING_PRUNE_RATIO: f32 = 0.0005;

/// Lower bound on the automatic `n_postings`.
pub const POSTING_MINIMUM_LENGTH: usize = 160;

/// Parameters of the clustered-posting method.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeismicParams {
    /// Per-term posting cap. `None` derives it from the document count.
    pub n_postings: Option<usize>,
    pub cluster_ratio: f32,
    pub summary_prune_ratio: f32,
    /// Builds over fewer documents skip clustering.
    pub approximate_threshold: usize,
}

impl Default for SeismicParams {
    fn default() -> Self {
        Self {
            n_postings: None,
            cluster_ratio: DEFAULT_CLUSTER_RATIO,
            summary_prune_ratio: DEFAULT_SUMMARY_PRUNE_RATIO,
            approximate_threshold: DEFAULT_APPROXIMATE_THRESHOLD,
        }
    }
}

impl SeismicParams {
    /// Parses and validates a string parameter map.
    ///
    /// Every problem is reported at once, including unknown names.
    pub fn from_map(parameters: &HashMap<String, String>) -> ClusteringResult<Self> {
        let mut params = Self::default();
        let mut errors = Vec::new();

        for (name, raw) in parameters {
            let raw = raw.trim();
            match name.as_str() {
                N_POSTINGS_FIELD => match raw.parse::<i64>() {
                    Ok(value) if value > 0 => params.n_postings = Some(value as usize),
                    Ok(_) => errors.push(format!("Parameter [{N_POSTINGS_FIELD}] must be a positive integer")),
                    Err(_) => errors.push(format!("Parameter [{N_POSTINGS_FIELD}] must be an integer")),
                },
                CLUSTER_RATIO_FIELD => match raw.parse::<f32>() {
                    Ok(value) => params.cluster_ratio = value,
                    Err(_) => errors.push(format!("Parameter [{CLUSTER_RATIO_FIELD}] must be a float")),
                },
                SUMMARY_PRUNE_RATIO_FIELD => match raw.parse::<f32>() {
                    Ok(value) => params.summary_prune_ratio = value,
                    Err(_) => errors.push(format!("Parameter [{SUMMARY_PRUNE_RATIO_FIELD}] must be a float")),
                },
                APPROXIMATE_THRESHOLD_FIELD => match raw.parse::<i64>() {
                    Ok(value) if value >= 0 => params.approximate_threshold = value as usize,
                    Ok(_) => errors.push(format!(
                        "Parameter [{APPROXIMATE_THRESHOLD_FIELD}] must be a non-negative integer"
                    )),
                    Err(_) => errors.push(format!("Parameter [{APPROXIMATE_THRESHOLD_FIELD}] must be an integer")),
                },
                unknown => errors.push(format!("Unknown parameter '{unknown}' found")),
            }
        }

        errors.extend(params.violations());
        if errors.is_empty() {
            Ok(params)
        } else {
            errors.sort();
            errors.dedup();
            Err(ClusteringError::InvalidParameters(errors))
        }
    }

    /// Checks every range constraint.
    pub fn validate(&self) -> ClusteringResult<()> {
        let errors = self.violations();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ClusteringError::InvalidParameters(errors))
        }
    }

    /// Posting cap for an index holding `doc_count` documents.
    #[must_use]
    pub fn resolve_n_postings(&self, doc_count: usize) -> usize {
        self.n_postings.unwrap_or_else(|| {
            ((POSTING_PRUNE_RATIO * doc_count as f32) as usize).max(POSTING_MINIMUM_LENGTH)
        })
    }

    /// String form, readable back by [`SeismicParams::from_map`].
    #[must_use]
    pub fn to_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        if let Some(n_postings) = self.n_postings {
            map.insert(N_POSTINGS_FIELD.to_string(), n_postings.to_string());
        }
        map.insert(CLUSTER_RATIO_FIELD.to_string(), self.cluster_ratio.to_string());
        map.insert(
            SUMMARY_PRUNE_RATIO_FIELD.to_string(),
            self.summary_prune_ratio.to_string(),
        );
        map.insert(
            APPROXIMATE_THRESHOLD_FIELD.to_string(),
            self.approximate_threshold.to_string(),
        );
        map
    }

    fn violations(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.n_postings == Some(0) {
            errors.push(format!("Parameter [{N_POSTINGS_FIELD}] must be a positive integer"));
        }
        if !(self.cluster_ratio > 0.0 && self.cluster_ratio < 1.0) {
            errors.push(format!("Parameter [{CLUSTER_RATIO_FIELD}] must be in (0, 1)"));
        }
        if !(self.summary_prune_ratio > 0.0 && self.summary_prune_ratio <= 1.0) {
            errors.push(format!("Parameter [{SUMMARY_PRUNE_RATIO_FIELD}] must be in (0, 1]"));
        }
        errors
    }
}
