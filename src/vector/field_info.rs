//! Per-field quantization ceilings stored as string attributes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::vector::quantization::{ByteQuantizer, rescale_ratio};
use crate::vector::types::{VectorError, VectorResult};

pub const QUANTIZATION_CEILING_INGEST_FIELD: &str = "quantization_ceiling_ingest";
pub const QUANTIZATION_CEILING_SEARCH_FIELD: &str = "quantization_ceiling_search";

pub const DEFAULT_QUANTIZATION_CEILING_INGEST: f32 = 3.0;
pub const DEFAULT_QUANTIZATION_CEILING_SEARCH: f32 = 16.0;

/// Ingest and search ceilings for one field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuantizationCeilings {
    pub ingest: f32,
    pub search: f32,
}

impl Default for QuantizationCeilings {
    fn default() -> Self {
        Self {
            ingest: DEFAULT_QUANTIZATION_CEILING_INGEST,
            search: DEFAULT_QUANTIZATION_CEILING_SEARCH,
        }
    }
}

impl QuantizationCeilings {
    #[must_use]
    pub const fn new(ingest: f32, search: f32) -> Self {
        Self { ingest, search }
    }

    /// Reads both ceilings from field attributes. Absent keys fall back to defaults.
    pub fn from_attributes(attributes: &HashMap<String, String>) -> VectorResult<Self> {
        Ok(Self {
            ingest: parse_ceiling(
                attributes,
                QUANTIZATION_CEILING_INGEST_FIELD,
                DEFAULT_QUANTIZATION_CEILING_INGEST,
            )?,
            search: parse_ceiling(
                attributes,
                QUANTIZATION_CEILING_SEARCH_FIELD,
                DEFAULT_QUANTIZATION_CEILING_SEARCH,
            )?,
        })
    }

    /// Writes both ceilings into field attributes.
    pub fn to_attributes(&self, attributes: &mut HashMap<String, String>) {
        attributes.insert(
            QUANTIZATION_CEILING_INGEST_FIELD.to_string(),
            self.ingest.to_string(),
        );
        attributes.insert(
            QUANTIZATION_CEILING_SEARCH_FIELD.to_string(),
            self.search.to_string(),
        );
    }

    #[must_use]
    pub fn ingest_quantizer(&self) -> ByteQuantizer {
        ByteQuantizer::new(self.ingest)
    }

    #[must_use]
    pub fn search_quantizer(&self) -> ByteQuantizer {
        ByteQuantizer::new(self.search)
    }

    /// `ingest * search / 255^2`
    #[must_use]
    pub fn rescale_ratio(&self) -> f32 {
        rescale_ratio(self.ingest, self.search)
    }

    /// Converts a quantized dot product into float score space.
    #[must_use]
    pub fn rescale(&self, quantized_score: u32, boost: f32) -> f32 {
        quantized_score as f32 * self.rescale_ratio() * boost
    }
}

fn parse_ceiling(
    attributes: &HashMap<String, String>,
    name: &str,
    default: f32,
) -> VectorResult<f32> {
    match attributes.get(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<f32>()
            .map_err(|_| VectorError::InvalidAttribute {
                name: name.to_string(),
                value: raw.clone(),
            }),
    }
}
