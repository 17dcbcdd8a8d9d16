//! Sparse vector primitives.
//!
//! This module holds the data model shared by ingestion, clustering and
//! query execution: byte quantization, the compact [`SparseVector`], posting
//! entries ([`DocWeight`]) and the [`DocumentCluster`] groups they are
//! partitioned into.
//!
//! # Representation
//! Weights are single unsigned bytes produced by clamping a float to
//! `[0, ceiling]`. A dot product of two quantized vectors is rescaled by
//! `ceiling_ingest * ceiling_search / 255^2` to approximate the float score.

mod cluster;
mod doc_weight;
mod field_info;
mod quantization;
mod sparse;
mod types;

pub use cluster::{ClusterCursor, DocWeightIterator, DocumentCluster};
pub use doc_weight::DocWeight;
pub use field_info::{
    DEFAULT_QUANTIZATION_CEILING_INGEST, DEFAULT_QUANTIZATION_CEILING_SEARCH,
    QUANTIZATION_CEILING_INGEST_FIELD, QUANTIZATION_CEILING_SEARCH_FIELD, QuantizationCeilings,
};
pub use quantization::{
    ByteQuantizer, MAX_UNSIGNED_BYTE, compare_unsigned_byte, dequantize_byte_to_float,
    get_unsigned_byte, multiply_unsigned_byte, quantize_float_to_byte, rescale_ratio,
};
pub use sparse::{
    BlobLayout, Item, SparseVector, SparseVectorIter, encode_int_keyed_blob,
    encode_string_keyed_blob, parse_token_map,
};
pub use types::{DocId, TOKEN_SPACE, TokenId, VectorError, VectorResult};
