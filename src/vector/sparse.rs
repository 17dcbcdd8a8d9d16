//! Compact sparse vector with byte-quantized weights.
//!
//! Tokens and weights live in two parallel arrays sorted by token. Every
//! construction path funnels through [`SparseVector::from_items`], which sorts
//! and merges duplicate tokens by keeping the larger weight.
//!
//! # Blob layouts
//!
//! Serialized vectors are a flat run of big-endian records with no header:
//! - [`BlobLayout::StringKeyed`]: `i32 key_len`, `key_len` UTF-8 bytes, `f32 value`
//! - [`BlobLayout::IntKeyed`]: `i32 key`, `f32 value`

use std::collections::HashMap;

use crate::vector::quantization::{ByteQuantizer, multiply_unsigned_byte};
use crate::vector::types::{TOKEN_SPACE, TokenId, VectorError, VectorResult};

/// A single `(token, weight)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Item {
    pub token: TokenId,
    pub weight: u8,
}

impl Item {
    #[must_use]
    pub const fn new(token: TokenId, weight: u8) -> Self {
        Self { token, weight }
    }
}

/// Record layout of a serialized vector. Not self-describing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobLayout {
    StringKeyed,
    IntKeyed,
}

/// Immutable sparse vector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SparseVector {
    tokens: Vec<TokenId>,
    weights: Vec<u8>,
}

impl SparseVector {
    /// Builds a vector from items in any order.
    ///
    /// Duplicate tokens collapse into one entry holding the maximum weight.
    #[must_use]
    pub fn from_items(items: impl IntoIterator<Item = Item>) -> Self {
        let mut items: Vec<Item> = items.into_iter().collect();
        items.sort_unstable_by_key(|item| item.token);

        let mut tokens: Vec<TokenId> = Vec::with_capacity(items.len());
        let mut weights: Vec<u8> = Vec::with_capacity(items.len());
        for item in items {
            match tokens.last() {
                Some(&last) if last == item.token => {
                    if let Some(weight) = weights.last_mut() {
                        *weight = (*weight).max(item.weight);
                    }
                }
                _ => {
                    tokens.push(item.token);
                    weights.push(item.weight);
                }
            }
        }

        Self { tokens, weights }
    }

    /// Builds a vector from string keys, quantizing each weight.
    ///
    /// Keys are parsed as decimal integers and must already lie in the
    /// 16-bit token space; no reduction is applied.
    pub fn from_string_map<K: AsRef<str>>(
        pairs: impl IntoIterator<Item = (K, f32)>,
        quantizer: &ByteQuantizer,
    ) -> VectorResult<Self> {
        let items = pairs
            .into_iter()
            .map(|(key, value)| {
                parse_token(key.as_ref()).map(|token| Item::new(token, quantizer.quantize(value)))
            })
            .collect::<VectorResult<Vec<_>>>()?;
        Ok(Self::from_items(items))
    }

    /// Builds a vector from unbounded integer keys.
    ///
    /// Keys are reduced modulo the token space, so distinct ids can collide;
    /// colliding entries keep the larger quantized weight.
    #[must_use]
    pub fn from_int_map(pairs: impl IntoIterator<Item = (i64, f32)>, quantizer: &ByteQuantizer) -> Self {
        Self::from_items(
            pairs
                .into_iter()
                .map(|(key, value)| Item::new(reduce_token(key), quantizer.quantize(value))),
        )
    }

    /// Decodes a serialized vector.
    ///
    /// Truncated records, negative key lengths and invalid UTF-8 fail the
    /// whole decode; nothing partial is returned.
    pub fn from_blob(
        bytes: &[u8],
        layout: BlobLayout,
        quantizer: &ByteQuantizer,
    ) -> VectorResult<Self> {
        let mut cursor = BlobCursor { bytes, offset: 0 };
        match layout {
            BlobLayout::StringKeyed => {
                let mut pairs: Vec<(String, f32)> = Vec::new();
                while !cursor.is_done() {
                    let len = cursor.read_i32()?;
                    let len = usize::try_from(len).map_err(|_| VectorError::MalformedBlob {
                        offset: cursor.offset - 4,
                        reason: format!("negative key length {len}"),
                    })?;
                    let start = cursor.offset;
                    let raw = cursor.take(len)?;
                    let key = std::str::from_utf8(raw).map_err(|e| VectorError::MalformedBlob {
                        offset: start,
                        reason: format!("key is not valid UTF-8: {e}"),
                    })?;
                    let value = cursor.read_f32()?;
                    pairs.push((key.to_string(), value));
                }
                Self::from_string_map(pairs, quantizer)
            }
            BlobLayout::IntKeyed => {
                let mut pairs: Vec<(i64, f32)> = Vec::new();
                while !cursor.is_done() {
                    let key = cursor.read_i32()?;
                    let value = cursor.read_f32()?;
                    pairs.push((i64::from(key), value));
                }
                Ok(Self::from_int_map(pairs, quantizer))
            }
        }
    }

    /// Rebuilds a vector from arrays that are already sorted and deduplicated.
    ///
    /// Returns `None` if the arrays differ in length or the tokens are not
    /// strictly ascending.
    #[must_use]
    pub fn from_sorted_parts(tokens: Vec<TokenId>, weights: Vec<u8>) -> Option<Self> {
        if tokens.len() != weights.len() || tokens.windows(2).any(|w| w[0] >= w[1]) {
            return None;
        }
        Some(Self { tokens, weights })
    }

    /// Number of stored pairs.
    #[must_use]
    pub fn size(&self) -> usize {
        self.tokens.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    #[must_use]
    pub fn tokens(&self) -> &[TokenId] {
        &self.tokens
    }

    #[must_use]
    pub fn weights(&self) -> &[u8] {
        &self.weights
    }

    /// Weight stored for `token`, if any.
    #[must_use]
    pub fn weight_of(&self, token: TokenId) -> Option<u8> {
        self.tokens
            .binary_search(&token)
            .ok()
            .map(|idx| self.weights[idx])
    }

    /// Expands into a dense array of length `max(token) + 1`.
    #[must_use]
    pub fn to_dense_vector(&self) -> Vec<u8> {
        let Some(&max_token) = self.tokens.last() else {
            return Vec::new();
        };
        let mut dense = vec![0u8; usize::from(max_token) + 1];
        for (&token, &weight) in self.tokens.iter().zip(&self.weights) {
            dense[usize::from(token)] = weight;
        }
        dense
    }

    /// Unsigned dot product against a dense array.
    ///
    /// Tokens beyond the end of `dense` contribute nothing; since tokens are
    /// ascending the scan stops at the first one out of bounds.
    #[must_use]
    pub fn dot_product(&self, dense: &[u8]) -> u32 {
        let mut score = 0u32;
        for (&token, &weight) in self.tokens.iter().zip(&self.weights) {
            let Some(&other) = dense.get(usize::from(token)) else {
                break;
            };
            score += multiply_unsigned_byte(weight, other);
        }
        score
    }

    /// Keeps the `n` highest-weight entries. Ties prefer the lower token.
    #[must_use]
    pub fn prune_top_n(&self, n: usize) -> Self {
        if n >= self.size() {
            return self.clone();
        }
        let mut items: Vec<Item> = self.iter().collect();
        items.sort_by(|a, b| b.weight.cmp(&a.weight).then(a.token.cmp(&b.token)));
        items.truncate(n);
        Self::from_items(items)
    }

    /// Forward-only iterator over pairs in ascending token order.
    #[must_use]
    pub fn iter(&self) -> SparseVectorIter<'_> {
        SparseVectorIter {
            tokens: self.tokens.iter(),
            weights: self.weights.iter(),
        }
    }

    /// Shallow size plus both backing arrays.
    #[must_use]
    pub fn ram_bytes_used(&self) -> usize {
        std::mem::size_of::<Self>()
            + std::mem::size_of_val(self.tokens.as_slice())
            + std::mem::size_of_val(self.weights.as_slice())
    }
}

impl<'a> IntoIterator for &'a SparseVector {
    type Item = Item;
    type IntoIter = SparseVectorIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator returned by [`SparseVector::iter`].
#[derive(Debug, Clone)]
pub struct SparseVectorIter<'a> {
    tokens: std::slice::Iter<'a, TokenId>,
    weights: std::slice::Iter<'a, u8>,
}

impl Iterator for SparseVectorIter<'_> {
    type Item = Item;

    fn next(&mut self) -> Option<Item> {
        let token = *self.tokens.next()?;
        let weight = *self.weights.next()?;
        Some(Item::new(token, weight))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.tokens.size_hint()
    }
}

impl ExactSizeIterator for SparseVectorIter<'_> {}

/// Serializes string-keyed pairs in [`BlobLayout::StringKeyed`] form.
#[must_use]
pub fn encode_string_keyed_blob<K: AsRef<str>>(pairs: impl IntoIterator<Item = (K, f32)>) -> Vec<u8> {
    let mut out = Vec::new();
    for (key, value) in pairs {
        let key = key.as_ref().as_bytes();
        out.extend_from_slice(&(key.len() as i32).to_be_bytes());
        out.extend_from_slice(key);
        out.extend_from_slice(&value.to_be_bytes());
    }
    out
}

/// Serializes integer-keyed pairs in [`BlobLayout::IntKeyed`] form.
#[must_use]
pub fn encode_int_keyed_blob(pairs: impl IntoIterator<Item = (i32, f32)>) -> Vec<u8> {
    let mut out = Vec::new();
    for (key, value) in pairs {
        out.extend_from_slice(&key.to_be_bytes());
        out.extend_from_slice(&value.to_be_bytes());
    }
    out
}

/// Parses a float map keyed by token strings, as produced by JSON input.
pub fn parse_token_map(
    map: &HashMap<String, f32>,
    quantizer: &ByteQuantizer,
) -> VectorResult<SparseVector> {
    SparseVector::from_string_map(map.iter().map(|(k, v)| (k.as_str(), *v)), quantizer)
}

fn parse_token(key: &str) -> VectorResult<TokenId> {
    let value: i64 = key.parse().map_err(|_| VectorError::InvalidToken {
        key: key.to_string(),
        reason: "not a decimal integer",
    })?;
    TokenId::try_from(value).map_err(|_| VectorError::InvalidToken {
        key: key.to_string(),
        reason: "outside the 16-bit token space",
    })
}

fn reduce_token(key: i64) -> TokenId {
    // rem_euclid keeps negative ids inside the token space
    key.rem_euclid(TOKEN_SPACE) as TokenId
}

struct BlobCursor<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> BlobCursor<'a> {
    fn is_done(&self) -> bool {
        self.offset >= self.bytes.len()
    }

    fn take(&mut self, len: usize) -> VectorResult<&'a [u8]> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| VectorError::MalformedBlob {
                offset: self.offset,
                reason: format!(
                    "needed {len} bytes, {} remain",
                    self.bytes.len() - self.offset
                ),
            })?;
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn read_array(&mut self) -> VectorResult<[u8; 4]> {
        let raw = self.take(4)?;
        Ok([raw[0], raw[1], raw[2], raw[3]])
    }

    fn read_i32(&mut self) -> VectorResult<i32> {
        self.read_array().map(i32::from_be_bytes)
    }

    fn read_f32(&mut self) -> VectorResult<f32> {
        self.read_array().map(f32::from_be_bytes)
    }
}
