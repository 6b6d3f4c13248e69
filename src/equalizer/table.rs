//! Partition table
//!
//! The ordered assignment of contiguous alphabet ranges ("buckets") to
//! volumes. Invariants: the buckets concatenated in table order
//! reconstruct the alphabet exactly once, the table has one bucket per
//! volume, and table order equals volume discovery order. The table is
//! only ever mutated by a full rebuild (even split or rebalance), never
//! by an incremental single-bucket edit.

use crate::classifier::{alphabet_index, ALPHABET, ALPHABET_LEN};
use crate::error::{Error, Result};

/// Alphabet-range-to-volume assignment. Bucket `i` belongs to volume `i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionTable {
    buckets: Vec<String>,
}

impl PartitionTable {
    /// Build a table from explicit buckets (rebalance output). An empty
    /// bucket is tolerated here; the caller reports it as an anomaly.
    pub fn from_buckets(buckets: Vec<String>) -> Self {
        Self { buckets }
    }

    /// Split the alphabet into `volume_count` contiguous buckets of
    /// equal symbol count, the final bucket absorbing the remainder.
    pub fn split_even(volume_count: usize) -> Self {
        let n = volume_count.max(1);
        let step = (ALPHABET_LEN / n).max(1);

        let mut buckets = Vec::with_capacity(n);
        for i in 0..n {
            let start = (i * step).min(ALPHABET_LEN);
            let end = if i == n - 1 {
                ALPHABET_LEN
            } else {
                ((i + 1) * step).min(ALPHABET_LEN)
            };
            let bucket: String = ALPHABET[start..end].iter().map(|&b| b as char).collect();
            buckets.push(bucket);
        }
        Self { buckets }
    }

    /// Reconstruct a table from its persisted sequence of bucket
    /// starting symbols.
    ///
    /// The sequence is accepted only if it has one symbol per volume,
    /// every symbol is in the alphabet, positions strictly increase,
    /// and it starts at `0` (full coverage). Anything else is a
    /// configuration anomaly for the caller to resolve by even split.
    pub fn from_seq(seq: &str, volume_count: usize) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidDiskSeq {
            seq: seq.to_string(),
            reason: reason.to_string(),
        };

        if seq.len() != volume_count {
            return Err(invalid("length does not match volume count"));
        }

        let mut starts = Vec::with_capacity(seq.len());
        for b in seq.bytes() {
            let idx = alphabet_index(b).ok_or_else(|| invalid("symbol not in alphabet"))?;
            if let Some(&prev) = starts.last() {
                if idx <= prev {
                    return Err(invalid("starting symbols not strictly increasing"));
                }
            }
            starts.push(idx);
        }
        if starts.first() != Some(&0) {
            return Err(invalid("sequence does not start at '0'"));
        }

        let mut buckets = Vec::with_capacity(starts.len());
        for (i, &start) in starts.iter().enumerate() {
            let end = starts.get(i + 1).copied().unwrap_or(ALPHABET_LEN);
            let bucket: String = ALPHABET[start..end].iter().map(|&b| b as char).collect();
            buckets.push(bucket);
        }
        Ok(Self { buckets })
    }

    /// Serialized form: the starting symbol of every non-empty bucket,
    /// in table order. This is the only durable artifact of the system.
    pub fn seq(&self) -> String {
        self.buckets
            .iter()
            .filter_map(|b| b.chars().next())
            .collect()
    }

    /// Index of the bucket containing `symbol`, if any.
    pub fn locate(&self, symbol: u8) -> Option<usize> {
        self.buckets
            .iter()
            .position(|b| b.as_bytes().contains(&symbol))
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn bucket(&self, i: usize) -> &str {
        &self.buckets[i]
    }

    pub fn buckets(&self) -> &[String] {
        &self.buckets
    }

    /// Coverage invariant: the concatenation of all buckets in table
    /// order equals the alphabet exactly once.
    pub fn is_total(&self) -> bool {
        let joined: String = self.buckets.concat();
        joined.as_bytes() == &ALPHABET[..]
    }
}
