//! Order-insensitive sequence alignment.
//!
//! Elements are bucketed by content fingerprint, then matched first come
//! first served in index order. Equality is re-checked inside a bucket, so a
//! fingerprint collision never pairs unequal values.

use rustc_hash::FxHashMap;

use super::hash::fingerprint;
use crate::value::Value;

/// Result of aligning two sequences as multisets.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Alignment {
    /// Matched `(from, to)` index pairs
    pub matched: Vec<(usize, usize)>,
    /// Unmatched `from` indices, ascending
    pub removed: Vec<usize>,
    /// Unmatched `to` indices, ascending
    pub added: Vec<usize>,
}

impl Alignment {
    /// Check whether both sequences hold the same elements.
    pub fn is_identity(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }
}

/// Align `from` and `to` ignoring element order.
pub fn align(from: &[Value], to: &[Value]) -> Alignment {
    let mut buckets: FxHashMap<u64, Vec<usize>> = FxHashMap::default();
    for (j, item) in to.iter().enumerate() {
        buckets.entry(fingerprint(item)).or_default().push(j);
    }

    let mut used = vec![false; to.len()];
    let mut alignment = Alignment::default();

    for (i, item) in from.iter().enumerate() {
        let found = buckets.get(&fingerprint(item)).and_then(|candidates| {
            candidates
                .iter()
                .copied()
                .find(|&j| !used[j] && to[j].same(item))
        });
        match found {
            Some(j) => {
                used[j] = true;
                alignment.matched.push((i, j));
            }
            None => alignment.removed.push(i),
        }
    }

    alignment.added = used
        .iter()
        .enumerate()
        .filter(|&(_, &u)| !u)
        .map(|(j, _)| j)
        .collect();
    alignment
}
