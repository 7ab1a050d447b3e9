//! Diffing many independent pairs.
//!
//! With the `parallel` feature the pairs are spread over rayon's thread
//! pool and the element type must be `Sync`; without it they are processed
//! in order. Results always come back in input order.

use crate::algo::diff_with_options;
use crate::change::ChangeSet;
use crate::error::DiffResult;
use crate::options::Options;
use crate::reflect::Diffable;

/// Diff every `(from, to)` pair.
///
/// One pair failing does not affect the others.
#[cfg(feature = "parallel")]
pub fn diff_batch<T: Diffable + Sync>(
    pairs: &[(T, T)],
    options: &Options,
) -> Vec<DiffResult<ChangeSet>> {
    use rayon::prelude::*;

    tracing::debug!(pairs = pairs.len(), "parallel batch diff");
    pairs
        .par_iter()
        .map(|(from, to)| diff_with_options(from, to, options))
        .collect()
}

/// Diff every `(from, to)` pair.
///
/// One pair failing does not affect the others.
#[cfg(not(feature = "parallel"))]
pub fn diff_batch<T: Diffable>(pairs: &[(T, T)], options: &Options) -> Vec<DiffResult<ChangeSet>> {
    tracing::debug!(pairs = pairs.len(), "batch diff");
    pairs
        .iter()
        .map(|(from, to)| diff_with_options(from, to, options))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_results_in_input_order() {
        let pairs = vec![
            (vec![1i64], vec![1i64]),
            (vec![1], vec![2]),
            (vec![], vec![1, 2, 3]),
        ];
        let results = diff_batch(&pairs, &Options::default());
        let lens: Vec<usize> = results.into_iter().map(|r| r.unwrap().len()).collect();
        assert_eq!(lens, vec![0, 1, 3]);
    }

    #[test]
    fn test_failure_is_per_pair() {
        let pairs = vec![(vec![vec![1i64]], vec![vec![2i64]]), (vec![], vec![])];
        let results = diff_batch(&pairs, &Options::default().with_max_depth(1));
        assert!(results[0].is_err());
        assert!(results[1].as_ref().unwrap().is_empty());
    }
}
