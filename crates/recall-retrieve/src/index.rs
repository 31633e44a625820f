//! Exact cosine-similarity index over one collection's chunk embeddings.
//!
//! Vectors are L2-normalised once at insertion so a search is a dot product
//! per entry. Ties are broken by insertion rank; replacing a vector keeps
//! the rank of the entry it replaces.

use std::cmp::Ordering;
use std::collections::HashMap;

use ndarray::{Array1, ArrayView1};
use parking_lot::RwLock;
use serde::Serialize;

use recall_core::{Error, Result};

/// A search hit: chunk id and cosine similarity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredId {
    pub chunk_id: String,
    pub score: f32,
}

struct Entry {
    vector: Array1<f32>,
    rank: u64,
}

#[derive(Default)]
struct IndexInner {
    /// Fixed by the first insertion.
    dimension: Option<usize>,
    entries: HashMap<String, Entry>,
    next_rank: u64,
}

impl IndexInner {
    fn insert(&mut self, chunk_id: &str, vector: Array1<f32>) {
        match self.entries.get_mut(chunk_id) {
            Some(entry) => entry.vector = vector,
            None => {
                let rank = self.next_rank;
                self.next_rank += 1;
                self.entries
                    .insert(chunk_id.to_string(), Entry { vector, rank });
            }
        }
    }
}

/// Per-collection nearest-neighbour index. `add`/`remove` take the write
/// lock, `search` the read lock.
#[derive(Default)]
pub struct VectorIndex {
    inner: RwLock<IndexInner>,
}

fn normalize(vector: ArrayView1<'_, f32>) -> Array1<f32> {
    let norm = vector.dot(&vector).sqrt();
    if norm > 1e-12 {
        vector.mapv(|v| v / norm)
    } else {
        Array1::zeros(vector.len())
    }
}

fn check_finite(vector: &[f32]) -> Result<()> {
    if vector.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(Error::InvalidInput("vector contains NaN or infinite values".into()))
    }
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the vector for `chunk_id`.
    pub fn add(&self, chunk_id: &str, vector: &[f32]) -> Result<()> {
        self.add_batch(&[(chunk_id, vector)], || Ok(()))
    }

    /// Validate every vector, run `commit`, then insert the whole batch, all
    /// under one write guard. Nothing is inserted when validation or `commit`
    /// fails, and no other writer can fix the dimension in between.
    pub fn add_batch<F>(&self, batch: &[(&str, &[f32])], commit: F) -> Result<()>
    where
        F: FnOnce() -> Result<()>,
    {
        let mut guard = self.inner.write();
        let inner = &mut *guard;

        let mut expected = inner.dimension;
        for (_, vector) in batch {
            if vector.is_empty() {
                return Err(Error::InvalidInput("cannot index an empty vector".into()));
            }
            check_finite(vector)?;
            match expected {
                Some(dim) if dim != vector.len() => {
                    return Err(Error::DimensionMismatch {
                        expected: dim,
                        actual: vector.len(),
                    });
                }
                Some(_) => {}
                None => expected = Some(vector.len()),
            }
        }

        commit()?;

        inner.dimension = expected;
        for (chunk_id, vector) in batch {
            inner.insert(chunk_id, normalize(ArrayView1::from(*vector)));
        }
        Ok(())
    }

    /// Remove `chunk_id`. Absent ids are ignored.
    pub fn remove(&self, chunk_id: &str) {
        self.inner.write().entries.remove(chunk_id);
    }

    /// The `k` most similar entries, best first.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredId>> {
        let inner = self.inner.read();
        if k == 0 || inner.entries.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(expected) = inner.dimension {
            if expected != query.len() {
                return Err(Error::DimensionMismatch {
                    expected,
                    actual: query.len(),
                });
            }
        }
        check_finite(query)?;

        let q = normalize(ArrayView1::from(query));
        let mut scored: Vec<(f32, u64, &str)> = inner
            .entries
            .iter()
            .map(|(id, entry)| (entry.vector.dot(&q), entry.rank, id.as_str()))
            .collect();
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(score, _, id)| ScoredId {
                chunk_id: id.to_string(),
                score,
            })
            .collect())
    }

    pub fn size(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn dimension(&self) -> Option<usize> {
        self.inner.read().dimension
    }

    pub fn contains(&self, chunk_id: &str) -> bool {
        self.inner.read().entries.contains_key(chunk_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(hits: &[ScoredId]) -> Vec<&str> {
        hits.iter().map(|h| h.chunk_id.as_str()).collect()
    }

    #[test]
    fn test_search_orders_by_similarity() {
        let index = VectorIndex::new();
        index.add("x", &[1.0, 0.0]).unwrap();
        index.add("y", &[0.0, 1.0]).unwrap();
        index.add("xy", &[1.0, 1.0]).unwrap();

        let hits = index.search(&[2.0, 0.1], 3).unwrap();
        assert_eq!(ids(&hits), ["x", "xy", "y"]);
        assert!(hits[0].score > hits[1].score && hits[1].score > hits[2].score);
        assert!((hits[0].score - 0.99875).abs() < 1e-3);
    }

    #[test]
    fn test_nearest_two_of_three() {
        let index = VectorIndex::new();
        index.add("a", &[1.0, 0.0]).unwrap();
        index.add("b", &[0.0, 1.0]).unwrap();
        index.add("c", &[0.9, 0.1]).unwrap();
        let hits = index.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(ids(&hits), ["a", "c"]);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert!((hits[1].score - 0.99388).abs() < 1e-4);
    }

    #[test]
    fn test_k_limits_results() {
        let index = VectorIndex::new();
        for i in 0..10 {
            index.add(&format!("c{i}"), &[1.0, i as f32]).unwrap();
        }
        assert_eq!(index.search(&[1.0, 0.0], 3).unwrap().len(), 3);
        assert_eq!(index.search(&[1.0, 0.0], 50).unwrap().len(), 10);
    }

    #[test]
    fn test_empty_index_and_zero_k() {
        let index = VectorIndex::new();
        assert!(index.search(&[1.0, 2.0, 3.0], 5).unwrap().is_empty());
        index.add("a", &[1.0, 0.0]).unwrap();
        // k == 0 wins over a mismatched query length.
        assert!(index.search(&[1.0, 2.0, 3.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_dimension_mismatch() {
        let index = VectorIndex::new();
        index.add("a", &[1.0, 0.0, 0.0]).unwrap();
        assert!(matches!(
            index.add("b", &[1.0, 0.0]),
            Err(Error::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
        assert!(matches!(
            index.search(&[1.0], 1),
            Err(Error::DimensionMismatch { .. })
        ));
        assert_eq!(index.size(), 1);
    }

    #[test]
    fn test_empty_vector_rejected() {
        let index = VectorIndex::new();
        assert!(matches!(index.add("a", &[]), Err(Error::InvalidInput(_))));
        assert!(index.dimension().is_none());
    }

    #[test]
    fn test_non_finite_vector_rejected() {
        let index = VectorIndex::new();
        assert!(matches!(
            index.add("a", &[f32::NAN, 1.0]),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            index.add("b", &[f32::INFINITY, 1.0]),
            Err(Error::InvalidInput(_))
        ));
        assert!(index.is_empty());
        assert!(index.dimension().is_none());
    }

    #[test]
    fn test_batch_is_all_or_nothing() {
        let index = VectorIndex::new();
        let good: &[f32] = &[1.0, 0.0];
        let bad: &[f32] = &[f32::NAN, 0.0];
        let mut committed = false;
        let err = index
            .add_batch(&[("a", good), ("b", bad)], || {
                committed = true;
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(!committed);
        assert!(index.is_empty());

        let err = index
            .add_batch(&[("a", good)], || Err(Error::Storage("disk full".into())))
            .unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        assert!(index.is_empty());
        assert!(index.dimension().is_none());

        index.add_batch(&[("a", good), ("c", &[0.0, 2.0][..])], || Ok(())).unwrap();
        assert_eq!(index.size(), 2);
        assert_eq!(index.dimension(), Some(2));
    }

    #[test]
    fn test_batch_dimension_checked_within_batch() {
        let index = VectorIndex::new();
        let err = index
            .add_batch(&[("a", &[1.0, 0.0][..]), ("b", &[1.0, 0.0, 0.0][..])], || Ok(()))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
        assert!(index.is_empty());
    }

    #[test]
    fn test_ties_follow_insertion_order() {
        let index = VectorIndex::new();
        index.add("first", &[1.0, 0.0]).unwrap();
        index.add("second", &[2.0, 0.0]).unwrap();
        index.add("third", &[0.5, 0.0]).unwrap();
        let hits = index.search(&[1.0, 0.0], 3).unwrap();
        assert_eq!(ids(&hits), ["first", "second", "third"]);
    }

    #[test]
    fn test_replace_keeps_rank_and_updates_vector() {
        let index = VectorIndex::new();
        index.add("a", &[0.0, 1.0]).unwrap();
        index.add("b", &[1.0, 0.0]).unwrap();
        index.add("a", &[3.0, 0.0]).unwrap();
        assert_eq!(index.size(), 2);

        let hits = index.search(&[1.0, 0.0], 2).unwrap();
        // Both now score 1.0; "a" was inserted first.
        assert_eq!(ids(&hits), ["a", "b"]);
    }

    #[test]
    fn test_remove() {
        let index = VectorIndex::new();
        index.add("a", &[1.0, 0.0]).unwrap();
        index.add("b", &[0.0, 1.0]).unwrap();
        index.remove("a");
        index.remove("missing");
        assert_eq!(ids(&index.search(&[1.0, 0.0], 5).unwrap()), ["b"]);
        assert!(!index.contains("a"));
    }

    #[test]
    fn test_zero_vector_scores_zero() {
        let index = VectorIndex::new();
        index.add("zero", &[0.0, 0.0]).unwrap();
        index.add("one", &[1.0, 0.0]).unwrap();
        let hits = index.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(ids(&hits), ["one", "zero"]);
        assert_eq!(hits[1].score, 0.0);
    }

    #[test]
    fn test_concurrent_adds_and_searches() {
        let index = std::sync::Arc::new(VectorIndex::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let index = index.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        index.add(&format!("{t}-{i}"), &[1.0, (t * i) as f32]).unwrap();
                        index.search(&[1.0, 0.0], 5).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(index.size(), 400);
    }
}
