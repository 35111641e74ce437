//! Vector index abstraction and the exhaustive in-memory implementation.
//!
//! A [`VectorIndex`] is built once from every `(Chunk, vector)` pair of a
//! document and is read-only afterwards. There is no insert, update, or
//! delete: a new document means a new index.

use anyhow::{bail, Result};

use crate::chunk::Chunk;
use crate::embedding::cosine_similarity;

/// A chunk returned by a similarity query, with its cosine score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit<'a> {
    pub chunk: &'a Chunk,
    pub score: f32,
}

/// Read-only nearest-neighbour index over chunk embeddings.
///
/// Implementations must be `Send + Sync` so one built index can serve
/// concurrent queries.
pub trait VectorIndex: Send + Sync {
    /// Build the index in one shot.
    ///
    /// Fails if vectors have differing or zero dimensionality, or hold a
    /// NaN or infinite component.
    fn build(entries: Vec<(Chunk, Vec<f32>)>) -> Result<Self>
    where
        Self: Sized;

    /// Number of indexed chunks.
    fn len(&self) -> usize;

    /// True when the index holds no chunks.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dimensionality of the indexed vectors (0 for an empty index).
    fn dims(&self) -> usize;

    /// Return up to `k` chunks ordered by descending similarity.
    ///
    /// A `k` larger than [`len`](VectorIndex::len) returns every chunk.
    fn query(&self, vector: &[f32], k: usize) -> Result<Vec<Hit<'_>>>;
}

struct Entry {
    chunk: Chunk,
    vector: Vec<f32>,
}

/// Brute-force cosine similarity index.
///
/// A single document yields at most a few thousand chunks, so an exact
/// scan per query is cheap. Ties are broken by chunk index ascending, which
/// keeps results reproducible across builds.
pub struct FlatIndex {
    entries: Vec<Entry>,
    dims: usize,
}

impl VectorIndex for FlatIndex {
    fn build(entries: Vec<(Chunk, Vec<f32>)>) -> Result<Self> {
        let dims = entries.first().map(|(_, v)| v.len()).unwrap_or(0);
        if !entries.is_empty() && dims == 0 {
            bail!("embedding vectors have zero dimensions");
        }

        let mut stored = Vec::with_capacity(entries.len());
        for (chunk, vector) in entries {
            if vector.len() != dims {
                bail!(
                    "dimension mismatch for chunk {}: expected {}, got {}",
                    chunk.index,
                    dims,
                    vector.len()
                );
            }
            if !is_finite(&vector) {
                bail!("non-finite value in embedding vector for chunk {}", chunk.index);
            }
            stored.push(Entry { chunk, vector });
        }

        Ok(Self {
            entries: stored,
            dims,
        })
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn query(&self, vector: &[f32], k: usize) -> Result<Vec<Hit<'_>>> {
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if vector.len() != self.dims {
            bail!(
                "query vector has {} dimensions, index has {}",
                vector.len(),
                self.dims
            );
        }
        if !is_finite(vector) {
            bail!("non-finite value in query vector");
        }

        let mut hits: Vec<Hit<'_>> = self
            .entries
            .iter()
            .map(|e| Hit {
                chunk: &e.chunk,
                score: cosine_similarity(vector, &e.vector),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(a.chunk.index.cmp(&b.chunk.index))
        });
        hits.truncate(k);

        Ok(hits)
    }
}

/// True when every component is a finite number.
pub fn is_finite(vector: &[f32]) -> bool {
    vector.iter().all(|x| x.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(index: usize, text: &str) -> Chunk {
        Chunk {
            index,
            text: text.to_string(),
            start_offset: 0,
            end_offset: text.len(),
        }
    }

    fn sample_index() -> FlatIndex {
        FlatIndex::build(vec![
            (chunk(0, "east"), vec![1.0, 0.0]),
            (chunk(1, "north"), vec![0.0, 1.0]),
            (chunk(2, "north-east"), vec![0.7, 0.7]),
        ])
        .unwrap()
    }

    #[test]
    fn test_query_orders_by_descending_score() {
        let index = sample_index();
        let hits = index.query(&[1.0, 0.1], 3).unwrap();
        let order: Vec<usize> = hits.iter().map(|h| h.chunk.index).collect();
        assert_eq!(order, vec![0, 2, 1]);
        assert!(hits[0].score >= hits[1].score && hits[1].score >= hits[2].score);
    }

    #[test]
    fn test_k_larger_than_len_returns_all() {
        let index = sample_index();
        let hits = index.query(&[0.0, 1.0], 10).unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn test_k_truncates() {
        let index = sample_index();
        let hits = index.query(&[0.0, 1.0], 1).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.text, "north");
    }

    #[test]
    fn test_ties_break_by_chunk_index() {
        let index = FlatIndex::build(vec![
            (chunk(0, "a"), vec![1.0, 0.0]),
            (chunk(1, "b"), vec![1.0, 0.0]),
            (chunk(2, "c"), vec![1.0, 0.0]),
        ])
        .unwrap();
        let hits = index.query(&[1.0, 0.0], 3).unwrap();
        let order: Vec<usize> = hits.iter().map(|h| h.chunk.index).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_empty_index() {
        let index = FlatIndex::build(Vec::new()).unwrap();
        assert!(index.is_empty());
        assert_eq!(index.dims(), 0);
        assert!(index.query(&[1.0, 2.0], 3).unwrap().is_empty());
    }

    #[test]
    fn test_build_rejects_mixed_dimensions() {
        let result = FlatIndex::build(vec![
            (chunk(0, "a"), vec![1.0, 0.0]),
            (chunk(1, "b"), vec![1.0, 0.0, 0.0]),
        ]);
        let err = result.err().unwrap().to_string();
        assert!(err.contains("dimension mismatch"), "{}", err);
    }

    #[test]
    fn test_build_rejects_zero_dimensions() {
        let result = FlatIndex::build(vec![(chunk(0, "a"), Vec::new())]);
        assert!(result.is_err());
    }

    #[test]
    fn test_build_rejects_nan_components() {
        let entries: Vec<(Chunk, Vec<f32>)> = (0..200)
            .map(|i| {
                let v = if i % 3 == 0 {
                    vec![f32::NAN, 1.0]
                } else {
                    vec![1.0, i as f32]
                };
                (chunk(i, "x"), v)
            })
            .collect();
        let err = FlatIndex::build(entries).err().unwrap().to_string();
        assert!(err.contains("non-finite"), "{}", err);

        let inf = FlatIndex::build(vec![(chunk(0, "a"), vec![f32::INFINITY, 0.0])]);
        assert!(inf.is_err());
    }

    #[test]
    fn test_query_rejects_non_finite_vector() {
        let index = sample_index();
        let err = index.query(&[f32::NAN, 1.0], 3).unwrap_err();
        assert!(err.to_string().contains("non-finite"));
        assert!(index.query(&[1.0, f32::NEG_INFINITY], 3).is_err());
    }

    #[test]
    fn test_query_many_entries_sorts_without_panic() {
        let entries: Vec<(Chunk, Vec<f32>)> = (0..200)
            .map(|i| (chunk(i, "x"), vec![(i % 7) as f32, 1.0]))
            .collect();
        let index = FlatIndex::build(entries).unwrap();
        let hits = index.query(&[1.0, 1.0], 3).unwrap();
        assert_eq!(hits.len(), 3);
        assert!(hits[0].score >= hits[1].score && hits[1].score >= hits[2].score);
    }

    #[test]
    fn test_query_rejects_mismatched_vector() {
        let index = sample_index();
        assert!(index.query(&[1.0, 0.0, 0.0], 2).is_err());
    }
}
