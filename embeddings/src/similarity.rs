//! Similarity computation and ranking for embeddings.

use std::hash::Hash;

use indexmap::IndexMap;
use ordered_float::OrderedFloat;

use crate::error::{EmbeddingError, Result};

/// Compute the cosine similarity between two embeddings.
///
/// Returns a value between -1.0 and 1.0, where:
/// - 1.0 means identical direction
/// - 0.0 means orthogonal vectors (or either vector is all zeros)
/// - -1.0 means opposite vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return Ok(0.0);
    }

    Ok(dot_product / (magnitude_a * magnitude_b))
}

/// An item paired with its similarity score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredItem<T> {
    /// The scored item.
    pub item: T,

    /// Similarity score.
    pub score: f32,
}

impl<T> ScoredItem<T> {
    /// Pair an item with a score.
    pub fn new(item: T, score: f32) -> Self {
        Self { item, score }
    }
}

fn sort_descending<T>(items: &mut [ScoredItem<T>]) {
    // Stable, so equal scores keep scan order.
    items.sort_by_key(|s| std::cmp::Reverse(OrderedFloat(s.score)));
}

/// Take the `k` highest scoring items, best first.
pub fn top_k<T>(mut items: Vec<ScoredItem<T>>, k: usize) -> Vec<ScoredItem<T>> {
    sort_descending(&mut items);
    items.truncate(k);
    items
}

/// Take up to `k` items spread across groups, best first.
///
/// Items are grouped by `group_of` (groups keep first-seen order) and each
/// group is sorted by score. Groups then take turns giving up their best
/// remaining item until `k` items are collected or every group is empty.
/// The collected items are finally re-sorted by score.
pub fn interleave_by_group<T, G, F>(
    items: Vec<ScoredItem<T>>,
    k: usize,
    group_of: F,
) -> Vec<ScoredItem<T>>
where
    G: Eq + Hash,
    F: Fn(&T) -> G,
{
    let mut groups: IndexMap<G, Vec<ScoredItem<T>>> = IndexMap::new();
    for scored in items {
        groups.entry(group_of(&scored.item)).or_default().push(scored);
    }

    let mut queues: Vec<std::vec::IntoIter<ScoredItem<T>>> = groups
        .into_values()
        .map(|mut group| {
            sort_descending(&mut group);
            group.into_iter()
        })
        .collect();

    let mut selected = Vec::with_capacity(k);
    while selected.len() < k {
        let mut took_any = false;
        for queue in queues.iter_mut() {
            if selected.len() >= k {
                break;
            }
            if let Some(next) = queue.next() {
                selected.push(next);
                took_any = true;
            }
        }
        if !took_any {
            break;
        }
    }

    sort_descending(&mut selected);
    selected
}
