use crate::types::{KnowledgeNode, MatchSource, NodeVariant};
use std::collections::HashMap;

/// Cosine-similarity search over node and variant embeddings.
///
/// Mirrors the SQL migration's `all_vector_results` / `dedupe_vector`
/// CTEs: search both the node's own embedding and each of its
/// variants' embeddings, union the hits, then keep only the
/// highest-scoring row per node id.
pub struct VectorIndex;

impl VectorIndex {
    pub fn new() -> Self {
        Self
    }

    /// Returns `(node_id, score, match_source)` sorted by descending
    /// score, truncated to `limit`, deduped to one entry per node id.
    pub fn search<'a>(
        &self,
        nodes: impl Iterator<Item = &'a KnowledgeNode>,
        variants: impl Iterator<Item = &'a NodeVariant>,
        query_embedding: &[f32],
        limit: usize,
    ) -> Vec<(i64, f64, MatchSource)> {
        let mut best: HashMap<i64, (f64, MatchSource)> = HashMap::new();

        for node in nodes {
            if let Some(embedding) = &node.embedding {
                let score = cosine_similarity(query_embedding, embedding);
                update_best(&mut best, node.id, score, MatchSource::Node);
            }
        }

        for variant in variants {
            if let Some(embedding) = &variant.embedding {
                let score = cosine_similarity(query_embedding, embedding);
                update_best(&mut best, variant.node_id, score, MatchSource::Variant);
            }
        }

        let mut results: Vec<(i64, f64, MatchSource)> = best
            .into_iter()
            .map(|(id, (score, source))| (id, score, source))
            .collect();
        results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(limit);
        results
    }
}

impl Default for VectorIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn update_best(
    best: &mut HashMap<i64, (f64, MatchSource)>,
    node_id: i64,
    score: f64,
    source: MatchSource,
) {
    best.entry(node_id)
        .and_modify(|existing| {
            if score > existing.0 {
                *existing = (score, source);
            }
        })
        .or_insert((score, source));
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| (*x as f64) * (*y as f64)).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeType;

    fn node(id: i64, embedding: Option<Vec<f32>>) -> KnowledgeNode {
        KnowledgeNode {
            id,
            tenant_id: "t1".into(),
            node_type: NodeType::Concept,
            title: "n".into(),
            summary: "s".into(),
            content: serde_json::json!({}),
            tags: vec![],
            embedding,
            edges: vec![],
        }
    }

    #[test]
    fn exact_match_scores_one() {
        let index = VectorIndex::new();
        let nodes = vec![node(1, Some(vec![1.0, 0.0, 0.0]))];
        let results = index.search(nodes.iter(), std::iter::empty(), &[1.0, 0.0, 0.0], 10);
        assert_eq!(results.len(), 1);
        assert!((results[0].1 - 1.0).abs() < 1e-9);
        assert_eq!(results[0].2, MatchSource::Node);
    }

    #[test]
    fn variant_hit_beats_weaker_node_hit_and_dedupes() {
        let index = VectorIndex::new();
        let nodes = vec![node(1, Some(vec![1.0, 1.0, 0.0]))];
        let variants = vec![NodeVariant {
            id: 10,
            node_id: 1,
            text: "variant".into(),
            embedding: Some(vec![1.0, 0.0, 0.0]),
        }];
        let results = index.search(nodes.iter(), variants.iter(), &[1.0, 0.0, 0.0], 10);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, 1);
        assert_eq!(results[0].2, MatchSource::Variant);
    }

    #[test]
    fn nodes_without_embeddings_are_skipped() {
        let index = VectorIndex::new();
        let nodes = vec![node(1, None)];
        let results = index.search(nodes.iter(), std::iter::empty(), &[1.0, 0.0], 10);
        assert!(results.is_empty());
    }

    #[test]
    fn mismatched_dimensions_score_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
    }
}
