use crate::types::{KnowledgeNode, MatchSource, ScoredNode};
use std::collections::HashMap;

/// Reciprocal Rank Fusion, matching the SQL migration's hybrid-search
/// CTE exactly: `rrf_score = bm25_weight * (1/(rrf_k+bm25_rank)) +
/// vector_weight * (1/(rrf_k+vector_rank))`. A node present in only
/// one leg is scored from that leg alone.
pub fn reciprocal_rank_fusion(
    nodes_by_id: &HashMap<i64, KnowledgeNode>,
    bm25_hits: &[(i64, f64)],
    vector_hits: &[(i64, f64, MatchSource)],
    bm25_weight: f64,
    vector_weight: f64,
    rrf_k: f64,
    limit: usize,
) -> Vec<ScoredNode> {
    let bm25_ranks: HashMap<i64, (u32, f64)> = bm25_hits
        .iter()
        .enumerate()
        .map(|(i, (id, score))| (*id, (i as u32 + 1, *score)))
        .collect();
    let vector_ranks: HashMap<i64, (u32, f64, MatchSource)> = vector_hits
        .iter()
        .enumerate()
        .map(|(i, (id, score, source))| (*id, (i as u32 + 1, *score, *source)))
        .collect();

    let mut ids: Vec<i64> = bm25_ranks.keys().chain(vector_ranks.keys()).copied().collect();
    ids.sort_unstable();
    ids.dedup();

    let mut scored: Vec<ScoredNode> = ids
        .into_iter()
        .filter_map(|id| {
            let node = nodes_by_id.get(&id)?.clone();
            let bm25 = bm25_ranks.get(&id);
            let vector = vector_ranks.get(&id);

            let bm25_rank = bm25.map(|(rank, _)| *rank);
            let bm25_score = bm25.map(|(_, score)| *score).unwrap_or(0.0);
            let vector_rank = vector.map(|(rank, _, _)| *rank);
            let vector_score = vector.map(|(_, score, _)| *score).unwrap_or(0.0);
            let match_source = vector
                .map(|(_, _, source)| *source)
                .unwrap_or(MatchSource::Node);

            let rrf_score = bm25_rank.map_or(0.0, |rank| bm25_weight * (1.0 / (rrf_k + rank as f64)))
                + vector_rank.map_or(0.0, |rank| vector_weight * (1.0 / (rrf_k + rank as f64)));

            Some(ScoredNode {
                node,
                rrf_score,
                bm25_rank,
                vector_rank,
                bm25_score,
                vector_score,
                match_source,
            })
        })
        .collect();

    scored.sort_by(|a, b| b.rrf_score.partial_cmp(&a.rrf_score).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeType;

    fn node(id: i64) -> KnowledgeNode {
        KnowledgeNode {
            id,
            tenant_id: "t1".into(),
            node_type: NodeType::Faq,
            title: "n".into(),
            summary: "s".into(),
            content: serde_json::json!({}),
            tags: vec![],
            embedding: None,
            edges: vec![],
        }
    }

    #[test]
    fn node_in_both_legs_outranks_single_leg_node() {
        let nodes: HashMap<i64, KnowledgeNode> = [(1, node(1)), (2, node(2))].into_iter().collect();
        let bm25 = vec![(1, 5.0), (2, 4.0)];
        let vector = vec![(1, 0.9, MatchSource::Node)];
        let result = reciprocal_rank_fusion(&nodes, &bm25, &vector, 0.4, 0.6, 60.0, 10);
        assert_eq!(result[0].node.id, 1);
        assert!(result[0].rrf_score > result[1].rrf_score);
    }

    #[test]
    fn vector_only_hit_still_scored() {
        let nodes: HashMap<i64, KnowledgeNode> = [(3, node(3))].into_iter().collect();
        let bm25 = vec![];
        let vector = vec![(3, 0.8, MatchSource::Variant)];
        let result = reciprocal_rank_fusion(&nodes, &bm25, &vector, 0.4, 0.6, 60.0, 10);
        assert_eq!(result.len(), 1);
        assert!(result[0].rrf_score > 0.0);
        assert_eq!(result[0].bm25_rank, None);
    }

    #[test]
    fn respects_limit() {
        let nodes: HashMap<i64, KnowledgeNode> = (0..5).map(|i| (i, node(i))).collect();
        let bm25: Vec<(i64, f64)> = (0..5).map(|i| (i, 1.0)).collect();
        let result = reciprocal_rank_fusion(&nodes, &bm25, &[], 0.4, 0.6, 60.0, 3);
        assert_eq!(result.len(), 3);
    }
}
