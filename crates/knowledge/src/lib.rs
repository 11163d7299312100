mod bm25;
mod fuse;
pub mod types;
mod vector;

use async_trait::async_trait;
use orc_domain::{Error, RequestContext, Result};
use std::collections::HashMap;
use std::sync::RwLock;

pub use bm25::Bm25Index;
pub use fuse::reciprocal_rank_fusion;
pub use types::{
    KnowledgeBundle, KnowledgeNode, MatchSource, NodeType, NodeVariant, ScoredNode, SearchQuery,
};
pub use vector::VectorIndex;

/// An embedder turns query text into the same vector space as stored
/// node/variant embeddings. Production wiring calls out to whichever
/// LLM provider exposes an embeddings endpoint; tests use a stub.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Hybrid BM25 + vector search over the knowledge graph, fused via RRF.
#[async_trait]
pub trait KnowledgeRetriever: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<ScoredNode>>;

    async fn bundle(&self, query: &SearchQuery) -> Result<KnowledgeBundle> {
        let nodes = self.search(query).await?;
        Ok(KnowledgeBundle::from_scored(nodes))
    }

    /// Fetch a single node by id, regardless of its type.
    async fn get_node(&self, ctx: &RequestContext, id: i64) -> Result<Option<KnowledgeNode>>;

    /// Follow a node's outgoing edges, returning up to `limit` of the
    /// nodes it points to.
    async fn get_related(&self, ctx: &RequestContext, id: i64, limit: usize) -> Result<Vec<KnowledgeNode>>;

    /// Look up the `Schema` node describing a named entity.
    async fn get_schema(&self, ctx: &RequestContext, entity_name: &str) -> Result<Option<KnowledgeNode>>;
}

/// A corpus held in memory, scored on every search. Fine for the
/// dataset sizes a single tenant's knowledge graph realistically has;
/// a future version backed by a real index can implement the same
/// trait without touching callers.
pub struct InMemoryKnowledgeRetriever {
    nodes: RwLock<Vec<KnowledgeNode>>,
    variants: RwLock<Vec<NodeVariant>>,
    embedder: Box<dyn Embedder>,
    bm25: Bm25Index,
    vector: VectorIndex,
    bm25_weight: f64,
    vector_weight: f64,
    rrf_k: f64,
}

impl InMemoryKnowledgeRetriever {
    pub fn new(config: &orc_domain::config::KnowledgeConfig, embedder: Box<dyn Embedder>) -> Self {
        Self {
            nodes: RwLock::new(Vec::new()),
            variants: RwLock::new(Vec::new()),
            embedder,
            bm25: Bm25Index::new(
                config.bm25_weights.title,
                config.bm25_weights.summary,
                config.bm25_weights.content,
            ),
            vector: VectorIndex::new(),
            bm25_weight: config.rrf_weight_bm25,
            vector_weight: config.rrf_weight_vector,
            rrf_k: config.rrf_k as f64,
        }
    }

    pub fn upsert_node(&self, node: KnowledgeNode) {
        let mut nodes = self.nodes.write().expect("knowledge node lock poisoned");
        if let Some(existing) = nodes.iter_mut().find(|n| n.id == node.id) {
            *existing = node;
        } else {
            nodes.push(node);
        }
    }

    pub fn upsert_variant(&self, variant: NodeVariant) {
        let mut variants = self.variants.write().expect("knowledge variant lock poisoned");
        if let Some(existing) = variants.iter_mut().find(|v| v.id == variant.id) {
            *existing = variant;
        } else {
            variants.push(variant);
        }
    }
}

#[async_trait]
impl KnowledgeRetriever for InMemoryKnowledgeRetriever {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<ScoredNode>> {
        if query.text.trim().is_empty() {
            return Ok(vec![]);
        }

        let embedding_result = self.embedder.embed(&query.text).await;

        let nodes = self.nodes.read().expect("knowledge node lock poisoned");
        let variants = self.variants.read().expect("knowledge variant lock poisoned");

        let candidates: Vec<&KnowledgeNode> = nodes
            .iter()
            .filter(|n| n.tenant_id == query.tenant_id)
            .filter(|n| {
                query
                    .node_types
                    .as_ref()
                    .map(|types| types.contains(&n.node_type))
                    .unwrap_or(true)
            })
            .filter(|n| {
                query
                    .tags
                    .as_ref()
                    .map(|tags| tags.iter().any(|t| n.tags.contains(t)))
                    .unwrap_or(true)
            })
            .collect();

        if candidates.is_empty() {
            return Ok(vec![]);
        }

        let candidate_variants: Vec<&NodeVariant> = variants
            .iter()
            .filter(|v| candidates.iter().any(|n| n.id == v.node_id))
            .collect();

        let leg_limit = query.limit * 2;
        let bm25_hits = self.bm25.search(candidates.iter().copied(), &query.text, leg_limit);

        let nodes_by_id: HashMap<i64, KnowledgeNode> =
            candidates.iter().map(|n| (n.id, (*n).clone())).collect();

        // If the embedder is unavailable, degrade to BM25-only: rrf_score
        // becomes the BM25 score normalised into [0,1] by the batch's top hit.
        let query_embedding = match embedding_result {
            Ok(embedding) => embedding,
            Err(e) => {
                tracing::warn!(error = %e, "embedder unavailable, falling back to BM25-only search");
                return Ok(bm25_only_results(&nodes_by_id, &bm25_hits, query.limit));
            }
        };

        let vector_hits = self.vector.search(
            candidates.iter().copied(),
            candidate_variants.iter().copied(),
            &query_embedding,
            leg_limit,
        );

        Ok(reciprocal_rank_fusion(
            &nodes_by_id,
            &bm25_hits,
            &vector_hits,
            self.bm25_weight,
            self.vector_weight,
            self.rrf_k,
            query.limit,
        ))
    }

    async fn get_node(&self, _ctx: &RequestContext, id: i64) -> Result<Option<KnowledgeNode>> {
        let nodes = self.nodes.read().expect("knowledge node lock poisoned");
        Ok(nodes.iter().find(|n| n.id == id).cloned())
    }

    async fn get_related(&self, _ctx: &RequestContext, id: i64, limit: usize) -> Result<Vec<KnowledgeNode>> {
        let nodes = self.nodes.read().expect("knowledge node lock poisoned");
        let Some(source) = nodes.iter().find(|n| n.id == id) else {
            return Ok(vec![]);
        };
        Ok(source
            .edges
            .iter()
            .filter_map(|edge_id| nodes.iter().find(|n| n.id == *edge_id))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get_schema(&self, _ctx: &RequestContext, entity_name: &str) -> Result<Option<KnowledgeNode>> {
        let nodes = self.nodes.read().expect("knowledge node lock poisoned");
        Ok(nodes
            .iter()
            .find(|n| n.node_type == NodeType::Schema && n.title.eq_ignore_ascii_case(entity_name))
            .cloned())
    }
}

/// BM25-only scoring path used when embeddings are unavailable: the raw
/// BM25 score normalised into `[0,1]` by the batch's top hit becomes the
/// fused score, `vector_rank`/`vector_score` left empty.
fn bm25_only_results(
    nodes_by_id: &HashMap<i64, KnowledgeNode>,
    bm25_hits: &[(i64, f64)],
    limit: usize,
) -> Vec<ScoredNode> {
    let top_score = bm25_hits.iter().map(|(_, score)| *score).fold(0.0_f64, f64::max);
    bm25_hits
        .iter()
        .enumerate()
        .take(limit)
        .filter_map(|(i, (id, score))| {
            let node = nodes_by_id.get(id)?.clone();
            let normalised = if top_score > 0.0 { score / top_score } else { 0.0 };
            Some(ScoredNode {
                node,
                rrf_score: normalised,
                bm25_rank: Some(i as u32 + 1),
                vector_rank: None,
                bm25_score: *score,
                vector_score: 0.0,
                match_source: MatchSource::Node,
            })
        })
        .collect()
}

/// Fixed-response embedder and retriever for tests that don't need
/// real scoring — just a `KnowledgeRetriever` to satisfy a caller's
/// dependency.
pub struct MockKnowledgeRetriever {
    pub fixed_bundle: KnowledgeBundle,
}

impl MockKnowledgeRetriever {
    pub fn new(fixed_bundle: KnowledgeBundle) -> Self {
        Self { fixed_bundle }
    }

    pub fn empty() -> Self {
        Self {
            fixed_bundle: KnowledgeBundle::default(),
        }
    }

    fn all_nodes(&self) -> impl Iterator<Item = &ScoredNode> {
        self.fixed_bundle
            .schemas
            .iter()
            .chain(self.fixed_bundle.playbooks.iter())
            .chain(self.fixed_bundle.faqs.iter())
            .chain(self.fixed_bundle.concepts.iter())
            .chain(self.fixed_bundle.examples.iter())
    }
}

#[async_trait]
impl KnowledgeRetriever for MockKnowledgeRetriever {
    async fn search(&self, _query: &SearchQuery) -> Result<Vec<ScoredNode>> {
        Ok(self.all_nodes().cloned().collect())
    }

    async fn get_node(&self, _ctx: &RequestContext, id: i64) -> Result<Option<KnowledgeNode>> {
        Ok(self.all_nodes().map(|n| &n.node).find(|n| n.id == id).cloned())
    }

    async fn get_related(&self, _ctx: &RequestContext, id: i64, limit: usize) -> Result<Vec<KnowledgeNode>> {
        let all: Vec<&KnowledgeNode> = self.all_nodes().map(|n| &n.node).collect();
        let Some(source) = all.iter().find(|n| n.id == id) else {
            return Ok(vec![]);
        };
        Ok(source
            .edges
            .iter()
            .filter_map(|edge_id| all.iter().find(|n| n.id == *edge_id))
            .take(limit)
            .map(|n| (*n).clone())
            .collect())
    }

    async fn get_schema(&self, _ctx: &RequestContext, entity_name: &str) -> Result<Option<KnowledgeNode>> {
        Ok(self
            .all_nodes()
            .map(|n| &n.node)
            .find(|n| n.node_type == NodeType::Schema && n.title.eq_ignore_ascii_case(entity_name))
            .cloned())
    }
}

pub struct MockEmbedder {
    pub dims: usize,
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.is_empty() {
            return Err(Error::Validation("cannot embed empty text".into()));
        }
        let mut v = vec![0.0f32; self.dims];
        for (i, byte) in text.bytes().enumerate() {
            v[i % self.dims] += byte as f32 / 255.0;
        }
        Ok(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orc_domain::config::KnowledgeConfig;

    fn sample_node(id: i64, title: &str) -> KnowledgeNode {
        KnowledgeNode {
            id,
            tenant_id: "acme".into(),
            node_type: NodeType::Faq,
            title: title.into(),
            summary: format!("summary for {title}"),
            content: serde_json::json!({"body": title}),
            tags: vec!["billing".into()],
            embedding: Some(vec![1.0, 0.0, 0.0]),
            edges: vec![],
        }
    }

    #[tokio::test]
    async fn search_filters_by_tenant() {
        let retriever = InMemoryKnowledgeRetriever::new(&KnowledgeConfig::default(), Box::new(MockEmbedder { dims: 3 }));
        retriever.upsert_node(sample_node(1, "refund policy"));
        let mut other_tenant = sample_node(2, "refund policy");
        other_tenant.tenant_id = "other".into();
        retriever.upsert_node(other_tenant);

        let query = SearchQuery::new("acme", "refund", 10);
        let results = retriever.search(&query).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].node.id, 1);
    }

    #[tokio::test]
    async fn bundle_buckets_by_node_type() {
        let retriever = InMemoryKnowledgeRetriever::new(&KnowledgeConfig::default(), Box::new(MockEmbedder { dims: 3 }));
        retriever.upsert_node(sample_node(1, "refund policy"));
        let query = SearchQuery::new("acme", "refund", 10);
        let bundle = retriever.bundle(&query).await.unwrap();
        assert_eq!(bundle.faqs.len(), 1);
        assert!(bundle.schemas.is_empty());
    }

    #[tokio::test]
    async fn mock_retriever_returns_fixed_bundle() {
        let mut bundle = KnowledgeBundle::default();
        bundle.faqs.push(ScoredNode {
            node: sample_node(9, "mock"),
            rrf_score: 1.0,
            bm25_rank: Some(1),
            vector_rank: None,
            bm25_score: 1.0,
            vector_score: 0.0,
            match_source: MatchSource::Node,
        });
        let retriever = MockKnowledgeRetriever::new(bundle);
        let query = SearchQuery::new("acme", "anything", 10);
        let results = retriever.search(&query).await.unwrap();
        assert_eq!(results.len(), 1);
    }

    fn ctx() -> RequestContext {
        RequestContext::new(
            orc_domain::User { id: "u1".into(), username: "u1".into(), email: None, permissions: Default::default(), bearer_token: None },
            "sess-1",
            "req-1",
        )
    }

    #[tokio::test]
    async fn search_with_empty_query_returns_empty_results() {
        let retriever = InMemoryKnowledgeRetriever::new(&KnowledgeConfig::default(), Box::new(MockEmbedder { dims: 3 }));
        retriever.upsert_node(sample_node(1, "refund policy"));
        let query = SearchQuery::new("acme", "  ", 10);
        let results = retriever.search(&query).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn search_falls_back_to_bm25_when_embedder_fails() {
        struct FailingEmbedder;
        #[async_trait]
        impl Embedder for FailingEmbedder {
            async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
                Err(Error::Knowledge("embedder down".into()))
            }
        }
        let retriever = InMemoryKnowledgeRetriever::new(&KnowledgeConfig::default(), Box::new(FailingEmbedder));
        retriever.upsert_node(sample_node(1, "refund policy"));
        let query = SearchQuery::new("acme", "refund", 10);
        let results = retriever.search(&query).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].vector_rank, None);
        assert!(results[0].rrf_score > 0.0);
    }

    #[tokio::test]
    async fn get_node_returns_none_for_unknown_id() {
        let retriever = InMemoryKnowledgeRetriever::new(&KnowledgeConfig::default(), Box::new(MockEmbedder { dims: 3 }));
        assert!(retriever.get_node(&ctx(), 99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn get_related_follows_edges() {
        let retriever = InMemoryKnowledgeRetriever::new(&KnowledgeConfig::default(), Box::new(MockEmbedder { dims: 3 }));
        let mut source = sample_node(1, "refund policy");
        source.edges = vec![2, 3];
        retriever.upsert_node(source);
        retriever.upsert_node(sample_node(2, "chargeback policy"));
        retriever.upsert_node(sample_node(3, "dispute policy"));
        retriever.upsert_node(sample_node(4, "unrelated"));

        let related = retriever.get_related(&ctx(), 1, 10).await.unwrap();
        let ids: Vec<i64> = related.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[tokio::test]
    async fn get_schema_matches_schema_nodes_by_title() {
        let retriever = InMemoryKnowledgeRetriever::new(&KnowledgeConfig::default(), Box::new(MockEmbedder { dims: 3 }));
        let mut schema = sample_node(1, "Invoice");
        schema.node_type = NodeType::Schema;
        retriever.upsert_node(schema);
        retriever.upsert_node(sample_node(2, "Invoice"));

        let found = retriever.get_schema(&ctx(), "invoice").await.unwrap();
        assert_eq!(found.unwrap().id, 1);
    }
}
