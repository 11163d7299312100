use serde::{Deserialize, Serialize};

/// The category of a knowledge node, used both to filter searches and
/// to bucket results into a `KnowledgeBundle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Schema,
    Playbook,
    Faq,
    Concept,
    Example,
}

/// A single entry in the knowledge graph, scoped by tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeNode {
    pub id: i64,
    pub tenant_id: String,
    pub node_type: NodeType,
    pub title: String,
    pub summary: String,
    pub content: serde_json::Value,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
    /// Ids of nodes this one points to — the directed multigraph edges
    /// `get_related` traverses.
    #[serde(default)]
    pub edges: Vec<i64>,
}

/// An alternate phrasing of a node (e.g. a paraphrase or a translated
/// title) carrying its own embedding, so a query can match a node via
/// a variant even when the canonical title/summary don't overlap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeVariant {
    pub id: i64,
    pub node_id: i64,
    pub text: String,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

/// Which leg of the hybrid search actually surfaced this node: through
/// its own embedding, or through one of its variants'.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
    Node,
    Variant,
}

/// A search request, scoped by tenant with optional type/tag filters.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub tenant_id: String,
    pub text: String,
    pub node_types: Option<Vec<NodeType>>,
    pub tags: Option<Vec<String>>,
    pub limit: usize,
}

impl SearchQuery {
    pub fn new(tenant_id: impl Into<String>, text: impl Into<String>, limit: usize) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            text: text.into(),
            node_types: None,
            tags: None,
            limit,
        }
    }
}

/// One knowledge node with its fused hybrid-search score and the raw
/// per-leg rank/score that produced it (kept for observability/tuning).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredNode {
    pub node: KnowledgeNode,
    pub rrf_score: f64,
    pub bm25_rank: Option<u32>,
    pub vector_rank: Option<u32>,
    pub bm25_score: f64,
    pub vector_score: f64,
    pub match_source: MatchSource,
}

/// Search results bucketed by node type for convenient prompt assembly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeBundle {
    pub schemas: Vec<ScoredNode>,
    pub playbooks: Vec<ScoredNode>,
    pub faqs: Vec<ScoredNode>,
    pub concepts: Vec<ScoredNode>,
    pub examples: Vec<ScoredNode>,
}

impl KnowledgeBundle {
    pub fn from_scored(nodes: Vec<ScoredNode>) -> Self {
        let mut bundle = KnowledgeBundle::default();
        for n in nodes {
            match n.node.node_type {
                NodeType::Schema => bundle.schemas.push(n),
                NodeType::Playbook => bundle.playbooks.push(n),
                NodeType::Faq => bundle.faqs.push(n),
                NodeType::Concept => bundle.concepts.push(n),
                NodeType::Example => bundle.examples.push(n),
            }
        }
        bundle
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
            && self.playbooks.is_empty()
            && self.faqs.is_empty()
            && self.concepts.is_empty()
            && self.examples.is_empty()
    }

    pub fn len(&self) -> usize {
        self.schemas.len() + self.playbooks.len() + self.faqs.len() + self.concepts.len() + self.examples.len()
    }

    /// Schemas and playbooks first — what the Planner needs to decompose
    /// a request into concrete, executable steps.
    pub fn for_planning(&self) -> Vec<&ScoredNode> {
        self.schemas.iter().chain(self.playbooks.iter()).collect()
    }

    /// Render all bucketed nodes as a single prompt-ready string,
    /// truncated to `max_chars`.
    pub fn for_prompt(&self, max_chars: usize) -> String {
        let mut sections = Vec::new();
        for (label, nodes) in [
            ("Schemas", &self.schemas),
            ("Playbooks", &self.playbooks),
            ("FAQs", &self.faqs),
            ("Concepts", &self.concepts),
            ("Examples", &self.examples),
        ] {
            if nodes.is_empty() {
                continue;
            }
            let mut section = vec![format!("## {label}")];
            for n in nodes {
                section.push(format!("- {}: {}", n.node.title, n.node.summary));
            }
            sections.push(section.join("\n"));
        }
        let mut rendered = sections.join("\n\n");
        if rendered.len() > max_chars {
            rendered.truncate(max_chars);
            rendered.push_str("\n\n[truncated]");
        }
        rendered
    }
}
