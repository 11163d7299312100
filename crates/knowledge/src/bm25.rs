use crate::types::KnowledgeNode;
use std::collections::HashMap;

/// Field-weighted BM25 over an in-memory node corpus.
///
/// Stands in for `ts_rank_cd` + a tsvector GIN index: the reference
/// implementation scores title/summary/content at decreasing weight
/// (3.0/2.0/1.0), which we replicate by scoring each field
/// independently and summing the weighted contributions.
pub struct Bm25Index {
    k1: f64,
    b: f64,
    title_weight: f64,
    summary_weight: f64,
    content_weight: f64,
}

impl Bm25Index {
    pub fn new(title_weight: f64, summary_weight: f64, content_weight: f64) -> Self {
        Self {
            k1: 1.2,
            b: 0.75,
            title_weight,
            summary_weight,
            content_weight,
        }
    }

    /// Score and rank every node against `query`, returning `(node_id, score)`
    /// pairs sorted by descending score, truncated to `limit`.
    pub fn search<'a>(
        &self,
        nodes: impl Iterator<Item = &'a KnowledgeNode>,
        query: &str,
        limit: usize,
    ) -> Vec<(i64, f64)> {
        let nodes: Vec<&KnowledgeNode> = nodes.collect();
        let query_terms = tokenize(query);
        if query_terms.is_empty() || nodes.is_empty() {
            return Vec::new();
        }

        let docs: Vec<Doc> = nodes.iter().map(|n| Doc::from_node(n)).collect();
        let avg_len: f64 = docs.iter().map(|d| d.len() as f64).sum::<f64>() / docs.len() as f64;
        let doc_freq = document_frequencies(&docs, &query_terms);

        let mut scored: Vec<(i64, f64)> = nodes
            .iter()
            .zip(docs.iter())
            .map(|(node, doc)| {
                let score = self.score_doc(doc, &query_terms, &doc_freq, docs.len(), avg_len);
                (node.id, score)
            })
            .filter(|(_, score)| *score > 0.0)
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        scored
    }

    fn score_doc(
        &self,
        doc: &Doc,
        query_terms: &[String],
        doc_freq: &HashMap<String, usize>,
        n_docs: usize,
        avg_len: f64,
    ) -> f64 {
        let mut total = 0.0;
        for (field_terms, weight) in [
            (&doc.title, self.title_weight),
            (&doc.summary, self.summary_weight),
            (&doc.content, self.content_weight),
        ] {
            total += weight * self.bm25_field(field_terms, query_terms, doc_freq, n_docs, avg_len);
        }
        total
    }

    fn bm25_field(
        &self,
        field_terms: &[String],
        query_terms: &[String],
        doc_freq: &HashMap<String, usize>,
        n_docs: usize,
        avg_len: f64,
    ) -> f64 {
        if field_terms.is_empty() {
            return 0.0;
        }
        let len = field_terms.len() as f64;
        let tf = term_frequencies(field_terms);
        let mut score = 0.0;
        for term in query_terms {
            let f = *tf.get(term).unwrap_or(&0) as f64;
            if f == 0.0 {
                continue;
            }
            let df = *doc_freq.get(term).unwrap_or(&0) as f64;
            let idf = ((n_docs as f64 - df + 0.5) / (df + 0.5) + 1.0).ln();
            let numerator = f * (self.k1 + 1.0);
            let denominator = f + self.k1 * (1.0 - self.b + self.b * (len / avg_len.max(1.0)));
            score += idf * (numerator / denominator);
        }
        score
    }
}

struct Doc {
    title: Vec<String>,
    summary: Vec<String>,
    content: Vec<String>,
}

impl Doc {
    fn from_node(node: &KnowledgeNode) -> Self {
        Self {
            title: tokenize(&node.title),
            summary: tokenize(&node.summary),
            content: tokenize(&node.content.to_string()),
        }
    }

    fn len(&self) -> usize {
        self.title.len() + self.summary.len() + self.content.len()
    }
}

fn document_frequencies(docs: &[Doc], query_terms: &[String]) -> HashMap<String, usize> {
    let mut freq = HashMap::new();
    for term in query_terms {
        let count = docs
            .iter()
            .filter(|d| d.title.contains(term) || d.summary.contains(term) || d.content.contains(term))
            .count();
        freq.insert(term.clone(), count);
    }
    freq
}

fn term_frequencies(terms: &[String]) -> HashMap<String, usize> {
    let mut freq = HashMap::new();
    for t in terms {
        *freq.entry(t.clone()).or_insert(0) += 1;
    }
    freq
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeType;

    fn node(id: i64, title: &str, summary: &str) -> KnowledgeNode {
        KnowledgeNode {
            id,
            tenant_id: "t1".into(),
            node_type: NodeType::Faq,
            title: title.into(),
            summary: summary.into(),
            content: serde_json::json!({}),
            tags: vec![],
            embedding: None,
            edges: vec![],
        }
    }

    #[test]
    fn title_hits_outrank_summary_hits() {
        let index = Bm25Index::new(3.0, 2.0, 1.0);
        let nodes = vec![
            node(1, "refund policy", "unrelated text about shipping"),
            node(2, "shipping details", "our refund policy is generous"),
        ];
        let results = index.search(nodes.iter(), "refund", 10);
        assert_eq!(results[0].0, 1);
    }

    #[test]
    fn empty_query_returns_nothing() {
        let index = Bm25Index::new(3.0, 2.0, 1.0);
        let nodes = vec![node(1, "a", "b")];
        assert!(index.search(nodes.iter(), "", 10).is_empty());
    }

    #[test]
    fn no_matches_returns_empty() {
        let index = Bm25Index::new(3.0, 2.0, 1.0);
        let nodes = vec![node(1, "apples", "oranges")];
        assert!(index.search(nodes.iter(), "zzzqqq", 10).is_empty());
    }

    #[test]
    fn respects_limit() {
        let index = Bm25Index::new(3.0, 2.0, 1.0);
        let nodes: Vec<_> = (0..5).map(|i| node(i, "widget pricing", "widget pricing info")).collect();
        let results = index.search(nodes.iter(), "widget", 2);
        assert_eq!(results.len(), 2);
    }
}
