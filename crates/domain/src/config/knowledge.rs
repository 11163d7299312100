use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Hybrid knowledge retrieval (BM25 + vector, RRF fusion)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// Reciprocal rank fusion weight for the BM25 leg.
    #[serde(default = "d_w_bm25")]
    pub rrf_weight_bm25: f64,
    /// Reciprocal rank fusion weight for the vector leg.
    #[serde(default = "d_w_vec")]
    pub rrf_weight_vector: f64,
    /// RRF smoothing constant `k` — larger values flatten the influence
    /// of rank position.
    #[serde(default = "d_rrf_k")]
    pub rrf_k: u32,
    /// Default result limit when the caller doesn't specify one.
    #[serde(default = "d_limit")]
    pub default_limit: usize,
    /// BM25 field weights.
    #[serde(default)]
    pub bm25_weights: Bm25Weights,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            rrf_weight_bm25: d_w_bm25(),
            rrf_weight_vector: d_w_vec(),
            rrf_k: d_rrf_k(),
            default_limit: d_limit(),
            bm25_weights: Bm25Weights::default(),
        }
    }
}

/// Field-weighted BM25: title hits outrank summary hits, which outrank
/// body hits.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Bm25Weights {
    #[serde(default = "d_title_w")]
    pub title: f64,
    #[serde(default = "d_summary_w")]
    pub summary: f64,
    #[serde(default = "d_content_w")]
    pub content: f64,
}

impl Default for Bm25Weights {
    fn default() -> Self {
        Self {
            title: d_title_w(),
            summary: d_summary_w(),
            content: d_content_w(),
        }
    }
}

fn d_w_bm25() -> f64 {
    0.4
}
fn d_w_vec() -> f64 {
    0.6
}
fn d_rrf_k() -> u32 {
    60
}
fn d_limit() -> usize {
    10
}
fn d_title_w() -> f64 {
    3.0
}
fn d_summary_w() -> f64 {
    2.0
}
fn d_content_w() -> f64 {
    1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_rrf_spec() {
        let cfg = KnowledgeConfig::default();
        assert!((cfg.rrf_weight_bm25 - 0.4).abs() < 1e-9);
        assert!((cfg.rrf_weight_vector - 0.6).abs() < 1e-9);
        assert_eq!(cfg.rrf_k, 60);
    }

    #[test]
    fn deserialize_empty_uses_defaults() {
        let cfg: KnowledgeConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.default_limit, 10);
        assert!((cfg.bm25_weights.title - 3.0).abs() < 1e-9);
    }
}
