use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_3210")]
    pub port: u16,
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    /// Bearer token clients must present in the `auth` frame. Prefer
    /// `api_token_env` over storing this directly in config.toml.
    #[serde(default)]
    pub api_token: Option<String>,
    /// Environment variable holding the bearer token (read at startup,
    /// overridden by `api_token` if both are set). Unset and `api_token`
    /// absent means auth is disabled (dev mode — any token is accepted).
    #[serde(default = "d_api_token_env")]
    pub api_token_env: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3210,
            host: "127.0.0.1".into(),
            cors: CorsConfig::default(),
            transport: TransportConfig::default(),
            api_token: None,
            api_token_env: d_api_token_env(),
        }
    }
}

fn d_api_token_env() -> String {
    "ORC_API_TOKEN".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Transport (WebSocket chat protocol framing rules)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Connection is closed if no frame arrives for this long.
    #[serde(default = "d_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// `auth` must arrive within this many seconds of connecting.
    #[serde(default = "d_auth_timeout_secs")]
    pub auth_timeout_secs: u64,
    /// Upper bound on simultaneous open connections, enforced by a semaphore.
    #[serde(default = "d_max_connections")]
    pub max_connections: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: d_idle_timeout_secs(),
            auth_timeout_secs: d_auth_timeout_secs(),
            max_connections: d_max_connections(),
        }
    }
}

fn d_idle_timeout_secs() -> u64 {
    300
}
fn d_auth_timeout_secs() -> u64 {
    30
}
fn d_max_connections() -> usize {
    1024
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Origins allowed for CORS. Use `["*"]` for permissive (NOT recommended).
    /// Defaults to localhost-only.
    #[serde(default = "d_cors_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: d_cors_origins(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_3210() -> u16 {
    3210
}
fn d_host() -> String {
    "127.0.0.1".into()
}
fn d_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:*".into(),
        "http://127.0.0.1:*".into(),
    ]
}
