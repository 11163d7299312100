use std::sync::Arc;

use orc_domain::config::Config;
use orc_orchestrator::Orchestrator;
use orc_sessions::SessionRepository;
use tokio::sync::Semaphore;

/// Shared application state passed to every connection handler.
///
/// The gateway itself holds almost nothing — planning, tool execution,
/// knowledge retrieval and checkpointing all live behind the
/// [`Orchestrator`]; this struct's job is just to give each WebSocket
/// connection a handle to it plus the connection-admission and auth
/// primitives the framing rules below call for.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub orchestrator: Arc<Orchestrator>,
    pub sessions: Arc<dyn SessionRepository>,
    /// Bounds simultaneous open connections to `server.transport.max_connections`.
    pub connection_semaphore: Arc<Semaphore>,
    /// Bearer token clients must present in the `auth` frame. `None` means
    /// auth is disabled (any token, including an empty one, is accepted).
    pub api_token: Option<Arc<str>>,
}
