//! `orc run` — one-shot execution command.
//!
//! Sends a single query through the orchestrator, prints the response to
//! stdout, and exits. Useful for scripting and quick checks against a
//! local config without standing up the WebSocket gateway.

use std::sync::Arc;

use orc_domain::config::Config;
use orc_domain::{RequestContext, User};
use orc_protocol::{ComponentPayload, OutboundFrame};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::bootstrap;

/// Execute a single request and print the response.
///
/// This is the entry point for `orc run "message"`.
pub async fn run(
    config: Arc<Config>,
    message: String,
    session_key: String,
    _model: Option<String>,
    json_output: bool,
) -> anyhow::Result<()> {
    let state = bootstrap::build_app_state(config, false).await?;

    let user = User {
        id: "cli".into(),
        username: "cli".into(),
        email: None,
        permissions: Default::default(),
        bearer_token: None,
    };
    let ctx = RequestContext::new(user, session_key, uuid::Uuid::new_v4().to_string());

    let (tx, mut rx) = mpsc::channel::<OutboundFrame>(64);
    let cancel = CancellationToken::new();
    let orchestrator = state.orchestrator.clone();
    let handle = tokio::spawn(async move { orchestrator.handle_request(ctx, message, tx, cancel).await });

    let mut collected = Vec::new();
    let mut exit_code = 0;

    while let Some(frame) = rx.recv().await {
        if json_output {
            collected.push(frame);
            continue;
        }
        match &frame {
            OutboundFrame::Markdown { payload } => println!("{payload}"),
            OutboundFrame::Component { payload: ComponentPayload::Progress { data } } => {
                eprintln!("\x1b[2m[{}]\x1b[0m", data.status);
            }
            OutboundFrame::Component { payload: ComponentPayload::Error { data } } => {
                eprintln!("error: {} ({})", data.message, data.code);
                exit_code = 1;
            }
            OutboundFrame::Component { payload: ComponentPayload::UiInteraction { data } } => {
                eprintln!("awaiting human input: {}", data.prompt);
            }
            OutboundFrame::AuthResponse { .. } | OutboundFrame::Suggestions { .. } | OutboundFrame::UiFieldOptions { .. } => {}
        }
    }

    if let Err(e) = handle.await? {
        eprintln!("error: {e}");
        exit_code = 1;
    }

    if json_output {
        println!("{}", serde_json::to_string_pretty(&collected)?);
    }

    if exit_code != 0 {
        std::process::exit(exit_code);
    }

    Ok(())
}
