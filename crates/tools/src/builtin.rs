//! Wires the exec/process/file tool implementations into `ToolSpec` +
//! `ToolFn` pairs for `ToolRegistry::build`.

use crate::file_ops;
use crate::manager::ProcessManager;
use crate::registry::ToolFn;
use crate::{exec, process};
use orc_domain::{Error, RiskTier, ToolSpec};
use std::path::PathBuf;
use std::sync::Arc;

fn param_err(name: &str, err: serde_json::Error) -> Error {
    Error::Validation(format!("invalid arguments for '{name}': {err}"))
}

/// Build the exec/process/file tool set backed by a shared `ProcessManager`
/// and a sandboxed workspace root.
pub fn builtin_tools(manager: Arc<ProcessManager>, workspace_root: PathBuf) -> Vec<(ToolSpec, ToolFn)> {
    vec![
        exec_tool(manager.clone()),
        process_tool(manager),
        file_read_tool(workspace_root.clone()),
        file_write_tool(workspace_root.clone()),
        file_append_tool(workspace_root.clone()),
        file_move_tool(workspace_root.clone()),
        file_delete_tool(workspace_root.clone()),
        file_list_tool(workspace_root),
    ]
}

fn exec_tool(manager: Arc<ProcessManager>) -> (ToolSpec, ToolFn) {
    let spec = ToolSpec {
        name: "exec".into(),
        description: "Run a shell command, foreground or backgrounded after a yield window.".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "command": {"type": "string"},
                "background": {"type": "boolean"},
                "yield_ms": {"type": "integer"},
                "timeout_sec": {"type": "integer"},
                "workdir": {"type": "string"},
            },
            "required": ["command"],
        }),
        risk: Some(RiskTier::Write),
        timeout_ms: None,
        required_permissions: vec!["tools.exec".into()],
        confirmation_prompt: None,
    };
    let func: ToolFn = Arc::new(move |_ctx, args| {
        let manager = manager.clone();
        Box::pin(async move {
            let req: exec::ExecRequest =
                serde_json::from_value(args).map_err(|e| param_err("exec", e))?;
            let response = exec::exec(&manager, req).await;
            serde_json::to_value(response).map_err(Error::Json)
        })
    });
    (spec, func)
}

fn process_tool(manager: Arc<ProcessManager>) -> (ToolSpec, ToolFn) {
    let spec = ToolSpec {
        name: "process".into(),
        description: "Manage a background process session started by exec (list/poll/log/write/kill/clear/remove).".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "action": {"type": "string", "enum": ["list","poll","log","write","kill","clear","remove"]},
                "session_id": {"type": "string"},
                "offset": {"type": "integer"},
                "limit": {"type": "integer"},
                "tail_lines": {"type": "integer"},
                "data": {"type": "string"},
                "eof": {"type": "boolean"},
            },
            "required": ["action"],
        }),
        risk: Some(RiskTier::Write),
        timeout_ms: Some(5_000),
        required_permissions: vec!["tools.exec".into()],
        confirmation_prompt: None,
    };
    let func: ToolFn = Arc::new(move |_ctx, args| {
        let manager = manager.clone();
        Box::pin(async move {
            let req: process::ProcessRequest =
                serde_json::from_value(args).map_err(|e| param_err("process", e))?;
            let response = process::handle_process(&manager, req).await;
            serde_json::to_value(response).map_err(Error::Json)
        })
    });
    (spec, func)
}

fn file_read_tool(root: PathBuf) -> (ToolSpec, ToolFn) {
    let spec = ToolSpec {
        name: "file_read".into(),
        description: "Read a file within the sandboxed workspace.".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "offset": {"type": "integer"},
                "limit": {"type": "integer"},
            },
            "required": ["path"],
        }),
        risk: Some(RiskTier::Read),
        timeout_ms: Some(10_000),
        required_permissions: vec!["tools.files.read".into()],
        confirmation_prompt: None,
    };
    let func: ToolFn = Arc::new(move |_ctx, args| {
        let root = root.clone();
        Box::pin(async move {
            let req: file_ops::FileReadRequest =
                serde_json::from_value(args).map_err(|e| param_err("file_read", e))?;
            file_ops::file_read(&root, req).await.map_err(Error::Validation)
        })
    });
    (spec, func)
}

fn file_write_tool(root: PathBuf) -> (ToolSpec, ToolFn) {
    let spec = ToolSpec {
        name: "file_write".into(),
        description: "Write (overwrite) a file within the sandboxed workspace.".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "content": {"type": "string"},
            },
            "required": ["path", "content"],
        }),
        risk: Some(RiskTier::Write),
        timeout_ms: Some(10_000),
        required_permissions: vec!["tools.files.write".into()],
        confirmation_prompt: None,
    };
    let func: ToolFn = Arc::new(move |_ctx, args| {
        let root = root.clone();
        Box::pin(async move {
            let req: file_ops::FileWriteRequest =
                serde_json::from_value(args).map_err(|e| param_err("file_write", e))?;
            file_ops::file_write(&root, req).await.map_err(Error::Validation)
        })
    });
    (spec, func)
}

fn file_append_tool(root: PathBuf) -> (ToolSpec, ToolFn) {
    let spec = ToolSpec {
        name: "file_append".into(),
        description: "Append to a file within the sandboxed workspace.".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "content": {"type": "string"},
            },
            "required": ["path", "content"],
        }),
        risk: Some(RiskTier::Write),
        timeout_ms: Some(10_000),
        required_permissions: vec!["tools.files.write".into()],
        confirmation_prompt: None,
    };
    let func: ToolFn = Arc::new(move |_ctx, args| {
        let root = root.clone();
        Box::pin(async move {
            let req: file_ops::FileAppendRequest =
                serde_json::from_value(args).map_err(|e| param_err("file_append", e))?;
            file_ops::file_append(&root, req).await.map_err(Error::Validation)
        })
    });
    (spec, func)
}

fn file_move_tool(root: PathBuf) -> (ToolSpec, ToolFn) {
    let spec = ToolSpec {
        name: "file_move".into(),
        description: "Move or rename a file within the sandboxed workspace.".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "source": {"type": "string"},
                "destination": {"type": "string"},
            },
            "required": ["source", "destination"],
        }),
        risk: Some(RiskTier::Write),
        timeout_ms: Some(10_000),
        required_permissions: vec!["tools.files.write".into()],
        confirmation_prompt: None,
    };
    let func: ToolFn = Arc::new(move |_ctx, args| {
        let root = root.clone();
        Box::pin(async move {
            let req: file_ops::FileMoveRequest =
                serde_json::from_value(args).map_err(|e| param_err("file_move", e))?;
            file_ops::file_move(&root, req).await.map_err(Error::Validation)
        })
    });
    (spec, func)
}

fn file_delete_tool(root: PathBuf) -> (ToolSpec, ToolFn) {
    let spec = ToolSpec {
        name: "file_delete".into(),
        description: "Delete a file within the sandboxed workspace.".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
            },
            "required": ["path"],
        }),
        risk: Some(RiskTier::Destructive),
        timeout_ms: Some(10_000),
        required_permissions: vec!["tools.files.write".into()],
        confirmation_prompt: None,
    };
    let func: ToolFn = Arc::new(move |_ctx, args| {
        let root = root.clone();
        Box::pin(async move {
            let req: file_ops::FileDeleteRequest =
                serde_json::from_value(args).map_err(|e| param_err("file_delete", e))?;
            file_ops::file_delete(&root, req).await.map_err(Error::Validation)
        })
    });
    (spec, func)
}

fn file_list_tool(root: PathBuf) -> (ToolSpec, ToolFn) {
    let spec = ToolSpec {
        name: "file_list".into(),
        description: "List a directory within the sandboxed workspace.".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
            },
        }),
        risk: Some(RiskTier::Read),
        timeout_ms: Some(10_000),
        required_permissions: vec!["tools.files.read".into()],
        confirmation_prompt: None,
    };
    let func: ToolFn = Arc::new(move |_ctx, args| {
        let root = root.clone();
        Box::pin(async move {
            let req: file_ops::FileListRequest =
                serde_json::from_value(args).map_err(|e| param_err("file_list", e))?;
            file_ops::file_list(&root, req).await.map_err(Error::Validation)
        })
    });
    (spec, func)
}
