//! Built-in tools plus the registry/executor that mediate every tool
//! call the orchestrator or a sub-agent makes.
//!
//! Tool calls never bypass `ToolExecutor::execute`: it is the single
//! point where permissions are checked, human-in-the-loop gating is
//! applied, and timeouts are enforced, matching the reference
//! executor's `execute`/`execute_approved` split.

pub mod builtin;
pub mod exec;
pub mod executor;
pub mod file_ops;
pub mod manager;
pub mod process;
pub mod registry;

pub use builtin::builtin_tools;
pub use executor::{PendingCall, ToolExecutor};
pub use manager::ProcessManager;
pub use registry::{ToolFn, ToolRegistry};
