//! Action executors.
//!
//! One executor per action kind. Executors are I/O-bound and side-effecting
//! but never let a failure escape their boundary: every outcome, including
//! timeouts, security rejections and I/O errors, comes back as an
//! `ActionOutcome` with `success: false`.

pub mod file;
pub mod http;
pub mod plugin;
pub mod shell;

pub use file::FileAccessPolicy;
pub use plugin::{NullPluginHost, PluginHost};

use serde::Serialize;
use serde_json::Value;

/// The result of executing one action
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionOutcome {
    pub success: bool,
    pub output: Value,
}

impl ActionOutcome {
    pub fn success(output: Value) -> Self {
        Self {
            success: true,
            output,
        }
    }

    pub fn failure(output: Value) -> Self {
        Self {
            success: false,
            output,
        }
    }

    /// A human-readable error for failed outcomes. Security and execution
    /// failures carry an `error` key; file I/O failures surface their message
    /// through `content`.
    pub fn error_message(&self) -> Option<String> {
        if self.success {
            return None;
        }
        let message = self
            .output
            .get("error")
            .or_else(|| self.output.get("content"))
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_else(|| self.output.to_string());
        Some(message)
    }
}
