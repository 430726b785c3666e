//! Node configuration parsing.
//!
//! Each node carries an opaque JSON `config` whose shape depends on the node
//! kind and, for actions, on the `actionType` tag. Configs are parsed once at
//! validation/execution entry into closed variant types; malformed JSON falls
//! back to an empty configuration object so downstream checks report missing
//! fields instead of crashing.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::condition::Condition;

pub const ACTION_SHELL: &str = "shell.exec";
pub const ACTION_HTTP: &str = "http.request";
pub const ACTION_FILE_READ: &str = "file.read";
pub const ACTION_PLUGIN: &str = "plugin.action";

pub const DEFAULT_SHELL_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_FILE_ENCODING: &str = "utf-8";

/// Configuration of a `shell.exec` action
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ShellConfig {
    pub command: Option<String>,
    pub working_directory: Option<String>,
    /// Timeout in milliseconds; defaults to 30000
    pub timeout: Option<u64>,
}

impl ShellConfig {
    pub fn timeout_ms(&self) -> u64 {
        self.timeout.unwrap_or(DEFAULT_SHELL_TIMEOUT_MS)
    }
}

/// Configuration of an `http.request` action
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HttpConfig {
    pub url: Option<String>,
    pub method: Option<String>,
    pub body: Option<Value>,
}

/// Configuration of a `file.read` action
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FileReadConfig {
    pub path: Option<String>,
    /// "utf-8" (default) or "base64"
    pub encoding: Option<String>,
    /// Overrides the engine's allowed roots when present
    pub allowed_dirs: Option<Vec<String>>,
}

impl FileReadConfig {
    pub fn encoding(&self) -> &str {
        self.encoding.as_deref().unwrap_or(DEFAULT_FILE_ENCODING)
    }
}

/// Configuration of a `plugin.action` action
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PluginConfig {
    pub plugin_id: Option<String>,
    pub action_id: Option<String>,
    /// Passed through to the plugin verbatim, including when omitted
    pub params: Option<Value>,
}

/// Parsed configuration of an action node
#[derive(Debug, Clone, PartialEq)]
pub enum ActionConfig {
    /// The node has no configuration payload at all
    Missing,
    /// A configuration is present but carries no `actionType`
    Untyped,
    Shell(ShellConfig),
    Http(HttpConfig),
    FileRead(FileReadConfig),
    Plugin(PluginConfig),
    /// Unknown action types are accepted without further checks
    Other { action_type: String, params: Value },
}

impl ActionConfig {
    /// Parse an action node's raw config text. Never fails: malformed JSON is
    /// treated as an empty configuration object.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().is_empty() {
            return ActionConfig::Missing;
        }
        let config = lenient_object(raw);
        let Some(action_type) = config.get("actionType").and_then(Value::as_str) else {
            return ActionConfig::Untyped;
        };

        match action_type {
            ACTION_SHELL => ActionConfig::Shell(fields(&config)),
            ACTION_HTTP => ActionConfig::Http(fields(&config)),
            ACTION_FILE_READ => ActionConfig::FileRead(fields(&config)),
            ACTION_PLUGIN => ActionConfig::Plugin(fields(&config)),
            other => ActionConfig::Other {
                action_type: other.to_string(),
                params: config,
            },
        }
    }
}

/// Parsed configuration of a condition node
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionConfig {
    /// No condition expression is configured
    Missing,
    /// A condition is present but its expression tree has an invalid type
    Invalid,
    Expr(Condition),
}

impl ConditionConfig {
    pub fn parse(raw: &str) -> Self {
        let config = lenient_object(raw);
        let Some(condition) = config.get("condition") else {
            return ConditionConfig::Missing;
        };
        if condition.is_null() {
            return ConditionConfig::Missing;
        }
        match serde_json::from_value(condition.clone()) {
            Ok(expr) => ConditionConfig::Expr(expr),
            Err(_) => ConditionConfig::Invalid,
        }
    }
}

/// Parse raw config text as a JSON object, falling back to an empty object on
/// malformed JSON or a non-object payload
pub fn lenient_object(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ Value::Object(_)) => value,
        _ => Value::Object(Default::default()),
    }
}

fn fields<T: Default + serde::de::DeserializeOwned>(config: &Value) -> T {
    serde_json::from_value(config.clone()).unwrap_or_default()
}
