//! `plugin.action` action: delegate to an installed plugin.
//!
//! The plugin manager is an injected capability rather than a global, so the
//! executor can run against a test double.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::ActionOutcome;
use crate::config::PluginConfig;

/// Capability exposed by the plugin manager
#[async_trait]
pub trait PluginHost: Send + Sync {
    /// Invoke an action provided by an installed plugin. `params` is passed
    /// through verbatim, including when omitted.
    async fn call_action(
        &self,
        plugin_id: &str,
        action_id: &str,
        params: Option<Value>,
    ) -> Result<Value>;
}

/// A host with no plugins installed; every call fails
pub struct NullPluginHost;

#[async_trait]
impl PluginHost for NullPluginHost {
    async fn call_action(
        &self,
        plugin_id: &str,
        _action_id: &str,
        _params: Option<Value>,
    ) -> Result<Value> {
        anyhow::bail!("Plugin {} is not installed", plugin_id)
    }
}

/// Delegate to the plugin host. Missing ids fail locally without touching
/// the host; host errors are caught and stringified.
pub async fn execute(config: &PluginConfig, host: &dyn PluginHost) -> ActionOutcome {
    let (Some(plugin_id), Some(action_id)) = (
        config.plugin_id.as_deref().filter(|s| !s.trim().is_empty()),
        config.action_id.as_deref().filter(|s| !s.trim().is_empty()),
    ) else {
        return ActionOutcome::failure(json!({"error": "Missing pluginId or actionId"}));
    };

    debug!(plugin_id, action_id, "Executing plugin action");

    match host
        .call_action(plugin_id, action_id, config.params.clone())
        .await
    {
        Ok(result) => ActionOutcome::success(result),
        Err(e) => ActionOutcome::failure(json!({"error": e.to_string()})),
    }
}
