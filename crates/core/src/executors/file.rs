//! `file.read` action: sandboxed file reads.
//!
//! Security-critical: a path must not contain traversal segments and must
//! resolve (through symlinks) into one of the allowed directories. Callers
//! pattern-match on the "traversal" and "outside allowed directories" message
//! substrings as a policy boundary, so those stay stable.

use std::path::{Component, Path, PathBuf};

use base64::Engine as _;
use serde_json::json;
use tracing::{debug, warn};

use super::ActionOutcome;
use crate::config::FileReadConfig;

/// Directories the file executor may read from
#[derive(Debug, Clone)]
pub struct FileAccessPolicy {
    pub allowed_dirs: Vec<PathBuf>,
}

impl FileAccessPolicy {
    pub fn new(allowed_dirs: Vec<PathBuf>) -> Self {
        Self { allowed_dirs }
    }
}

impl Default for FileAccessPolicy {
    /// The application's user-data directory plus the OS temp directory
    fn default() -> Self {
        let mut allowed_dirs = Vec::new();
        if let Some(data_dir) = dirs::data_dir() {
            allowed_dirs.push(data_dir.join("relay"));
        }
        allowed_dirs.push(std::env::temp_dir());
        Self { allowed_dirs }
    }
}

/// Read the configured file after enforcing the access policy.
pub async fn execute(config: &FileReadConfig, policy: &FileAccessPolicy) -> ActionOutcome {
    let Some(path) = config.path.as_deref().filter(|p| !p.trim().is_empty()) else {
        return ActionOutcome::failure(json!({"error": "File read action requires a path"}));
    };
    let encoding = config.encoding();

    // Rejected before any resolution so `..` can never influence the lookup
    let requested = Path::new(path);
    if requested
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        warn!(path, "Rejected file read with traversal segment");
        return ActionOutcome::failure(json!({
            "error": format!("Path {} contains a traversal segment", path),
        }));
    }

    let allowed: Vec<PathBuf> = match &config.allowed_dirs {
        Some(dirs) => dirs.iter().map(PathBuf::from).collect(),
        None => policy.allowed_dirs.clone(),
    };

    // Resolve symlinks so a link inside an allowed root cannot point out of
    // it; unresolvable paths fall back to their normalized absolute form and
    // fail the read itself later.
    let absolute = absolutize(requested);
    let resolved = match tokio::fs::canonicalize(&absolute).await {
        Ok(resolved) => resolved,
        Err(_) => normalize(&absolute),
    };

    let mut permitted = false;
    for root in &allowed {
        let root = match tokio::fs::canonicalize(root).await {
            Ok(root) => root,
            Err(_) => normalize(root),
        };
        if resolved.starts_with(&root) {
            permitted = true;
            break;
        }
    }
    if !permitted {
        warn!(path = %resolved.display(), "Rejected file read outside allowed roots");
        return ActionOutcome::failure(json!({
            "error": format!("Path {} is outside allowed directories", resolved.display()),
        }));
    }

    debug!(path = %resolved.display(), encoding, "Reading file");

    match tokio::fs::read(&resolved).await {
        Ok(bytes) => {
            let size = bytes.len();
            let content = match encoding {
                "base64" => base64::engine::general_purpose::STANDARD.encode(&bytes),
                _ => String::from_utf8_lossy(&bytes).into_owned(),
            };
            ActionOutcome::success(json!({
                "content": content,
                "size": size,
                "encoding": encoding,
            }))
        }
        Err(e) => {
            let message = e.to_string();
            let message = if message.is_empty() {
                "Unknown file error".to_string()
            } else {
                message
            };
            ActionOutcome::failure(json!({"content": message, "size": 0}))
        }
    }
}

fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("/"))
            .join(path)
    }
}

/// Lexical normalization: drops `.` segments. `..` never reaches this point.
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}
