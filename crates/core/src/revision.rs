//! Deploy identifier resolution
//!
//! The revision sent with every envelope comes from, in order: explicit
//! configuration, the first non-blank platform variable in
//! [`DEPLOY_ID_ENV_VARS`], or an identifier generated once per process.

use once_cell::sync::Lazy;
use uuid::Uuid;
use vigil_domain::constants::DEPLOY_ID_ENV_VARS;

static PROCESS_DEPLOY_ID: Lazy<String> = Lazy::new(|| Uuid::new_v4().to_string());

/// Identifier generated on first use and stable for the process lifetime
pub fn process_deploy_id() -> &'static str {
    PROCESS_DEPLOY_ID.as_str()
}

/// Resolve the deploy id using `lookup` to read variables.
pub fn resolve_deploy_id<F>(explicit: Option<&str>, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(id) = explicit.map(str::trim).filter(|id| !id.is_empty()) {
        return id.to_string();
    }

    DEPLOY_ID_ENV_VARS
        .iter()
        .filter_map(|name| lookup(name))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .unwrap_or_else(|| process_deploy_id().to_string())
}

/// Resolve the deploy id from the process environment.
pub fn deploy_id(explicit: Option<&str>) -> String {
    resolve_deploy_id(explicit, |name| std::env::var(name).ok())
}
