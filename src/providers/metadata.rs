//! Provider metadata types
//!
//! Static descriptors used for discovery, rendered by `GET /api/providers`.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Capabilities a provider offers to the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProviderFeatures {
    pub time_tracking: bool,
    pub tasks: bool,
    pub projects: bool,
    pub workspaces: bool,
}

/// Metadata about a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProviderMetadata {
    /// Unique identifier, e.g. `clickup`
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub icon: String,
    /// Brand color as a hex string
    pub color: String,
    pub features: ProviderFeatures,
    /// Environment variables that must be set for the provider to be enabled
    pub required_env_vars: Vec<String>,
    pub is_enabled: bool,
}

impl ProviderMetadata {
    pub fn clickup(is_enabled: bool) -> Self {
        Self {
            name: "clickup".to_string(),
            display_name: "ClickUp".to_string(),
            description: "Sync time entries with ClickUp tasks".to_string(),
            icon: "clickup".to_string(),
            color: "#7B68EE".to_string(),
            features: ProviderFeatures {
                time_tracking: true,
                tasks: true,
                projects: true,
                workspaces: true,
            },
            required_env_vars: vec![
                "TIMETRACK_CLICKUP_CLIENT_ID".to_string(),
                "TIMETRACK_CLICKUP_CLIENT_SECRET".to_string(),
            ],
            is_enabled,
        }
    }

    /// Listed for discovery; no adapter exists yet so these are never enabled.
    pub fn planned() -> Vec<Self> {
        let planned = |name: &str, display: &str, description: &str, color: &str| Self {
            name: name.to_string(),
            display_name: display.to_string(),
            description: description.to_string(),
            icon: name.to_string(),
            color: color.to_string(),
            features: ProviderFeatures {
                time_tracking: true,
                tasks: true,
                projects: true,
                workspaces: true,
            },
            required_env_vars: vec![
                format!("TIMETRACK_{}_CLIENT_ID", name.to_uppercase()),
                format!("TIMETRACK_{}_CLIENT_SECRET", name.to_uppercase()),
            ],
            is_enabled: false,
        };
        vec![
            planned("asana", "Asana", "Track time against Asana tasks", "#F06A6A"),
            planned("jira", "Jira", "Log work on Jira issues", "#0052CC"),
            planned("linear", "Linear", "Track time on Linear issues", "#5E6AD2"),
        ]
    }
}
