//! Provider trait definition
//!
//! Defines the capability contract every time-tracking provider adapter
//! implements, along with the shared DTOs and the uniform error taxonomy.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use url::Url;
use utoipa::ToSchema;

use crate::models::synced_resource::ResourceType;

/// Failures surfaced by provider adapters, independent of the provider.
///
/// Adapters never retry; callers decide based on [`IntegrationError::is_retryable`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrationError {
    /// 401 from the provider or a failed code exchange
    #[error("{provider} authentication failed: {message}")]
    Authentication { provider: String, message: String },

    /// 429 from the provider
    #[error("{provider} rate limit exceeded")]
    RateLimit {
        provider: String,
        retry_after: Option<u64>,
    },

    /// 404 from the provider
    #[error("{resource_type} '{id}' not found on {provider}")]
    NotFound {
        provider: String,
        resource_type: String,
        id: String,
    },

    /// Any other provider-side failure
    #[error("{provider} error: {message}")]
    Provider {
        provider: String,
        message: String,
        code: Option<String>,
        status: Option<u16>,
        body: Option<String>,
    },

    #[error("network error talking to {provider}: {message}")]
    Network { provider: String, message: String },

    #[error("malformed response from {provider}: {message}")]
    MalformedResponse { provider: String, message: String },
}

impl IntegrationError {
    pub fn provider(&self) -> &str {
        match self {
            IntegrationError::Authentication { provider, .. }
            | IntegrationError::RateLimit { provider, .. }
            | IntegrationError::NotFound { provider, .. }
            | IntegrationError::Provider { provider, .. }
            | IntegrationError::Network { provider, .. }
            | IntegrationError::MalformedResponse { provider, .. } => provider,
        }
    }

    /// Whether repeating the same call later could succeed.
    ///
    /// Authentication and not-found failures need user action; provider errors
    /// are retryable only for 5xx statuses.
    pub fn is_retryable(&self) -> bool {
        match self {
            IntegrationError::RateLimit { .. } | IntegrationError::Network { .. } => true,
            IntegrationError::Provider { status, .. } => {
                matches!(status, Some(code) if *code >= 500)
            }
            IntegrationError::Authentication { .. }
            | IntegrationError::NotFound { .. }
            | IntegrationError::MalformedResponse { .. } => false,
        }
    }

    pub fn retry_after(&self) -> Option<u64> {
        match self {
            IntegrationError::RateLimit { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Generic error without an HTTP status, e.g. an unsupported operation.
    pub fn unsupported(provider: &str, message: &str) -> Self {
        IntegrationError::Provider {
            provider: provider.to_string(),
            message: message.to_string(),
            code: None,
            status: None,
            body: None,
        }
    }
}

/// Tokens returned by a code exchange or refresh
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Lifetime in seconds, when the provider reports one
    pub expires_in: Option<i64>,
    pub token_type: String,
    pub scope: Option<String>,
}

/// Identity of the account that authorized the connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProviderUser {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

/// One node of a provider's hierarchy as returned by a fetch call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalResource {
    pub id: String,
    pub name: String,
    /// Provider's own name for the kind (ClickUp: `team`, `space`, `list`, `task`)
    pub provider_type: String,
    pub status: Option<String>,
    pub color: Option<String>,
    pub metadata: Option<JsonValue>,
}

/// Generic time entry pushed to a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeEntryInput {
    pub task_id: String,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    /// Explicit duration in milliseconds; derived from start/end when absent
    pub duration_ms: Option<i64>,
    pub description: Option<String>,
    pub billable: bool,
}

impl TimeEntryInput {
    pub fn effective_duration_ms(&self) -> i64 {
        self.duration_ms.unwrap_or_else(|| {
            self.end
                .map(|end| (end - self.start).num_milliseconds().max(0))
                .unwrap_or(0)
        })
    }
}

/// Time entry as stored by the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalTimeEntry {
    pub id: String,
    pub task_id: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
}

/// Which generic levels a provider exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HierarchySupport {
    pub containers: bool,
    pub projects: bool,
    pub collections: bool,
    pub sub_collections: bool,
}

/// Display names of the generic levels in the provider's vocabulary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HierarchyLabels {
    pub container: String,
    pub project: String,
    pub collection: String,
    pub task: String,
}

/// Static capability descriptor consumed by the sync engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceHierarchy {
    pub supports: HierarchySupport,
    pub labels: HierarchyLabels,
    /// Deepest level index a resource can have (tasks sit at 3)
    pub max_depth: u8,
}

impl ResourceHierarchy {
    pub fn supports(&self, resource_type: ResourceType) -> bool {
        match resource_type {
            ResourceType::Container => self.supports.containers,
            ResourceType::Project => self.supports.projects,
            ResourceType::Collection => self.supports.collections,
            ResourceType::Task => true,
        }
    }
}

/// Uniform capability contract implemented once per provider.
#[async_trait]
pub trait TimeTrackingProvider: Send + Sync {
    /// Provider identifier, e.g. `clickup`
    fn id(&self) -> &'static str;

    /// Builds the authorize URL; `state` is echoed back verbatim by the provider.
    fn auth_url(&self, state: &str, redirect_uri: &str) -> Result<Url, IntegrationError>;

    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<OAuthTokens, IntegrationError>;

    async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<OAuthTokens, IntegrationError>;

    async fn fetch_workspaces(
        &self,
        access_token: &str,
    ) -> Result<Vec<ExternalResource>, IntegrationError>;

    async fn fetch_projects(
        &self,
        access_token: &str,
        workspace_id: &str,
    ) -> Result<Vec<ExternalResource>, IntegrationError>;

    async fn fetch_collections(
        &self,
        access_token: &str,
        project_id: &str,
    ) -> Result<Vec<ExternalResource>, IntegrationError>;

    async fn fetch_tasks(
        &self,
        access_token: &str,
        collection_id: &str,
    ) -> Result<Vec<ExternalResource>, IntegrationError>;

    async fn create_time_entry(
        &self,
        access_token: &str,
        entry: &TimeEntryInput,
    ) -> Result<ExternalTimeEntry, IntegrationError>;

    async fn update_time_entry(
        &self,
        access_token: &str,
        entry_id: &str,
        entry: &TimeEntryInput,
    ) -> Result<ExternalTimeEntry, IntegrationError>;

    async fn delete_time_entry(
        &self,
        access_token: &str,
        entry_id: &str,
    ) -> Result<(), IntegrationError>;

    /// `Ok(false)` when the provider rejects the token.
    async fn validate_token(&self, access_token: &str) -> Result<bool, IntegrationError> {
        match self.current_user(access_token).await {
            Ok(_) => Ok(true),
            Err(IntegrationError::Authentication { .. }) => Ok(false),
            Err(other) => Err(other),
        }
    }

    async fn current_user(&self, access_token: &str) -> Result<ProviderUser, IntegrationError>;

    fn hierarchy(&self) -> ResourceHierarchy;

    /// Fetches the children of `parent_external_id` at the given level.
    async fn fetch_level(
        &self,
        access_token: &str,
        resource_type: ResourceType,
        parent_external_id: Option<&str>,
    ) -> Result<Vec<ExternalResource>, IntegrationError> {
        match (resource_type, parent_external_id) {
            (ResourceType::Container, _) => self.fetch_workspaces(access_token).await,
            (ResourceType::Project, Some(parent)) => {
                self.fetch_projects(access_token, parent).await
            }
            (ResourceType::Collection, Some(parent)) => {
                self.fetch_collections(access_token, parent).await
            }
            (ResourceType::Task, Some(parent)) => self.fetch_tasks(access_token, parent).await,
            (other, None) => Err(IntegrationError::unsupported(
                self.id(),
                &format!("{other} resources require a parent"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn retryability_by_kind() {
        let rate = IntegrationError::RateLimit {
            provider: "clickup".into(),
            retry_after: Some(30),
        };
        assert!(rate.is_retryable());
        assert_eq!(rate.retry_after(), Some(30));

        let auth = IntegrationError::Authentication {
            provider: "clickup".into(),
            message: "expired".into(),
        };
        assert!(!auth.is_retryable());

        let server = IntegrationError::Provider {
            provider: "clickup".into(),
            message: "oops".into(),
            code: None,
            status: Some(503),
            body: None,
        };
        assert!(server.is_retryable());
        assert!(!IntegrationError::unsupported("clickup", "no refresh").is_retryable());
    }

    #[test]
    fn duration_falls_back_to_interval() {
        let start = Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap();
        let entry = TimeEntryInput {
            task_id: "t1".into(),
            start,
            end: Some(start + chrono::Duration::minutes(30)),
            duration_ms: None,
            description: None,
            billable: false,
        };
        assert_eq!(entry.effective_duration_ms(), 30 * 60 * 1000);

        let explicit = TimeEntryInput {
            duration_ms: Some(1234),
            ..entry
        };
        assert_eq!(explicit.effective_duration_ms(), 1234);
    }
}
