//! ClickUp provider adapter
//!
//! Maps the generic hierarchy onto ClickUp's REST API v2:
//! Workspace (team) → Space → List → Task. ClickUp tokens do not expire and
//! are sent raw in the `Authorization` header.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value as JsonValue, json};
use tracing::{debug, warn};
use url::Url;

use super::trait_::{
    ExternalResource, ExternalTimeEntry, HierarchyLabels, HierarchySupport, IntegrationError,
    OAuthTokens, ProviderUser, ResourceHierarchy, TimeEntryInput, TimeTrackingProvider,
};

pub const CLICKUP_PROVIDER: &str = "clickup";
pub const DEFAULT_API_BASE: &str = "https://api.clickup.com/api/v2";
pub const DEFAULT_AUTH_BASE: &str = "https://app.clickup.com/api";

#[derive(Debug, Clone)]
pub struct ClickUpConfig {
    pub client_id: String,
    pub client_secret: String,
    pub api_base: String,
    pub auth_base: String,
}

#[derive(Clone)]
pub struct ClickUpProvider {
    config: ClickUpConfig,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TeamsResponse {
    #[serde(default)]
    teams: Vec<ClickUpNode>,
}

#[derive(Debug, Deserialize)]
struct SpacesResponse {
    #[serde(default)]
    spaces: Vec<ClickUpNode>,
}

#[derive(Debug, Deserialize)]
struct ListsResponse {
    #[serde(default)]
    lists: Vec<ClickUpNode>,
}

#[derive(Debug, Deserialize)]
struct TasksResponse {
    #[serde(default)]
    tasks: Vec<ClickUpNode>,
}

/// Shared shape of teams, spaces, lists and tasks; only the fields we keep
#[derive(Debug, Deserialize)]
struct ClickUpNode {
    id: String,
    name: String,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    status: Option<JsonValue>,
    #[serde(default)]
    archived: Option<bool>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    due_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    user: ClickUpUser,
}

#[derive(Debug, Deserialize)]
struct ClickUpUser {
    id: JsonValue,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TimeEntryEnvelope {
    data: ClickUpTimeEntry,
}

#[derive(Debug, Deserialize)]
struct ClickUpTimeEntry {
    id: JsonValue,
    #[serde(default)]
    task: Option<JsonValue>,
    #[serde(default)]
    start: Option<JsonValue>,
    #[serde(default)]
    end: Option<JsonValue>,
    #[serde(default)]
    duration: Option<JsonValue>,
}

impl ClickUpProvider {
    pub fn new(config: ClickUpConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    pub fn config(&self) -> &ClickUpConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base.trim_end_matches('/'), path)
    }

    fn request(&self, method: Method, path: &str, access_token: &str) -> RequestBuilder {
        self.http
            .request(method, self.url(path))
            .header("Authorization", access_token)
            .header("Accept", "application/json")
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, IntegrationError> {
        let resp = builder.send().await.map_err(network_error)?;
        check_status(resp).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        access_token: &str,
    ) -> Result<T, IntegrationError> {
        debug!(provider = CLICKUP_PROVIDER, path, "GET");
        let resp = self
            .send(self.request(Method::GET, path, access_token))
            .await?;
        parse_json(resp).await
    }
}

fn network_error(err: reqwest::Error) -> IntegrationError {
    IntegrationError::Network {
        provider: CLICKUP_PROVIDER.to_string(),
        message: err.to_string(),
    }
}

async fn parse_json<T: DeserializeOwned>(resp: Response) -> Result<T, IntegrationError> {
    let bytes = resp.bytes().await.map_err(network_error)?;
    serde_json::from_slice(&bytes).map_err(|e| IntegrationError::MalformedResponse {
        provider: CLICKUP_PROVIDER.to_string(),
        message: e.to_string(),
    })
}

/// Converts non-success statuses into the uniform error taxonomy.
async fn check_status(resp: Response) -> Result<Response, IntegrationError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = retry_after_seconds(resp.headers(), Utc::now());
        warn!(provider = CLICKUP_PROVIDER, ?retry_after, "rate limited");
        return Err(IntegrationError::RateLimit {
            provider: CLICKUP_PROVIDER.to_string(),
            retry_after,
        });
    }

    let body = resp.text().await.unwrap_or_default();
    let parsed: Option<JsonValue> = serde_json::from_str(&body).ok();
    let message = parsed
        .as_ref()
        .and_then(|v| v.get("err"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
    let code = parsed
        .as_ref()
        .and_then(|v| v.get("ECODE"))
        .and_then(|v| v.as_str())
        .map(str::to_string);

    if status == StatusCode::UNAUTHORIZED {
        return Err(IntegrationError::Authentication {
            provider: CLICKUP_PROVIDER.to_string(),
            message,
        });
    }

    Err(IntegrationError::Provider {
        provider: CLICKUP_PROVIDER.to_string(),
        message,
        code,
        status: Some(status.as_u16()),
        body: if body.is_empty() { None } else { Some(body) },
    })
}

/// `Retry-After` seconds, else the distance to the `X-RateLimit-Reset` epoch.
fn retry_after_seconds(headers: &reqwest::header::HeaderMap, now: DateTime<Utc>) -> Option<u64> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.trim().parse::<i64>().ok())
    };
    if let Some(seconds) = header("Retry-After") {
        return u64::try_from(seconds).ok();
    }
    header("X-RateLimit-Reset").map(|reset| {
        // ClickUp reports the reset as a unix timestamp in seconds
        u64::try_from(reset - now.timestamp()).unwrap_or(0)
    })
}

fn status_label(status: &Option<JsonValue>) -> Option<String> {
    match status {
        Some(JsonValue::String(s)) => Some(s.clone()),
        Some(JsonValue::Object(map)) => map
            .get("status")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        _ => None,
    }
}

fn node_to_resource(node: ClickUpNode, provider_type: &str) -> ExternalResource {
    let status = status_label(&node.status);
    let mut metadata = serde_json::Map::new();
    if let Some(archived) = node.archived {
        metadata.insert("archived".into(), JsonValue::Bool(archived));
    }
    if let Some(url) = node.url {
        metadata.insert("url".into(), JsonValue::String(url));
    }
    if let Some(due) = node.due_date {
        metadata.insert("dueDate".into(), JsonValue::String(due));
    }
    ExternalResource {
        id: node.id,
        name: node.name,
        provider_type: provider_type.to_string(),
        status,
        color: node.color,
        metadata: if metadata.is_empty() {
            None
        } else {
            Some(JsonValue::Object(metadata))
        },
    }
}

/// ClickUp sends ids and millisecond timestamps as either strings or numbers.
fn json_to_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn json_to_millis(value: &Option<JsonValue>) -> Option<i64> {
    value
        .as_ref()
        .and_then(json_to_string)
        .and_then(|s| s.parse::<i64>().ok())
}

fn millis_to_datetime(ms: Option<i64>) -> Option<DateTime<Utc>> {
    ms.and_then(|ms| Utc.timestamp_millis_opt(ms).single())
}

fn to_external_entry(entry: ClickUpTimeEntry) -> Result<ExternalTimeEntry, IntegrationError> {
    let id = json_to_string(&entry.id).ok_or_else(|| IntegrationError::MalformedResponse {
        provider: CLICKUP_PROVIDER.to_string(),
        message: "time entry id missing".to_string(),
    })?;
    let task_id = entry.task.as_ref().and_then(|t| match t {
        JsonValue::Object(map) => map.get("id").and_then(json_to_string),
        other => json_to_string(other),
    });
    Ok(ExternalTimeEntry {
        id,
        task_id,
        start: millis_to_datetime(json_to_millis(&entry.start)),
        end: millis_to_datetime(json_to_millis(&entry.end)),
        duration_ms: json_to_millis(&entry.duration),
    })
}

fn time_entry_body(entry: &TimeEntryInput) -> JsonValue {
    let duration = entry.effective_duration_ms();
    let end = entry
        .end
        .map(|e| e.timestamp_millis())
        .unwrap_or_else(|| entry.start.timestamp_millis() + duration);
    json!({
        "start": entry.start.timestamp_millis(),
        "end": end,
        "duration": duration,
        "description": entry.description.clone().unwrap_or_default(),
        "billable": entry.billable,
    })
}

#[async_trait]
impl TimeTrackingProvider for ClickUpProvider {
    fn id(&self) -> &'static str {
        CLICKUP_PROVIDER
    }

    fn auth_url(&self, state: &str, redirect_uri: &str) -> Result<Url, IntegrationError> {
        let mut url = Url::parse(&self.config.auth_base).map_err(|e| {
            IntegrationError::unsupported(CLICKUP_PROVIDER, &format!("invalid auth base: {e}"))
        })?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("state", state);
        Ok(url)
    }

    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<OAuthTokens, IntegrationError> {
        let resp = self
            .http
            .post(self.url("/oauth/token"))
            .json(&json!({
                "client_id": self.config.client_id,
                "client_secret": self.config.client_secret,
                "code": code,
                "redirect_uri": redirect_uri,
            }))
            .send()
            .await
            .map_err(network_error)?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            warn!(provider = CLICKUP_PROVIDER, status = status.as_u16(), "code exchange failed");
            return Err(IntegrationError::Authentication {
                provider: CLICKUP_PROVIDER.to_string(),
                message: format!("token exchange failed with HTTP {}: {}", status.as_u16(), body),
            });
        }

        let token: TokenResponse = parse_json(resp).await?;
        Ok(OAuthTokens {
            access_token: token.access_token,
            refresh_token: None,
            expires_in: None,
            token_type: token.token_type.unwrap_or_else(|| "Bearer".to_string()),
            scope: None,
        })
    }

    async fn refresh_access_token(
        &self,
        _refresh_token: &str,
    ) -> Result<OAuthTokens, IntegrationError> {
        Err(IntegrationError::unsupported(
            CLICKUP_PROVIDER,
            "ClickUp tokens do not expire and cannot be refreshed",
        ))
    }

    async fn fetch_workspaces(
        &self,
        access_token: &str,
    ) -> Result<Vec<ExternalResource>, IntegrationError> {
        let body: TeamsResponse = self.get_json("/team", access_token).await?;
        Ok(body
            .teams
            .into_iter()
            .map(|n| node_to_resource(n, "team"))
            .collect())
    }

    async fn fetch_projects(
        &self,
        access_token: &str,
        workspace_id: &str,
    ) -> Result<Vec<ExternalResource>, IntegrationError> {
        let path = format!("/team/{workspace_id}/space?archived=false");
        let body: SpacesResponse = self.get_json(&path, access_token).await?;
        Ok(body
            .spaces
            .into_iter()
            .map(|n| node_to_resource(n, "space"))
            .collect())
    }

    async fn fetch_collections(
        &self,
        access_token: &str,
        project_id: &str,
    ) -> Result<Vec<ExternalResource>, IntegrationError> {
        let path = format!("/space/{project_id}/list?archived=false");
        let body: ListsResponse = self.get_json(&path, access_token).await?;
        Ok(body
            .lists
            .into_iter()
            .map(|n| node_to_resource(n, "list"))
            .collect())
    }

    async fn fetch_tasks(
        &self,
        access_token: &str,
        collection_id: &str,
    ) -> Result<Vec<ExternalResource>, IntegrationError> {
        let path = format!("/list/{collection_id}/task?archived=false");
        let body: TasksResponse = self.get_json(&path, access_token).await?;
        Ok(body
            .tasks
            .into_iter()
            .map(|n| node_to_resource(n, "task"))
            .collect())
    }

    async fn create_time_entry(
        &self,
        access_token: &str,
        entry: &TimeEntryInput,
    ) -> Result<ExternalTimeEntry, IntegrationError> {
        let path = format!("/task/{}/time", entry.task_id);
        let resp = self
            .send(
                self.request(Method::POST, &path, access_token)
                    .json(&time_entry_body(entry)),
            )
            .await?;
        let body: TimeEntryEnvelope = parse_json(resp).await?;
        let mut created = to_external_entry(body.data)?;
        created.task_id.get_or_insert_with(|| entry.task_id.clone());
        Ok(created)
    }

    async fn update_time_entry(
        &self,
        access_token: &str,
        entry_id: &str,
        entry: &TimeEntryInput,
    ) -> Result<ExternalTimeEntry, IntegrationError> {
        let path = format!("/team/time/{entry_id}");
        let mut body = time_entry_body(entry);
        body["tid"] = JsonValue::String(entry.task_id.clone());
        let resp = self
            .send(self.request(Method::PUT, &path, access_token).json(&body))
            .await?;
        let text = resp.text().await.map_err(network_error)?;
        // Update responses omit the entry on some accounts; fall back to the input.
        let parsed = serde_json::from_str::<TimeEntryEnvelope>(&text)
            .ok()
            .and_then(|env| to_external_entry(env.data).ok());
        Ok(parsed.unwrap_or_else(|| ExternalTimeEntry {
            id: entry_id.to_string(),
            task_id: Some(entry.task_id.clone()),
            start: Some(entry.start),
            end: entry.end,
            duration_ms: Some(entry.effective_duration_ms()),
        }))
    }

    async fn delete_time_entry(
        &self,
        access_token: &str,
        entry_id: &str,
    ) -> Result<(), IntegrationError> {
        let path = format!("/team/time/{entry_id}");
        match self
            .send(self.request(Method::DELETE, &path, access_token))
            .await
        {
            Ok(_) => Ok(()),
            Err(IntegrationError::Provider {
                status: Some(404), ..
            }) => Err(IntegrationError::NotFound {
                provider: CLICKUP_PROVIDER.to_string(),
                resource_type: "time entry".to_string(),
                id: entry_id.to_string(),
            }),
            Err(other) => Err(other),
        }
    }

    async fn current_user(&self, access_token: &str) -> Result<ProviderUser, IntegrationError> {
        let body: UserResponse = self.get_json("/user", access_token).await?;
        let id = json_to_string(&body.user.id).ok_or_else(|| {
            IntegrationError::MalformedResponse {
                provider: CLICKUP_PROVIDER.to_string(),
                message: "user id missing".to_string(),
            }
        })?;
        Ok(ProviderUser {
            id,
            name: body.user.username,
            email: body.user.email,
        })
    }

    fn hierarchy(&self) -> ResourceHierarchy {
        clickup_hierarchy()
    }
}

pub fn clickup_hierarchy() -> ResourceHierarchy {
    ResourceHierarchy {
        supports: HierarchySupport {
            containers: true,
            projects: true,
            collections: true,
            sub_collections: false,
        },
        labels: HierarchyLabels {
            container: "Workspace".to_string(),
            project: "Space".to_string(),
            collection: "List".to_string(),
            task: "Task".to_string(),
        },
        max_depth: 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> ClickUpProvider {
        ClickUpProvider::new(ClickUpConfig {
            client_id: "cid".to_string(),
            client_secret: "secret".to_string(),
            api_base: server.uri(),
            auth_base: DEFAULT_AUTH_BASE.to_string(),
        })
    }

    #[test]
    fn test_auth_url_shape() {
        let provider = ClickUpProvider::new(ClickUpConfig {
            client_id: "cid".to_string(),
            client_secret: "secret".to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            auth_base: DEFAULT_AUTH_BASE.to_string(),
        });
        let url = provider
            .auth_url("state-123", "https://app.test/api/integrations/clickup/callback")
            .unwrap();
        assert_eq!(url.host_str(), Some("app.clickup.com"));
        assert_eq!(url.path(), "/api");
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().collect();
        assert_eq!(pairs.get("client_id").unwrap(), "cid");
        assert_eq!(pairs.get("state").unwrap(), "state-123");
        assert_eq!(
            pairs.get("redirect_uri").unwrap(),
            "https://app.test/api/integrations/clickup/callback"
        );
    }

    #[tokio::test]
    async fn test_exchange_code_posts_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_partial_json(json!({"client_id": "cid", "code": "abc"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok_1"})),
            )
            .mount(&server)
            .await;

        let tokens = provider_for(&server)
            .exchange_code("abc", "https://app.test/cb")
            .await
            .unwrap();
        assert_eq!(tokens.access_token, "tok_1");
        assert!(tokens.refresh_token.is_none());
    }

    #[tokio::test]
    async fn test_exchange_code_failure_is_authentication() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({"err": "bad code"})))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .exchange_code("bad", "https://app.test/cb")
            .await
            .unwrap_err();
        assert!(matches!(err, IntegrationError::Authentication { .. }));
    }

    #[tokio::test]
    async fn test_fetch_workspaces_sends_raw_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/team"))
            .and(header("Authorization", "tok_1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "teams": [
                    {"id": "9001", "name": "Acme", "color": "#fff"},
                    {"id": "9002", "name": "Side Project"}
                ]
            })))
            .mount(&server)
            .await;

        let teams = provider_for(&server).fetch_workspaces("tok_1").await.unwrap();
        assert_eq!(teams.len(), 2);
        assert_eq!(teams[0].id, "9001");
        assert_eq!(teams[0].provider_type, "team");
        assert_eq!(teams[0].color.as_deref(), Some("#fff"));
    }

    #[tokio::test]
    async fn test_fetch_projects_excludes_archived() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/team/9001/space"))
            .and(query_param("archived", "false"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "spaces": [{"id": "s1", "name": "Engineering"}]
            })))
            .mount(&server)
            .await;

        let spaces = provider_for(&server)
            .fetch_projects("tok", "9001")
            .await
            .unwrap();
        assert_eq!(spaces.len(), 1);
        assert_eq!(spaces[0].provider_type, "space");
    }

    #[tokio::test]
    async fn test_fetch_tasks_keeps_status_label() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/list/l1/task"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "tasks": [{
                    "id": "t1",
                    "name": "Write docs",
                    "status": {"status": "in progress", "color": "#000"},
                    "url": "https://app.clickup.com/t/t1"
                }]
            })))
            .mount(&server)
            .await;

        let tasks = provider_for(&server).fetch_tasks("tok", "l1").await.unwrap();
        assert_eq!(tasks[0].status.as_deref(), Some("in progress"));
        assert_eq!(
            tasks[0].metadata.as_ref().unwrap()["url"],
            "https://app.clickup.com/t/t1"
        );
    }

    #[tokio::test]
    async fn test_unauthorized_maps_to_authentication() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/team"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(json!({"err": "Token invalid", "ECODE": "OAUTH_025"})),
            )
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let err = provider.fetch_workspaces("expired").await.unwrap_err();
        match err {
            IntegrationError::Authentication { message, .. } => {
                assert_eq!(message, "Token invalid")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rate_limit_carries_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/team"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "42"))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .fetch_workspaces("tok")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            IntegrationError::RateLimit {
                provider: "clickup".to_string(),
                retry_after: Some(42)
            }
        );
    }

    #[test]
    fn test_rate_limit_reset_header() {
        let now = Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap();
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "X-RateLimit-Reset",
            (now.timestamp() + 17).to_string().parse().unwrap(),
        );
        assert_eq!(retry_after_seconds(&headers, now), Some(17));

        headers.insert("Retry-After", "3".parse().unwrap());
        assert_eq!(retry_after_seconds(&headers, now), Some(3));

        assert_eq!(
            retry_after_seconds(&reqwest::header::HeaderMap::new(), now),
            None
        );
    }

    #[tokio::test]
    async fn test_provider_error_keeps_code_and_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/space/s1/list"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(json!({"err": "Internal", "ECODE": "ITEM_015"})),
            )
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .fetch_collections("tok", "s1")
            .await
            .unwrap_err();
        match &err {
            IntegrationError::Provider { code, status, .. } => {
                assert_eq!(code.as_deref(), Some("ITEM_015"));
                assert_eq!(*status, Some(500));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/team"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .fetch_workspaces("tok")
            .await
            .unwrap_err();
        assert!(matches!(err, IntegrationError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn test_create_time_entry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/task/t1/time"))
            .and(body_partial_json(json!({"duration": 1_800_000, "billable": true})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"data": {"id": 777}})),
            )
            .mount(&server)
            .await;

        let start = Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap();
        let entry = TimeEntryInput {
            task_id: "t1".to_string(),
            start,
            end: Some(start + chrono::Duration::minutes(30)),
            duration_ms: None,
            description: Some("pairing".to_string()),
            billable: true,
        };
        let created = provider_for(&server)
            .create_time_entry("tok", &entry)
            .await
            .unwrap();
        assert_eq!(created.id, "777");
        assert_eq!(created.task_id.as_deref(), Some("t1"));
    }

    #[tokio::test]
    async fn test_delete_missing_entry_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/team/time/404"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"err": "missing"})))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .delete_time_entry("tok", "404")
            .await
            .unwrap_err();
        assert!(matches!(err, IntegrationError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_validate_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .and(header("Authorization", "good"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "user": {"id": 42, "username": "ada", "email": "ada@example.com"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .and(header("Authorization", "bad"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        assert!(provider.validate_token("good").await.unwrap());
        assert!(!provider.validate_token("bad").await.unwrap());

        let user = provider.current_user("good").await.unwrap();
        assert_eq!(user.id, "42");
        assert_eq!(user.email.as_deref(), Some("ada@example.com"));
    }

    #[tokio::test]
    async fn test_refresh_is_unsupported() {
        let server = MockServer::start().await;
        let err = provider_for(&server)
            .refresh_access_token("anything")
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_hierarchy_labels() {
        let h = clickup_hierarchy();
        assert_eq!(h.max_depth, 3);
        assert_eq!(h.labels.container, "Workspace");
        assert!(!h.supports.sub_collections);
    }
}
