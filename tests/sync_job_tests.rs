//! Background sync job handlers: ClickUp project refresh and resource mirror

#[path = "test_utils/mod.rs"]
mod test_utils;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde_json::json;
use test_utils::*;
use timetrack::jobs::{
    self, ClickUpSyncHandler, ClickUpSyncJob, FailureKind, JobHandler, QueuePolicy,
    ResourceSyncHandler, ResourceSyncJob,
};
use timetrack::models::user::Role;
use timetrack::providers::{
    ClickUpConfig, ClickUpProvider, ProviderMetadata, Registry, clickup::DEFAULT_AUTH_BASE,
};
use timetrack::repositories::{ClickUpRepository, JobRepository, SyncedResourceRepository};
use timetrack::sync::{SmartSyncService, cache::LevelCache};
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn clickup_registry(server: &MockServer) -> Arc<Registry> {
    let provider = ClickUpProvider::new(ClickUpConfig {
        client_id: "cid".to_string(),
        client_secret: "secret".to_string(),
        api_base: server.uri(),
        auth_base: DEFAULT_AUTH_BASE.to_string(),
    });
    let mut registry = Registry::new();
    registry.register(Arc::new(provider), ProviderMetadata::clickup(true));
    Arc::new(registry)
}

async fn mount_json(server: &MockServer, route: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn clickup_sync_inserts_new_lists_and_keeps_existing_rows() -> Result<()> {
    let db = setup_test_db().await?;
    let key = test_key();
    let org = create_org_with_user(&db, None, Role::Admin, true).await?;
    let clickup = ClickUpRepository::new(db.clone(), key.clone());
    let workspace = clickup
        .upsert_workspace(org.org_id, "team-1", "Team", "pk_token")
        .await?;
    clickup
        .insert_project_if_absent(workspace.id, "list-2", "Renamed locally", None, None)
        .await?;

    let server = MockServer::start().await;
    mount_json(
        &server,
        "/team/team-1/space",
        json!({"spaces": [{"id": "space-a", "name": "A"}, {"id": "space-b", "name": "B"}]}),
    )
    .await;
    mount_json(
        &server,
        "/space/space-a/list",
        json!({"lists": [
            {"id": "list-1", "name": "List One", "color": "#ff0000"},
            {"id": "list-2", "name": "List Two"}
        ]}),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/space/space-b/list"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"err": "boom"})))
        .mount(&server)
        .await;

    let handler = ClickUpSyncHandler::new(db.clone(), key, clickup_registry(&server));
    let queued = jobs::enqueue(
        &JobRepository::new(db.clone()),
        &QueuePolicy::clickup_sync(),
        &ClickUpSyncJob {
            workspace_id: workspace.id,
            organization_id: org.org_id,
        },
    )
    .await?;

    // The failing space is skipped rather than failing the job
    handler.handle(&queued).await.map_err(anyhow::Error::msg)?;

    let projects = clickup.list_projects(workspace.id).await?;
    let by_id = |id: &str| projects.iter().find(|p| p.project_id == id);
    assert_eq!(projects.len(), 2);
    assert_eq!(by_id("list-1").map(|p| p.name.as_str()), Some("List One"));
    assert_eq!(
        by_id("list-1").and_then(|p| p.color.as_deref()),
        Some("#ff0000")
    );
    assert_eq!(
        by_id("list-2").map(|p| p.name.as_str()),
        Some("Renamed locally")
    );

    let refreshed = clickup
        .find_workspace(org.org_id, workspace.id)
        .await?
        .expect("workspace");
    assert!(refreshed.last_synced_at.is_some());
    Ok(())
}

#[tokio::test]
async fn clickup_sync_of_unknown_workspace_fails_permanently() -> Result<()> {
    let db = setup_test_db().await?;
    let server = MockServer::start().await;
    let handler = ClickUpSyncHandler::new(db.clone(), test_key(), clickup_registry(&server));
    let queued = jobs::enqueue(
        &JobRepository::new(db.clone()),
        &QueuePolicy::clickup_sync(),
        &ClickUpSyncJob {
            workspace_id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
        },
    )
    .await?;

    let failure = handler.handle(&queued).await.expect_err("unknown workspace");
    assert_eq!(failure.kind, FailureKind::Permanent);
    assert!(!failure.is_retryable());
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
    Ok(())
}

#[tokio::test]
async fn resource_sync_job_fills_the_mirror() -> Result<()> {
    let db = setup_test_db().await?;
    let key = test_key();
    let org = create_org_with_user(&db, None, Role::Admin, true).await?;
    let integration = connect_integration(&db, &key, org.org_id, STUB_PROVIDER).await?;
    let handler = ResourceSyncHandler::new(SmartSyncService::new(
        db.clone(),
        key,
        stub_registry(StubProvider::new(1, 2, 1, 3)),
        Arc::new(LevelCache::new(Duration::from_secs(300))),
    ));

    let queued = jobs::enqueue(
        &JobRepository::new(db.clone()),
        &QueuePolicy::resource_sync(),
        &ResourceSyncJob {
            integration_id: integration.id,
            organization_id: org.org_id,
            full: true,
        },
    )
    .await?;
    handler.handle(&queued).await.map_err(anyhow::Error::msg)?;

    let stored = SyncedResourceRepository::new(db.clone())
        .count_for_integration(org.org_id, integration.id)
        .await?;
    // 1 container, 2 projects, 2 lists, 6 tasks
    assert_eq!(stored, 11);

    // An integration from another organization is not found
    let foreign = jobs::enqueue(
        &JobRepository::new(db.clone()),
        &QueuePolicy::resource_sync(),
        &ResourceSyncJob {
            integration_id: integration.id,
            organization_id: Uuid::new_v4(),
            full: false,
        },
    )
    .await?;
    let failure = handler.handle(&foreign).await.expect_err("scoped lookup");
    assert_eq!(failure.kind, FailureKind::Permanent);
    Ok(())
}
