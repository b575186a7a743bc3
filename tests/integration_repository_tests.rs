//! Integration store, OAuth state and time-entry link tests

#[path = "test_utils/mod.rs"]
mod test_utils;

use anyhow::Result;
use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, Set};
use serde_json::json;
use test_utils::*;
use timetrack::models::{oauth_state, time_entry_mapping, user::Role};
use timetrack::providers::OAuthTokens;
use timetrack::repositories::{
    ActivityRepository, ConnectParams, IntegrationRepository, NewTimeEntry, OAuthStateRepository,
    StateLookup, generate_state,
};
use uuid::Uuid;

fn tokens(access: &str) -> OAuthTokens {
    OAuthTokens {
        access_token: access.to_string(),
        refresh_token: Some(format!("{access}-refresh")),
        expires_in: Some(3600),
        token_type: "Bearer".to_string(),
        scope: None,
    }
}

#[tokio::test]
async fn reconnect_updates_the_same_row() -> Result<()> {
    let db = setup_test_db().await?;
    let key = test_key();
    let org = create_org_with_user(&db, None, Role::Admin, true).await?;
    let repo = IntegrationRepository::new(db.clone(), key.clone());

    let params = |access: &str| ConnectParams {
        organization_id: org.org_id,
        provider: STUB_PROVIDER.to_string(),
        tokens: tokens(access),
        provider_account_id: Some("acct-1".to_string()),
        metadata: Some(json!({"providerUser": {"id": "u1"}})),
        user_id: None,
    };

    let first = repo.connect(params("tok_one")).await?;
    assert!(repo.disconnect(org.org_id, first.id).await?);
    let second = repo.connect(params("tok_two")).await?;

    assert_eq!(first.id, second.id);
    assert!(second.is_active);
    assert!(second.token_expires_at.is_some());
    assert_eq!(repo.access_token(&second)?, "tok_two");
    assert_ne!(second.access_token_ciphertext, b"tok_two".to_vec());
    assert_eq!(repo.list_for_organization(org.org_id).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn tokens_do_not_decrypt_under_another_key() -> Result<()> {
    let db = setup_test_db().await?;
    let org = create_org_with_user(&db, None, Role::Admin, true).await?;
    let integration = connect_integration(&db, &test_key(), org.org_id, STUB_PROVIDER).await?;

    let other = timetrack::crypto::CryptoKey::new(vec![9u8; 32])?;
    let repo = IntegrationRepository::new(db.clone(), other);
    assert!(repo.access_token(&integration).is_err());
    Ok(())
}

#[tokio::test]
async fn integrations_are_scoped_to_their_organization() -> Result<()> {
    let db = setup_test_db().await?;
    let key = test_key();
    let org = create_org_with_user(&db, None, Role::Admin, true).await?;
    let other = create_org_with_user(&db, None, Role::Admin, true).await?;
    let integration = connect_integration(&db, &key, org.org_id, STUB_PROVIDER).await?;

    let repo = IntegrationRepository::new(db.clone(), key);
    assert!(repo.get_by_id(other.org_id, integration.id).await?.is_none());
    assert!(!repo.disconnect(other.org_id, integration.id).await?);
    assert!(repo.get_by_id(org.org_id, integration.id).await?.is_some());
    Ok(())
}

#[tokio::test]
async fn config_values_upsert_by_key() -> Result<()> {
    let db = setup_test_db().await?;
    let key = test_key();
    let org = create_org_with_user(&db, None, Role::Admin, true).await?;
    let integration = connect_integration(&db, &key, org.org_id, STUB_PROVIDER).await?;
    let repo = IntegrationRepository::new(db.clone(), key);

    repo.set_config(integration.id, "defaultWorkspace", json!("c000"))
        .await?;
    repo.set_config(integration.id, "defaultWorkspace", json!("c001"))
        .await?;
    repo.set_config(integration.id, "billable", json!(true)).await?;

    assert_eq!(
        repo.get_config(integration.id, "defaultWorkspace").await?,
        Some(json!("c001"))
    );
    assert_eq!(repo.get_config(integration.id, "missing").await?, None);

    let all = repo.all_config(integration.id).await?;
    assert_eq!(all.len(), 2);
    Ok(())
}

#[tokio::test]
async fn time_entry_link_syncs_through_provider() -> Result<()> {
    let db = setup_test_db().await?;
    let key = test_key();
    let org = create_org_with_user(&db, None, Role::Employee, false).await?;
    let integration = connect_integration(&db, &key, org.org_id, STUB_PROVIDER).await?;
    let now = Utc::now();
    let entry = ActivityRepository::new(db.clone())
        .create_time_entry(NewTimeEntry {
            user_id: org.user_id,
            start_time: now - Duration::minutes(30),
            end_time: Some(now),
            activity_percentage: 80.0,
            mouse_clicks: 0,
            keyboard_strokes: 0,
        })
        .await?;
    let repo = IntegrationRepository::new(db.clone(), key);

    let link = repo
        .link_time_entry(entry.id, integration.id, "c000-p000-l000-t000")
        .await?;
    assert_eq!(link.sync_status, time_entry_mapping::STATUS_PENDING);

    // Relinking replaces the task on the same mapping
    let relinked = repo
        .link_time_entry(entry.id, integration.id, "c000-p000-l000-t001")
        .await?;
    assert_eq!(relinked.id, link.id);

    let registry = stub_registry(StubProvider::new(1, 1, 1, 2));
    let synced = repo.sync_time_entry(&registry, link.id).await?;
    assert_eq!(synced.sync_status, time_entry_mapping::STATUS_SYNCED);
    assert_eq!(synced.external_entry_id.as_deref(), Some("entry-1"));
    assert_eq!(synced.external_task_id, "c000-p000-l000-t001");
    assert!(synced.synced_at.is_some());
    Ok(())
}

#[tokio::test]
async fn time_entry_sync_fails_when_integration_inactive() -> Result<()> {
    let db = setup_test_db().await?;
    let key = test_key();
    let org = create_org_with_user(&db, None, Role::Employee, false).await?;
    let integration = connect_integration(&db, &key, org.org_id, STUB_PROVIDER).await?;
    let entry = ActivityRepository::new(db.clone())
        .create_time_entry(NewTimeEntry {
            user_id: org.user_id,
            start_time: Utc::now(),
            end_time: None,
            activity_percentage: 0.0,
            mouse_clicks: 0,
            keyboard_strokes: 0,
        })
        .await?;
    let repo = IntegrationRepository::new(db.clone(), key);
    let link = repo.link_time_entry(entry.id, integration.id, "t").await?;
    repo.disconnect(org.org_id, integration.id).await?;

    let registry = stub_registry(StubProvider::new(0, 0, 0, 0));
    assert!(repo.sync_time_entry(&registry, link.id).await.is_err());
    Ok(())
}

#[tokio::test]
async fn oauth_state_is_single_use() -> Result<()> {
    let db = setup_test_db().await?;
    let repo = OAuthStateRepository::new(db.clone());
    let state = generate_state();
    let org_id = Uuid::new_v4();

    repo.create(&state, STUB_PROVIDER, Some(org_id), None).await?;

    match repo.consume(&state).await? {
        StateLookup::Valid(found) => {
            assert_eq!(found.provider, STUB_PROVIDER);
            assert_eq!(found.organization_id, Some(org_id));
        }
        other => panic!("expected valid state, got {other:?}"),
    }
    assert_eq!(repo.consume(&state).await?, StateLookup::Unknown);
    Ok(())
}

#[tokio::test]
async fn expired_oauth_state_is_rejected_and_removed() -> Result<()> {
    let db = setup_test_db().await?;
    let repo = OAuthStateRepository::new(db.clone());
    let state = generate_state();
    let past = Utc::now() - Duration::minutes(30);

    oauth_state::ActiveModel {
        id: Set(Uuid::new_v4()),
        state: Set(state.clone()),
        provider: Set(STUB_PROVIDER.to_string()),
        organization_id: Set(None),
        user_id: Set(None),
        expires_at: Set(past.into()),
        created_at: Set(past.into()),
    }
    .insert(&db)
    .await?;

    assert_eq!(repo.consume(&state).await?, StateLookup::Expired);
    assert_eq!(repo.consume(&state).await?, StateLookup::Unknown);
    assert_eq!(repo.cleanup_expired().await?, 0);
    Ok(())
}

#[test]
fn generated_states_are_url_safe_and_distinct() {
    let a = generate_state();
    let b = generate_state();
    assert_ne!(a, b);
    assert_eq!(a.len(), 43);
    assert!(
        a.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    );
}
