//! Integration repository for database operations
//!
//! Persists provider connections per organization (optionally per user) with
//! encrypted tokens, their key/value configuration, and time entry mappings.

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde_json::Value as JsonValue;
use tracing::{info, warn};
use uuid::Uuid;

use crate::crypto::{CryptoKey, decrypt_token, encrypt_integration_tokens, integration_aad};
use crate::models::integration::{self, Entity as Integration, owner_key};
use crate::models::integration_config::{self, Entity as IntegrationConfig};
use crate::models::time_entry::Entity as TimeEntry;
use crate::models::time_entry_mapping::{self, Entity as TimeEntryMapping};
use crate::providers::{OAuthTokens, Registry, TimeEntryInput};

/// Input for [`IntegrationRepository::connect`]
#[derive(Debug, Clone)]
pub struct ConnectParams {
    pub organization_id: Uuid,
    pub provider: String,
    pub tokens: OAuthTokens,
    pub provider_account_id: Option<String>,
    pub metadata: Option<JsonValue>,
    pub user_id: Option<Uuid>,
}

/// Repository for integration database operations
#[derive(Debug, Clone)]
pub struct IntegrationRepository {
    db: DatabaseConnection,
    crypto_key: CryptoKey,
}

impl IntegrationRepository {
    pub fn new(db: DatabaseConnection, crypto_key: CryptoKey) -> Self {
        Self { db, crypto_key }
    }

    /// Creates or refreshes the integration for `(organization, provider, owner)`.
    ///
    /// A single `INSERT .. ON CONFLICT DO UPDATE`; reconnecting overwrites the
    /// tokens and metadata and reactivates a disconnected row.
    pub async fn connect(&self, params: ConnectParams) -> Result<integration::Model> {
        let owner = owner_key(params.user_id);
        let aad = integration_aad(params.organization_id, &params.provider, &owner);
        let (access, refresh) = encrypt_integration_tokens(
            &self.crypto_key,
            &aad,
            &params.tokens.access_token,
            params.tokens.refresh_token.as_deref(),
        )
        .map_err(|e| anyhow!("Token encryption failed: {}", e))?;

        let now = Utc::now();
        let expires_at = params
            .tokens
            .expires_in
            .map(|secs| (now + chrono::Duration::seconds(secs)).into());

        let row = integration::ActiveModel {
            id: Set(Uuid::new_v4()),
            organization_id: Set(params.organization_id),
            user_id: Set(params.user_id),
            owner_key: Set(owner.clone()),
            provider: Set(params.provider.clone()),
            access_token_ciphertext: Set(access),
            refresh_token_ciphertext: Set(refresh),
            token_expires_at: Set(expires_at),
            scope: Set(params.tokens.scope.clone()),
            provider_account_id: Set(params.provider_account_id.clone()),
            metadata: Set(params.metadata.clone()),
            is_active: Set(true),
            last_synced_at: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        Integration::insert(row)
            .on_conflict(
                OnConflict::columns([
                    integration::Column::OrganizationId,
                    integration::Column::Provider,
                    integration::Column::OwnerKey,
                ])
                .update_columns([
                    integration::Column::AccessTokenCiphertext,
                    integration::Column::RefreshTokenCiphertext,
                    integration::Column::TokenExpiresAt,
                    integration::Column::Scope,
                    integration::Column::ProviderAccountId,
                    integration::Column::Metadata,
                    integration::Column::IsActive,
                    integration::Column::UpdatedAt,
                ])
                .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        let model = Integration::find()
            .filter(integration::Column::OrganizationId.eq(params.organization_id))
            .filter(integration::Column::Provider.eq(params.provider.as_str()))
            .filter(integration::Column::OwnerKey.eq(owner))
            .one(&self.db)
            .await?
            .ok_or_else(|| anyhow!("integration missing after upsert"))?;

        info!(
            integration_id = %model.id,
            organization_id = %model.organization_id,
            provider = %model.provider,
            "integration connected"
        );
        Ok(model)
    }

    /// Active integration for the organization (or the user's own connection)
    pub async fn get(
        &self,
        organization_id: Uuid,
        provider: &str,
        user_id: Option<Uuid>,
    ) -> Result<Option<integration::Model>> {
        let found = Integration::find()
            .filter(integration::Column::OrganizationId.eq(organization_id))
            .filter(integration::Column::Provider.eq(provider))
            .filter(integration::Column::OwnerKey.eq(owner_key(user_id)))
            .filter(integration::Column::IsActive.eq(true))
            .one(&self.db)
            .await?;
        Ok(found)
    }

    /// Active integration by id within the organization
    pub async fn get_by_id(
        &self,
        organization_id: Uuid,
        integration_id: Uuid,
    ) -> Result<Option<integration::Model>> {
        let found = Integration::find_by_id(integration_id)
            .filter(integration::Column::OrganizationId.eq(organization_id))
            .filter(integration::Column::IsActive.eq(true))
            .one(&self.db)
            .await?;
        Ok(found)
    }

    /// Provider name of an integration, active or not
    pub async fn provider_of(&self, integration_id: Uuid) -> Result<Option<String>> {
        let provider = Integration::find_by_id(integration_id)
            .select_only()
            .column(integration::Column::Provider)
            .into_tuple::<String>()
            .one(&self.db)
            .await?;
        Ok(provider)
    }

    pub async fn list_for_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<integration::Model>> {
        let rows = Integration::find()
            .filter(integration::Column::OrganizationId.eq(organization_id))
            .filter(integration::Column::IsActive.eq(true))
            .order_by_asc(integration::Column::Provider)
            .order_by_asc(integration::Column::CreatedAt)
            .all(&self.db)
            .await?;
        Ok(rows)
    }

    /// Marks the integration inactive; synced resources are kept.
    ///
    /// Returns false when no active integration matched within the organization.
    pub async fn disconnect(&self, organization_id: Uuid, integration_id: Uuid) -> Result<bool> {
        let Some(found) = self.get_by_id(organization_id, integration_id).await? else {
            return Ok(false);
        };

        let mut active: integration::ActiveModel = found.into();
        active.is_active = Set(false);
        active.updated_at = Set(Utc::now().into());
        active.update(&self.db).await?;

        info!(%integration_id, %organization_id, "integration disconnected");
        Ok(true)
    }

    pub async fn touch_last_synced(&self, integration_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let at: DateTimeWithTimeZone = at.into();
        Integration::update_many()
            .col_expr(integration::Column::LastSyncedAt, Expr::value(at))
            .filter(integration::Column::Id.eq(integration_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    /// Decrypts the access token of an integration
    pub fn access_token(&self, integration: &integration::Model) -> Result<String> {
        let aad = integration_aad(
            integration.organization_id,
            &integration.provider,
            &integration.owner_key,
        );
        decrypt_token(&self.crypto_key, &aad, &integration.access_token_ciphertext).map_err(|e| {
            tracing::error!(
                integration_id = %integration.id,
                provider = %integration.provider,
                "Token decryption failed"
            );
            anyhow!("Token decryption failed: {}", e)
        })
    }

    pub async fn set_config(&self, integration_id: Uuid, key: &str, value: JsonValue) -> Result<()> {
        let row = integration_config::ActiveModel {
            id: Set(Uuid::new_v4()),
            integration_id: Set(integration_id),
            key: Set(key.to_string()),
            value: Set(value),
            updated_at: Set(Utc::now().into()),
        };
        IntegrationConfig::insert(row)
            .on_conflict(
                OnConflict::columns([
                    integration_config::Column::IntegrationId,
                    integration_config::Column::Key,
                ])
                .update_columns([
                    integration_config::Column::Value,
                    integration_config::Column::UpdatedAt,
                ])
                .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;
        Ok(())
    }

    pub async fn get_config(&self, integration_id: Uuid, key: &str) -> Result<Option<JsonValue>> {
        let row = IntegrationConfig::find()
            .filter(integration_config::Column::IntegrationId.eq(integration_id))
            .filter(integration_config::Column::Key.eq(key))
            .one(&self.db)
            .await?;
        Ok(row.map(|r| r.value))
    }

    pub async fn all_config(&self, integration_id: Uuid) -> Result<serde_json::Map<String, JsonValue>> {
        let rows = IntegrationConfig::find()
            .filter(integration_config::Column::IntegrationId.eq(integration_id))
            .order_by_asc(integration_config::Column::Key)
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(|r| (r.key, r.value)).collect())
    }

    /// Links a time entry to an external task; the mapping starts as pending.
    pub async fn link_time_entry(
        &self,
        time_entry_id: Uuid,
        integration_id: Uuid,
        external_task_id: &str,
    ) -> Result<time_entry_mapping::Model> {
        let row = time_entry_mapping::ActiveModel {
            id: Set(Uuid::new_v4()),
            time_entry_id: Set(time_entry_id),
            integration_id: Set(integration_id),
            external_task_id: Set(external_task_id.to_string()),
            external_entry_id: Set(None),
            sync_status: Set(time_entry_mapping::STATUS_PENDING.to_string()),
            sync_error: Set(None),
            synced_at: Set(None),
            created_at: Set(Utc::now().into()),
        };
        TimeEntryMapping::insert(row)
            .on_conflict(
                OnConflict::columns([
                    time_entry_mapping::Column::TimeEntryId,
                    time_entry_mapping::Column::IntegrationId,
                ])
                .update_columns([
                    time_entry_mapping::Column::ExternalTaskId,
                    time_entry_mapping::Column::SyncStatus,
                    time_entry_mapping::Column::SyncError,
                ])
                .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        TimeEntryMapping::find()
            .filter(time_entry_mapping::Column::TimeEntryId.eq(time_entry_id))
            .filter(time_entry_mapping::Column::IntegrationId.eq(integration_id))
            .one(&self.db)
            .await?
            .ok_or_else(|| anyhow!("time entry mapping missing after upsert"))
    }

    pub async fn find_mapping(&self, mapping_id: Uuid) -> Result<Option<time_entry_mapping::Model>> {
        Ok(TimeEntryMapping::find_by_id(mapping_id).one(&self.db).await?)
    }

    /// Pushes a linked time entry to the provider and records the outcome.
    ///
    /// Creates the external entry on first sync and updates it afterwards.
    /// Provider failures are stored on the mapping and returned as the
    /// mapping with `sync_status = error`.
    pub async fn sync_time_entry(
        &self,
        registry: &Registry,
        mapping_id: Uuid,
    ) -> Result<time_entry_mapping::Model> {
        let mapping = self
            .find_mapping(mapping_id)
            .await?
            .ok_or_else(|| anyhow!("Time entry mapping {} not found", mapping_id))?;
        let entry = TimeEntry::find_by_id(mapping.time_entry_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| anyhow!("Time entry {} not found", mapping.time_entry_id))?;
        let integration = Integration::find_by_id(mapping.integration_id)
            .filter(integration::Column::IsActive.eq(true))
            .one(&self.db)
            .await?
            .ok_or_else(|| anyhow!("Integration {} not found or not active", mapping.integration_id))?;

        let provider = registry.get_enabled(&integration.provider)?;
        let token = self.access_token(&integration)?;

        let input = TimeEntryInput {
            task_id: mapping.external_task_id.clone(),
            start: entry.start_time.with_timezone(&Utc),
            end: entry.end_time.map(|t| t.with_timezone(&Utc)),
            duration_ms: None,
            description: None,
            billable: false,
        };

        let outcome = match mapping.external_entry_id.as_deref() {
            Some(existing) => provider.update_time_entry(&token, existing, &input).await,
            None => provider.create_time_entry(&token, &input).await,
        };

        let mut active: time_entry_mapping::ActiveModel = mapping.into();
        match outcome {
            Ok(external) => {
                active.external_entry_id = Set(Some(external.id));
                active.sync_status = Set(time_entry_mapping::STATUS_SYNCED.to_string());
                active.sync_error = Set(None);
                active.synced_at = Set(Some(Utc::now().into()));
            }
            Err(err) => {
                warn!(%mapping_id, error = %err, "time entry sync failed");
                active.sync_status = Set(time_entry_mapping::STATUS_ERROR.to_string());
                active.sync_error = Set(Some(err.to_string()));
            }
        }
        Ok(active.update(&self.db).await?)
    }
}
