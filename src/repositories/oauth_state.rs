//! # OAuth State Repository
//!
//! Single-use OAuth `state` tokens binding a callback to the organization and
//! user that started the connect flow.

use chrono::{Duration, Utc};
use sea_orm::{
    ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    TryIntoModel,
};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::models::oauth_state::{self, ActiveModel, Entity, Model};

/// Lifetime of a connect attempt
pub const STATE_TTL_MINUTES: i64 = 15;

/// Outcome of consuming a state token on callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateLookup {
    Valid(Model),
    Expired,
    Unknown,
}

/// Repository for OAuth state database operations
#[derive(Debug, Clone)]
pub struct OAuthStateRepository {
    db: DatabaseConnection,
}

impl OAuthStateRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Store a freshly generated state
    pub async fn create(
        &self,
        state: &str,
        provider: &str,
        organization_id: Option<Uuid>,
        user_id: Option<Uuid>,
    ) -> Result<Model, sea_orm::DbErr> {
        let now = Utc::now();
        let row = ActiveModel {
            id: Set(Uuid::new_v4()),
            state: Set(state.to_string()),
            provider: Set(provider.to_string()),
            organization_id: Set(organization_id),
            user_id: Set(user_id),
            expires_at: Set((now + Duration::minutes(STATE_TTL_MINUTES)).into()),
            created_at: Set(now.into()),
        };
        let model = row.clone().try_into_model()?;
        Entity::insert(row).exec_without_returning(&self.db).await?;
        Ok(model)
    }

    /// Look up and delete a state; a state can only be consumed once.
    pub async fn consume(&self, state: &str) -> Result<StateLookup, sea_orm::DbErr> {
        let Some(found) = Entity::find()
            .filter(oauth_state::Column::State.eq(state))
            .one(&self.db)
            .await?
        else {
            return Ok(StateLookup::Unknown);
        };

        let matches: bool = found.state.as_bytes().ct_eq(state.as_bytes()).into();
        let expired = found.expires_at < Utc::now();
        found.clone().delete(&self.db).await?;

        if !matches {
            return Ok(StateLookup::Unknown);
        }
        if expired {
            return Ok(StateLookup::Expired);
        }
        Ok(StateLookup::Valid(found))
    }

    /// Delete states past their expiry; returns the number removed
    pub async fn cleanup_expired(&self) -> Result<u64, sea_orm::DbErr> {
        let now: sea_orm::prelude::DateTimeWithTimeZone = Utc::now().into();
        let result = Entity::delete_many()
            .filter(oauth_state::Column::ExpiresAt.lt(now))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }
}

/// 32 random bytes, URL-safe base64 without padding
pub fn generate_state() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64_url::encode(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_states_are_url_safe_and_unique() {
        let a = generate_state();
        let b = generate_state();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(
            a.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }
}
