//! # OAuth State Model
//!
//! Anti-CSRF state issued by the connect endpoint and consumed by the callback.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

/// OAuth State entity for storing OAuth flow state tokens
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "oauth_states")]
pub struct Model {
    /// Primary key UUID
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// State token generated for CSRF protection
    pub state: String,

    /// Provider the flow was started for
    pub provider: String,

    /// Organization the connection will be bound to
    pub organization_id: Option<Uuid>,

    /// Admin who started the flow
    pub user_id: Option<Uuid>,

    /// Expiration timestamp
    pub expires_at: DateTimeWithTimeZone,

    /// When the state was created
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
