//! # Data Models
//!
//! SeaORM entities for the timetrack schema plus small API views.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod clickup_project;
pub mod clickup_workspace;
pub mod favorite_resource;
pub mod integration;
pub mod integration_config;
pub mod job;
pub mod oauth_state;
pub mod organization;
pub mod recent_resource;
pub mod screenshot;
pub mod synced_resource;
pub mod time_entry;
pub mod time_entry_mapping;
pub mod user;
pub mod user_integration_preference;

pub use clickup_project::Entity as ClickupProject;
pub use clickup_workspace::Entity as ClickupWorkspace;
pub use favorite_resource::Entity as FavoriteResource;
pub use integration::Entity as Integration;
pub use integration_config::Entity as IntegrationConfig;
pub use job::Entity as Job;
pub use oauth_state::Entity as OAuthState;
pub use organization::Entity as Organization;
pub use recent_resource::Entity as RecentResource;
pub use screenshot::Entity as Screenshot;
pub use synced_resource::Entity as SyncedResource;
pub use time_entry::Entity as TimeEntry;
pub use time_entry_mapping::Entity as TimeEntryMapping;
pub use user::Entity as User;
pub use user_integration_preference::Entity as UserIntegrationPreference;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "timetrack".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
