//! # Repository Layer
//!
//! Repository implementations that encapsulate SeaORM operations for the
//! timetrack tables, with organization-scoped lookups.

pub mod activity;
pub mod clickup;
pub mod integration;
pub mod job;
pub mod oauth_state;
pub mod organization;
pub mod synced_resource;

pub use activity::{ActivityRepository, NewScreenshot, NewTimeEntry};
pub use clickup::ClickUpRepository;
pub use integration::{ConnectParams, IntegrationRepository};
pub use job::JobRepository;
pub use oauth_state::{OAuthStateRepository, StateLookup, generate_state};
pub use organization::OrganizationRepository;
pub use synced_resource::{ResourceUpsert, SyncedResourceRepository};
