//! Providers module
//!
//! Provider abstraction for external time-tracking tools:
//! - The `TimeTrackingProvider` trait and the shared DTOs
//! - Provider metadata and the injected registry
//! - The ClickUp adapter

pub mod clickup;
pub mod metadata;
pub mod registry;
pub mod trait_;

pub use clickup::{CLICKUP_PROVIDER, ClickUpConfig, ClickUpProvider};
pub use metadata::{ProviderFeatures, ProviderMetadata};
pub use registry::{Registry, RegistryError};
pub use trait_::{
    ExternalResource, ExternalTimeEntry, HierarchyLabels, HierarchySupport, IntegrationError,
    OAuthTokens, ProviderUser, ResourceHierarchy, TimeEntryInput, TimeTrackingProvider,
};
