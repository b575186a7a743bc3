//! # Server Configuration
//!
//! This module contains the server setup and configuration for the timetrack API.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router, middleware,
    routing::{delete, get, post},
};
use sea_orm::DatabaseConnection;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;
use crate::crypto::CryptoKey;
use crate::handlers;
use crate::providers::Registry;
use crate::repositories::IntegrationRepository;
use crate::storage::ObjectStorage;
use crate::sync::{SmartSyncService, cache::LevelCache};
use crate::telemetry;
use crate::usage::UsageService;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DatabaseConnection,
    pub registry: Arc<Registry>,
    pub crypto_key: CryptoKey,
    pub storage: Arc<dyn ObjectStorage>,
    pub level_cache: Arc<LevelCache>,
}

impl AppState {
    pub fn new(
        config: Arc<AppConfig>,
        db: DatabaseConnection,
        registry: Arc<Registry>,
        crypto_key: CryptoKey,
        storage: Arc<dyn ObjectStorage>,
    ) -> Self {
        let level_cache = Arc::new(LevelCache::new(Duration::from_secs(
            config.sync.level_cache_ttl_seconds,
        )));
        Self {
            config,
            db,
            registry,
            crypto_key,
            storage,
            level_cache,
        }
    }

    pub fn integrations(&self) -> IntegrationRepository {
        IntegrationRepository::new(self.db.clone(), self.crypto_key.clone())
    }

    pub fn sync_service(&self) -> SmartSyncService {
        SmartSyncService::new(
            self.db.clone(),
            self.crypto_key.clone(),
            Arc::clone(&self.registry),
            Arc::clone(&self.level_cache),
        )
    }

    pub fn usage(&self) -> UsageService {
        UsageService::new(self.db.clone())
    }
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    let api = Router::new()
        .route("/api/providers", get(handlers::providers::list_providers))
        .route(
            "/api/integrations",
            get(handlers::integrations::list_integrations),
        )
        .route(
            "/api/integrations/{provider}/connect",
            get(handlers::integrations::connect),
        )
        .route(
            "/api/integrations/{provider}/callback",
            get(handlers::integrations::callback),
        )
        .route(
            "/api/integrations/{provider}/disconnect",
            post(handlers::integrations::disconnect),
        )
        .route(
            "/api/integrations/{provider}/sync",
            post(handlers::sync::trigger_sync).get(handlers::sync::sync_method_not_allowed),
        )
        // Segment shares the `{provider}` name with its siblings; these take an integration id
        .route(
            "/api/integrations/{provider}/defaults",
            get(handlers::integrations::get_defaults).put(handlers::integrations::put_defaults),
        )
        .route(
            "/api/integrations/{provider}/resources",
            get(handlers::resources::list_resources),
        )
        .route(
            "/api/resources/search",
            get(handlers::resources::search_resources),
        )
        .route(
            "/api/resources/recent",
            get(handlers::resources::recent_resources),
        )
        .route(
            "/api/resources/favorites",
            get(handlers::resources::list_favorites).post(handlers::resources::add_favorite),
        )
        .route(
            "/api/resources/favorites/{id}",
            delete(handlers::resources::remove_favorite),
        )
        .route(
            "/api/resources/{id}/path",
            get(handlers::resources::resource_path),
        )
        .route(
            "/api/resources/{id}/sync-level",
            post(handlers::resources::sync_level),
        )
        .route(
            "/api/resources/{id}/usage",
            post(handlers::resources::track_usage),
        )
        .route("/api/activity", post(handlers::activity::record_activity))
        .route(
            "/api/screenshots/{id}",
            delete(handlers::screenshots::delete_screenshot)
                .patch(handlers::screenshots::toggle_blur),
        )
        .route(
            "/api/time-entries/{id}/links",
            post(handlers::time_entries::link_time_entry),
        )
        .route(
            "/api/time-entry-links/{id}/sync",
            post(handlers::time_entries::sync_time_entry_link),
        )
        .route("/api/clickup/sync", post(handlers::clickup::start_sync))
        .route("/api/jobs/failed", get(handlers::jobs::list_failed_jobs));

    Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        .merge(api)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(middleware::from_fn(telemetry::trace_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Starts the server and serves until `shutdown` fires
pub async fn run_server(
    state: AppState,
    shutdown: CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    // Resolve the configured bind address
    let addr = state
        .config
        .bind_addr()
        .map_err(|e| format!("Invalid server address: {}", e))?;
    let profile = state.config.profile.clone();
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, %profile, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("Server stopped");
    Ok(())
}

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::healthz,
        crate::handlers::readyz,
        crate::handlers::providers::list_providers,
        crate::handlers::integrations::list_integrations,
        crate::handlers::integrations::connect,
        crate::handlers::integrations::callback,
        crate::handlers::integrations::disconnect,
        crate::handlers::integrations::get_defaults,
        crate::handlers::integrations::put_defaults,
        crate::handlers::sync::trigger_sync,
        crate::handlers::sync::sync_method_not_allowed,
        crate::handlers::resources::list_resources,
        crate::handlers::resources::search_resources,
        crate::handlers::resources::resource_path,
        crate::handlers::resources::sync_level,
        crate::handlers::resources::track_usage,
        crate::handlers::resources::recent_resources,
        crate::handlers::resources::list_favorites,
        crate::handlers::resources::add_favorite,
        crate::handlers::resources::remove_favorite,
        crate::handlers::activity::record_activity,
        crate::handlers::screenshots::delete_screenshot,
        crate::handlers::screenshots::toggle_blur,
        crate::handlers::time_entries::link_time_entry,
        crate::handlers::time_entries::sync_time_entry_link,
        crate::handlers::clickup::start_sync,
        crate::handlers::jobs::list_failed_jobs,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::error::ApiError,
            crate::handlers::HealthResponse,
            crate::providers::ProviderMetadata,
            crate::providers::ProviderFeatures,
            crate::handlers::providers::ProvidersResponse,
            crate::models::integration::IntegrationInfo,
            crate::handlers::integrations::IntegrationsResponse,
            crate::models::user_integration_preference::UserDefaults,
            crate::sync::SyncStats,
            crate::sync::SyncLevel,
            crate::sync::LevelSyncOutcome,
            crate::handlers::sync::SyncResponse,
            crate::handlers::sync::SyncErrorBody,
            crate::models::synced_resource::ResourceInfo,
            crate::handlers::resources::ResourcesResponse,
            crate::handlers::resources::ResourcePathResponse,
            crate::handlers::resources::SyncLevelRequest,
            crate::handlers::resources::FavoriteRequest,
            crate::handlers::resources::RecentResponse,
            crate::usage::RecentResourceView,
            crate::handlers::activity::ActivityRequest,
            crate::handlers::activity::CapturedScreenshot,
            crate::handlers::activity::ActivityResponse,
            crate::handlers::screenshots::ScreenshotActionResponse,
            crate::handlers::screenshots::BlurToggleRequest,
            crate::models::time_entry_mapping::TimeEntryLinkInfo,
            crate::handlers::time_entries::LinkRequest,
            crate::handlers::clickup::ClickUpSyncResponse,
            crate::models::job::JobInfo,
            crate::handlers::jobs::FailedJobsResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "root", description = "Service info and probes"),
        (name = "providers", description = "Provider discovery"),
        (name = "integrations", description = "OAuth connections and manual sync"),
        (name = "resources", description = "Synced resource browsing, recents and favorites"),
        (name = "activity", description = "Activity ingestion from the desktop client"),
        (name = "screenshots", description = "Screenshot deletion and blur"),
        (name = "time-entries", description = "Linking time entries to provider tasks"),
        (name = "clickup", description = "ClickUp workspace project refresh"),
        (name = "jobs", description = "Background job inspection")
    ),
    info(
        title = "timetrack API",
        description = "Multi-tenant time tracking with provider integrations",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
