//! Database migrations for the timetrack service.
//!
//! This module contains all database migrations using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2026_01_05_000001_create_organizations;
mod m2026_01_05_000002_create_activity;
mod m2026_01_05_000003_create_integrations;
mod m2026_01_05_000004_create_synced_resources;
mod m2026_01_05_000005_create_clickup_tables;
mod m2026_01_05_000006_create_jobs;
mod m2026_01_05_000007_create_oauth_states;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2026_01_05_000001_create_organizations::Migration),
            Box::new(m2026_01_05_000002_create_activity::Migration),
            Box::new(m2026_01_05_000003_create_integrations::Migration),
            Box::new(m2026_01_05_000004_create_synced_resources::Migration),
            Box::new(m2026_01_05_000005_create_clickup_tables::Migration),
            Box::new(m2026_01_05_000006_create_jobs::Migration),
            Box::new(m2026_01_05_000007_create_oauth_states::Migration),
        ]
    }
}
