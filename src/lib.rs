//! # timetrack Library
//!
//! Core of the timetrack service: provider integrations and the synced
//! resource mirror, activity and screenshot ingestion, the durable job
//! queues, and the HTTP API.

pub mod auth;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod handlers;
pub mod imaging;
pub mod jobs;
pub mod models;
pub mod providers;
pub mod repositories;
pub mod server;
pub mod storage;
pub mod sync;
pub mod telemetry;
pub mod usage;
pub use migration;
