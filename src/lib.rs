// Core layer - configuration and the achievement catalog
pub mod catalog;
pub mod config;

// Infrastructure - the SQLite-backed counter/signature/view store
pub mod database;

// Feature layer
pub mod progress;
pub mod roles;
pub mod signature;
pub mod views;
pub mod voice_tracker;

// Application layer
pub mod command_handler;
pub mod commands;
pub mod message_components;

// Re-export the items the binary and tests reach for most
pub use catalog::{AchievementDef, AchievementKind, Catalog, PickerCategory};
pub use config::Config;
pub use database::{ActivityMetric, Database, UserActivity};
pub use progress::{shop_gateway_from, ShopGateway};
pub use signature::SignatureService;
pub use voice_tracker::VoiceTracker;
