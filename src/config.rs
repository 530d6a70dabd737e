//! # Feature: Configuration System
//!
//! Environment-based bot configuration plus `${VAR}` interpolation for the
//! achievement catalog YAML.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Add SHOP_API_URL for the external check-in/giveaway collaborator
//! - 1.0.0: Initial environment variable configuration

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::env;

/// Bot configuration loaded from environment variables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub discord_token: String,
    pub database_path: String,
    pub log_level: String,
    /// Dev-mode guild for fast command registration; global registration otherwise
    pub discord_guild_id: Option<String>,
    /// Path to the achievement catalog YAML
    pub catalog_path: String,
    /// Base URL of the shop subsystem (check-ins, giveaways); progress for
    /// external kinds reads 0 when unset
    pub shop_api_url: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            discord_token: env::var("DISCORD_WAYPOINT_TOKEN")
                .map_err(|_| anyhow::anyhow!("DISCORD_WAYPOINT_TOKEN environment variable not set"))?,
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "waypoint.db".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            discord_guild_id: env::var("DISCORD_GUILD_ID").ok(),
            catalog_path: env::var("CATALOG_PATH").unwrap_or_else(|_| "catalog.yaml".to_string()),
            shop_api_url: env::var("SHOP_API_URL").ok(),
        })
    }
}

// ============================================================================
// Environment Variable Interpolation
// ============================================================================

// Pattern: ${VAR_NAME} or ${VAR_NAME:-default}
static ENV_VAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}").expect("Invalid regex")
});

/// Interpolate environment variables in a string
///
/// Supports `${VAR_NAME}` syntax. If a variable is not set, returns an error.
/// Use `${VAR_NAME:-default}` for default values.
pub fn interpolate_env_vars(content: &str) -> Result<String> {
    let mut result = content.to_string();
    let mut errors = Vec::new();

    for cap in ENV_VAR_RE.captures_iter(content) {
        let full_match = cap.get(0).unwrap().as_str();
        let var_name = &cap[1];
        let default_value = cap.get(2).map(|m| m.as_str());

        let value = match env::var(var_name) {
            Ok(v) => v,
            Err(_) => {
                if let Some(default) = default_value {
                    default.to_string()
                } else {
                    errors.push(format!("Environment variable '{}' is not set", var_name));
                    continue;
                }
            }
        };

        result = result.replace(full_match, &value);
    }

    if !errors.is_empty() {
        anyhow::bail!("Missing environment variables:\n  - {}", errors.join("\n  - "));
    }

    Ok(result)
}

// ============================================================================
// Tests
// ============================================================================
