/// Configuration management for community-service
///
/// Loads configuration from environment variables.
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database configuration
    pub database: DatabaseConfig,
    /// Membership listing defaults
    pub membership: MembershipConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL
    pub url: String,
    /// Max connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Min connections in pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Defaults applied to member listing and leaderboards
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembershipConfig {
    /// Page size applied when the caller does not supply one
    pub default_limit: i64,
    /// Hard cap on the page size a caller may request
    pub max_limit: i64,
    /// Leaderboard size when the caller does not supply one
    pub leaderboard_limit: i64,
}

// Default values
fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    5
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database = DatabaseConfig {
            url: std::env::var("DATABASE_URL")
                .context("DATABASE_URL environment variable not set")?,
            max_connections: env_parse("DB_MAX_CONNECTIONS", default_max_connections()),
            min_connections: env_parse("DB_MIN_CONNECTIONS", default_min_connections()),
        };

        let membership = MembershipConfig {
            default_limit: env_parse("MEMBERSHIP_DEFAULT_LIMIT", 10),
            max_limit: env_parse("MEMBERSHIP_MAX_LIMIT", 100),
            leaderboard_limit: env_parse("LEADERBOARD_LIMIT", 10),
        };

        Ok(Config {
            database,
            membership,
        })
    }
}
