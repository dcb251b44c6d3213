/// Configuration management for the ranking service
///
/// Loads configuration from environment variables.
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database configuration
    pub database: DatabaseConfig,
    /// Redis configuration (optional; ranking degrades to Postgres-only)
    pub redis: RedisConfig,
    /// Ranking request limits and deadlines
    pub ranking: RankingConfig,
    /// Scoring weight policy
    pub weights: ScoringWeights,
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

/// Redis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis URL; when unset, counter reads and page caching fall back to Postgres only
    pub url: Option<String>,
}

/// Limits and deadlines applied to every ranking request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    /// Page size applied when the caller does not supply one
    pub default_limit: i64,
    /// Hard cap on the page size a caller may request
    pub max_limit: i64,
    /// Upper bound on the similar-user set shipped to the store per request
    pub max_similar_users: i64,
    /// Window for the "recent posts" activity signal, in days
    pub recent_window_days: i32,
    /// Per-store-call deadline, in milliseconds
    pub store_timeout_ms: u64,
    /// TTL for cached unpersonalized trending pages, in seconds
    pub trending_cache_ttl_secs: u64,
}

impl RankingConfig {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

/// Scoring weights.
///
/// These encode product policy (assumed intent strength: share > comment >
/// like > view) and are deliberately configuration, not literals, so they
/// can be tuned without code changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringWeights {
    /// Weight of one like in raw engagement
    pub like: f64,
    /// Weight of one comment in raw engagement
    pub comment: f64,
    /// Weight of one view in raw engagement
    pub view: f64,
    /// Weight of one share in raw engagement
    pub share: f64,
    /// Boost per engagement event authored by a similar user
    pub similar_user_engagement: f64,
    /// Boost per interest shared between viewer and the post's community
    pub interest_overlap: f64,
    /// Suggestion ranking: weight per shared interest
    pub suggestion_interest_overlap: f64,
    /// Suggestion ranking: weight of average engagement per post
    pub suggestion_avg_engagement: f64,
    /// Suggestion ranking: weight of the activity level signal
    pub suggestion_activity: f64,
    /// Suggestion ranking: flat boost for public communities
    pub public_community_boost: f64,
    /// Suggestion ranking: flat boost for free communities
    pub free_community_boost: f64,
    /// Member count is divided by this before it contributes to activity
    pub member_count_divisor: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            like: 2.0,
            comment: 3.0,
            view: 1.0,
            share: 4.0,
            similar_user_engagement: 5.0,
            interest_overlap: 3.0,
            suggestion_interest_overlap: 5.0,
            suggestion_avg_engagement: 0.5,
            suggestion_activity: 1.0,
            public_community_boost: 2.0,
            free_community_boost: 2.0,
            member_count_divisor: 10.0,
        }
    }
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

        let redis = RedisConfig {
            url: std::env::var("REDIS_URL").ok(),
        };

        let ranking = RankingConfig {
            default_limit: env_parse("RANKING_DEFAULT_LIMIT", 10),
            max_limit: env_parse("RANKING_MAX_LIMIT", 100),
            max_similar_users: env_parse("RANKING_MAX_SIMILAR_USERS", 1000),
            recent_window_days: env_parse("RANKING_RECENT_WINDOW_DAYS", 30),
            store_timeout_ms: env_parse("RANKING_STORE_TIMEOUT_MS", 5000),
            trending_cache_ttl_secs: env_parse("TRENDING_CACHE_TTL_SECS", 300),
        };

        let defaults = ScoringWeights::default();
        let weights = ScoringWeights {
            like: env_parse("WEIGHT_LIKE", defaults.like),
            comment: env_parse("WEIGHT_COMMENT", defaults.comment),
            view: env_parse("WEIGHT_VIEW", defaults.view),
            share: env_parse("WEIGHT_SHARE", defaults.share),
            similar_user_engagement: env_parse(
                "WEIGHT_SIMILAR_USER_ENGAGEMENT",
                defaults.similar_user_engagement,
            ),
            interest_overlap: env_parse("WEIGHT_INTEREST_OVERLAP", defaults.interest_overlap),
            suggestion_interest_overlap: env_parse(
                "WEIGHT_SUGGESTION_INTEREST_OVERLAP",
                defaults.suggestion_interest_overlap,
            ),
            suggestion_avg_engagement: env_parse(
                "WEIGHT_SUGGESTION_AVG_ENGAGEMENT",
                defaults.suggestion_avg_engagement,
            ),
            suggestion_activity: env_parse(
                "WEIGHT_SUGGESTION_ACTIVITY",
                defaults.suggestion_activity,
            ),
            public_community_boost: env_parse(
                "WEIGHT_PUBLIC_COMMUNITY_BOOST",
                defaults.public_community_boost,
            ),
            free_community_boost: env_parse(
                "WEIGHT_FREE_COMMUNITY_BOOST",
                defaults.free_community_boost,
            ),
            member_count_divisor: env_parse(
                "WEIGHT_MEMBER_COUNT_DIVISOR",
                defaults.member_count_divisor,
            ),
        };

        Ok(Config {
            database,
            redis,
            ranking,
            weights,
        })
    }
}
