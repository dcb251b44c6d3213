use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ServiceError;

/// Scope of one post-ranking request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankScope {
    /// Rank across all eligible posts
    Global,
    /// Rank within a single community
    Community(Uuid),
}

impl RankScope {
    pub fn community_id(&self) -> Option<Uuid> {
        match self {
            RankScope::Global => None,
            RankScope::Community(id) => Some(*id),
        }
    }

    /// Stable token used in cache keys
    pub fn cache_token(&self) -> String {
        match self {
            RankScope::Global => "global".to_string(),
            RankScope::Community(id) => id.to_string(),
        }
    }
}

/// Community visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

impl FromStr for Visibility {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Visibility::Public),
            "private" => Ok(Visibility::Private),
            other => Err(ServiceError::Internal(format!(
                "unknown visibility: {}",
                other
            ))),
        }
    }
}

/// Whether a community charges for membership
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipTier {
    Free,
    Paid,
}

impl FromStr for MembershipTier {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(MembershipTier::Free),
            "paid" => Ok(MembershipTier::Paid),
            other => Err(ServiceError::Internal(format!(
                "unknown membership type: {}",
                other
            ))),
        }
    }
}

/// Raw engagement counters for one post.
///
/// Monotonic approximations, not exact ledgers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementCounters {
    pub like_count: i64,
    pub comment_count: i64,
    pub share_count: i64,
    pub views_count: i64,
}

/// Counters plus the age used for time decay
#[derive(Debug, Clone, Copy)]
pub struct EngagementRecord {
    pub counters: EngagementCounters,
    pub age_hours: f64,
}

impl EngagementRecord {
    /// Default record for an entity the store does not know: zero
    /// engagement at maximal age, so it decays to score 0 and sinks,
    /// without failing the rest of the batch.
    pub fn missing() -> Self {
        Self {
            counters: EngagementCounters::default(),
            age_hours: f64::INFINITY,
        }
    }
}

/// A post eligible for ranking in the current request
#[derive(Debug, Clone)]
pub struct CandidatePost {
    pub id: Uuid,
    pub community_id: Uuid,
    pub author_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// A community eligible for suggestion ranking
#[derive(Debug, Clone)]
pub struct CandidateCommunity {
    pub id: Uuid,
    pub name: String,
    pub visibility: Visibility,
    pub membership_type: MembershipTier,
    pub interests: Vec<String>,
}

/// Engagement rollup across one community's posts and members
#[derive(Debug, Clone, Copy, Default)]
pub struct CommunityEngagement {
    pub post_count: i64,
    pub member_count: i64,
    pub recent_post_count: i64,
    /// Sum of like+comment+share+view across the community's posts
    pub total_engagement: i64,
}

/// Contributing factors behind one post score
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PostScoreFactors {
    pub raw_engagement: f64,
    pub age_hours: f64,
    pub similar_user_engagement: i64,
    pub interest_overlap: i64,
}

/// A scored post. Ephemeral; lives only for the duration of one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredPost {
    pub post_id: Uuid,
    pub community_id: Uuid,
    pub author_id: Uuid,
    pub score: f64,
    pub factors: PostScoreFactors,
}

/// Contributing factors behind one community suggestion score
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CommunityScoreFactors {
    pub interest_overlap: i64,
    pub avg_engagement_per_post: f64,
    pub activity_level: f64,
    pub post_count: i64,
    pub member_count: i64,
    pub recent_post_count: i64,
}

/// A scored community suggestion. Ephemeral.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCommunity {
    pub community_id: Uuid,
    pub name: String,
    pub visibility: Visibility,
    pub membership_type: MembershipTier,
    pub score: f64,
    pub factors: CommunityScoreFactors,
}

/// Validated page/limit pair. 1-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    /// Validate caller-supplied paging parameters.
    ///
    /// Missing values fall back to page 1 / `default_limit`; a limit above
    /// `max_limit` is clamped; zero or negative values are rejected.
    pub fn new(
        page: Option<i64>,
        limit: Option<i64>,
        default_limit: i64,
        max_limit: i64,
    ) -> Result<Self, ServiceError> {
        let page = page.unwrap_or(1);
        let limit = limit.unwrap_or(default_limit);
        if page < 1 {
            return Err(ServiceError::Validation(
                "page must be a positive integer".to_string(),
            ));
        }
        if limit < 1 {
            return Err(ServiceError::Validation(
                "limit must be a positive integer".to_string(),
            ));
        }
        Ok(Self {
            page,
            limit: limit.min(max_limit),
        })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

/// Pagination envelope returned with every ranked page
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pagination {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl Pagination {
    pub fn new(total: i64, request: PageRequest) -> Self {
        let total_pages = if total == 0 {
            0
        } else {
            (total + request.limit - 1) / request.limit
        };
        Self {
            total,
            page: request.page,
            limit: request.limit,
            total_pages,
            has_next_page: request.page < total_pages,
            has_prev_page: request.page > 1,
        }
    }
}

/// One page of ranked results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}
