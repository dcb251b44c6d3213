pub mod communities;
pub mod engagement;
pub mod memberships;
pub mod posts;
pub mod users;

pub use communities::CommunityRepository;
pub use engagement::EngagementRepository;
pub use memberships::MembershipRepository;
pub use posts::PostRepository;
pub use users::UserRepository;

use async_trait::async_trait;
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::{
    CandidateCommunity, CandidatePost, CommunityEngagement, EngagementCounters, RankScope,
};
use crate::error::ServiceResult;

/// Read-only view over posts eligible for ranking.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PostStore: Send + Sync {
    /// Full eligible candidate set for one request.
    ///
    /// Joins `posts` to `communities` and keeps a post only when its owning
    /// community is public and free, or appears in
    /// `viewer_active_communities`. Ranking is computed over this whole set
    /// before pagination.
    async fn list_candidates(
        &self,
        scope: RankScope,
        viewer_active_communities: &[Uuid],
    ) -> ServiceResult<Vec<CandidatePost>>;
}

/// Read-only view over communities.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommunityStore: Send + Sync {
    /// Stored interest tags for each of the given communities.
    async fn interest_sets(&self, ids: &[Uuid]) -> ServiceResult<HashMap<Uuid, Vec<String>>>;

    /// Suggestion candidates: public, free communities not in `exclude`.
    async fn list_suggestion_candidates(
        &self,
        exclude: &[Uuid],
    ) -> ServiceResult<Vec<CandidateCommunity>>;
}

/// Read-only view over user identity and interests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Raw stored interests; `None` when the user does not exist.
    async fn interests(&self, user_id: Uuid) -> ServiceResult<Option<Vec<String>>>;

    /// Ids of other users sharing at least one interest with the viewer,
    /// capped at `cap` rows.
    async fn similar_user_ids(
        &self,
        user_id: Uuid,
        interests: &[String],
        cap: i64,
    ) -> ServiceResult<Vec<Uuid>>;
}

/// Read-only view over the membership store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// Communities where the user's membership status is active.
    async fn active_community_ids(&self, user_id: Uuid) -> ServiceResult<Vec<Uuid>>;

    /// Communities where the user holds a membership of any status.
    async fn joined_community_ids(&self, user_id: Uuid) -> ServiceResult<Vec<Uuid>>;
}

/// Read-only view over externally-owned engagement counters.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EngagementStore: Send + Sync {
    /// Counters for the given posts. Ids absent from the result simply have
    /// no stored counters; callers substitute the zero-engagement default.
    async fn post_counters(
        &self,
        ids: &[Uuid],
    ) -> ServiceResult<HashMap<Uuid, EngagementCounters>>;

    /// Per-post count of like/comment/share events authored by `user_ids`.
    async fn similar_user_engagement(
        &self,
        post_ids: &[Uuid],
        user_ids: &[Uuid],
    ) -> ServiceResult<HashMap<Uuid, i64>>;

    /// Engagement rollups per community: post count, active member count,
    /// posts within the recent window, summed engagement across posts.
    async fn community_stats(
        &self,
        ids: &[Uuid],
        recent_window_days: i32,
    ) -> ServiceResult<HashMap<Uuid, CommunityEngagement>>;
}
