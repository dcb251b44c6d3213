pub mod communities;
pub mod memberships;

pub use communities::CommunityRepository;
pub use memberships::MembershipRepository;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{
    CascadeSummary, Community, Membership, MembershipRole, MembershipStatus, NewMembership,
    Subscription, SubscriptionStatus,
};
use crate::error::ServiceResult;

/// Membership persistence.
///
/// Update methods return `None` when no membership exists for the pair, so
/// the service layer owns the `NotFound` decision.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// Exclusive check-and-insert guarded by the (user_id, community_id)
    /// unique index; returns `None` when the pair already exists. The
    /// insert and the community member-count cross-reference update are
    /// one transaction.
    async fn insert(&self, new_membership: NewMembership) -> ServiceResult<Option<Membership>>;

    async fn find(&self, user_id: Uuid, community_id: Uuid)
        -> ServiceResult<Option<Membership>>;

    async fn update_role(
        &self,
        user_id: Uuid,
        community_id: Uuid,
        role: MembershipRole,
    ) -> ServiceResult<Option<Membership>>;

    async fn update_status(
        &self,
        user_id: Uuid,
        community_id: Uuid,
        status: MembershipStatus,
    ) -> ServiceResult<Option<Membership>>;

    /// Atomically add `delta` points and rederive level and progress.
    async fn add_points(
        &self,
        user_id: Uuid,
        community_id: Uuid,
        delta: i64,
    ) -> ServiceResult<Option<Membership>>;

    /// Persist subscription state. Only paid memberships match; `None`
    /// covers both a missing pair and a free membership.
    async fn update_subscription(
        &self,
        user_id: Uuid,
        community_id: Uuid,
        status: SubscriptionStatus,
        subscription: Subscription,
    ) -> ServiceResult<Option<Membership>>;

    /// Active members ordered by points descending, user id ascending.
    async fn leaderboard(
        &self,
        community_id: Uuid,
        limit: i64,
    ) -> ServiceResult<Vec<Membership>>;

    /// Active members by join date, newest first, with the total count.
    async fn list_active(
        &self,
        community_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> ServiceResult<(Vec<Membership>, i64)>;

    /// Communities where the user's membership status is active.
    async fn active_community_ids(&self, user_id: Uuid) -> ServiceResult<Vec<Uuid>>;
}

/// Community persistence.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommunityStore: Send + Sync {
    async fn find(&self, id: Uuid) -> ServiceResult<Option<Community>>;

    /// Delete the community, its memberships and its payment methods in
    /// one transaction; any failure rolls the whole cascade back.
    async fn delete_cascade(&self, id: Uuid) -> ServiceResult<CascadeSummary>;
}
