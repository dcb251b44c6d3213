/// Membership lifecycle manager
///
/// State machine per (user, community): absent -> active -> {inactive,
/// banned}; paid communities carry a nested subscription sub-state
/// free -> paid -> expired. Uniqueness of the pair is enforced by the
/// store's exclusive check-and-insert, not a check-then-insert race.
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::config::{Config, MembershipConfig};
use crate::domain::{
    CascadeSummary, Membership, MembershipKind, MembershipRole, MembershipStatus,
    MembershipTier, NewMembership, Page, PageRequest, Pagination, Subscription,
    SubscriptionStatus, SubscriptionUpdate,
};
use crate::error::{ServiceError, ServiceResult};
use crate::repository::{
    CommunityRepository, CommunityStore, MembershipRepository, MembershipStore,
};

pub struct MembershipService {
    memberships: Arc<dyn MembershipStore>,
    communities: Arc<dyn CommunityStore>,
    cfg: MembershipConfig,
}

impl MembershipService {
    pub fn new(
        memberships: Arc<dyn MembershipStore>,
        communities: Arc<dyn CommunityStore>,
        cfg: MembershipConfig,
    ) -> Self {
        Self {
            memberships,
            communities,
            cfg,
        }
    }

    /// Wire the service over concrete Postgres repositories
    pub fn from_pool(pool: PgPool, config: &Config) -> Self {
        Self::new(
            Arc::new(MembershipRepository::new(pool.clone())),
            Arc::new(CommunityRepository::new(pool)),
            config.membership.clone(),
        )
    }

    /// Join a community.
    ///
    /// The membership type is copied from the community at creation time;
    /// later community-type changes do not retroactively alter existing
    /// memberships. Joining a paid community starts in the unsubscribed
    /// `free` sub-state until payment completes through the payment
    /// subsystem.
    pub async fn join(&self, user_id: Uuid, community_id: Uuid) -> ServiceResult<Membership> {
        let community = self
            .communities
            .find(community_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("community {}", community_id)))?;

        let kind = match community.membership_type {
            MembershipTier::Free => MembershipKind::Free,
            MembershipTier::Paid => MembershipKind::Paid {
                subscription_status: SubscriptionStatus::Free,
                subscription: Subscription {
                    start_date: Some(Utc::now()),
                    plan: Some("basic".to_string()),
                    auto_renew: false,
                    ..Subscription::default()
                },
            },
        };

        let inserted = self
            .memberships
            .insert(NewMembership {
                user_id,
                community_id,
                role: MembershipRole::Member,
                status: MembershipStatus::Active,
                kind,
            })
            .await?;

        match inserted {
            Some(membership) => {
                info!(user = %user_id, community = %community_id, "User joined community");
                Ok(membership)
            }
            None => Err(ServiceError::Conflict(
                "already a member of this community".to_string(),
            )),
        }
    }

    /// Promote or demote a member.
    ///
    /// Only an existing active admin membership on the same community may
    /// invoke this transition.
    pub async fn update_role(
        &self,
        acting_user_id: Uuid,
        target_user_id: Uuid,
        community_id: Uuid,
        new_role: MembershipRole,
    ) -> ServiceResult<Membership> {
        let acting = self.memberships.find(acting_user_id, community_id).await?;
        if !acting
            .map(|m| m.can_perform_admin_actions())
            .unwrap_or(false)
        {
            return Err(ServiceError::Forbidden(
                "only an active admin can change member roles".to_string(),
            ));
        }

        self.memberships
            .update_role(target_user_id, community_id, new_role)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "membership of user {} in community {}",
                    target_user_id, community_id
                ))
            })
    }

    /// Move a membership between active, inactive and banned.
    pub async fn update_status(
        &self,
        user_id: Uuid,
        community_id: Uuid,
        new_status: MembershipStatus,
    ) -> ServiceResult<Membership> {
        if new_status == MembershipStatus::Anonymous {
            return Err(ServiceError::Validation(
                "status must be one of active, inactive, banned".to_string(),
            ));
        }

        self.memberships
            .update_status(user_id, community_id, new_status)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "membership of user {} in community {}",
                    user_id, community_id
                ))
            })
    }

    /// Award points and rederive level and progress.
    ///
    /// Points are monotonic: negative deltas are rejected, zero is a no-op
    /// returning the unchanged record.
    pub async fn add_points(
        &self,
        user_id: Uuid,
        community_id: Uuid,
        points: i64,
    ) -> ServiceResult<Membership> {
        if points < 0 {
            return Err(ServiceError::Validation(
                "points must be non-negative".to_string(),
            ));
        }

        if points == 0 {
            return self
                .memberships
                .find(user_id, community_id)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!(
                        "membership of user {} in community {}",
                        user_id, community_id
                    ))
                });
        }

        self.memberships
            .add_points(user_id, community_id, points)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "membership of user {} in community {}",
                    user_id, community_id
                ))
            })
    }

    /// Update the subscription sub-state of a paid membership.
    ///
    /// Free memberships carry no subscription state and are never mutated
    /// by this transition.
    pub async fn update_subscription(
        &self,
        user_id: Uuid,
        community_id: Uuid,
        update: SubscriptionUpdate,
    ) -> ServiceResult<Membership> {
        let membership = self
            .memberships
            .find(user_id, community_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "membership of user {} in community {}",
                    user_id, community_id
                ))
            })?;

        let existing = match membership.kind {
            MembershipKind::Free => {
                return Err(ServiceError::InvalidState(
                    "cannot subscribe to a free community membership".to_string(),
                ))
            }
            MembershipKind::Paid { subscription, .. } => subscription,
        };

        let status = update.status.unwrap_or(SubscriptionStatus::Paid);
        let merged = Subscription {
            start_date: Some(update.start_date.unwrap_or_else(Utc::now)),
            end_date: update.end_date.or(existing.end_date),
            plan: update.plan.or(existing.plan),
            amount: update.amount.or(existing.amount),
            currency: update.currency.or(existing.currency),
            payment_method: update.payment_method.or(existing.payment_method),
            auto_renew: update.auto_renew.unwrap_or(existing.auto_renew),
        };

        self.memberships
            .update_subscription(user_id, community_id, status, merged)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "membership of user {} in community {}",
                    user_id, community_id
                ))
            })
    }

    /// Delete a community with its memberships and payment methods.
    ///
    /// Owner-only. The cascade is one transaction: all rows go, or none.
    pub async fn delete_community(
        &self,
        acting_user_id: Uuid,
        community_id: Uuid,
    ) -> ServiceResult<CascadeSummary> {
        let community = self
            .communities
            .find(community_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("community {}", community_id)))?;

        if community.owner_id != acting_user_id {
            return Err(ServiceError::Forbidden(
                "only the owner can delete a community".to_string(),
            ));
        }

        let summary = self.communities.delete_cascade(community_id).await?;
        info!(
            community = %community_id,
            memberships = summary.memberships_deleted,
            payment_methods = summary.payment_methods_deleted,
            "Community deleted with cascade"
        );
        Ok(summary)
    }

    /// Active members by points, descending; user id breaks ties.
    pub async fn leaderboard(
        &self,
        community_id: Uuid,
        limit: Option<i64>,
    ) -> ServiceResult<Vec<Membership>> {
        let limit = limit.unwrap_or(self.cfg.leaderboard_limit);
        if limit < 1 {
            return Err(ServiceError::Validation(
                "limit must be a positive integer".to_string(),
            ));
        }
        self.communities
            .find(community_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("community {}", community_id)))?;

        self.memberships
            .leaderboard(community_id, limit.min(self.cfg.max_limit))
            .await
    }

    /// Active members, newest first, with a pagination envelope.
    pub async fn list_members(
        &self,
        community_id: Uuid,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> ServiceResult<Page<Membership>> {
        let request = PageRequest::new(page, limit, self.cfg.default_limit, self.cfg.max_limit)?;

        let (items, total) = self
            .memberships
            .list_active(community_id, request.limit, request.offset())
            .await?;

        Ok(Page {
            items,
            pagination: Pagination::new(total, request),
        })
    }

    /// Communities where the user holds an active membership
    pub async fn user_communities(&self, user_id: Uuid) -> ServiceResult<Vec<Uuid>> {
        self.memberships.active_community_ids(user_id).await
    }

    pub async fn is_member(&self, user_id: Uuid, community_id: Uuid) -> ServiceResult<bool> {
        Ok(self
            .memberships
            .find(user_id, community_id)
            .await?
            .map(|m| m.is_active())
            .unwrap_or(false))
    }

    pub async fn is_admin(&self, user_id: Uuid, community_id: Uuid) -> ServiceResult<bool> {
        Ok(self
            .memberships
            .find(user_id, community_id)
            .await?
            .map(|m| m.can_perform_admin_actions())
            .unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Community, MembershipLevel, MembershipTier, Visibility};
    use crate::repository::{MockCommunityStore, MockMembershipStore};
    use chrono::Utc;

    fn cfg() -> MembershipConfig {
        MembershipConfig {
            default_limit: 10,
            max_limit: 100,
            leaderboard_limit: 10,
        }
    }

    fn community(id: Uuid, owner: Uuid, tier: MembershipTier) -> Community {
        Community {
            id,
            name: "rustaceans".to_string(),
            owner_id: owner,
            visibility: Visibility::Public,
            membership_type: tier,
            interests: vec!["rust".to_string()],
            member_count: 1,
            created_at: Utc::now(),
        }
    }

    fn membership(user: Uuid, community: Uuid, kind: MembershipKind) -> Membership {
        Membership {
            id: Uuid::new_v4(),
            user_id: user,
            community_id: community,
            role: MembershipRole::Member,
            status: MembershipStatus::Active,
            kind,
            level: MembershipLevel::default(),
            joined_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn membership_from_new(new_membership: &NewMembership) -> Membership {
        Membership {
            id: Uuid::new_v4(),
            user_id: new_membership.user_id,
            community_id: new_membership.community_id,
            role: new_membership.role,
            status: new_membership.status,
            kind: new_membership.kind.clone(),
            level: MembershipLevel::default(),
            joined_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn service(
        memberships: MockMembershipStore,
        communities: MockCommunityStore,
    ) -> MembershipService {
        MembershipService::new(Arc::new(memberships), Arc::new(communities), cfg())
    }

    #[tokio::test]
    async fn join_free_community_creates_member() {
        let user = Uuid::from_u128(1);
        let community_id = Uuid::from_u128(2);

        let mut communities = MockCommunityStore::new();
        communities
            .expect_find()
            .returning(move |id| Ok(Some(community(id, Uuid::from_u128(9), MembershipTier::Free))));

        let mut memberships = MockMembershipStore::new();
        memberships
            .expect_insert()
            .withf(|new_membership| {
                new_membership.role == MembershipRole::Member
                    && new_membership.status == MembershipStatus::Active
                    && new_membership.kind == MembershipKind::Free
            })
            .returning(|new_membership| Ok(Some(membership_from_new(&new_membership))));

        let result = service(memberships, communities)
            .join(user, community_id)
            .await
            .unwrap();
        assert_eq!(result.kind, MembershipKind::Free);
        assert!(result.is_active());
    }

    #[tokio::test]
    async fn join_paid_community_starts_unsubscribed() {
        let user = Uuid::from_u128(1);
        let community_id = Uuid::from_u128(2);

        let mut communities = MockCommunityStore::new();
        communities
            .expect_find()
            .returning(move |id| Ok(Some(community(id, Uuid::from_u128(9), MembershipTier::Paid))));

        let mut memberships = MockMembershipStore::new();
        memberships
            .expect_insert()
            .returning(|new_membership| Ok(Some(membership_from_new(&new_membership))));

        let result = service(memberships, communities)
            .join(user, community_id)
            .await
            .unwrap();

        match result.kind {
            MembershipKind::Paid {
                subscription_status,
                subscription,
            } => {
                assert_eq!(subscription_status, SubscriptionStatus::Free);
                assert_eq!(subscription.plan.as_deref(), Some("basic"));
                assert!(!subscription.auto_renew);
            }
            MembershipKind::Free => panic!("expected a paid membership"),
        }
    }

    #[tokio::test]
    async fn duplicate_join_conflicts() {
        let mut communities = MockCommunityStore::new();
        communities
            .expect_find()
            .returning(move |id| Ok(Some(community(id, Uuid::from_u128(9), MembershipTier::Free))));

        let mut memberships = MockMembershipStore::new();
        memberships.expect_insert().returning(|_| Ok(None));

        let err = service(memberships, communities)
            .join(Uuid::from_u128(1), Uuid::from_u128(2))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn join_unknown_community_is_not_found() {
        let mut communities = MockCommunityStore::new();
        communities.expect_find().returning(|_| Ok(None));
        let memberships = MockMembershipStore::new();

        let err = service(memberships, communities)
            .join(Uuid::from_u128(1), Uuid::from_u128(2))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn role_change_requires_active_admin() {
        let admin = Uuid::from_u128(1);
        let target = Uuid::from_u128(2);
        let community_id = Uuid::from_u128(3);

        let mut memberships = MockMembershipStore::new();
        memberships.expect_find().returning(move |user, c| {
            let mut m = membership(user, c, MembershipKind::Free);
            if user == admin {
                m.role = MembershipRole::Admin;
                m.status = MembershipStatus::Banned; // active guard must reject this
            }
            Ok(Some(m))
        });

        let err = service(memberships, MockCommunityStore::new())
            .update_role(admin, target, community_id, MembershipRole::Admin)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn active_admin_can_promote() {
        let admin = Uuid::from_u128(1);
        let target = Uuid::from_u128(2);
        let community_id = Uuid::from_u128(3);

        let mut memberships = MockMembershipStore::new();
        memberships.expect_find().returning(move |user, c| {
            let mut m = membership(user, c, MembershipKind::Free);
            if user == admin {
                m.role = MembershipRole::Admin;
            }
            Ok(Some(m))
        });
        memberships
            .expect_update_role()
            .withf(move |user, c, role| {
                *user == target && *c == community_id && *role == MembershipRole::Admin
            })
            .returning(|user, c, role| {
                let mut m = membership(user, c, MembershipKind::Free);
                m.role = role;
                Ok(Some(m))
            });

        let promoted = service(memberships, MockCommunityStore::new())
            .update_role(admin, target, community_id, MembershipRole::Admin)
            .await
            .unwrap();
        assert!(promoted.is_admin());
    }

    #[tokio::test]
    async fn negative_points_are_rejected_without_a_store_call() {
        let memberships = MockMembershipStore::new();

        let err = service(memberships, MockCommunityStore::new())
            .add_points(Uuid::from_u128(1), Uuid::from_u128(2), -100)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn zero_points_is_a_noop_read() {
        let mut memberships = MockMembershipStore::new();
        memberships
            .expect_find()
            .times(1)
            .returning(|user, c| Ok(Some(membership(user, c, MembershipKind::Free))));
        // no expect_add_points: the mock panics if the write path is taken

        let result = service(memberships, MockCommunityStore::new())
            .add_points(Uuid::from_u128(1), Uuid::from_u128(2), 0)
            .await
            .unwrap();
        assert_eq!(result.level.points, 0);
    }

    #[tokio::test]
    async fn subscribing_a_free_membership_is_invalid_state() {
        let mut memberships = MockMembershipStore::new();
        memberships
            .expect_find()
            .returning(|user, c| Ok(Some(membership(user, c, MembershipKind::Free))));
        // no expect_update_subscription: the record must never be mutated

        let err = service(memberships, MockCommunityStore::new())
            .update_subscription(
                Uuid::from_u128(1),
                Uuid::from_u128(2),
                SubscriptionUpdate::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn subscription_update_defaults_to_paid_and_merges() {
        let mut memberships = MockMembershipStore::new();
        memberships.expect_find().returning(|user, c| {
            Ok(Some(membership(
                user,
                c,
                MembershipKind::Paid {
                    subscription_status: SubscriptionStatus::Free,
                    subscription: Subscription {
                        start_date: Some(Utc::now()),
                        plan: Some("basic".to_string()),
                        ..Subscription::default()
                    },
                },
            )))
        });
        memberships
            .expect_update_subscription()
            .withf(|_, _, status, subscription| {
                *status == SubscriptionStatus::Paid
                    && subscription.plan.as_deref() == Some("basic")
                    && subscription.auto_renew
                    && subscription.start_date.is_some()
            })
            .returning(|user, c, status, subscription| {
                Ok(Some(membership(
                    user,
                    c,
                    MembershipKind::Paid {
                        subscription_status: status,
                        subscription,
                    },
                )))
            });

        let updated = service(memberships, MockCommunityStore::new())
            .update_subscription(
                Uuid::from_u128(1),
                Uuid::from_u128(2),
                SubscriptionUpdate {
                    auto_renew: Some(true),
                    ..SubscriptionUpdate::default()
                },
            )
            .await
            .unwrap();
        assert!(updated.has_active_subscription());
    }

    #[tokio::test]
    async fn anonymous_is_not_a_valid_status_transition() {
        let memberships = MockMembershipStore::new();

        let err = service(memberships, MockCommunityStore::new())
            .update_status(
                Uuid::from_u128(1),
                Uuid::from_u128(2),
                MembershipStatus::Anonymous,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn only_the_owner_may_delete_a_community() {
        let owner = Uuid::from_u128(1);
        let intruder = Uuid::from_u128(2);
        let community_id = Uuid::from_u128(3);

        let mut communities = MockCommunityStore::new();
        communities
            .expect_find()
            .returning(move |id| Ok(Some(community(id, owner, MembershipTier::Free))));
        // no expect_delete_cascade: the forbidden path must not delete

        let err = service(MockMembershipStore::new(), communities)
            .delete_community(intruder, community_id)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn owner_delete_cascades() {
        let owner = Uuid::from_u128(1);
        let community_id = Uuid::from_u128(3);

        let mut communities = MockCommunityStore::new();
        communities
            .expect_find()
            .returning(move |id| Ok(Some(community(id, owner, MembershipTier::Paid))));
        communities.expect_delete_cascade().returning(|_| {
            Ok(CascadeSummary {
                memberships_deleted: 12,
                payment_methods_deleted: 2,
            })
        });

        let summary = service(MockMembershipStore::new(), communities)
            .delete_community(owner, community_id)
            .await
            .unwrap();
        assert_eq!(summary.memberships_deleted, 12);
        assert_eq!(summary.payment_methods_deleted, 2);
    }

    #[tokio::test]
    async fn member_listing_wraps_a_pagination_envelope() {
        let community_id = Uuid::from_u128(3);

        let mut memberships = MockMembershipStore::new();
        memberships
            .expect_list_active()
            .withf(|_, limit, offset| *limit == 5 && *offset == 5)
            .returning(|c, _, _| {
                let items = (0..5)
                    .map(|i| {
                        membership(Uuid::from_u128(100 + i), c, MembershipKind::Free)
                    })
                    .collect();
                Ok((items, 12))
            });

        let page = service(memberships, MockCommunityStore::new())
            .list_members(community_id, Some(2), Some(5))
            .await
            .unwrap();
        assert_eq!(page.pagination.total, 12);
        assert_eq!(page.pagination.total_pages, 3);
        assert!(page.pagination.has_next_page);
        assert!(page.pagination.has_prev_page);
    }
}
