use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{
    level, Membership, MembershipKind, MembershipLevel, MembershipRole, MembershipStatus,
    MembershipTier, NewMembership, Subscription, SubscriptionStatus,
};
use crate::error::ServiceResult;
use crate::repository::MembershipStore;

const MEMBERSHIP_COLUMNS: &str = "id, user_id, community_id, role, status, membership_type, \
     subscription_status, subscription, level_points, level_current, level_progress, \
     joined_at, updated_at";

/// Postgres-backed membership persistence
#[derive(Clone)]
pub struct MembershipRepository {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct MembershipRow {
    id: Uuid,
    user_id: Uuid,
    community_id: Uuid,
    role: String,
    status: String,
    membership_type: String,
    subscription_status: Option<String>,
    subscription: Option<Json<Subscription>>,
    level_points: i64,
    level_current: i32,
    level_progress: i32,
    joined_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MembershipRow> for Membership {
    type Error = crate::error::ServiceError;

    fn try_from(row: MembershipRow) -> Result<Self, Self::Error> {
        let kind = match row.membership_type.parse::<MembershipTier>()? {
            MembershipTier::Free => MembershipKind::Free,
            MembershipTier::Paid => MembershipKind::Paid {
                subscription_status: row
                    .subscription_status
                    .as_deref()
                    .unwrap_or("free")
                    .parse::<SubscriptionStatus>()?,
                subscription: row.subscription.map(|json| json.0).unwrap_or_default(),
            },
        };

        Ok(Membership {
            id: row.id,
            user_id: row.user_id,
            community_id: row.community_id,
            role: row.role.parse()?,
            status: row.status.parse()?,
            kind,
            level: MembershipLevel {
                points: row.level_points,
                current_level: row.level_current,
                progress: row.level_progress,
            },
            joined_at: row.joined_at,
            updated_at: row.updated_at,
        })
    }
}

impl MembershipRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MembershipStore for MembershipRepository {
    async fn insert(&self, new_membership: NewMembership) -> ServiceResult<Option<Membership>> {
        let (subscription_status, subscription) = match &new_membership.kind {
            MembershipKind::Free => (None, None),
            MembershipKind::Paid {
                subscription_status,
                subscription,
            } => (
                Some(subscription_status.as_str()),
                Some(Json(subscription.clone())),
            ),
        };

        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, MembershipRow>(&format!(
            r#"
            INSERT INTO memberships
                (id, user_id, community_id, role, status, membership_type,
                 subscription_status, subscription,
                 level_points, level_current, level_progress,
                 joined_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 0, 1, 0, NOW(), NOW())
            ON CONFLICT (user_id, community_id) DO NOTHING
            RETURNING {MEMBERSHIP_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(new_membership.user_id)
        .bind(new_membership.community_id)
        .bind(new_membership.role.as_str())
        .bind(new_membership.status.as_str())
        .bind(new_membership.kind.tier().as_str())
        .bind(subscription_status)
        .bind(subscription)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        // Cross-reference kept in the same transaction as the insert
        sqlx::query("UPDATE communities SET member_count = member_count + 1 WHERE id = $1")
            .bind(new_membership.community_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(row.try_into()?))
    }

    async fn find(
        &self,
        user_id: Uuid,
        community_id: Uuid,
    ) -> ServiceResult<Option<Membership>> {
        let row = sqlx::query_as::<_, MembershipRow>(&format!(
            r#"
            SELECT {MEMBERSHIP_COLUMNS}
            FROM memberships
            WHERE user_id = $1 AND community_id = $2
            "#
        ))
        .bind(user_id)
        .bind(community_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Membership::try_from).transpose()
    }

    async fn update_role(
        &self,
        user_id: Uuid,
        community_id: Uuid,
        role: MembershipRole,
    ) -> ServiceResult<Option<Membership>> {
        let row = sqlx::query_as::<_, MembershipRow>(&format!(
            r#"
            UPDATE memberships
            SET role = $3, updated_at = NOW()
            WHERE user_id = $1 AND community_id = $2
            RETURNING {MEMBERSHIP_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(community_id)
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Membership::try_from).transpose()
    }

    async fn update_status(
        &self,
        user_id: Uuid,
        community_id: Uuid,
        status: MembershipStatus,
    ) -> ServiceResult<Option<Membership>> {
        let row = sqlx::query_as::<_, MembershipRow>(&format!(
            r#"
            UPDATE memberships
            SET status = $3, updated_at = NOW()
            WHERE user_id = $1 AND community_id = $2
            RETURNING {MEMBERSHIP_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(community_id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Membership::try_from).transpose()
    }

    async fn add_points(
        &self,
        user_id: Uuid,
        community_id: Uuid,
        delta: i64,
    ) -> ServiceResult<Option<Membership>> {
        let mut tx = self.pool.begin().await?;

        // The increment is applied in SQL so concurrent awards never lose
        // points; level and progress are rederived from the result.
        let row = sqlx::query_as::<_, MembershipRow>(&format!(
            r#"
            UPDATE memberships
            SET level_points = level_points + $3, updated_at = NOW()
            WHERE user_id = $1 AND community_id = $2
            RETURNING {MEMBERSHIP_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(community_id)
        .bind(delta)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let before = MembershipLevel {
            points: row.level_points - delta,
            current_level: row.level_current,
            progress: row.level_progress,
        };
        let after = level::apply_points(&before, delta);

        let row = sqlx::query_as::<_, MembershipRow>(&format!(
            r#"
            UPDATE memberships
            SET level_current = $2, level_progress = $3
            WHERE id = $1
            RETURNING {MEMBERSHIP_COLUMNS}
            "#
        ))
        .bind(row.id)
        .bind(after.current_level)
        .bind(after.progress)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(row.try_into()?))
    }

    async fn update_subscription(
        &self,
        user_id: Uuid,
        community_id: Uuid,
        status: SubscriptionStatus,
        subscription: Subscription,
    ) -> ServiceResult<Option<Membership>> {
        let row = sqlx::query_as::<_, MembershipRow>(&format!(
            r#"
            UPDATE memberships
            SET subscription_status = $3, subscription = $4, updated_at = NOW()
            WHERE user_id = $1 AND community_id = $2 AND membership_type = 'paid'
            RETURNING {MEMBERSHIP_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(community_id)
        .bind(status.as_str())
        .bind(Json(subscription))
        .fetch_optional(&self.pool)
        .await?;

        row.map(Membership::try_from).transpose()
    }

    async fn leaderboard(
        &self,
        community_id: Uuid,
        limit: i64,
    ) -> ServiceResult<Vec<Membership>> {
        let rows = sqlx::query_as::<_, MembershipRow>(&format!(
            r#"
            SELECT {MEMBERSHIP_COLUMNS}
            FROM memberships
            WHERE community_id = $1 AND status = 'active'
            ORDER BY level_points DESC, user_id ASC
            LIMIT $2
            "#
        ))
        .bind(community_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Membership::try_from).collect()
    }

    async fn list_active(
        &self,
        community_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> ServiceResult<(Vec<Membership>, i64)> {
        let rows = sqlx::query_as::<_, MembershipRow>(&format!(
            r#"
            SELECT {MEMBERSHIP_COLUMNS}
            FROM memberships
            WHERE community_id = $1 AND status = 'active'
            ORDER BY joined_at DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(community_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM memberships
            WHERE community_id = $1 AND status = 'active'
            "#,
        )
        .bind(community_id)
        .fetch_one(&self.pool)
        .await?;

        let memberships = rows
            .into_iter()
            .map(Membership::try_from)
            .collect::<ServiceResult<Vec<_>>>()?;

        Ok((memberships, total))
    }

    async fn active_community_ids(&self, user_id: Uuid) -> ServiceResult<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT community_id
            FROM memberships
            WHERE user_id = $1 AND status = 'active'
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}
