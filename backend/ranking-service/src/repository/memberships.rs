use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ServiceResult;
use crate::repository::MembershipStore;

/// Read-only view over the membership store, used to resolve a viewer's
/// community access and suggestion exclusions.
#[derive(Clone)]
pub struct MembershipRepository {
    pool: PgPool,
}

impl MembershipRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MembershipStore for MembershipRepository {
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

    async fn joined_community_ids(&self, user_id: Uuid) -> ServiceResult<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT community_id
            FROM memberships
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}
