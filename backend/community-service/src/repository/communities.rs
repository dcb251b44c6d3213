use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{CascadeSummary, Community};
use crate::error::{ServiceError, ServiceResult};
use crate::repository::CommunityStore;

/// Postgres-backed community persistence
#[derive(Clone)]
pub struct CommunityRepository {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct CommunityRow {
    id: Uuid,
    name: String,
    owner_id: Uuid,
    visibility: String,
    membership_type: String,
    interests: Vec<String>,
    member_count: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<CommunityRow> for Community {
    type Error = ServiceError;

    fn try_from(row: CommunityRow) -> Result<Self, Self::Error> {
        Ok(Community {
            id: row.id,
            name: row.name,
            owner_id: row.owner_id,
            visibility: row.visibility.parse()?,
            membership_type: row.membership_type.parse()?,
            interests: row.interests,
            member_count: row.member_count,
            created_at: row.created_at,
        })
    }
}

impl CommunityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CommunityStore for CommunityRepository {
    async fn find(&self, id: Uuid) -> ServiceResult<Option<Community>> {
        let row = sqlx::query_as::<_, CommunityRow>(
            r#"
            SELECT id, name, owner_id, visibility, membership_type,
                   interests, member_count, created_at
            FROM communities
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Community::try_from).transpose()
    }

    async fn delete_cascade(&self, id: Uuid) -> ServiceResult<CascadeSummary> {
        let mut tx = self.pool.begin().await?;

        let memberships_deleted = sqlx::query("DELETE FROM memberships WHERE community_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let payment_methods_deleted =
            sqlx::query("DELETE FROM community_payment_methods WHERE community_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?
                .rows_affected();

        let communities_deleted = sqlx::query("DELETE FROM communities WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if communities_deleted == 0 {
            // Dropping the transaction rolls back the membership and
            // payment-method deletes.
            return Err(ServiceError::NotFound(format!("community {}", id)));
        }

        tx.commit().await?;

        Ok(CascadeSummary {
            memberships_deleted,
            payment_methods_deleted,
        })
    }
}
