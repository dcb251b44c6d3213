use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ServiceResult;
use crate::repository::UserStore;

/// Postgres-backed user reads
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for UserRepository {
    async fn interests(&self, user_id: Uuid) -> ServiceResult<Option<Vec<String>>> {
        let interests: Option<Vec<String>> = sqlx::query_scalar(
            r#"
            SELECT interests
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(interests)
    }

    async fn similar_user_ids(
        &self,
        user_id: Uuid,
        interests: &[String],
        cap: i64,
    ) -> ServiceResult<Vec<Uuid>> {
        if interests.is_empty() {
            return Ok(Vec::new());
        }

        // Array overlap: any shared interest qualifies a user as similar.
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id
            FROM users
            WHERE id <> $1
              AND interests && $2
            ORDER BY id
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(interests)
        .bind(cap)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}
