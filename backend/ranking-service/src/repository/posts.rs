use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{CandidatePost, RankScope};
use crate::error::ServiceResult;
use crate::repository::PostStore;

/// Postgres-backed candidate loading
#[derive(Clone)]
pub struct PostRepository {
    pool: PgPool,
}

impl PostRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PostStore for PostRepository {
    async fn list_candidates(
        &self,
        scope: RankScope,
        viewer_active_communities: &[Uuid],
    ) -> ServiceResult<Vec<CandidatePost>> {
        let rows = sqlx::query_as::<_, (Uuid, Uuid, Uuid, chrono::DateTime<chrono::Utc>)>(
            r#"
            SELECT p.id, p.community_id, p.author_id, p.created_at
            FROM posts p
            JOIN communities c ON c.id = p.community_id
            WHERE p.deleted_at IS NULL
              AND ($1::uuid IS NULL OR p.community_id = $1)
              AND (
                    (c.visibility = 'public' AND c.membership_type = 'free')
                    OR c.id = ANY($2)
              )
            "#,
        )
        .bind(scope.community_id())
        .bind(viewer_active_communities)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, community_id, author_id, created_at)| CandidatePost {
                id,
                community_id,
                author_id,
                created_at,
            })
            .collect())
    }
}
