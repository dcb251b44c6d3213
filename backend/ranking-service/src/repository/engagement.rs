use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::{CommunityEngagement, EngagementCounters};
use crate::error::ServiceResult;
use crate::repository::EngagementStore;

/// Postgres source of truth for engagement counters.
///
/// Counters live on the `posts` row and are incremented by the content
/// subsystem on like/comment/share/view events; this repository only reads
/// them.
#[derive(Clone)]
pub struct EngagementRepository {
    pool: PgPool,
}

impl EngagementRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EngagementStore for EngagementRepository {
    async fn post_counters(
        &self,
        ids: &[Uuid],
    ) -> ServiceResult<HashMap<Uuid, EngagementCounters>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, (Uuid, i64, i64, i64, i64)>(
            r#"
            SELECT id, like_count, comment_count, share_count, views_count
            FROM posts
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, like_count, comment_count, share_count, views_count)| {
                (
                    id,
                    EngagementCounters {
                        like_count,
                        comment_count,
                        share_count,
                        views_count,
                    },
                )
            })
            .collect())
    }

    async fn similar_user_engagement(
        &self,
        post_ids: &[Uuid],
        user_ids: &[Uuid],
    ) -> ServiceResult<HashMap<Uuid, i64>> {
        if post_ids.is_empty() || user_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<(Uuid, i64)> = sqlx::query_as(
            r#"
            SELECT post_id, COUNT(*)::bigint AS events
            FROM (
                SELECT post_id, user_id FROM likes
                WHERE post_id = ANY($1) AND user_id = ANY($2)
                UNION ALL
                SELECT post_id, user_id FROM comments
                WHERE post_id = ANY($1) AND user_id = ANY($2)
                UNION ALL
                SELECT post_id, user_id FROM shares
                WHERE post_id = ANY($1) AND user_id = ANY($2)
            ) events
            GROUP BY post_id
            "#,
        )
        .bind(post_ids)
        .bind(user_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }

    async fn community_stats(
        &self,
        ids: &[Uuid],
        recent_window_days: i32,
    ) -> ServiceResult<HashMap<Uuid, CommunityEngagement>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<(Uuid, i64, i64, i64, i64)> = sqlx::query_as(
            r#"
            SELECT c.id,
                   COUNT(p.id)::bigint AS post_count,
                   COUNT(p.id) FILTER (
                       WHERE p.created_at > NOW() - make_interval(days => $2)
                   )::bigint AS recent_post_count,
                   COALESCE(SUM(p.like_count + p.comment_count + p.share_count + p.views_count), 0)::bigint
                       AS total_engagement,
                   (SELECT COUNT(*) FROM memberships m
                     WHERE m.community_id = c.id AND m.status = 'active')::bigint AS member_count
            FROM communities c
            LEFT JOIN posts p ON p.community_id = c.id AND p.deleted_at IS NULL
            WHERE c.id = ANY($1)
            GROUP BY c.id
            "#,
        )
        .bind(ids)
        .bind(recent_window_days)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(id, post_count, recent_post_count, total_engagement, member_count)| {
                    (
                        id,
                        CommunityEngagement {
                            post_count,
                            member_count,
                            recent_post_count,
                            total_engagement,
                        },
                    )
                },
            )
            .collect())
    }
}
