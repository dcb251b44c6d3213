use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::{CandidateCommunity, MembershipTier, Visibility};
use crate::error::ServiceResult;
use crate::repository::CommunityStore;

/// Postgres-backed community reads
#[derive(Clone)]
pub struct CommunityRepository {
    pool: PgPool,
}

impl CommunityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CommunityStore for CommunityRepository {
    async fn interest_sets(&self, ids: &[Uuid]) -> ServiceResult<HashMap<Uuid, Vec<String>>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, (Uuid, Vec<String>)>(
            r#"
            SELECT id, interests
            FROM communities
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }

    async fn list_suggestion_candidates(
        &self,
        exclude: &[Uuid],
    ) -> ServiceResult<Vec<CandidateCommunity>> {
        let rows = sqlx::query_as::<_, (Uuid, String, String, String, Vec<String>)>(
            r#"
            SELECT id, name, visibility, membership_type, interests
            FROM communities
            WHERE visibility = 'public'
              AND membership_type = 'free'
              AND NOT (id = ANY($1))
            "#,
        )
        .bind(exclude)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, name, visibility, membership_type, interests)| {
                Ok(CandidateCommunity {
                    id,
                    name,
                    visibility: visibility.parse::<Visibility>()?,
                    membership_type: membership_type.parse::<MembershipTier>()?,
                    interests,
                })
            })
            .collect()
    }
}
