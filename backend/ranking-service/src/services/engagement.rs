use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{CandidatePost, CommunityEngagement, EngagementCounters, EngagementRecord};
use crate::error::ServiceResult;
use crate::repository::EngagementStore;

/// TTL for counter keys (7 days)
const COUNTER_TTL: u64 = 604800;

/// Read-only aggregation over externally-owned engagement counters.
///
/// Keys: post:{post_id}:likes, post:{post_id}:comments,
///       post:{post_id}:shares, post:{post_id}:views
///
/// Architecture:
/// - Get: batch MGET from Redis, Postgres batch load for misses
/// - Warm: misses are written back through a pipeline
/// - Degraded: Redis absent or erroring falls back to Postgres entirely
///
/// Missing entities yield the zero-engagement, maximal-age record; absence
/// of one entity never fails the ranking of the others.
#[derive(Clone)]
pub struct EngagementAggregator {
    store: Arc<dyn EngagementStore>,
    redis: Option<ConnectionManager>,
}

impl EngagementAggregator {
    pub fn new(store: Arc<dyn EngagementStore>, redis: Option<ConnectionManager>) -> Self {
        Self { store, redis }
    }

    /// Counters plus age for each candidate, keyed by post id.
    ///
    /// Age is `now - created_at` in fractional hours, floored at 0 for
    /// clock skew; a candidate with no stored counters gets the zero
    /// default at its real age.
    pub async fn post_records(
        &self,
        candidates: &[CandidatePost],
        now: DateTime<Utc>,
    ) -> ServiceResult<HashMap<Uuid, EngagementRecord>> {
        let ids: Vec<Uuid> = candidates.iter().map(|c| c.id).collect();
        let counters = self.counters(&ids).await?;

        Ok(candidates
            .iter()
            .map(|candidate| {
                let age_ms = (now - candidate.created_at).num_milliseconds();
                let age_hours = (age_ms as f64 / 3_600_000.0).max(0.0);
                let record = EngagementRecord {
                    counters: counters.get(&candidate.id).copied().unwrap_or_default(),
                    age_hours,
                };
                (candidate.id, record)
            })
            .collect())
    }

    /// Per-post count of like/comment/share events authored by `user_ids`
    pub async fn similar_user_engagement(
        &self,
        post_ids: &[Uuid],
        user_ids: &[Uuid],
    ) -> ServiceResult<HashMap<Uuid, i64>> {
        self.store.similar_user_engagement(post_ids, user_ids).await
    }

    /// Community rollups; communities missing from the store come back as
    /// the zero default.
    pub async fn community_stats(
        &self,
        ids: &[Uuid],
        recent_window_days: i32,
    ) -> ServiceResult<HashMap<Uuid, CommunityEngagement>> {
        let mut stats = self.store.community_stats(ids, recent_window_days).await?;
        for id in ids {
            stats.entry(*id).or_default();
        }
        Ok(stats)
    }

    async fn counters(&self, ids: &[Uuid]) -> ServiceResult<HashMap<Uuid, EngagementCounters>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let Some(redis) = &self.redis else {
            return self.store.post_counters(ids).await;
        };

        let mut keys = Vec::with_capacity(ids.len() * 4);
        for id in ids {
            keys.push(format!("post:{}:likes", id));
            keys.push(format!("post:{}:comments", id));
            keys.push(format!("post:{}:shares", id));
            keys.push(format!("post:{}:views", id));
        }

        let redis_result: Result<Vec<Option<i64>>, _> = redis.clone().get(&keys).await;
        let values = match redis_result {
            Ok(values) => values,
            Err(err) => {
                tracing::warn!(
                    error = ?err,
                    post_count = ids.len(),
                    "Redis MGET failed, falling back to Postgres"
                );
                return self.store.post_counters(ids).await;
            }
        };

        let mut counters = HashMap::new();
        let mut misses = Vec::new();
        for (i, id) in ids.iter().enumerate() {
            let chunk = &values[i * 4..i * 4 + 4];
            match (chunk[0], chunk[1], chunk[2], chunk[3]) {
                (Some(likes), Some(comments), Some(shares), Some(views)) => {
                    counters.insert(
                        *id,
                        EngagementCounters {
                            like_count: likes,
                            comment_count: comments,
                            share_count: shares,
                            views_count: views,
                        },
                    );
                }
                _ => misses.push(*id),
            }
        }

        if !misses.is_empty() {
            let loaded = self.store.post_counters(&misses).await?;
            if let Err(err) = self.warm_cache(redis, &loaded).await {
                tracing::warn!(error = ?err, miss_count = misses.len(), "Failed to warm counter cache");
            }
            counters.extend(loaded);
        }

        Ok(counters)
    }

    async fn warm_cache(
        &self,
        redis: &ConnectionManager,
        counters: &HashMap<Uuid, EngagementCounters>,
    ) -> ServiceResult<()> {
        if counters.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        for (id, c) in counters {
            pipe.set_ex(format!("post:{}:likes", id), c.like_count, COUNTER_TTL)
                .ignore();
            pipe.set_ex(format!("post:{}:comments", id), c.comment_count, COUNTER_TTL)
                .ignore();
            pipe.set_ex(format!("post:{}:shares", id), c.share_count, COUNTER_TTL)
                .ignore();
            pipe.set_ex(format!("post:{}:views", id), c.views_count, COUNTER_TTL)
                .ignore();
        }
        pipe.query_async::<_, ()>(&mut redis.clone()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MockEngagementStore;
    use chrono::Duration;

    fn candidate(id: Uuid, age_hours: i64, now: DateTime<Utc>) -> CandidatePost {
        CandidatePost {
            id,
            community_id: Uuid::from_u128(99),
            author_id: Uuid::from_u128(7),
            created_at: now - Duration::hours(age_hours),
        }
    }

    #[tokio::test]
    async fn missing_counters_default_to_zero() {
        let now = Utc::now();
        let known = Uuid::from_u128(1);
        let unknown = Uuid::from_u128(2);

        let mut store = MockEngagementStore::new();
        store.expect_post_counters().returning(move |_| {
            let mut map = HashMap::new();
            map.insert(
                known,
                EngagementCounters {
                    like_count: 3,
                    comment_count: 0,
                    share_count: 0,
                    views_count: 1,
                },
            );
            Ok(map)
        });

        let aggregator = EngagementAggregator::new(Arc::new(store), None);
        let records = aggregator
            .post_records(&[candidate(known, 2, now), candidate(unknown, 5, now)], now)
            .await
            .unwrap();

        assert_eq!(records[&known].counters.like_count, 3);
        assert_eq!(records[&unknown].counters, EngagementCounters::default());
        assert!((records[&unknown].age_hours - 5.0).abs() < 0.01);
    }

    #[tokio::test]
    async fn age_is_floored_at_zero() {
        let now = Utc::now();
        let id = Uuid::from_u128(1);

        let mut store = MockEngagementStore::new();
        store
            .expect_post_counters()
            .returning(|_| Ok(HashMap::new()));

        let aggregator = EngagementAggregator::new(Arc::new(store), None);
        // created_at in the future (clock skew)
        let records = aggregator
            .post_records(&[candidate(id, -3, now)], now)
            .await
            .unwrap();
        assert_eq!(records[&id].age_hours, 0.0);
    }

    #[tokio::test]
    async fn community_stats_fill_missing_with_zero_default() {
        let present = Uuid::from_u128(1);
        let absent = Uuid::from_u128(2);

        let mut store = MockEngagementStore::new();
        store.expect_community_stats().returning(move |_, _| {
            let mut map = HashMap::new();
            map.insert(
                present,
                CommunityEngagement {
                    post_count: 2,
                    member_count: 4,
                    recent_post_count: 1,
                    total_engagement: 10,
                },
            );
            Ok(map)
        });

        let aggregator = EngagementAggregator::new(Arc::new(store), None);
        let stats = aggregator
            .community_stats(&[present, absent], 30)
            .await
            .unwrap();
        assert_eq!(stats[&present].post_count, 2);
        assert_eq!(stats[&absent].post_count, 0);
        assert_eq!(stats[&absent].member_count, 0);
    }
}
