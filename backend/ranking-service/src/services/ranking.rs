/// Ranking service
///
/// Orchestrates one ranking request: resolve the personalization snapshot,
/// load the full eligible candidate set, aggregate engagement, score, order
/// and paginate. All candidates in one request are scored against the same
/// snapshot.
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use sqlx::PgPool;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::{Config, RankingConfig, ScoringWeights};
use crate::domain::{
    CommunityScoreFactors, InterestSet, Page, PageRequest, Pagination, PostScoreFactors,
    RankScope, ScoredCommunity, ScoredPost,
};
use crate::error::{ServiceError, ServiceResult};
use crate::repository::{
    CommunityRepository, CommunityStore, EngagementRepository, MembershipRepository,
    PostRepository, PostStore, UserRepository,
};
use crate::services::engagement::EngagementAggregator;
use crate::services::personalization::{PersonalizationResolver, PersonalizationSnapshot};
use crate::services::scoring;

pub struct RankingService {
    posts: Arc<dyn PostStore>,
    communities: Arc<dyn CommunityStore>,
    engagement: EngagementAggregator,
    personalization: PersonalizationResolver,
    weights: ScoringWeights,
    cfg: RankingConfig,
    redis: Option<ConnectionManager>,
}

impl RankingService {
    pub fn new(
        posts: Arc<dyn PostStore>,
        communities: Arc<dyn CommunityStore>,
        engagement: EngagementAggregator,
        personalization: PersonalizationResolver,
        weights: ScoringWeights,
        cfg: RankingConfig,
        redis: Option<ConnectionManager>,
    ) -> Self {
        Self {
            posts,
            communities,
            engagement,
            personalization,
            weights,
            cfg,
            redis,
        }
    }

    /// Wire the service over concrete Postgres repositories
    pub fn from_pool(pool: PgPool, redis: Option<ConnectionManager>, config: &Config) -> Self {
        let engagement = EngagementAggregator::new(
            Arc::new(EngagementRepository::new(pool.clone())),
            redis.clone(),
        );
        let personalization = PersonalizationResolver::new(
            Arc::new(UserRepository::new(pool.clone())),
            Arc::new(MembershipRepository::new(pool.clone())),
            config.ranking.max_similar_users,
        );
        Self::new(
            Arc::new(PostRepository::new(pool.clone())),
            Arc::new(CommunityRepository::new(pool)),
            engagement,
            personalization,
            config.weights.clone(),
            config.ranking.clone(),
            redis,
        )
    }

    /// Rank posts in `scope` for an optional viewer.
    ///
    /// Anonymous requests see only public free communities and score with
    /// the canonical trending formula; authenticated requests additionally
    /// see communities they are active members of and receive the
    /// similar-user and interest-overlap boosts.
    pub async fn rank_posts(
        &self,
        scope: RankScope,
        viewer: Option<Uuid>,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> ServiceResult<Page<ScoredPost>> {
        let request = PageRequest::new(
            page,
            limit,
            self.cfg.default_limit,
            self.cfg.max_limit,
        )?;

        let snapshot = match viewer {
            Some(viewer_id) => {
                self.deadline(
                    "resolving personalization",
                    self.personalization.resolve(viewer_id),
                )
                .await?
            }
            None => PersonalizationSnapshot::anonymous(),
        };

        let cache_key = format!(
            "commune:trending:{}:{}:{}",
            scope.cache_token(),
            request.page,
            request.limit
        );
        if snapshot.is_anonymous() {
            if let Some(cached) = self.cached_page(&cache_key).await {
                debug!(key = %cache_key, "Trending cache hit");
                return Ok(cached);
            }
        }

        let mut active: Vec<Uuid> = snapshot.active_communities.iter().copied().collect();
        active.sort();

        let candidates = self
            .deadline(
                "loading candidate posts",
                self.posts.list_candidates(scope, &active),
            )
            .await?;
        let total = candidates.len() as i64;

        let now = Utc::now();
        let records = self
            .deadline(
                "aggregating engagement",
                self.engagement.post_records(&candidates, now),
            )
            .await?;

        // Interest overlap is between the viewer and the post's owning
        // community, so one lookup per distinct community covers all posts.
        let mut overlaps: HashMap<Uuid, i64> = HashMap::new();
        if !snapshot.interests.is_empty() {
            let mut community_ids: Vec<Uuid> =
                candidates.iter().map(|c| c.community_id).collect();
            community_ids.sort();
            community_ids.dedup();

            let interest_sets = self
                .deadline(
                    "loading community interests",
                    self.communities.interest_sets(&community_ids),
                )
                .await?;
            for (community_id, tags) in interest_sets {
                let overlap = snapshot.interests.overlap(&InterestSet::sanitize(tags));
                overlaps.insert(community_id, overlap as i64);
            }
        }

        let mut similar_engagement: HashMap<Uuid, i64> = HashMap::new();
        if !snapshot.similar_users.is_empty() {
            let post_ids: Vec<Uuid> = candidates.iter().map(|c| c.id).collect();
            similar_engagement = self
                .deadline(
                    "counting similar-user engagement",
                    self.engagement
                        .similar_user_engagement(&post_ids, &snapshot.similar_users),
                )
                .await?;
        }

        let mut scored: Vec<ScoredPost> = candidates
            .into_iter()
            .map(|candidate| {
                let record = records
                    .get(&candidate.id)
                    .copied()
                    .unwrap_or_else(crate::domain::EngagementRecord::missing);
                let similar = similar_engagement
                    .get(&candidate.id)
                    .copied()
                    .unwrap_or(0);
                let overlap = overlaps.get(&candidate.community_id).copied().unwrap_or(0);
                let score =
                    scoring::personalized_score(&self.weights, &record, similar, overlap);
                ScoredPost {
                    post_id: candidate.id,
                    community_id: candidate.community_id,
                    author_id: candidate.author_id,
                    score,
                    factors: PostScoreFactors {
                        raw_engagement: scoring::raw_engagement(
                            &self.weights,
                            &record.counters,
                        ),
                        age_hours: record.age_hours,
                        similar_user_engagement: similar,
                        interest_overlap: overlap,
                    },
                }
            })
            .collect();

        scored.sort_by(|a, b| scoring::compare_ranked((a.score, a.post_id), (b.score, b.post_id)));

        let items: Vec<ScoredPost> = scored
            .into_iter()
            .skip(request.offset() as usize)
            .take(request.limit as usize)
            .collect();
        let result = Page {
            items,
            pagination: Pagination::new(total, request),
        };

        if snapshot.is_anonymous() {
            self.cache_page(&cache_key, &result).await;
        }

        Ok(result)
    }

    /// Rank community suggestions for a viewer.
    ///
    /// Candidates are public free communities the viewer holds no
    /// membership in, of any status. The visibility and tier boosts stay
    /// in the formula as stated policy even though the candidate filter
    /// makes them uniform.
    pub async fn rank_community_suggestions(
        &self,
        viewer: Uuid,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> ServiceResult<Page<ScoredCommunity>> {
        let request = PageRequest::new(
            page,
            limit,
            self.cfg.default_limit,
            self.cfg.max_limit,
        )?;

        let snapshot = self
            .deadline(
                "resolving personalization",
                self.personalization.resolve(viewer),
            )
            .await?;

        let mut exclude: Vec<Uuid> = snapshot.joined_communities.iter().copied().collect();
        exclude.sort();

        let candidates = self
            .deadline(
                "loading suggestion candidates",
                self.communities.list_suggestion_candidates(&exclude),
            )
            .await?;
        let total = candidates.len() as i64;

        let ids: Vec<Uuid> = candidates.iter().map(|c| c.id).collect();
        let stats = self
            .deadline(
                "aggregating community engagement",
                self.engagement
                    .community_stats(&ids, self.cfg.recent_window_days),
            )
            .await?;

        let mut scored: Vec<ScoredCommunity> = candidates
            .into_iter()
            .map(|candidate| {
                let community_stats = stats.get(&candidate.id).copied().unwrap_or_default();
                let overlap = snapshot
                    .interests
                    .overlap(&InterestSet::sanitize(&candidate.interests))
                    as i64;
                let score = scoring::suggestion_score(
                    &self.weights,
                    overlap,
                    &community_stats,
                    candidate.visibility,
                    candidate.membership_type,
                );
                ScoredCommunity {
                    community_id: candidate.id,
                    name: candidate.name,
                    visibility: candidate.visibility,
                    membership_type: candidate.membership_type,
                    score,
                    factors: CommunityScoreFactors {
                        interest_overlap: overlap,
                        avg_engagement_per_post: scoring::avg_engagement_per_post(
                            &community_stats,
                        ),
                        activity_level: scoring::activity_level(&self.weights, &community_stats),
                        post_count: community_stats.post_count,
                        member_count: community_stats.member_count,
                        recent_post_count: community_stats.recent_post_count,
                    },
                }
            })
            .collect();

        scored.sort_by(|a, b| {
            scoring::compare_ranked((a.score, a.community_id), (b.score, b.community_id))
        });

        let items: Vec<ScoredCommunity> = scored
            .into_iter()
            .skip(request.offset() as usize)
            .take(request.limit as usize)
            .collect();

        Ok(Page {
            items,
            pagination: Pagination::new(total, request),
        })
    }

    /// Enforce the per-store-call deadline. On expiry the request fails
    /// with `Timeout` rather than returning a truncated result.
    async fn deadline<T>(
        &self,
        what: &str,
        fut: impl Future<Output = ServiceResult<T>>,
    ) -> ServiceResult<T> {
        match tokio::time::timeout(self.cfg.store_timeout(), fut).await {
            Ok(result) => result,
            Err(_) => Err(ServiceError::Timeout(what.to_string())),
        }
    }

    async fn cached_page(&self, key: &str) -> Option<Page<ScoredPost>> {
        let redis = self.redis.as_ref()?;
        let cached: Option<String> = match redis.clone().get(key).await {
            Ok(value) => value,
            Err(err) => {
                warn!(error = ?err, key = %key, "Trending cache read failed");
                return None;
            }
        };
        cached.and_then(|json| serde_json::from_str(&json).ok())
    }

    async fn cache_page(&self, key: &str, page: &Page<ScoredPost>) {
        let Some(redis) = &self.redis else {
            return;
        };
        let json = match serde_json::to_string(page) {
            Ok(json) => json,
            Err(err) => {
                warn!(error = ?err, "Failed to serialize trending page");
                return;
            }
        };
        if let Err(err) = redis
            .clone()
            .set_ex::<_, _, ()>(key, json, self.cfg.trending_cache_ttl_secs)
            .await
        {
            warn!(error = ?err, key = %key, "Trending cache write failed");
        }
    }
}
