/// Scoring engine
///
/// Pure functions combining engagement counters, age and personalization
/// signals into a single ordering key. All weights come from
/// [`ScoringWeights`] so product policy can be tuned without code changes.
use std::cmp::Ordering;
use uuid::Uuid;

use crate::config::ScoringWeights;
use crate::domain::{
    CommunityEngagement, EngagementCounters, EngagementRecord, MembershipTier, Visibility,
};

/// Weighted raw engagement of one post
pub fn raw_engagement(weights: &ScoringWeights, counters: &EngagementCounters) -> f64 {
    weights.like * counters.like_count as f64
        + weights.comment * counters.comment_count as f64
        + weights.view * counters.views_count as f64
        + weights.share * counters.share_count as f64
}

/// Canonical trending score: raw engagement with smooth time decay.
///
/// The `1 +` in the denominator guards age zero and makes a one-day-old
/// post need ~24x the raw engagement of a brand-new post to tie it.
pub fn trending_score(weights: &ScoringWeights, record: &EngagementRecord) -> f64 {
    decayed(raw_engagement(weights, &record.counters), record.age_hours)
}

/// Personalized trending score.
///
/// Boost terms are added to raw engagement before the decay division, so
/// personalization is subject to the same aging as organic engagement.
/// With both signals at zero this reduces to [`trending_score`].
pub fn personalized_score(
    weights: &ScoringWeights,
    record: &EngagementRecord,
    similar_user_engagement: i64,
    interest_overlap: i64,
) -> f64 {
    let raw = raw_engagement(weights, &record.counters)
        + weights.similar_user_engagement * similar_user_engagement as f64
        + weights.interest_overlap * interest_overlap as f64;
    decayed(raw, record.age_hours)
}

/// Community suggestion score. No time decay; candidates are communities.
pub fn suggestion_score(
    weights: &ScoringWeights,
    interest_overlap: i64,
    stats: &CommunityEngagement,
    visibility: Visibility,
    membership_type: MembershipTier,
) -> f64 {
    let mut score = weights.suggestion_interest_overlap * interest_overlap as f64
        + weights.suggestion_avg_engagement * avg_engagement_per_post(stats)
        + weights.suggestion_activity * activity_level(weights, stats);
    if visibility == Visibility::Public {
        score += weights.public_community_boost;
    }
    if membership_type == MembershipTier::Free {
        score += weights.free_community_boost;
    }
    score
}

/// Average like+comment+share+view per post, guarding the zero-post case
pub fn avg_engagement_per_post(stats: &CommunityEngagement) -> f64 {
    stats.total_engagement as f64 / stats.post_count.max(1) as f64
}

/// Recent posting volume plus a damped member-count contribution
pub fn activity_level(weights: &ScoringWeights, stats: &CommunityEngagement) -> f64 {
    stats.recent_post_count as f64 + stats.member_count as f64 / weights.member_count_divisor
}

fn decayed(raw: f64, age_hours: f64) -> f64 {
    raw / (1.0 + age_hours.max(0.0))
}

/// Total order over scored candidates: score descending, candidate id
/// ascending. The id tie-break keeps pagination deterministic; without it,
/// equal scores could reorder between page fetches and a candidate could
/// appear twice or be skipped.
pub fn compare_ranked(a: (f64, Uuid), b: (f64, Uuid)) -> Ordering {
    b.0.partial_cmp(&a.0)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.1.cmp(&b.1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights() -> ScoringWeights {
        ScoringWeights::default()
    }

    fn record(likes: i64, comments: i64, shares: i64, views: i64, age: f64) -> EngagementRecord {
        EngagementRecord {
            counters: EngagementCounters {
                like_count: likes,
                comment_count: comments,
                share_count: shares,
                views_count: views,
            },
            age_hours: age,
        }
    }

    #[test]
    fn zero_engagement_scores_zero_at_any_age() {
        let w = weights();
        for age in [0.0, 1.0, 24.0, 1000.0, f64::INFINITY] {
            assert_eq!(trending_score(&w, &record(0, 0, 0, 0, age)), 0.0);
        }
    }

    #[test]
    fn score_decays_monotonically_with_age() {
        let w = weights();
        let s0 = trending_score(&w, &record(10, 5, 2, 100, 0.0));
        let s10 = trending_score(&w, &record(10, 5, 2, 100, 10.0));
        let s100 = trending_score(&w, &record(10, 5, 2, 100, 100.0));
        assert!(s0 >= s10 && s10 >= s100);
        assert!(s0 > s100);
    }

    #[test]
    fn share_delta_contributes_four_per_share() {
        let w = weights();
        let base = raw_engagement(&w, &record(3, 1, 2, 7, 0.0).counters);
        let bumped = raw_engagement(&w, &record(3, 1, 7, 7, 0.0).counters);
        assert_eq!(bumped - base, 4.0 * 5.0);
    }

    #[test]
    fn documented_scenario_scores_71_5() {
        // likes=10, comments=5, shares=2, views=100, age=1h
        // raw = 20 + 15 + 100 + 8 = 143; score = 143 / 2 = 71.5
        let w = weights();
        let r = record(10, 5, 2, 100, 1.0);
        assert_eq!(raw_engagement(&w, &r.counters), 143.0);
        assert_eq!(trending_score(&w, &r), 71.5);
    }

    #[test]
    fn personalized_reduces_to_trending_without_signals() {
        let w = weights();
        let r = record(10, 5, 2, 100, 3.0);
        assert_eq!(personalized_score(&w, &r, 0, 0), trending_score(&w, &r));
    }

    #[test]
    fn personalization_boosts_are_decayed_too() {
        let w = weights();
        let r = record(0, 0, 0, 0, 1.0);
        // raw = 5*4 + 3*2 = 26; score = 26 / 2 = 13
        assert_eq!(personalized_score(&w, &r, 4, 2), 13.0);
    }

    #[test]
    fn missing_record_sinks_to_zero() {
        let w = weights();
        assert_eq!(
            personalized_score(&w, &EngagementRecord::missing(), 0, 0),
            0.0
        );
    }

    #[test]
    fn suggestion_score_composition() {
        let w = weights();
        let stats = CommunityEngagement {
            post_count: 4,
            member_count: 50,
            recent_post_count: 3,
            total_engagement: 40,
        };
        // 5*2 + 0.5*(40/4) + 1*(3 + 50/10) + 2 + 2 = 10 + 5 + 8 + 4 = 27
        let score = suggestion_score(&w, 2, &stats, Visibility::Public, MembershipTier::Free);
        assert_eq!(score, 27.0);
    }

    #[test]
    fn avg_engagement_guards_zero_posts() {
        let stats = CommunityEngagement {
            post_count: 0,
            member_count: 10,
            recent_post_count: 0,
            total_engagement: 0,
        };
        assert_eq!(avg_engagement_per_post(&stats), 0.0);
    }

    #[test]
    fn ranking_order_breaks_ties_by_id() {
        let low = Uuid::from_u128(1);
        let high = Uuid::from_u128(2);
        assert_eq!(
            compare_ranked((5.0, high), (5.0, low)),
            std::cmp::Ordering::Greater
        );
        assert_eq!(
            compare_ranked((6.0, high), (5.0, low)),
            std::cmp::Ordering::Less
        );
    }
}
