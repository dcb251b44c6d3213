use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::domain::InterestSet;
use crate::error::{ServiceError, ServiceResult};
use crate::repository::{MembershipStore, UserStore};

/// Personalization signals for one ranking request.
///
/// Resolved once per request; every candidate in the request is scored
/// against this same snapshot.
#[derive(Debug, Clone, Default)]
pub struct PersonalizationSnapshot {
    pub viewer_id: Option<Uuid>,
    pub interests: InterestSet,
    /// Users sharing at least one interest with the viewer (capped)
    pub similar_users: Vec<Uuid>,
    /// Communities where the viewer's membership is active
    pub active_communities: HashSet<Uuid>,
    /// Communities where the viewer holds a membership of any status
    pub joined_communities: HashSet<Uuid>,
}

impl PersonalizationSnapshot {
    /// Snapshot for an unauthenticated viewer: no boosts, no memberships
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_anonymous(&self) -> bool {
        self.viewer_id.is_none()
    }
}

/// Resolves the viewer-side inputs of the scoring engine
#[derive(Clone)]
pub struct PersonalizationResolver {
    users: Arc<dyn UserStore>,
    memberships: Arc<dyn MembershipStore>,
    max_similar_users: i64,
}

impl PersonalizationResolver {
    pub fn new(
        users: Arc<dyn UserStore>,
        memberships: Arc<dyn MembershipStore>,
        max_similar_users: i64,
    ) -> Self {
        Self {
            users,
            memberships,
            max_similar_users,
        }
    }

    /// Load and normalize the viewer's interests, the similar-user set and
    /// the viewer's membership sets.
    ///
    /// Queries performed: one user interests read, one interest-overlap
    /// user scan (skipped when the interest set is empty), two membership
    /// id reads. An unknown viewer is `NotFound`; an empty interest set is
    /// valid and simply produces zero overlap boosts.
    pub async fn resolve(&self, viewer_id: Uuid) -> ServiceResult<PersonalizationSnapshot> {
        let raw = self
            .users
            .interests(viewer_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("user {}", viewer_id)))?;
        let interests = InterestSet::sanitize(raw);

        let similar_users = if interests.is_empty() {
            Vec::new()
        } else {
            self.users
                .similar_user_ids(viewer_id, &interests.to_vec(), self.max_similar_users)
                .await?
        };

        let (active_ids, joined_ids) = futures::try_join!(
            self.memberships.active_community_ids(viewer_id),
            self.memberships.joined_community_ids(viewer_id),
        )?;
        let active_communities: HashSet<Uuid> = active_ids.into_iter().collect();
        let joined_communities: HashSet<Uuid> = joined_ids.into_iter().collect();

        debug!(
            viewer = %viewer_id,
            interests = interests.len(),
            similar_users = similar_users.len(),
            active_communities = active_communities.len(),
            "Resolved personalization snapshot"
        );

        Ok(PersonalizationSnapshot {
            viewer_id: Some(viewer_id),
            interests,
            similar_users,
            active_communities,
            joined_communities,
        })
    }
}
