use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ServiceError;

/// Role a member holds within a community
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipRole {
    Member,
    Admin,
}

impl MembershipRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipRole::Member => "member",
            MembershipRole::Admin => "admin",
        }
    }
}

impl FromStr for MembershipRole {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "member" => Ok(MembershipRole::Member),
            "admin" => Ok(MembershipRole::Admin),
            other => Err(ServiceError::Internal(format!("unknown role: {}", other))),
        }
    }
}

/// Lifecycle status of a membership
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipStatus {
    Active,
    Inactive,
    Banned,
    Anonymous,
}

impl MembershipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipStatus::Active => "active",
            MembershipStatus::Inactive => "inactive",
            MembershipStatus::Banned => "banned",
            MembershipStatus::Anonymous => "anonymous",
        }
    }
}

impl FromStr for MembershipStatus {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(MembershipStatus::Active),
            "inactive" => Ok(MembershipStatus::Inactive),
            "banned" => Ok(MembershipStatus::Banned),
            "anonymous" => Ok(MembershipStatus::Anonymous),
            other => Err(ServiceError::Internal(format!("unknown status: {}", other))),
        }
    }
}

/// Whether a community charges for membership
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipTier {
    Free,
    Paid,
}

impl MembershipTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipTier::Free => "free",
            MembershipTier::Paid => "paid",
        }
    }
}

impl FromStr for MembershipTier {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(MembershipTier::Free),
            "paid" => Ok(MembershipTier::Paid),
            other => Err(ServiceError::Internal(format!(
                "unknown membership type: {}",
                other
            ))),
        }
    }
}

/// Community visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

impl FromStr for Visibility {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Visibility::Public),
            "private" => Ok(Visibility::Private),
            other => Err(ServiceError::Internal(format!(
                "unknown visibility: {}",
                other
            ))),
        }
    }
}

/// Payment state of a paid membership
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Free,
    Paid,
    Expired,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Free => "free",
            SubscriptionStatus::Paid => "paid",
            SubscriptionStatus::Expired => "expired",
        }
    }
}

impl FromStr for SubscriptionStatus {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(SubscriptionStatus::Free),
            "paid" => Ok(SubscriptionStatus::Paid),
            "expired" => Ok(SubscriptionStatus::Expired),
            other => Err(ServiceError::Internal(format!(
                "unknown subscription status: {}",
                other
            ))),
        }
    }
}

/// Subscription details carried by paid memberships
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub start_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub auto_renew: bool,
}

/// The free/paid branch of a membership.
///
/// Subscription state only exists on the paid variant, so serialization of
/// a free membership omits it by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "membership_type", rename_all = "lowercase")]
pub enum MembershipKind {
    Free,
    Paid {
        subscription_status: SubscriptionStatus,
        subscription: Subscription,
    },
}

impl MembershipKind {
    pub fn tier(&self) -> MembershipTier {
        match self {
            MembershipKind::Free => MembershipTier::Free,
            MembershipKind::Paid { .. } => MembershipTier::Paid,
        }
    }
}

/// Gamification state of a membership
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipLevel {
    pub points: i64,
    pub current_level: i32,
    pub progress: i32,
}

impl Default for MembershipLevel {
    fn default() -> Self {
        Self {
            points: 0,
            current_level: 1,
            progress: 0,
        }
    }
}

/// The relationship record binding a user to a community
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Membership {
    pub id: Uuid,
    pub user_id: Uuid,
    pub community_id: Uuid,
    pub role: MembershipRole,
    pub status: MembershipStatus,
    #[serde(flatten)]
    pub kind: MembershipKind,
    pub level: MembershipLevel,
    pub joined_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Membership {
    pub fn is_active(&self) -> bool {
        self.status == MembershipStatus::Active
    }

    pub fn is_admin(&self) -> bool {
        self.role == MembershipRole::Admin
    }

    /// Role-guarded transitions require an active admin membership
    pub fn can_perform_admin_actions(&self) -> bool {
        self.is_active() && self.is_admin()
    }

    /// Paid and not past its end date (an open-ended subscription counts)
    pub fn has_active_subscription(&self) -> bool {
        match &self.kind {
            MembershipKind::Free => false,
            MembershipKind::Paid {
                subscription_status,
                subscription,
            } => {
                if *subscription_status != SubscriptionStatus::Paid {
                    return false;
                }
                match subscription.end_date {
                    Some(end) => end > Utc::now(),
                    None => true,
                }
            }
        }
    }

    /// Days remaining on the subscription, rounded up; `None` when there is
    /// no end date to count down to.
    pub fn subscription_time_remaining(&self) -> Option<i64> {
        match &self.kind {
            MembershipKind::Free => None,
            MembershipKind::Paid { subscription, .. } => {
                let end = subscription.end_date?;
                let remaining = (end - Utc::now()).num_seconds();
                if remaining <= 0 {
                    Some(0)
                } else {
                    Some((remaining + 86399) / 86400)
                }
            }
        }
    }
}

/// Input for the exclusive membership insert
#[derive(Debug, Clone)]
pub struct NewMembership {
    pub user_id: Uuid,
    pub community_id: Uuid,
    pub role: MembershipRole,
    pub status: MembershipStatus,
    pub kind: MembershipKind,
}

/// Caller-supplied subscription changes; unset fields keep their value
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscriptionUpdate {
    pub status: Option<SubscriptionStatus>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub plan: Option<String>,
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub payment_method: Option<String>,
    pub auto_renew: Option<bool>,
}

/// A community as seen by the membership lifecycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Community {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    pub visibility: Visibility,
    pub membership_type: MembershipTier,
    pub interests: Vec<String>,
    pub member_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Row counts removed by a community-deletion cascade
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeSummary {
    pub memberships_deleted: u64,
    pub payment_methods_deleted: u64,
}

/// Validated page/limit pair. 1-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    pub fn new(
        page: Option<i64>,
        limit: Option<i64>,
        default_limit: i64,
        max_limit: i64,
    ) -> Result<Self, ServiceError> {
        let page = page.unwrap_or(1);
        let limit = limit.unwrap_or(default_limit);
        if page < 1 {
            return Err(ServiceError::Validation(
                "page must be a positive integer".to_string(),
            ));
        }
        if limit < 1 {
            return Err(ServiceError::Validation(
                "limit must be a positive integer".to_string(),
            ));
        }
        Ok(Self {
            page,
            limit: limit.min(max_limit),
        })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

/// Pagination envelope for member listings
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pagination {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl Pagination {
    pub fn new(total: i64, request: PageRequest) -> Self {
        let total_pages = if total == 0 {
            0
        } else {
            (total + request.limit - 1) / request.limit
        };
        Self {
            total,
            page: request.page,
            limit: request.limit,
            total_pages,
            has_next_page: request.page < total_pages,
            has_prev_page: request.page > 1,
        }
    }
}

/// One page of results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn membership(kind: MembershipKind) -> Membership {
        Membership {
            id: Uuid::from_u128(1),
            user_id: Uuid::from_u128(2),
            community_id: Uuid::from_u128(3),
            role: MembershipRole::Member,
            status: MembershipStatus::Active,
            kind,
            level: MembershipLevel::default(),
            joined_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn free_membership_serializes_without_subscription_fields() {
        let value = serde_json::to_value(membership(MembershipKind::Free)).unwrap();
        assert_eq!(value["membership_type"], "free");
        assert!(value.get("subscription").is_none());
        assert!(value.get("subscription_status").is_none());
    }

    #[test]
    fn paid_membership_serializes_subscription_state() {
        let kind = MembershipKind::Paid {
            subscription_status: SubscriptionStatus::Free,
            subscription: Subscription {
                start_date: Some(Utc::now()),
                plan: Some("basic".to_string()),
                ..Subscription::default()
            },
        };
        let value = serde_json::to_value(membership(kind)).unwrap();
        assert_eq!(value["membership_type"], "paid");
        assert_eq!(value["subscription_status"], "free");
        assert_eq!(value["subscription"]["plan"], "basic");
        // unset optionals are omitted, not null
        assert!(value["subscription"].get("end_date").is_none());
    }

    #[test]
    fn membership_roundtrips_through_json() {
        let original = membership(MembershipKind::Paid {
            subscription_status: SubscriptionStatus::Paid,
            subscription: Subscription {
                start_date: Some(Utc::now()),
                end_date: Some(Utc::now() + Duration::days(30)),
                plan: Some("annual".to_string()),
                auto_renew: true,
                ..Subscription::default()
            },
        });
        let json = serde_json::to_string(&original).unwrap();
        let parsed: Membership = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn subscription_activity_checks() {
        let free = membership(MembershipKind::Free);
        assert!(!free.has_active_subscription());
        assert_eq!(free.subscription_time_remaining(), None);

        let unpaid = membership(MembershipKind::Paid {
            subscription_status: SubscriptionStatus::Free,
            subscription: Subscription::default(),
        });
        assert!(!unpaid.has_active_subscription());

        let open_ended = membership(MembershipKind::Paid {
            subscription_status: SubscriptionStatus::Paid,
            subscription: Subscription::default(),
        });
        assert!(open_ended.has_active_subscription());

        let expiring = membership(MembershipKind::Paid {
            subscription_status: SubscriptionStatus::Paid,
            subscription: Subscription {
                end_date: Some(Utc::now() + Duration::days(10)),
                ..Subscription::default()
            },
        });
        assert!(expiring.has_active_subscription());
        assert_eq!(expiring.subscription_time_remaining(), Some(10));

        let lapsed = membership(MembershipKind::Paid {
            subscription_status: SubscriptionStatus::Paid,
            subscription: Subscription {
                end_date: Some(Utc::now() - Duration::days(1)),
                ..Subscription::default()
            },
        });
        assert!(!lapsed.has_active_subscription());
        assert_eq!(lapsed.subscription_time_remaining(), Some(0));
    }

    #[test]
    fn admin_guard_requires_active_status() {
        let mut m = membership(MembershipKind::Free);
        m.role = MembershipRole::Admin;
        assert!(m.can_perform_admin_actions());
        m.status = MembershipStatus::Banned;
        assert!(!m.can_perform_admin_actions());
    }
}
