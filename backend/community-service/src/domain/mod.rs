pub mod level;
pub mod models;

pub use models::{
    CascadeSummary, Community, Membership, MembershipKind, MembershipLevel, MembershipRole,
    MembershipStatus, MembershipTier, NewMembership, Page, PageRequest, Pagination,
    Subscription, SubscriptionStatus, SubscriptionUpdate, Visibility,
};
