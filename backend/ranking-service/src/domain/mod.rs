pub mod interests;
pub mod models;

pub use interests::InterestSet;
pub use models::{
    CandidateCommunity, CandidatePost, CommunityEngagement, CommunityScoreFactors,
    EngagementCounters, EngagementRecord, MembershipTier, Page, PageRequest, Pagination,
    PostScoreFactors, RankScope, ScoredCommunity, ScoredPost, Visibility,
};
