pub mod engagement;
pub mod personalization;
pub mod ranking;
pub mod scoring;

pub use engagement::EngagementAggregator;
pub use personalization::{PersonalizationResolver, PersonalizationSnapshot};
pub use ranking::RankingService;
