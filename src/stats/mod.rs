pub mod cache;
pub mod form;
pub mod standings;

pub use cache::StatsCache;
pub use form::{FormBadge, FormSummary};
pub use standings::{PreviousSeason, Rank, StandingsSnapshot};
