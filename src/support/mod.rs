//! Support scoring: buckets, the interaction aggregator and the tally

pub mod category;
pub mod interactions;
pub mod tally;

pub use category::SupportCategory;
pub use interactions::{HistoryOptions, InteractionAggregator, LastContactInfo};
pub use tally::{build_tally, ByCategory, ProjectedOutcome, Tally, TallyEngine};
