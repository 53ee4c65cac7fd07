mod cache;
mod prorater;
mod store;
mod summarizer;

pub use cache::{CacheError, ReportCache};
pub use prorater::{ProRateError, ProRater};
pub use store::{ReportStore, StoreError};
pub use summarizer::Summarizer;
