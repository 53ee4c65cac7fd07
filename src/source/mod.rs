mod data_source;
mod fetcher;
mod publisher;

pub use data_source::{DataSource, PollOutcome, PollSchedule};
pub use fetcher::{FetchError, Fetcher, HttpFetcher};
pub use publisher::{Publisher, SubscriberId, Subscription};
