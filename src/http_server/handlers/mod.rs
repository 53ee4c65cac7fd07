pub mod metrics;
pub mod reports;
pub mod status;
