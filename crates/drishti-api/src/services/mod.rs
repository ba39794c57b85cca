//! Outbound services used by handlers.

pub mod summary;

pub use summary::{SummaryClient, SummaryConfig, ZoneStats};
