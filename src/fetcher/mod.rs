//! Periodic configuration fetching.
//!
//! # Data Flow
//! ```text
//! PollingFetcher::run (poller.rs)
//!     → sleep FetchSchedule::next_delay (schedule.rs)
//!     → FetcherDataSource::fetch (source.rs)
//!     → cache snapshot
//!     → FetcherDelegate (hot_properties.rs)
//!     → HotProperties watchers
//! ```
//!
//! # Design Decisions
//! - Delay measured from the start of the last successful fetch
//! - Errors retry after a fixed interval and never end the loop
//! - At most one fetch in flight

pub mod hot_properties;
pub mod poller;
pub mod schedule;
pub mod source;

pub use hot_properties::HotProperties;
pub use poller::{FetcherDelegate, PollingFetcher};
pub use schedule::FetchSchedule;
pub use source::{ConfigurationInfo, FetchError, FetcherDataSource, FileDataSource, ServiceEndpoint};
