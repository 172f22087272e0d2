//! `herald-scheduler`: the scheduled item store and the service that
//! publishes due items.
//!
//! Items live in the `scheduled_content` table ([`store::ScheduledItemStore`]).
//! [`service::SchedulerService::process_due`] is the sweep: it claims due
//! items atomically, dispatches them through the publish adapters with
//! bounded concurrency, and records each outcome on the item.

pub mod content;
pub mod db;
pub mod error;
pub mod service;
pub mod store;
pub mod types;

pub use content::{ContentStatus, ContentStatusSink, NoopContentStatus, SqliteContentStatus};
pub use error::{Result, SchedulerError};
pub use service::{SchedulerService, SweepConfig};
pub use store::ScheduledItemStore;
pub use types::{ItemStatus, ListFilter, NewSchedule, ScheduledItem, SweepReport};
