pub mod sweep;
pub mod tracker;
pub mod types;

pub use sweep::{spawn_reconciliation_sweep, spawn_retry_sweep};
pub use tracker::DeliveryTracker;
pub use types::{DeliveryOutcome, DeliveryRequest};
