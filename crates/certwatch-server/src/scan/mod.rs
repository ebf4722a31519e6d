pub mod classify;
pub mod reconcile;
pub mod scheduler;

pub use classify::classify;
pub use reconcile::{Reconciler, SyncReport};
pub use scheduler::ScanScheduler;
