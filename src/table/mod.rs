//! Table reconciliation
//!
//! Two policies act on a relational table through a [`RowStore`]:
//!
//! - [`PruneReconciler`] keeps a single sentinel row and deletes everything
//!   else, auditing each row first.
//! - [`RestoreReconciler`] captures a baseline at start-up and, every cycle,
//!   replays the inverse of any drift in one transaction.
//!
//! [`RowStore`]: crate::store::RowStore

pub mod diff;
pub mod prune;
pub mod restore;
pub mod snapshot;

pub use diff::{corrective_statement, diff, Drift, DriftRecord};
pub use prune::{PruneReconciler, PruneReport};
pub use restore::{RestoreReconciler, RestoreReport};
pub use snapshot::RowSnapshot;
