//! Safeguard: continuous reconciliation of protected resources
//!
//! Protected directories and database tables are compared against a trusted
//! reference on a fixed interval, and any drift is undone: files are copied
//! back from a source tree, transient rows are pruned, and a baseline table
//! snapshot is replayed transactionally.

pub mod audit;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod logging;
pub mod mirror;
pub mod reconciler;
pub mod scheduler;
pub mod store;
pub mod table;
