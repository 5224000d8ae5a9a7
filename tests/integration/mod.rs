//! Integration tests for the Safeguard reconciliation engine

mod config_integration;
mod engine_run;
mod mirror_scenarios;
mod properties;
mod prune_policy;
mod test_utils;
