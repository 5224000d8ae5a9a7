//! CLI domain: parse, route and output only.
//! Reconciler assembly lives in [`crate::engine`].

mod output;
mod parse;
mod route;

pub use output::{
    format_outcomes_json, format_outcomes_text, format_stats, format_validation_errors, map_error,
};
pub use parse::{Cli, Commands};
pub use route::{shutdown_signal, CommandOutput, RunContext};
