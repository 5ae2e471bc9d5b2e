//! Dry-run queries against a pool definition: evaluates a single swap, join,
//! exit, invariant or amplification query and prints the result as JSON.

pub mod arguments;
pub mod config;
mod observe;
mod run;

pub use run::{run, start};
