//! Empirical-Bayes smoothing of click-through rates.
//!
//! Fits the Beta prior behind a group of click/impression counts by maximum
//! likelihood (method-of-moments start, digamma fixed-point iteration with
//! Steffensen acceleration) and smooths each record's CTR toward it.
pub mod config;
pub mod digamma;
pub mod estimation;
pub mod fixed_point;
pub mod moments;
pub mod params;
pub mod reader;
pub mod record;
pub mod reducer;
pub mod solver;

#[cfg(test)]
mod test_utils;

pub use config::SolverConfig;
pub use estimation::SmoothingResult;
pub use record::Record;
pub use solver::{BayesSmoother, FailureCause, SolveReport, SolveStatus};
