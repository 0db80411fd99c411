use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use strum_macros::{Display, EnumString};

/// How the change between two successive estimates is measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeltaMetric {
    /// max(|Δα/α|, |Δβ/β|)
    Relative,
    /// max(|Δα|, |Δβ|)
    Absolute,
}

/// Variance estimator used by the method-of-moments initializer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum VarianceEstimator {
    /// Divide by n - 1
    Sample,
    /// Divide by n
    Population,
}

/// Tuning knobs for one empirical-Bayes solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub epsilon: f64,
    pub max_iterations: usize,
    /// Plain fixed-point steps taken before Steffensen acceleration is tried
    pub warm_up_iterations: usize,
    pub delta_metric: DeltaMetric,
    pub variance: VarianceEstimator,
    /// Drop records without impressions before initializing
    pub skip_empty_records: bool,
    /// Batches larger than this are summed by splitting in halves
    pub parallel_threshold: usize,
    /// Size of a dedicated worker pool for one solve, `None` uses the current pool
    pub threads: Option<usize>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            epsilon: 1e-6,
            max_iterations: 1000,
            warm_up_iterations: 100,
            delta_metric: DeltaMetric::Relative,
            variance: VarianceEstimator::Sample,
            skip_empty_records: true,
            parallel_threshold: 128,
            threads: None,
        }
    }
}

impl SolverConfig {
    pub fn new(epsilon: f64, max_iterations: usize) -> Self {
        Self {
            epsilon,
            max_iterations,
            ..Self::default()
        }
    }

    /// Load a JSON config, missing fields fall back to the defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Could not open config file: {}", path.display()))?;
        let config: SolverConfig = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Could not parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_warm_up_iterations(mut self, warm_up_iterations: usize) -> Self {
        self.warm_up_iterations = warm_up_iterations;
        self
    }

    pub fn with_delta_metric(mut self, delta_metric: DeltaMetric) -> Self {
        self.delta_metric = delta_metric;
        self
    }

    pub fn with_variance(mut self, variance: VarianceEstimator) -> Self {
        self.variance = variance;
        self
    }

    pub fn with_skip_empty_records(mut self, skip: bool) -> Self {
        self.skip_empty_records = skip;
        self
    }

    pub fn with_parallel_threshold(mut self, parallel_threshold: usize) -> Self {
        self.parallel_threshold = parallel_threshold;
        self
    }

    pub fn with_threads(mut self, threads: Option<usize>) -> Self {
        self.threads = threads;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.epsilon.is_finite() && self.epsilon > 0.0) {
            bail!("epsilon must be a positive number, got {}", self.epsilon);
        }
        if self.max_iterations == 0 {
            bail!("max_iterations must be at least 1");
        }
        if self.parallel_threshold == 0 {
            bail!("parallel_threshold must be at least 1");
        }
        if self.threads == Some(0) {
            bail!("threads must be at least 1 when set");
        }
        Ok(())
    }
}
