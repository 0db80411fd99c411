use crate::config::SolverConfig;
use crate::estimation::SmoothingResult;
use crate::fixed_point::FixedPoint;
use crate::moments::initial_guess;
use crate::params::Params;
use crate::record::Record;
use anyhow::{bail, Context, Result};
use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::time::Instant;
use strum_macros::Display;

/// Why a solve could not produce a usable prior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailureCause {
    /// Nothing left after dropping records without impressions
    NoInformativeRecords,
    /// All CTRs are identical, the method of moments is undefined
    ZeroVariance,
    /// The method of moments gave a non-positive α or β
    InvalidInitialGuess,
    NonFiniteUpdate,
    NonPositiveUpdate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    /// The delta dropped to epsilon or below
    Converged,
    /// Iteration budget spent, the estimate is a best effort
    Exhausted,
    Failed(FailureCause),
}

impl SolveStatus {
    pub fn is_usable(&self) -> bool {
        !matches!(self, SolveStatus::Failed(_))
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SolveStatus::Converged => write!(f, "converged"),
            SolveStatus::Exhausted => write!(f, "exhausted"),
            SolveStatus::Failed(cause) => write!(f, "failed({})", cause),
        }
    }
}

/// A map that moves (α, β) toward the maximum likelihood estimate.
pub trait UpdateMap {
    fn update(&self, params: Params) -> Params;

    /// Accelerated step, costing `ACCELERATED_EVALUATIONS` updates
    fn accelerate(&self, params: Params) -> Params;
}

/// Plain updates spent by one accelerated step
pub const ACCELERATED_EVALUATIONS: usize = 2;

impl UpdateMap for FixedPoint<'_> {
    fn update(&self, params: Params) -> Params {
        FixedPoint::update(self, params)
    }

    fn accelerate(&self, params: Params) -> Params {
        FixedPoint::accelerate(self, params)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Plain,
    Accelerated,
    /// An accelerated step went out of bounds, plain steps only from here on
    FallenBack,
}

/// Terminal state of the iteration for one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Iteration {
    pub status: SolveStatus,
    /// Final parameters, `None` exactly when the status is `Failed`
    pub params: Option<Params>,
    pub iterations: usize,
    /// Number of plain update evaluations, accelerated steps count two
    pub evaluations: usize,
    pub accelerated_steps: usize,
    pub fell_back: bool,
    pub last_delta: Option<f64>,
}

impl Iteration {
    fn start() -> Self {
        Self {
            status: SolveStatus::Exhausted,
            params: None,
            iterations: 0,
            evaluations: 0,
            accelerated_steps: 0,
            fell_back: false,
            last_delta: None,
        }
    }

    fn finish(mut self, status: SolveStatus, params: Option<Params>) -> Self {
        self.status = status;
        self.params = params;
        self
    }

    fn failed(cause: FailureCause) -> Self {
        Self::start().finish(SolveStatus::Failed(cause), None)
    }
}

/// Run the fixed-point iteration from `initial` until the delta between two
/// successive estimates is at most `epsilon` or `max_iterations` steps are
/// taken.
///
/// After `warm_up_iterations` plain steps each step is a Steffensen step. The
/// first accelerated estimate that is not a valid Beta parameter pair is
/// replaced by a plain step from the last valid estimate, and acceleration is
/// not tried again for this batch.
pub fn iterate<M: UpdateMap>(map: &M, initial: Params, config: &SolverConfig) -> Iteration {
    let mut state = Iteration::start();
    if !initial.is_valid() {
        return Iteration::failed(FailureCause::InvalidInitialGuess);
    }
    let mut phase = Phase::Plain;
    let mut current = initial;
    let mut previous: Option<Params> = None;

    loop {
        if let Some(previous) = previous {
            let delta = current.delta(&previous, config.delta_metric);
            state.last_delta = Some(delta);
            if delta <= config.epsilon {
                return state.finish(SolveStatus::Converged, Some(current));
            }
        }
        if state.iterations >= config.max_iterations {
            return state.finish(SolveStatus::Exhausted, Some(current));
        }
        state.iterations += 1;

        if phase == Phase::Plain && state.iterations > config.warm_up_iterations {
            debug!(
                "Switching to accelerated steps at iteration {}",
                state.iterations
            );
            phase = Phase::Accelerated;
        }

        let next = match phase {
            Phase::Accelerated => {
                let candidate = map.accelerate(current);
                state.evaluations += ACCELERATED_EVALUATIONS;
                if candidate.is_valid() {
                    state.accelerated_steps += 1;
                    candidate
                } else {
                    debug!(
                        "Accelerated step gave α = {}, β = {} at iteration {}, falling back to plain steps",
                        candidate.alpha, candidate.beta, state.iterations
                    );
                    phase = Phase::FallenBack;
                    state.fell_back = true;
                    state.evaluations += 1;
                    map.update(current)
                }
            }
            Phase::Plain | Phase::FallenBack => {
                state.evaluations += 1;
                map.update(current)
            }
        };

        if !next.is_finite() {
            debug!("Non-finite update at iteration {}", state.iterations);
            let cause = SolveStatus::Failed(FailureCause::NonFiniteUpdate);
            return state.finish(cause, None);
        }
        if !next.is_valid() {
            debug!(
                "Update left the parameter space at iteration {}: α = {}, β = {}",
                state.iterations, next.alpha, next.beta
            );
            let cause = SolveStatus::Failed(FailureCause::NonPositiveUpdate);
            return state.finish(cause, None);
        }
        previous = Some(current);
        current = next;
    }
}

/// Everything known about one solve, whether it succeeded or not.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolveReport {
    pub group_id: i64,
    /// Records passed in
    pub batch_size: usize,
    /// Records left after filtering
    pub used_records: usize,
    pub status: SolveStatus,
    pub iterations: usize,
    pub evaluations: usize,
    pub accelerated_steps: usize,
    pub fell_back: bool,
    pub last_delta: Option<f64>,
    pub elapsed_ms: f64,
    pub estimate: Option<SmoothingResult>,
}

impl SolveReport {
    pub fn estimate(&self) -> Option<&SmoothingResult> {
        self.estimate.as_ref()
    }

    pub fn is_converged(&self) -> bool {
        self.status == SolveStatus::Converged
    }
}

/// Empirical-Bayes estimator of the Beta prior behind click/impression counts.
#[derive(Debug, Clone)]
pub struct BayesSmoother {
    config: SolverConfig,
}

impl BayesSmoother {
    pub fn new(config: SolverConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Fit (α, β) to the records of one group.
    ///
    /// Returns an error only for an empty batch or when a dedicated worker
    /// pool cannot be started. Numerical trouble is reported through the
    /// status of the returned report.
    pub fn solve(&self, group_id: i64, records: &[Record]) -> Result<SolveReport> {
        if records.is_empty() {
            bail!("illegal data: group {} has no records", group_id);
        }
        match self.config.threads {
            Some(threads) => {
                let pool = build_pool(threads)?;
                Ok(pool.install(|| self.solve_in_current_pool(group_id, records)))
            }
            None => Ok(self.solve_in_current_pool(group_id, records)),
        }
    }

    /// Solve many groups at once, each on its own batch.
    ///
    /// Groups run concurrently on one pool, sized by `threads` when set.
    /// Reports come back in input order.
    pub fn solve_all(&self, groups: &[(i64, Vec<Record>)]) -> Result<Vec<SolveReport>> {
        if let Some((group_id, _)) = groups.iter().find(|(_, records)| records.is_empty()) {
            bail!("illegal data: group {} has no records", group_id);
        }
        let run = || {
            groups
                .par_iter()
                .map(|(group_id, records)| self.solve_in_current_pool(*group_id, records))
                .collect::<Vec<_>>()
        };
        match self.config.threads {
            Some(threads) => Ok(build_pool(threads)?.install(run)),
            None => Ok(run()),
        }
    }

    fn solve_in_current_pool(&self, group_id: i64, records: &[Record]) -> SolveReport {
        let timer = Instant::now();
        let batch: Cow<[Record]> = if self.config.skip_empty_records {
            Cow::Owned(records.iter().filter(|r| !r.is_empty()).copied().collect())
        } else {
            Cow::Borrowed(records)
        };

        let iteration = match initial_guess(&batch, self.config.variance) {
            Ok(initial) => {
                debug!(
                    "Group {}: initial α = {}, β = {} from {} records",
                    group_id,
                    initial.alpha,
                    initial.beta,
                    batch.len()
                );
                let map = FixedPoint::new(&batch, self.config.parallel_threshold);
                iterate(&map, initial, &self.config)
            }
            Err(cause) => Iteration::failed(cause),
        };

        let report = SolveReport {
            group_id,
            batch_size: records.len(),
            used_records: batch.len(),
            status: iteration.status,
            iterations: iteration.iterations,
            evaluations: iteration.evaluations,
            accelerated_steps: iteration.accelerated_steps,
            fell_back: iteration.fell_back,
            last_delta: iteration.last_delta,
            elapsed_ms: timer.elapsed().as_secs_f64() * 1e3,
            estimate: iteration
                .params
                .map(|params| SmoothingResult::from_params(group_id, params)),
        };
        debug!(
            "Group {}: {} after {} iterations ({} evaluations)",
            group_id, report.status, report.iterations, report.evaluations
        );
        report
    }
}

fn build_pool(threads: usize) -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .context("Could not start worker pool")
}
