use crate::cli;
use crate::io::{write_reports_json, EstimateWriter, ScoreWriter};
use anyhow::{bail, Result};
use ctrsmooth_utils::reader::read_groups_from_path;
use ctrsmooth_utils::{BayesSmoother, Record, SolveReport, SolveStatus, SolverConfig};
use log::{debug, info, warn};
use std::path::Path;
use std::time::Instant;

/// Config file values, overridden by whatever was given on the command line
pub fn solver_config(args: &cli::Cli) -> Result<SolverConfig> {
    let mut config = match &args.config {
        Some(path) => SolverConfig::from_json_file(Path::new(path))?,
        None => SolverConfig::default(),
    };
    if let Some(epsilon) = args.epsilon {
        config = config.with_epsilon(epsilon);
    }
    if let Some(max_iterations) = args.max_iterations {
        config = config.with_max_iterations(max_iterations);
    }
    if let Some(warm_up) = args.warm_up {
        config = config.with_warm_up_iterations(warm_up);
    }
    if let Some(parallel_threshold) = args.parallel_threshold {
        config = config.with_parallel_threshold(parallel_threshold);
    }
    if args.threads.is_some() {
        config = config.with_threads(args.threads);
    }
    config.validate()?;
    Ok(config)
}

pub fn ctrsmooth(args: &cli::Cli) -> Result<()> {
    let global_timer = Instant::now();
    let config = solver_config(args)?;
    debug!("Solver configuration: {:?}", config);
    let smoother = BayesSmoother::new(config)?;

    if !args.delimiter.is_ascii() {
        bail!("Delimiter must be a single ASCII character: {:?}", args.delimiter);
    }
    let groups = read_groups_from_path(Path::new(&args.records), args.delimiter as u8)?;
    if groups.is_empty() {
        warn!("No records found in {}", args.records);
    }

    let batches: Vec<(i64, Vec<Record>)> = groups
        .iter()
        .map(|group| (group.group_id, group.records()))
        .collect();
    info!("Solving {} groups", batches.len());
    let reports = smoother.solve_all(&batches)?;
    for report in &reports {
        log_report(report);
    }

    let outdir = Path::new(&args.out);
    let mut estimate_writer = EstimateWriter::new(&outdir.join("estimates.tsv"))?;
    estimate_writer.write_header()?;
    for report in &reports {
        estimate_writer.write_report(report)?;
    }
    estimate_writer.flush()?;
    write_reports_json(&outdir.join("estimates.json"), &reports)?;

    if args.scores {
        let mut score_writer = ScoreWriter::new(&outdir.join("scores.tsv"))?;
        score_writer.write_header()?;
        for (group, report) in groups.iter().zip(reports.iter()) {
            if let Some(estimate) = report.estimate() {
                score_writer.write_group(group, estimate)?;
            }
        }
        score_writer.flush()?;
    }

    let converged = reports.iter().filter(|r| r.is_converged()).count();
    let failed = reports.iter().filter(|r| !r.status.is_usable()).count();
    info!(
        "{} of {} groups converged, {} failed",
        converged,
        reports.len(),
        failed
    );
    info!("Finished processing in {:?}", global_timer.elapsed());
    Ok(())
}

fn log_report(report: &SolveReport) {
    let (alpha, beta) = report
        .estimate()
        .map(|e| (e.alpha, e.beta))
        .unwrap_or((f64::NAN, f64::NAN));
    let message = format!(
        "groupId: {}, size: {}, status: {}, iteration: {} ---> alpha: {}, beta: {} ({:.1} ms)",
        report.group_id,
        report.batch_size,
        report.status,
        report.iterations,
        alpha,
        beta,
        report.elapsed_ms
    );
    match report.status {
        SolveStatus::Converged => info!("{}", message),
        SolveStatus::Exhausted | SolveStatus::Failed(_) => warn!("{}", message),
    }
    if report.fell_back {
        debug!(
            "Group {}: acceleration was abandoned after {} accelerated steps",
            report.group_id, report.accelerated_steps
        );
    }
}
