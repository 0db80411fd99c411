use anyhow::Result;
use csv::{Writer, WriterBuilder};
use ctrsmooth_utils::reader::RecordGroup;
use ctrsmooth_utils::{SmoothingResult, SolveReport};
use itertools::Itertools;
use ordered_float::OrderedFloat;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub struct EstimateWriter {
    file: File,
    writer: Writer<File>,
}

impl EstimateWriter {
    pub fn new(file_path: &Path) -> Result<Self> {
        let file = File::create(file_path)?;
        let writer = WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .from_writer(file.try_clone()?);
        Ok(Self { file, writer })
    }

    pub fn write_header(&mut self) -> Result<()> {
        self.writer.write_record([
            "group_id",
            "n_records",
            "n_used",
            "status",
            "iterations",
            "alpha",
            "beta",
            "prior_mean",
        ])?;
        Ok(())
    }

    pub fn write_report(&mut self, report: &SolveReport) -> Result<()> {
        let (alpha, beta, prior_mean) = match report.estimate() {
            Some(estimate) => (
                estimate.alpha.to_string(),
                estimate.beta.to_string(),
                format!("{:.6}", estimate.prior_mean()),
            ),
            None => ("NA".to_string(), "NA".to_string(), "NA".to_string()),
        };
        self.writer.write_record(&[
            report.group_id.to_string(),
            report.batch_size.to_string(),
            report.used_records.to_string(),
            report.status.to_string(),
            report.iterations.to_string(),
            alpha,
            beta,
            prior_mean,
        ])?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.file.sync_all()?;
        Ok(())
    }
}

/// Smoothed CTR of every subject in a group, highest first.
pub struct ScoreWriter {
    writer: Writer<File>,
}

impl ScoreWriter {
    pub fn new(file_path: &Path) -> Result<Self> {
        let writer = WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .from_path(file_path)?;
        Ok(Self { writer })
    }

    pub fn write_header(&mut self) -> Result<()> {
        self.writer.write_record([
            "group_id",
            "rank",
            "subject",
            "clicks",
            "impressions",
            "ctr",
            "smoothed_ctr",
        ])?;
        Ok(())
    }

    pub fn write_group(&mut self, group: &RecordGroup, estimate: &SmoothingResult) -> Result<()> {
        let ranked = group
            .subjects
            .iter()
            .map(|s| (s, estimate.smoothing_ctr(&s.record)))
            .sorted_by_key(|(_, score)| std::cmp::Reverse(OrderedFloat(*score)));
        for (rank, (subject, score)) in ranked.enumerate() {
            self.writer.write_record(&[
                group.group_id.to_string(),
                (rank + 1).to_string(),
                subject.subject.clone(),
                subject.record.clicks().to_string(),
                subject.record.impressions().to_string(),
                format!("{:.6}", subject.record.ctr()),
                format!("{:.6}", score),
            ])?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

pub fn write_reports_json(file_path: &Path, reports: &[SolveReport]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(file_path)?);
    serde_json::to_writer_pretty(&mut writer, reports)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctrsmooth_utils::reader::SubjectRecord;
    use ctrsmooth_utils::{Record, SolveStatus};
    use tempfile::tempdir;

    fn report(status: SolveStatus, estimate: Option<SmoothingResult>) -> SolveReport {
        SolveReport {
            group_id: 4,
            batch_size: 3,
            used_records: 3,
            status,
            iterations: 12,
            evaluations: 12,
            accelerated_steps: 0,
            fell_back: false,
            last_delta: Some(1e-7),
            elapsed_ms: 0.5,
            estimate,
        }
    }

    #[test]
    fn test_estimate_writer() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("estimates.tsv");
        let mut writer = EstimateWriter::new(&path).unwrap();
        writer.write_header().unwrap();
        writer
            .write_report(&report(
                SolveStatus::Converged,
                Some(SmoothingResult::new(4, 1.0, 3.0)),
            ))
            .unwrap();
        writer
            .write_report(&report(
                SolveStatus::Failed(ctrsmooth_utils::FailureCause::ZeroVariance),
                None,
            ))
            .unwrap();
        writer.flush().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("group_id\tn_records"));
        assert_eq!(lines[1], "4\t3\t3\tconverged\t12\t1\t3\t0.250000");
        assert_eq!(lines[2], "4\t3\t3\tfailed(zero_variance)\t12\tNA\tNA\tNA");
    }

    #[test]
    fn test_scores_are_ranked() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scores.tsv");
        let group = RecordGroup {
            group_id: 1,
            subjects: vec![
                SubjectRecord {
                    subject: "low".to_string(),
                    record: Record::new(0, 100),
                },
                SubjectRecord {
                    subject: "high".to_string(),
                    record: Record::new(30, 100),
                },
                SubjectRecord {
                    subject: "new".to_string(),
                    record: Record::ZERO,
                },
            ],
        };
        let mut writer = ScoreWriter::new(&path).unwrap();
        writer.write_header().unwrap();
        writer
            .write_group(&group, &SmoothingResult::new(1, 1.0, 9.0))
            .unwrap();
        writer.flush().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let subjects: Vec<&str> = content
            .lines()
            .skip(1)
            .map(|line| line.split('\t').nth(2).unwrap())
            .collect();
        assert_eq!(subjects, vec!["high", "new", "low"]);
    }

    #[test]
    fn test_json_reports() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("estimates.json");
        let reports = vec![report(
            SolveStatus::Exhausted,
            Some(SmoothingResult::new(4, 2.0, 5.0)),
        )];
        write_reports_json(&path, &reports).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value[0]["status"], "exhausted");
        assert_eq!(value[0]["estimate"]["alpha"], 2.0);
    }
}
