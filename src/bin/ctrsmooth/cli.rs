// src/cli.rs
use clap::Parser;

/// Fit Beta priors to click/impression counts and smooth CTRs per group.
#[derive(Parser, Debug)]
#[command(name = "ctrsmooth", version, about = "Empirical-Bayes CTR smoothing")]
pub struct Cli {
    #[arg(
        value_name = "RECORDS",
        help = "Delimited file with group_id, subject, clicks and impressions columns"
    )]
    pub records: String,

    #[arg(
        long,
        short,
        default_value = "ctrsmooth",
        value_name = "OUT",
        help = "Output directory, must not exist"
    )]
    pub out: String,

    #[arg(long, value_name = "CONFIG", help = "JSON solver configuration")]
    pub config: Option<String>,

    #[arg(long, help = "Convergence threshold [default: 1e-6]")]
    pub epsilon: Option<f64>,

    #[arg(long, help = "Maximum number of iterations per group [default: 1000]")]
    pub max_iterations: Option<usize>,

    #[arg(long, help = "Plain iterations before acceleration [default: 100]")]
    pub warm_up: Option<usize>,

    #[arg(
        long,
        help = "Groups larger than this are summed in parallel [default: 128]"
    )]
    pub parallel_threshold: Option<usize>,

    #[arg(long, short, help = "Number of threads to use [default: all cores]")]
    pub threads: Option<usize>,

    #[arg(long, default_value = "\t", help = "Field delimiter of the records file")]
    pub delimiter: char,

    #[arg(long, help = "Also write smoothed CTRs per subject")]
    pub scores: bool,

    #[arg(
        value_enum,
        long,
        default_value = "normal",
        value_name = "VERBOSITY",
        help = "Verbosity level"
    )]
    pub verbosity: LogLevel,
}

#[derive(Debug, clap::ValueEnum, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Verbose,
    Normal,
    Silent,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Verbose => write!(f, "verbose"),
            LogLevel::Normal => write!(f, "normal"),
            LogLevel::Silent => write!(f, "silent"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["ctrsmooth", "records.tsv"]);
        assert_eq!(cli.records, "records.tsv");
        assert_eq!(cli.out, "ctrsmooth");
        assert_eq!(cli.delimiter, '\t');
        assert_eq!(cli.verbosity, LogLevel::Normal);
        assert!(cli.epsilon.is_none());
        assert!(!cli.scores);
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::parse_from([
            "ctrsmooth",
            "records.csv",
            "--out",
            "results",
            "--epsilon",
            "1e-8",
            "--threads",
            "4",
            "--delimiter",
            ",",
            "--scores",
            "--verbosity",
            "silent",
        ]);
        assert_eq!(cli.out, "results");
        assert_eq!(cli.epsilon, Some(1e-8));
        assert_eq!(cli.threads, Some(4));
        assert_eq!(cli.delimiter, ',');
        assert!(cli.scores);
        assert_eq!(cli.verbosity, LogLevel::Silent);
    }
}
