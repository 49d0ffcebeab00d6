use clap::{Parser, Subcommand, ValueEnum, ValueHint};
use flowcal_algo::NanPolicy;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "flowcal", author, version, about, long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info")]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the hourly flow model over a window and score it against measurements
    Run {
        /// Run configuration (YAML or JSON)
        #[arg(long, value_hint = ValueHint::FilePath)]
        config: PathBuf,
        /// First hour, `yyyymmdd:hh`
        #[arg(long)]
        start: String,
        /// Last hour (inclusive); defaults to `start`
        #[arg(long)]
        end: Option<String>,
        /// Directory for measured/modelled flows and the error report
        #[arg(short, long, value_hint = ValueHint::DirPath)]
        out: Option<PathBuf>,
        /// Worker threads (0 = all cores); overrides the configuration
        #[arg(long)]
        threads: Option<usize>,
    },
    /// Score two hourly flow files against each other
    Errors {
        /// Measured flows (`time` column plus one column per corridor)
        #[arg(long, value_hint = ValueHint::FilePath)]
        measured: PathBuf,
        /// Modelled flows in the same layout
        #[arg(long, value_hint = ValueHint::FilePath)]
        modelled: PathBuf,
        #[arg(long, value_enum, default_value_t = NanPolicyArg::Exclude)]
        nan_policy: NanPolicyArg,
        /// Write the per-corridor metrics as JSON
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Calibrate branch parameters over disjoint intervals in parallel
    Calibrate {
        #[arg(long, value_hint = ValueHint::FilePath)]
        config: PathBuf,
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: Option<String>,
        /// Number of intervals; overrides the configuration
        #[arg(long)]
        workers: Option<usize>,
        /// Manifest path
        #[arg(long, default_value = "calibration.json")]
        manifest: PathBuf,
        #[arg(long)]
        threads: Option<usize>,
    },
    /// Topology utilities
    Topology {
        #[command(subcommand)]
        command: TopologyCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum TopologyCommands {
    /// Print bus, branch and degree statistics
    Stats {
        /// Topology directory (`bus.csv`, `line.csv`, ...)
        #[arg(long, value_hint = ValueHint::DirPath)]
        dir: PathBuf,
    },
    /// List AC islands
    Islands {
        #[arg(long, value_hint = ValueHint::DirPath)]
        dir: PathBuf,
        /// Print the buses of every island
        #[arg(long)]
        emit: bool,
    },
    /// Apply the service-year filter and island pruning, then write the result
    Prepare {
        #[arg(long, value_hint = ValueHint::DirPath)]
        dir: PathBuf,
        #[arg(long)]
        year: Option<i32>,
        #[arg(short, long, value_hint = ValueHint::DirPath)]
        out: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum NanPolicyArg {
    Exclude,
    Fail,
}

impl From<NanPolicyArg> for NanPolicy {
    fn from(arg: NanPolicyArg) -> Self {
        match arg {
            NanPolicyArg::Exclude => NanPolicy::Exclude,
            NanPolicyArg::Fail => NanPolicy::Fail,
        }
    }
}
