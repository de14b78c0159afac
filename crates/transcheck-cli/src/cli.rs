use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use transcheck_core::{HarnessConfig, Suite};

/// Command-line arguments for transcheck
#[derive(Debug, Parser)]
#[command(name = "transcheck")]
#[command(about = "Verify a live transliteration UI against fixture cases", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(about = "Run fixture cases against the translator")]
    Run(RunArgs),

    #[command(about = "List fixture cases without running them")]
    List {
        #[arg(long, help = "Directory of fixture JSON files (default: built-in suite)")]
        fixtures: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = SuiteArg::All, help = "Suite to list")]
        suite: SuiteArg,
    },

    #[command(about = "Print the effective configuration as TOML")]
    Config {
        #[arg(short, long, help = "Configuration file")]
        config: Option<PathBuf>,
    },
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[arg(short, long, help = "Configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Directory of fixture JSON files (default: built-in suite)")]
    pub fixtures: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = SuiteArg::All, help = "Suite to run")]
    pub suite: SuiteArg,

    #[arg(long, help = "Only run cases whose id contains this text")]
    pub filter: Option<String>,

    #[arg(long, help = "Translator URL")]
    pub site_url: Option<String>,

    #[arg(long, help = "Output poll interval in milliseconds")]
    pub poll_interval_ms: Option<u64>,

    #[arg(long, help = "Budget for the output to appear, in milliseconds")]
    pub convergence_timeout_ms: Option<u64>,

    #[arg(long, help = "Wait after the output first appears, in milliseconds")]
    pub settle_delay_ms: Option<u64>,

    #[arg(long, help = "Pause between cases, in milliseconds")]
    pub inter_case_delay_ms: Option<u64>,

    #[arg(long, help = "Pause between typed characters, in milliseconds")]
    pub keystroke_delay_ms: Option<u64>,

    #[arg(long, help = "Number of cases run at once")]
    pub parallelism: Option<usize>,

    #[arg(long, help = "Show the browser window")]
    pub headed: bool,

    #[arg(long, help = "Write the JSON report to this file")]
    pub report_json: Option<PathBuf>,

    #[arg(long, help = "Print per-phase timings after the run")]
    pub timings: bool,
}

impl RunArgs {
    /// Apply flag overrides on top of file and environment settings.
    pub fn apply_to(&self, config: &mut HarnessConfig) {
        if let Some(url) = &self.site_url {
            config.site_url.clone_from(url);
        }
        let timing = &mut config.timing;
        for (flag, target) in [
            (self.poll_interval_ms, &mut timing.poll_interval_ms),
            (self.convergence_timeout_ms, &mut timing.convergence_timeout_ms),
            (self.settle_delay_ms, &mut timing.settle_delay_ms),
            (self.inter_case_delay_ms, &mut timing.inter_case_delay_ms),
            (self.keystroke_delay_ms, &mut timing.keystroke_delay_ms),
        ] {
            if let Some(value) = flag {
                *target = value;
            }
        }
        if let Some(parallelism) = self.parallelism {
            config.run.parallelism = parallelism;
        }
        if self.headed {
            config.browser.headless = false;
        }
    }
}

/// Suite selection on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SuiteArg {
    All,
    Positive,
    Negative,
    Incremental,
}

impl SuiteArg {
    pub fn suites(self) -> Vec<Suite> {
        match self {
            Self::All => Suite::ALL.to_vec(),
            Self::Positive => vec![Suite::Positive],
            Self::Negative => vec![Suite::Negative],
            Self::Incremental => vec![Suite::Incremental],
        }
    }
}
