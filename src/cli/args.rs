use clap::Parser;
use std::path::PathBuf;

use crate::sweep::FrequencyAxis;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    long_about,
    help_template(
        "{before-help}{name} {version}\n{author-with-newline}{about-with-newline}\n{usage-heading} {usage}\n\n{all-args}{after-help}"
    )
)]
pub struct Args {
    /// Path to TOML configuration file.
    #[arg(short, long, default_value = "sweep.toml")]
    pub config: PathBuf,

    /// Directory under which run workspaces should be created.
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Number of runs to execute at once.
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Fail a run when a tool exits with a non-zero status.
    #[arg(long)]
    pub strict: bool,

    /// Print raw tool output.
    #[arg(long)]
    pub echo: bool,

    /// Kill tools that run longer than this many seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Frequency sweep in MHz for every project, as `freq` or `lo,hi,step`.
    #[arg(long, value_name = "SPEC")]
    pub frequency: Option<FrequencyAxis>,

    /// Comma separated widths to sweep for every project.
    #[arg(long, value_name = "W1,W2,...")]
    pub widths: Option<String>,

    /// Write results to this file as JSON.
    #[arg(long, value_name = "PATH")]
    pub json: Option<PathBuf>,
}
