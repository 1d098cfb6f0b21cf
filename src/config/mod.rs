use std::path::PathBuf;
use std::time::Duration;

use arcstr::ArcStr;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::sweep::{expand_widths, FrequencyAxis, FrequencySweep};

pub mod file;

pub use file::{parse_sweep_config, parse_sweep_config_str, SweepConfig};

/// Everything needed to sweep one project.
///
/// # Example
///
/// ```
/// use std::path::PathBuf;
/// use synsweep::config::SweepSpec;
/// use synsweep::sweep::FrequencyAxis;
///
/// let spec = SweepSpec::builder()
///     .project("det")
///     .sources(vec![PathBuf::from("/rtl/det.sv")])
///     .widths(vec![8, 16])
///     .frequency(FrequencyAxis::Single(500))
///     .build()
///     .unwrap();
/// assert_eq!(spec.expanded_widths().unwrap(), vec![8, 16]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(
    derive(Debug),
    build_fn(validate = "Self::validate", error = "ConfigError")
)]
pub struct SweepSpec {
    #[builder(setter(into))]
    pub project: ArcStr,
    /// Design sources, read by the synthesis tool in this order.
    #[builder(default)]
    pub sources: Vec<PathBuf>,
    #[builder(default)]
    pub include_paths: Vec<String>,
    /// Template rendered to `top.sv` in every run workspace.
    #[builder(default, setter(into, strip_option))]
    pub top_level_template: Option<PathBuf>,
    pub frequency: FrequencyAxis,
    /// Widths to sweep. Defaults to [`crate::sweep::DEFAULT_WIDTH`] alone.
    #[builder(default, setter(strip_option))]
    pub widths: Option<Vec<u32>>,
}

impl SweepSpec {
    #[inline]
    pub fn builder() -> SweepSpecBuilder {
        SweepSpecBuilder::default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_spec(
            Some(&self.project),
            Some(&self.frequency),
            self.widths.as_deref(),
        )
    }

    pub fn expanded_widths(&self) -> Result<Vec<u32>, ConfigError> {
        expand_widths(self.widths.as_deref())
    }

    pub fn expanded_frequencies(&self) -> Result<FrequencySweep, ConfigError> {
        self.frequency.expand()
    }
}

impl SweepSpecBuilder {
    fn validate(&self) -> Result<(), ConfigError> {
        check_spec(
            self.project.as_ref(),
            self.frequency.as_ref(),
            self.widths.as_ref().and_then(|w| w.as_deref()),
        )
    }
}

fn check_spec(
    project: Option<&ArcStr>,
    frequency: Option<&FrequencyAxis>,
    widths: Option<&[u32]>,
) -> Result<(), ConfigError> {
    if project.is_some_and(|p| p.is_empty()) {
        return Err(ConfigError::EmptyProject);
    }
    if let Some(frequency) = frequency {
        frequency.validate()?;
    }
    if widths.is_some_and(|w| w.contains(&0)) {
        return Err(ConfigError::ZeroWidth);
    }
    Ok(())
}

/// Paths to the external tools and the standard-cell library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolConfig {
    /// Synthesis executable, invoked as `<synthesis> -s synlig.tcl`.
    #[serde(default = "ToolConfig::default_synthesis")]
    pub synthesis: PathBuf,
    /// Timing analysis executable, invoked as `<timing> opensta.tcl`.
    #[serde(default = "ToolConfig::default_timing")]
    pub timing: PathBuf,
    /// Liberty file describing the standard-cell library.
    pub liberty: PathBuf,
}

impl ToolConfig {
    pub fn new(liberty: impl Into<PathBuf>) -> Self {
        Self {
            synthesis: Self::default_synthesis(),
            timing: Self::default_timing(),
            liberty: liberty.into(),
        }
    }

    fn default_synthesis() -> PathBuf {
        PathBuf::from("synlig")
    }

    fn default_timing() -> PathBuf {
        PathBuf::from("sta")
    }
}

/// Knobs controlling how a sweep is executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SweepOptions {
    /// Maximum number of runs executed at once.
    pub jobs: usize,
    /// Treat a non-zero tool exit code as a run failure.
    pub strict: bool,
    /// Print raw tool output as it is collected.
    pub echo: bool,
    /// Kill tools running longer than this many seconds.
    pub timeout_secs: Option<u64>,
}

impl SweepOptions {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            jobs: 1,
            strict: false,
            echo: false,
            timeout_secs: None,
        }
    }
}
