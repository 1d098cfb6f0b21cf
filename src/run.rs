//! A single (project, width, frequency) run through synthesis and timing analysis.

use std::fmt::Display;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use arcstr::ArcStr;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{SweepOptions, SweepSpec, ToolConfig};
use crate::error::{Result, RunError};
use crate::parse::{parse_synthesis_output, parse_timing_output};
use crate::paths::{
    out_file, out_netlist, out_top_sv, out_workspace, workspace_name, OPENSTA_LOG, OPENSTA_TCL,
    SYNLIG_LOG, SYNLIG_TCL,
};
use crate::scripts::{emit, render_top_level_file, ScriptKind, ScriptParams};
use crate::tool::{ToolInvoker, ToolKind, ToolOutput};

/// Identifies one point of a sweep.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunKey {
    pub project: ArcStr,
    pub width: u32,
    /// Clock frequency in MHz.
    pub frequency: u32,
}

impl RunKey {
    pub fn new(project: impl Into<ArcStr>, width: u32, frequency: u32) -> Self {
        Self {
            project: project.into(),
            width,
            frequency,
        }
    }
}

impl Display for RunKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", workspace_name(self))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisOutcome {
    pub total_area: Option<f64>,
    pub sequential_area: Option<f64>,
    pub raw_exit_code: i32,
    pub raw_output: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingOutcome {
    pub passed: bool,
    pub violations: usize,
    pub worst_slack: Option<f64>,
    pub raw_exit_code: i32,
    pub raw_output: String,
}

/// The outcome of a run that reached the end of the flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub key: RunKey,
    pub synthesis: SynthesisOutcome,
    pub timing: TimingOutcome,
}

impl RunResult {
    /// Total area less sequential area, when both were reported.
    pub fn combinational_area(&self) -> Option<f64> {
        Some(self.synthesis.total_area? - self.synthesis.sequential_area?)
    }
}

struct Area(Option<f64>);

impl Display for Area {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(area) => write!(f, "{area:.2}"),
            None => write!(f, "n/a"),
        }
    }
}

impl Display for RunResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Total Area: {}, Sequential Area: {}, Combinatorial Area: {}, Timing Passed: {}",
            Area(self.synthesis.total_area),
            Area(self.synthesis.sequential_area),
            Area(self.combinational_area()),
            self.timing.passed
        )
    }
}

/// Progress of a run through the flow.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Created,
    WorkspaceReady,
    SynthesisScripted,
    SynthesisRun,
    SynthesisParsed,
    TimingScripted,
    TimingRun,
    TimingParsed,
    Done,
}

impl Display for RunStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::WorkspaceReady => "workspace ready",
            Self::SynthesisScripted => "synthesis scripted",
            Self::SynthesisRun => "synthesis run",
            Self::SynthesisParsed => "synthesis parsed",
            Self::TimingScripted => "timing scripted",
            Self::TimingRun => "timing run",
            Self::TimingParsed => "timing parsed",
            Self::Done => "done",
        };
        write!(f, "{name}")
    }
}

/// A run that stopped before reaching [`RunStage::Done`].
#[derive(Debug, Error)]
#[error("run {key} failed after stage `{stage}`: {error}")]
pub struct RunFailure {
    pub key: RunKey,
    /// The last stage the run reached.
    pub stage: RunStage,
    #[source]
    pub error: RunError,
}

pub type RunOutcome = std::result::Result<RunResult, RunFailure>;

/// Shared, read-only context for executing runs.
#[derive(Copy, Clone)]
pub struct RunEnv<'a> {
    pub work_dir: &'a Path,
    pub tools: &'a ToolConfig,
    pub options: &'a SweepOptions,
    pub invoker: &'a dyn ToolInvoker,
}

pub struct RunInstance<'a> {
    key: RunKey,
    spec: &'a SweepSpec,
    workspace: PathBuf,
    stage: RunStage,
}

impl<'a> RunInstance<'a> {
    pub fn new(key: RunKey, spec: &'a SweepSpec, work_dir: impl AsRef<Path>) -> Self {
        let workspace = out_workspace(work_dir, &key);
        Self {
            key,
            spec,
            workspace,
            stage: RunStage::Created,
        }
    }

    #[inline]
    pub fn key(&self) -> &RunKey {
        &self.key
    }

    #[inline]
    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    #[inline]
    pub fn stage(&self) -> RunStage {
        self.stage
    }

    /// Drives the run to completion.
    ///
    /// Every failure is captured in the returned outcome.
    pub fn execute(mut self, env: RunEnv<'_>) -> RunOutcome {
        log::info!("starting run {}", self.key);
        match self.drive(env) {
            Ok(result) => {
                log::info!("finished run {}: {}", self.key, result);
                Ok(result)
            }
            Err(error) => {
                log::error!(
                    "run {} failed after stage `{}`: {}",
                    self.key,
                    self.stage,
                    error
                );
                Err(RunFailure {
                    key: self.key,
                    stage: self.stage,
                    error,
                })
            }
        }
    }

    fn drive(&mut self, env: RunEnv<'_>) -> Result<RunResult> {
        fs::create_dir_all(&self.workspace).map_err(|e| RunError::io(&self.workspace, e))?;
        self.advance(RunStage::WorkspaceReady);

        let params = self.script_params(env.tools)?;
        self.write_script(ScriptKind::Synthesis, &params)?;
        self.advance(RunStage::SynthesisScripted);

        let synthesis = self.run_tool(ToolKind::Synthesis, env)?;
        self.advance(RunStage::SynthesisRun);
        if !out_netlist(&self.workspace).is_file() {
            log::warn!("synthesis wrote no netlist for run {}", self.key);
        }

        let area = match parse_synthesis_output(&synthesis.output) {
            Ok(area) => area,
            Err(source) => {
                return Err(RunError::Parse {
                    tool: ToolKind::Synthesis,
                    source,
                    output: synthesis.output,
                })
            }
        };
        self.advance(RunStage::SynthesisParsed);

        self.write_script(ScriptKind::Constraints, &params)?;
        self.write_script(ScriptKind::Timing, &params)?;
        self.advance(RunStage::TimingScripted);

        let timing = self.run_tool(ToolKind::Timing, env)?;
        self.advance(RunStage::TimingRun);

        let report = parse_timing_output(&timing.output);
        self.advance(RunStage::TimingParsed);

        let result = RunResult {
            key: self.key.clone(),
            synthesis: SynthesisOutcome {
                total_area: area.total_area,
                sequential_area: area.sequential_area,
                raw_exit_code: synthesis.exit_code,
                raw_output: synthesis.output,
            },
            timing: TimingOutcome {
                passed: report.passed,
                violations: report.violations,
                worst_slack: report.worst_slack,
                raw_exit_code: timing.exit_code,
                raw_output: timing.output,
            },
        };
        self.advance(RunStage::Done);

        Ok(result)
    }

    fn advance(&mut self, stage: RunStage) {
        log::debug!("run {}: {} -> {}", self.key, self.stage, stage);
        self.stage = stage;
    }

    /// Collects script parameters, rendering the top-level template if there is one.
    ///
    /// The rendered `top.sv` is appended to this run's sources only.
    fn script_params(&self, tools: &ToolConfig) -> Result<ScriptParams> {
        let mut sources = self.spec.sources.clone();

        if let Some(template) = &self.spec.top_level_template {
            let text = render_top_level_file(template, self.key.width, &self.key.project)?;
            let path = out_top_sv(&self.workspace);
            fs::write(&path, text).map_err(|e| RunError::io(&path, e))?;
            let path = fs::canonicalize(&path).map_err(|e| RunError::io(&path, e))?;
            sources.push(path);
        }

        Ok(ScriptParams {
            project: self.key.project.clone(),
            frequency: self.key.frequency,
            sources,
            include_paths: self.spec.include_paths.clone(),
            liberty: tools.liberty.clone(),
        })
    }

    fn write_script(&self, kind: ScriptKind, params: &ScriptParams) -> Result<()> {
        let text = emit(kind, params)?;
        let path = out_file(&self.workspace, kind.file_name());
        fs::write(&path, text).map_err(|e| RunError::io(&path, e))
    }

    fn run_tool(&self, tool: ToolKind, env: RunEnv<'_>) -> Result<ToolOutput> {
        let (executable, args, log_name) = match tool {
            ToolKind::Synthesis => (
                &env.tools.synthesis,
                vec!["-s".to_string(), SYNLIG_TCL.to_string()],
                SYNLIG_LOG,
            ),
            ToolKind::Timing => (&env.tools.timing, vec![OPENSTA_TCL.to_string()], OPENSTA_LOG),
        };

        let output = env.invoker.invoke(executable, &args, &self.workspace)?;

        let log_path = out_file(&self.workspace, log_name);
        fs::write(&log_path, &output.output).map_err(|e| RunError::io(&log_path, e))?;
        if env.options.echo {
            let mut stdout = std::io::stdout().lock();
            if let Err(e) = echo_output(&mut stdout, tool, &self.key, &output) {
                log::warn!("failed to echo {tool} output of run {}: {e}", self.key);
            }
        }

        if !output.success() {
            if env.options.strict {
                return Err(RunError::ToolReportedFailure {
                    tool,
                    exit_code: output.exit_code,
                    output: output.output,
                });
            }
            log::warn!(
                "{} tool exited with status {} in run {}",
                tool,
                output.exit_code,
                self.key
            );
        }

        Ok(output)
    }
}

/// Writes raw tool output as a single block headed by the tool and run.
///
/// The caller holds the stdout lock for the whole block.
fn echo_output(
    out: &mut impl Write,
    tool: ToolKind,
    key: &RunKey,
    output: &ToolOutput,
) -> std::io::Result<()> {
    writeln!(out, "==> {tool} output of run {key} (exit status {})", output.exit_code)?;
    out.write_all(output.output.as_bytes())?;
    if !output.output.is_empty() && !output.output.ends_with('\n') {
        writeln!(out)?;
    }
    out.flush()
}
