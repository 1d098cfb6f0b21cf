use std::path::{Path, PathBuf};

use arcstr::ArcStr;
use serde::Serialize;
use tera::{Context, Tera};

use crate::paths::{DESIGN_SDC, OPENSTA_TCL, SYNLIG_TCL, SYN_V};
use crate::TEMPLATES;

/// Name of the top-level module in every synthesized design.
pub const TOP_MODULE: &str = "top";
/// Name of the clock port constrained in every design.
pub const CLOCK_PORT: &str = "clk";
/// Value of the `ADMIT_COMPLIMENT_EN` parameter passed to top-level templates.
pub const ADMIT_COMPLIMENT_EN: bool = true;

/// The text files generated for a run, in the order they are needed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ScriptKind {
    Synthesis,
    Constraints,
    Timing,
}

impl ScriptKind {
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Synthesis => SYNLIG_TCL,
            Self::Constraints => DESIGN_SDC,
            Self::Timing => OPENSTA_TCL,
        }
    }
}

/// Everything the script templates depend on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptParams {
    pub project: ArcStr,
    pub frequency: u32,
    /// Sources in read order, including the rendered top level if any.
    pub sources: Vec<PathBuf>,
    pub include_paths: Vec<String>,
    /// Standard-cell library used for mapping and timing.
    pub liberty: PathBuf,
}

#[derive(Serialize)]
struct SynthesisScript<'a> {
    project: &'a str,
    frequency: u32,
    sources: Vec<String>,
    include_paths: &'a [String],
    liberty: String,
    netlist: &'static str,
    top: &'static str,
}

#[derive(Serialize)]
struct Constraints<'a> {
    project: &'a str,
    frequency: u32,
    clock: &'static str,
    period_ns: String,
}

#[derive(Serialize)]
struct TimingScript<'a> {
    project: &'a str,
    frequency: u32,
    liberty: String,
    netlist: &'static str,
    top: &'static str,
    constraints: &'static str,
}

/// Clock period in nanoseconds for a frequency in MHz, with three decimals.
pub fn clock_period_ns(frequency: u32) -> String {
    format!("{:.3}", 1000.0 / f64::from(frequency))
}

/// Renders the script of the given kind.
///
/// Identical parameters always produce byte-identical text.
pub fn emit(kind: ScriptKind, params: &ScriptParams) -> tera::Result<String> {
    let liberty = params.liberty.display().to_string();
    let context = match kind {
        ScriptKind::Synthesis => Context::from_serialize(SynthesisScript {
            project: &params.project,
            frequency: params.frequency,
            sources: params
                .sources
                .iter()
                .map(|src| src.display().to_string())
                .collect(),
            include_paths: &params.include_paths,
            liberty,
            netlist: SYN_V,
            top: TOP_MODULE,
        })?,
        ScriptKind::Constraints => Context::from_serialize(Constraints {
            project: &params.project,
            frequency: params.frequency,
            clock: CLOCK_PORT,
            period_ns: clock_period_ns(params.frequency),
        })?,
        ScriptKind::Timing => Context::from_serialize(TimingScript {
            project: &params.project,
            frequency: params.frequency,
            liberty,
            netlist: SYN_V,
            top: TOP_MODULE,
            constraints: DESIGN_SDC,
        })?,
    };

    let mut text = TEMPLATES.render(kind.file_name(), &context)?;
    if !text.ends_with('\n') {
        text.push('\n');
    }
    Ok(text)
}

fn verilog_bool(b: bool) -> &'static str {
    if b {
        "1'b1"
    } else {
        "1'b0"
    }
}

/// Renders a user supplied top-level template for one width of a project.
pub fn render_top_level(template: &str, width: u32, project: &str) -> tera::Result<String> {
    let mut context = Context::new();
    context.insert("W", &width);
    context.insert("ADMIT_COMPLIMENT_EN", verilog_bool(ADMIT_COMPLIMENT_EN));
    context.insert("unary_detector", project);
    context.insert("project", project);

    Tera::one_off(template, &context, false)
}

/// Reads `template` from disk and renders it; see [`render_top_level`].
pub fn render_top_level_file(
    template: impl AsRef<Path>,
    width: u32,
    project: &str,
) -> crate::error::Result<String> {
    let template = template.as_ref();
    let text = std::fs::read_to_string(template)
        .map_err(|e| crate::error::RunError::io(template, e))?;
    Ok(render_top_level(&text, width, project)?)
}
