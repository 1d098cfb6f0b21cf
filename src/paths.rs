use std::path::{Path, PathBuf};

use crate::run::RunKey;

/// Rendered top-level source.
pub const TOP_SV: &str = "top.sv";
/// Synthesis script.
pub const SYNLIG_TCL: &str = "synlig.tcl";
/// Raw synthesis tool output.
pub const SYNLIG_LOG: &str = "synlig.log";
/// Netlist written by the synthesis tool and read by the timing tool.
pub const SYN_V: &str = "syn.v";
/// Timing constraints.
pub const DESIGN_SDC: &str = "design.sdc";
/// Timing analysis script.
pub const OPENSTA_TCL: &str = "opensta.tcl";
/// Raw timing tool output.
pub const OPENSTA_LOG: &str = "opensta.log";

pub fn workspace_name(key: &RunKey) -> String {
    format!("{}_W{}_{}MHz", key.project, key.width, key.frequency)
}

pub fn out_workspace(work_dir: impl AsRef<Path>, key: &RunKey) -> PathBuf {
    PathBuf::from(work_dir.as_ref()).join(workspace_name(key))
}

pub fn out_top_sv(work_dir: impl AsRef<Path>) -> PathBuf {
    PathBuf::from(work_dir.as_ref()).join(TOP_SV)
}

pub fn out_netlist(work_dir: impl AsRef<Path>) -> PathBuf {
    PathBuf::from(work_dir.as_ref()).join(SYN_V)
}

pub fn out_file(work_dir: impl AsRef<Path>, name: &str) -> PathBuf {
    PathBuf::from(work_dir.as_ref()).join(name)
}
