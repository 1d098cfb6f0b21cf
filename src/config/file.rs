//! TOML sweep configuration files.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::{SweepOptions, SweepSpec, ToolConfig};
use crate::error::ConfigError;
use crate::sweep::FrequencyAxis;

/// A fully resolved sweep configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepConfig {
    /// Directory under which run workspaces are created.
    pub work_dir: PathBuf,
    pub tools: ToolConfig,
    pub options: SweepOptions,
    pub projects: Vec<SweepSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    work_dir: Option<PathBuf>,
    tools: ToolConfig,
    #[serde(default)]
    options: SweepOptions,
    #[serde(default)]
    defaults: RawDefaults,
    #[serde(default)]
    projects: Vec<RawProject>,
}

/// Fields shared by every project that does not set them itself.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDefaults {
    frequency: Option<RawFrequency>,
    widths: Option<Vec<u32>>,
    include_paths: Option<Vec<String>>,
    template: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawProject {
    name: String,
    #[serde(default)]
    sources: Vec<PathBuf>,
    include_paths: Option<Vec<String>>,
    template: Option<PathBuf>,
    frequency: Option<RawFrequency>,
    widths: Option<Vec<u32>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawFrequency {
    Axis(FrequencyAxis),
    Text(String),
}

impl RawFrequency {
    fn into_axis(self) -> Result<FrequencyAxis, ConfigError> {
        match self {
            Self::Axis(axis) => Ok(axis),
            Self::Text(text) => text.parse(),
        }
    }
}

/// Reads a sweep configuration file.
///
/// Relative paths in the file are resolved against the directory containing it.
pub fn parse_sweep_config(path: impl AsRef<Path>) -> Result<SweepConfig, ConfigError> {
    let path = path.as_ref();
    let io_err = |source| ConfigError::Io {
        path: path.to_owned(),
        source,
    };
    let path = fs::canonicalize(path).map_err(io_err)?;
    let contents = fs::read_to_string(&path).map_err(io_err)?;
    let base = path.parent().unwrap_or_else(|| Path::new("/"));
    parse_sweep_config_str(&contents, base)
}

/// Parses sweep configuration text, resolving relative paths against `base`.
pub fn parse_sweep_config_str(contents: &str, base: &Path) -> Result<SweepConfig, ConfigError> {
    let raw: RawConfig = toml::from_str(contents)?;

    let mut names = HashSet::new();
    let mut projects = Vec::with_capacity(raw.projects.len());
    for project in raw.projects {
        if !names.insert(project.name.clone()) {
            return Err(ConfigError::DuplicateProject(project.name));
        }
        let name = project.name.clone();
        let spec = build_spec(project, &raw.defaults, base).map_err(|e| e.in_project(name))?;
        projects.push(spec);
    }

    let tools = ToolConfig {
        synthesis: resolve_tool(base, raw.tools.synthesis),
        timing: resolve_tool(base, raw.tools.timing),
        liberty: resolve(base, raw.tools.liberty),
    };

    Ok(SweepConfig {
        work_dir: resolve(base, raw.work_dir.unwrap_or_else(|| PathBuf::from("."))),
        tools,
        options: raw.options,
        projects,
    })
}

fn build_spec(
    project: RawProject,
    defaults: &RawDefaults,
    base: &Path,
) -> Result<SweepSpec, ConfigError> {
    let mut builder = SweepSpec::builder();
    builder
        .project(project.name.as_str())
        .sources(
            project
                .sources
                .into_iter()
                .map(|src| resolve(base, src))
                .collect(),
        )
        .include_paths(
            project
                .include_paths
                .or_else(|| defaults.include_paths.clone())
                .unwrap_or_default(),
        );

    if let Some(template) = project.template.or_else(|| defaults.template.clone()) {
        builder.top_level_template(resolve(base, template));
    }
    if let Some(frequency) = project.frequency.or_else(|| defaults.frequency.clone()) {
        builder.frequency(frequency.into_axis()?);
    }
    if let Some(widths) = project.widths.or_else(|| defaults.widths.clone()) {
        builder.widths(widths);
    }

    builder.build()
}

fn resolve(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// Like [`resolve`], but leaves bare executable names to be looked up on `PATH`.
fn resolve_tool(base: &Path, path: PathBuf) -> PathBuf {
    if path.components().count() > 1 {
        resolve(base, path)
    } else {
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
work_dir = "build"

[tools]
synthesis = "./bin/synlig"
liberty = "/pdk/sky130_fd_sc_hd__tt_025C_1v80.lib"

[options]
jobs = 4
strict = true

[defaults]
frequency = "100,500,100"
widths = [8, 16]
include_paths = ["/rtl/include"]

[[projects]]
name = "det"
sources = ["rtl/det.sv", "/abs/common.sv"]
template = "rtl/top.sv.j2"

[[projects]]
name = "enc"
sources = ["rtl/enc.sv"]
frequency = 250
widths = [4]
include_paths = []

[[projects]]
name = "dec"
frequency = { lo = 200, hi = 400, step = 200 }
"#;

    #[test]
    fn test_parse_config() {
        let config = parse_sweep_config_str(CONFIG, Path::new("/work")).unwrap();
        assert_eq!(config.work_dir, PathBuf::from("/work/build"));
        assert_eq!(config.tools.synthesis, PathBuf::from("/work/./bin/synlig"));
        assert_eq!(config.tools.timing, PathBuf::from("sta"));
        assert_eq!(config.options.jobs, 4);
        assert!(config.options.strict);
        assert!(!config.options.echo);
        assert_eq!(config.options.timeout(), None);

        let det = &config.projects[0];
        assert_eq!(det.project, "det");
        assert_eq!(
            det.sources,
            vec![
                PathBuf::from("/work/rtl/det.sv"),
                PathBuf::from("/abs/common.sv")
            ]
        );
        assert_eq!(
            det.top_level_template,
            Some(PathBuf::from("/work/rtl/top.sv.j2"))
        );
        assert_eq!(det.frequency, FrequencyAxis::range(100, 500, 100));
        assert_eq!(det.widths, Some(vec![8, 16]));
        assert_eq!(det.include_paths, vec!["/rtl/include".to_string()]);

        let enc = &config.projects[1];
        assert_eq!(enc.frequency, FrequencyAxis::Single(250));
        assert_eq!(enc.widths, Some(vec![4]));
        assert!(enc.include_paths.is_empty());

        let dec = &config.projects[2];
        assert_eq!(dec.frequency, FrequencyAxis::range(200, 400, 200));
        assert!(dec.sources.is_empty());
    }

    #[test]
    fn test_missing_frequency() {
        let config = r#"
[tools]
liberty = "cells.lib"

[[projects]]
name = "det"
"#;
        let err = parse_sweep_config_str(config, Path::new("/work")).unwrap_err();
        match err {
            ConfigError::Project { project, source } => {
                assert_eq!(project, "det");
                assert!(matches!(*source, ConfigError::MissingField("frequency")));
            }
            err => panic!("unexpected error: {err}"),
        }
    }

    #[test]
    fn test_bad_frequency_text() {
        let config = r#"
[tools]
liberty = "cells.lib"

[[projects]]
name = "det"
frequency = "100-500"
"#;
        let err = parse_sweep_config_str(config, Path::new("/work")).unwrap_err();
        assert!(err.to_string().contains("100-500"));
    }

    #[test]
    fn test_duplicate_project() {
        let config = r#"
[tools]
liberty = "cells.lib"

[defaults]
frequency = 100

[[projects]]
name = "det"

[[projects]]
name = "det"
"#;
        let err = parse_sweep_config_str(config, Path::new("/work")).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateProject(name) if name == "det"));
    }

    #[test]
    fn test_unknown_field() {
        let config = r#"
[tools]
liberty = "cells.lib"
synthesys = "yosys"
"#;
        assert!(matches!(
            parse_sweep_config_str(config, Path::new("/work")),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn test_parse_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sweep.toml");
        std::fs::write(
            &path,
            "[tools]\nliberty = \"cells.lib\"\n\n[[projects]]\nname = \"det\"\nfrequency = 500\n",
        )
        .unwrap();
        let config = parse_sweep_config(&path).unwrap();
        let base = std::fs::canonicalize(dir.path()).unwrap();
        assert_eq!(config.tools.liberty, base.join("cells.lib"));
        assert_eq!(config.work_dir, base.join("."));
        assert_eq!(config.projects.len(), 1);

        assert!(matches!(
            parse_sweep_config(dir.path().join("missing.toml")),
            Err(ConfigError::Io { .. })
        ));
    }
}
