use std::path::PathBuf;
use std::time::Duration;

use derive_builder::UninitializedFieldError;
use thiserror::Error;

use crate::tool::ToolKind;

/// A malformed sweep definition or configuration file.
///
/// Configuration errors are reported before any run workspace is created.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("project name must not be empty")]
    EmptyProject,

    #[error("frequency sweep step must be positive")]
    ZeroStep,

    #[error("frequency must be positive")]
    ZeroFrequency,

    #[error("width must be positive")]
    ZeroWidth,

    #[error("malformed frequency specification `{0}` (expected `freq` or `lo,hi,step`)")]
    MalformedFrequency(String),

    #[error("project `{0}` is defined more than once")]
    DuplicateProject(String),

    #[error("malformed width list `{0}`")]
    MalformedWidths(String),

    #[error("in project `{project}`: {source}")]
    Project {
        project: String,
        #[source]
        source: Box<ConfigError>,
    },

    #[error("error reading configuration file `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error parsing configuration file: {0}")]
    Toml(#[from] toml::de::Error),
}

impl ConfigError {
    pub(crate) fn in_project(self, project: impl Into<String>) -> Self {
        Self::Project {
            project: project.into(),
            source: Box::new(self),
        }
    }
}

impl From<UninitializedFieldError> for ConfigError {
    fn from(e: UninitializedFieldError) -> Self {
        Self::MissingField(e.field_name())
    }
}

/// An external tool that could not be run to completion.
///
/// A tool that runs and exits with a non-zero status is *not* a launch error.
#[derive(Debug, Error)]
pub enum ToolLaunchError {
    #[error("failed to start `{}`: {source}", executable.display())]
    Spawn {
        executable: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error while collecting output of `{}`: {source}", executable.display())]
    Io {
        executable: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("`{}` did not finish within {timeout:?}", executable.display())]
    TimedOut {
        executable: PathBuf,
        timeout: Duration,
    },

    #[error("`{}` was cancelled", executable.display())]
    Cancelled { executable: PathBuf },
}

/// A metric line was found in tool output but its value could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed {metric} value `{text}` on line {line}")]
pub struct ParseError {
    pub metric: &'static str,
    pub text: String,
    pub line: usize,
}

/// The reason a single run instance failed.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("I/O error on `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error rendering template: {0}")]
    Render(#[from] tera::Error),

    #[error(transparent)]
    ToolLaunch(#[from] ToolLaunchError),

    #[error("error parsing {tool} output: {source}")]
    Parse {
        tool: ToolKind,
        #[source]
        source: ParseError,
        output: String,
    },

    #[error("{tool} tool exited with status {exit_code}")]
    ToolReportedFailure {
        tool: ToolKind,
        exit_code: i32,
        output: String,
    },

    #[error("run was cancelled before it started")]
    Cancelled,
}

impl RunError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Raw output of the tool involved in the failure, if it produced any.
    pub fn raw_output(&self) -> Option<&str> {
        match self {
            Self::Parse { output, .. } | Self::ToolReportedFailure { output, .. } => Some(output),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, RunError>;
