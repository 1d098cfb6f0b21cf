use lazy_static::lazy_static;
use tera::Tera;

pub mod cli;
pub mod config;
pub mod error;
pub mod matrix;
pub mod parse;
pub mod paths;
pub mod plan;
pub mod run;
pub mod scripts;
pub mod sweep;
pub mod tool;

pub use config::{SweepOptions, SweepSpec, ToolConfig};
pub use error::{ConfigError, RunError, ToolLaunchError};
pub use matrix::ResultMatrix;
pub use plan::{execute_plan, generate_plan, run, ExecutePlanParams};
pub use run::{RunKey, RunOutcome, RunResult};
pub use sweep::FrequencyAxis;

lazy_static! {
    pub static ref TEMPLATES: Tera = {
        let mut tera = Tera::default();
        match tera.add_raw_templates(vec![
            ("synlig.tcl", include_str!("../templates/synlig.tcl")),
            ("design.sdc", include_str!("../templates/design.sdc")),
            ("opensta.tcl", include_str!("../templates/opensta.tcl")),
        ]) {
            Ok(()) => tera,
            Err(e) => panic!("Error parsing templates: {e}"),
        }
    };
}
