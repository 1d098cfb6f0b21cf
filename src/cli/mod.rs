use std::fs::canonicalize;

use anyhow::{Context, Result};
use clap::Parser;

use crate::cli::args::Args;
use crate::cli::progress::SweepProgress;
use crate::config::{parse_sweep_config, SweepConfig};
use crate::plan::{execute_plan, generate_plan, ExecutePlanParams};
use crate::sweep::parse_widths;
use crate::tool::ProcessInvoker;

pub mod args;
pub mod progress;

pub const BANNER: &str = concat!("synsweep v", env!("CARGO_PKG_VERSION"));

/// Overrides configuration file settings with those given on the command line.
fn apply_args(config: &mut SweepConfig, args: &Args) -> Result<()> {
    if let Some(output_dir) = &args.output_dir {
        config.work_dir = output_dir.clone();
    }
    if let Some(jobs) = args.jobs {
        config.options.jobs = jobs;
    }
    config.options.strict |= args.strict;
    config.options.echo |= args.echo;
    if args.timeout.is_some() {
        config.options.timeout_secs = args.timeout;
    }

    if let Some(frequency) = args.frequency {
        for project in config.projects.iter_mut() {
            project.frequency = frequency;
        }
    }
    if let Some(widths) = &args.widths {
        let widths = parse_widths(widths)?;
        for project in config.projects.iter_mut() {
            project.widths = Some(widths.clone());
        }
    }
    Ok(())
}

pub fn run() -> Result<()> {
    let args = Args::parse();

    let config_path = canonicalize(&args.config)
        .with_context(|| format!("Configuration file {:?} not found", args.config))?;

    println!("{BANNER}\n");

    println!("Reading configuration file...\n");
    let mut config = parse_sweep_config(&config_path)?;
    apply_args(&mut config, &args)?;

    println!("Configuration file: {:?}", &config_path);
    println!("Tools:");
    println!("\tSynthesis: {:?}", config.tools.synthesis);
    println!("\tTiming: {:?}", config.tools.timing);
    println!("\tLiberty: {:?}", config.tools.liberty);
    println!("Projects:");
    for project in config.projects.iter() {
        let widths = project.expanded_widths()?;
        println!(
            "\t{}: widths {:?}, frequency {} MHz",
            project.project, widths, project.frequency
        );
    }
    println!("Jobs: {}\n", config.options.jobs);

    let plan = generate_plan(&config.projects)?;

    std::fs::create_dir_all(&config.work_dir)?;
    let work_dir = canonicalize(&config.work_dir)?;

    let progress = SweepProgress::new(plan.len());
    let invoker = ProcessInvoker::new().timeout(config.options.timeout());
    let matrix = execute_plan(ExecutePlanParams {
        work_dir: &work_dir,
        plan: &plan,
        tools: &config.tools,
        options: &config.options,
        invoker: &invoker,
        cancel: None,
        listener: Some(&progress),
    });
    progress.finish();

    println!("\nResults:\n{matrix}");
    let failed = matrix.failures().count();
    if failed > 0 {
        println!("{failed} of {} runs failed", matrix.len());
    }

    if let Some(json) = &args.json {
        matrix
            .write_json(json)
            .with_context(|| format!("Failed to write results to {json:?}"))?;
        println!("Results saved to: {json:?}");
    }
    println!("Artifacts saved to: {:?}\n", &work_dir);

    Ok(())
}
