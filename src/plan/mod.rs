use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;

use itertools::Itertools;

use crate::config::{SweepOptions, SweepSpec, ToolConfig};
use crate::error::{ConfigError, RunError};
use crate::matrix::ResultMatrix;
use crate::run::{RunEnv, RunFailure, RunInstance, RunKey, RunOutcome, RunStage};
use crate::tool::{CancelToken, ProcessInvoker, ToolInvoker};

/// A run scheduled by a [`SweepPlan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedRun {
    pub key: RunKey,
    spec: usize,
}

/// Every run of a sweep, in execution order.
///
/// Runs are grouped by project in the order given; within a project widths vary
/// slowest and frequencies fastest.
#[derive(Debug, Clone)]
pub struct SweepPlan<'a> {
    specs: &'a [SweepSpec],
    runs: Vec<PlannedRun>,
}

impl<'a> SweepPlan<'a> {
    #[inline]
    pub fn runs(&self) -> &[PlannedRun] {
        &self.runs
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// The spec a planned run was expanded from.
    pub fn spec(&self, run: &PlannedRun) -> &'a SweepSpec {
        &self.specs[run.spec]
    }
}

/// Observes the progress of [`execute_plan`].
///
/// Methods may be called from worker threads.
pub trait RunListener: Sync {
    fn started(&self, _key: &RunKey) {}
    fn finished(&self, _key: &RunKey, _outcome: &RunOutcome) {}
}

pub struct ExecutePlanParams<'a> {
    pub work_dir: &'a Path,
    pub plan: &'a SweepPlan<'a>,
    pub tools: &'a ToolConfig,
    pub options: &'a SweepOptions,
    pub invoker: &'a dyn ToolInvoker,
    pub cancel: Option<&'a CancelToken>,
    pub listener: Option<&'a dyn RunListener>,
}

/// Validates every spec and expands it into runs.
///
/// Every key appears once in the plan. A key produced again keeps its first
/// position but is run from the last spec that produced it. Nothing is
/// written to disk.
pub fn generate_plan(specs: &[SweepSpec]) -> Result<SweepPlan<'_>, ConfigError> {
    let mut runs: Vec<PlannedRun> = Vec::new();
    let mut planned: HashMap<RunKey, usize> = HashMap::new();

    for (i, spec) in specs.iter().enumerate() {
        let in_project = |e: ConfigError| e.in_project(spec.project.as_str());
        spec.validate().map_err(in_project)?;
        let widths = spec.expanded_widths().map_err(in_project)?;
        let frequencies = spec.expanded_frequencies().map_err(in_project)?;

        for (width, frequency) in widths.into_iter().cartesian_product(frequencies) {
            let key = RunKey::new(spec.project.clone(), width, frequency);
            // A key owns its workspace exclusively; repeats replace the earlier run in place.
            if let Some(&pos) = planned.get(&key) {
                log::warn!("run {key} is planned more than once; keeping the last definition");
                runs[pos].spec = i;
                continue;
            }
            planned.insert(key.clone(), runs.len());
            runs.push(PlannedRun { key, spec: i });
        }
    }

    if runs.is_empty() {
        log::warn!("sweep contains no runs");
    }

    Ok(SweepPlan { specs, runs })
}

/// Executes every run of `plan`, continuing past failed runs.
///
/// With more than one job, runs execute concurrently but outcomes are still
/// inserted into the matrix in plan order.
pub fn execute_plan(params: ExecutePlanParams) -> ResultMatrix {
    let ExecutePlanParams {
        work_dir,
        plan,
        tools,
        options,
        invoker,
        cancel,
        listener,
    } = params;

    let env = RunEnv {
        work_dir,
        tools,
        options,
        invoker,
    };
    let jobs = options.jobs.clamp(1, plan.len().max(1));
    log::info!("executing {} runs with {} job(s)", plan.len(), jobs);

    let mut matrix = ResultMatrix::new();

    if jobs == 1 {
        for run in plan.runs() {
            let outcome = execute_run(plan, run, env, cancel, listener);
            matrix.insert(run.key.clone(), outcome);
        }
        return matrix;
    }

    let next = AtomicUsize::new(0);
    let (tx, rx) = mpsc::channel();

    thread::scope(|s| {
        for _ in 0..jobs {
            let tx = tx.clone();
            let next = &next;
            s.spawn(move || loop {
                let i = next.fetch_add(1, Ordering::SeqCst);
                let Some(run) = plan.runs().get(i) else {
                    break;
                };
                let outcome = execute_run(plan, run, env, cancel, listener);
                if tx.send((i, outcome)).is_err() {
                    break;
                }
            });
        }
        drop(tx);

        // Outcomes arrive in completion order; hold them until their turn.
        let mut pending = BTreeMap::new();
        let mut cursor = 0;
        for (i, outcome) in rx {
            pending.insert(i, outcome);
            while let Some(outcome) = pending.remove(&cursor) {
                matrix.insert(plan.runs()[cursor].key.clone(), outcome);
                cursor += 1;
            }
        }
    });

    matrix
}

fn execute_run(
    plan: &SweepPlan<'_>,
    run: &PlannedRun,
    env: RunEnv<'_>,
    cancel: Option<&CancelToken>,
    listener: Option<&dyn RunListener>,
) -> RunOutcome {
    let outcome = if cancel.is_some_and(CancelToken::is_cancelled) {
        log::info!("skipping run {}: sweep cancelled", run.key);
        Err(RunFailure {
            key: run.key.clone(),
            stage: RunStage::Created,
            error: RunError::Cancelled,
        })
    } else {
        if let Some(listener) = listener {
            listener.started(&run.key);
        }
        RunInstance::new(run.key.clone(), plan.spec(run), env.work_dir).execute(env)
    };

    if let Some(listener) = listener {
        listener.finished(&run.key, &outcome);
    }
    outcome
}

/// Plans and executes a sweep with tools run as child processes.
///
/// Configuration errors are reported before any workspace is created.
pub fn run(
    specs: &[SweepSpec],
    tools: &ToolConfig,
    options: &SweepOptions,
    work_dir: impl AsRef<Path>,
) -> Result<ResultMatrix, ConfigError> {
    let plan = generate_plan(specs)?;
    let invoker = ProcessInvoker::new().timeout(options.timeout());

    Ok(execute_plan(ExecutePlanParams {
        work_dir: work_dir.as_ref(),
        plan: &plan,
        tools,
        options,
        invoker: &invoker,
        cancel: None,
        listener: None,
    }))
}
