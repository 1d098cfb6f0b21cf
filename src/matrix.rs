use std::collections::HashMap;
use std::fmt::Display;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use arcstr::ArcStr;
use serde::{Deserialize, Serialize};

use crate::run::{RunFailure, RunKey, RunOutcome, RunResult};

type FrequencyMap = HashMap<u32, RunOutcome>;
type WidthMap = HashMap<u32, FrequencyMap>;

/// Outcomes of a sweep, indexed by project, then width, then frequency.
///
/// Iteration follows the order in which keys were first inserted.
#[derive(Debug, Default)]
pub struct ResultMatrix {
    cells: HashMap<ArcStr, WidthMap>,
    order: Vec<RunKey>,
}

impl ResultMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the outcome of a run, returning the outcome it replaced.
    ///
    /// A replaced key keeps its original position in the iteration order.
    pub fn insert(&mut self, key: RunKey, outcome: RunOutcome) -> Option<RunOutcome> {
        let prev = self
            .cells
            .entry(key.project.clone())
            .or_default()
            .entry(key.width)
            .or_default()
            .insert(key.frequency, outcome);
        if prev.is_none() {
            self.order.push(key);
        }
        prev
    }

    pub fn get(&self, key: &RunKey) -> Option<&RunOutcome> {
        self.get_cell(&key.project, key.width, key.frequency)
    }

    pub fn get_cell(&self, project: &str, width: u32, frequency: u32) -> Option<&RunOutcome> {
        self.cells.get(project)?.get(&width)?.get(&frequency)
    }

    /// All outcomes of one project, keyed by width then frequency.
    pub fn project(&self, project: &str) -> Option<&HashMap<u32, HashMap<u32, RunOutcome>>> {
        self.cells.get(project)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &RunKey> {
        self.order.iter()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RunKey, &RunOutcome)> {
        self.order.iter().filter_map(|key| Some((key, self.get(key)?)))
    }

    pub fn successes(&self) -> impl Iterator<Item = &RunResult> {
        self.iter().filter_map(|(_, outcome)| outcome.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &RunFailure> {
        self.iter().filter_map(|(_, outcome)| outcome.as_ref().err())
    }

    /// Flattens the matrix into one record per run, in iteration order.
    pub fn records(&self) -> Vec<ResultRecord> {
        self.iter()
            .map(|(key, outcome)| ResultRecord::new(key, outcome))
            .collect()
    }

    /// Writes [`ResultMatrix::records`] to `path` as JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, &self.records())?;
        Ok(())
    }
}

impl Display for ResultMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (key, outcome) in self.iter() {
            match outcome {
                Ok(result) => writeln!(f, "{key}: {result}")?,
                Err(failure) => writeln!(
                    f,
                    "{key}: FAILED after stage `{}`: {}",
                    failure.stage, failure.error
                )?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Done,
    Failed,
}

/// A flattened, serializable view of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub project: ArcStr,
    pub width: u32,
    pub frequency: u32,
    pub status: RecordStatus,
    pub total_area: Option<f64>,
    pub sequential_area: Option<f64>,
    pub combinational_area: Option<f64>,
    pub timing_passed: Option<bool>,
    pub error: Option<String>,
}

impl ResultRecord {
    fn new(key: &RunKey, outcome: &RunOutcome) -> Self {
        let mut record = Self {
            project: key.project.clone(),
            width: key.width,
            frequency: key.frequency,
            status: RecordStatus::Done,
            total_area: None,
            sequential_area: None,
            combinational_area: None,
            timing_passed: None,
            error: None,
        };
        match outcome {
            Ok(result) => {
                record.total_area = result.synthesis.total_area;
                record.sequential_area = result.synthesis.sequential_area;
                record.combinational_area = result.combinational_area();
                record.timing_passed = Some(result.timing.passed);
            }
            Err(failure) => {
                record.status = RecordStatus::Failed;
                record.error = Some(failure.error.to_string());
            }
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RunError;
    use crate::run::{RunStage, SynthesisOutcome, TimingOutcome};

    fn result(key: &RunKey, total_area: f64) -> RunOutcome {
        Ok(RunResult {
            key: key.clone(),
            synthesis: SynthesisOutcome {
                total_area: Some(total_area),
                sequential_area: Some(1.0),
                raw_exit_code: 0,
                raw_output: String::new(),
            },
            timing: TimingOutcome {
                passed: true,
                violations: 0,
                worst_slack: Some(0.5),
                raw_exit_code: 0,
                raw_output: String::new(),
            },
        })
    }

    fn cancelled(key: &RunKey) -> RunOutcome {
        Err(RunFailure {
            key: key.clone(),
            stage: RunStage::Created,
            error: RunError::Cancelled,
        })
    }

    #[test]
    fn test_insert_and_get() {
        let mut matrix = ResultMatrix::new();
        assert!(matrix.is_empty());

        let a = RunKey::new("det", 8, 500);
        let b = RunKey::new("det", 16, 500);
        let c = RunKey::new("enc", 8, 100);
        assert!(matrix.insert(a.clone(), result(&a, 10.0)).is_none());
        assert!(matrix.insert(b.clone(), cancelled(&b)).is_none());
        assert!(matrix.insert(c.clone(), result(&c, 30.0)).is_none());

        assert_eq!(matrix.len(), 3);
        assert!(matrix.get_cell("det", 8, 500).unwrap().is_ok());
        assert!(matrix.get(&b).unwrap().is_err());
        assert!(matrix.get_cell("det", 8, 100).is_none());
        assert!(matrix.get_cell("missing", 8, 500).is_none());
        assert_eq!(matrix.project("det").unwrap().len(), 2);
        assert_eq!(matrix.keys().cloned().collect::<Vec<_>>(), vec![a, b, c]);
        assert_eq!(matrix.successes().count(), 2);
        assert_eq!(matrix.failures().count(), 1);
    }

    #[test]
    fn test_last_write_wins() {
        let mut matrix = ResultMatrix::new();
        let a = RunKey::new("det", 8, 500);
        let b = RunKey::new("det", 8, 600);
        matrix.insert(a.clone(), result(&a, 10.0));
        matrix.insert(b.clone(), result(&b, 20.0));

        let prev = matrix.insert(a.clone(), result(&a, 11.0)).unwrap().unwrap();
        assert_eq!(prev.synthesis.total_area, Some(10.0));

        assert_eq!(matrix.len(), 2);
        assert_eq!(matrix.keys().next(), Some(&a));
        let current = matrix.get(&a).unwrap().as_ref().unwrap();
        assert_eq!(current.synthesis.total_area, Some(11.0));
    }

    #[test]
    fn test_records_and_json() {
        let mut matrix = ResultMatrix::new();
        let a = RunKey::new("det", 8, 500);
        let b = RunKey::new("det", 16, 500);
        matrix.insert(a.clone(), result(&a, 10.0));
        matrix.insert(b.clone(), cancelled(&b));

        let records = matrix.records();
        assert_eq!(records[0].status, RecordStatus::Done);
        assert_eq!(records[0].combinational_area, Some(9.0));
        assert_eq!(records[0].timing_passed, Some(true));
        assert_eq!(records[1].status, RecordStatus::Failed);
        assert_eq!(records[1].total_area, None);
        assert!(records[1].error.is_some());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        matrix.write_json(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let parsed: Vec<ResultRecord> = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, records);
        assert!(text.contains("\"status\": \"failed\""));
    }

    #[test]
    fn test_display() {
        let mut matrix = ResultMatrix::new();
        let a = RunKey::new("det", 8, 500);
        let b = RunKey::new("det", 16, 500);
        matrix.insert(a.clone(), result(&a, 10.0));
        matrix.insert(b.clone(), cancelled(&b));

        let text = matrix.to_string();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("det_W8_500MHz: Total Area: 10.00"));
        assert!(lines[1].starts_with("det_W16_500MHz: FAILED after stage `created`"));
    }
}
