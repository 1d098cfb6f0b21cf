//! Extraction of metrics from raw tool output.

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

const TOTAL_AREA_MARKER: &str = "Chip area for module '\\top': ";
const SEQUENTIAL_AREA_MARKER: &str = "of which used for sequential elements: ";
const SLACK_MARKER: &str = "slack (";
const VIOLATED_MARKER: &str = "slack (VIOLATED)";

/// Areas reported by the synthesis tool's `stat` command.
#[derive(Debug, Default, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaReport {
    pub total_area: Option<f64>,
    pub sequential_area: Option<f64>,
}

/// Timing closure reported by the timing tool's `report_checks` command.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingReport {
    pub passed: bool,
    /// Number of violated slack lines.
    pub violations: usize,
    /// Most negative slack seen on any slack line, if one could be read.
    pub worst_slack: Option<f64>,
}

impl Default for TimingReport {
    fn default() -> Self {
        Self {
            passed: true,
            violations: 0,
            worst_slack: None,
        }
    }
}

/// Scans synthesis output for area statistics.
///
/// A metric line counts only when an unsigned decimal follows the marker.
/// When a metric is reported more than once, the last report wins.
pub fn parse_synthesis_output(text: &str) -> Result<AreaReport, ParseError> {
    let mut report = AreaReport::default();

    for (i, line) in text.lines().enumerate() {
        if let Some(area) = metric_after(line, TOTAL_AREA_MARKER, "total area", i + 1)? {
            report.total_area = Some(area);
        } else if let Some(area) =
            metric_after(line, SEQUENTIAL_AREA_MARKER, "sequential area", i + 1)?
        {
            report.sequential_area = Some(area);
        }
    }

    Ok(report)
}

fn metric_after(
    line: &str,
    marker: &str,
    metric: &'static str,
    line_num: usize,
) -> Result<Option<f64>, ParseError> {
    let Some(pos) = line.find(marker) else {
        return Ok(None);
    };
    // Only digits and dots directly after the marker count as a value.
    let rest = &line[pos + marker.len()..];
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(rest.len());
    let text = &rest[..end];
    if text.is_empty() {
        return Ok(None);
    }

    match text.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(Some(value)),
        _ => Err(ParseError {
            metric,
            text: text.to_string(),
            line: line_num,
        }),
    }
}

/// Scans timing output for violated slack.
///
/// Timing passes unless at least one line reports `slack (VIOLATED)`.
pub fn parse_timing_output(text: &str) -> TimingReport {
    let mut report = TimingReport::default();

    for line in text.lines() {
        if line.contains(VIOLATED_MARKER) {
            report.passed = false;
            report.violations += 1;
        }
        if let Some(pos) = line.find(SLACK_MARKER) {
            // OpenSTA prints the slack value right before the marker.
            let slack = line[..pos]
                .split_whitespace()
                .last()
                .and_then(|s| s.parse::<f64>().ok());
            if let Some(slack) = slack {
                report.worst_slack = Some(report.worst_slack.map_or(slack, |w| w.min(slack)));
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::tests::{STA_MET, STA_VIOLATED, YOSYS_STAT};

    #[test]
    fn test_parse_areas() {
        let report = parse_synthesis_output(YOSYS_STAT).unwrap();
        assert_eq!(report.total_area, Some(1234.5));
        assert_eq!(report.sequential_area, Some(200.25));
        let comb = report.total_area.unwrap() - report.sequential_area.unwrap();
        assert_relative_eq!(comb, 1034.25);
    }

    #[test]
    fn test_missing_areas_are_absent() {
        let report = parse_synthesis_output("ERROR: Module `\\foo' not found!\n").unwrap();
        assert_eq!(report, AreaReport::default());
    }

    #[test]
    fn test_last_area_wins() {
        let text = "Chip area for module '\\top': 10.0\nChip area for module '\\top': 12.5\n";
        let report = parse_synthesis_output(text).unwrap();
        assert_eq!(report.total_area, Some(12.5));
        assert_eq!(report.sequential_area, None);
    }

    #[test]
    fn test_malformed_area() {
        let text = "\n\n   Chip area for module '\\top': 12.3.4\n";
        let err = parse_synthesis_output(text).unwrap_err();
        assert_eq!(
            err,
            ParseError {
                metric: "total area",
                text: "12.3.4".to_string(),
                line: 3,
            }
        );

        let err = parse_synthesis_output("of which used for sequential elements: 1..5 (3%)")
            .unwrap_err();
        assert_eq!(err.metric, "sequential area");
        assert_eq!(err.text, "1..5");

        let err = parse_synthesis_output("Chip area for module '\\top': .").unwrap_err();
        assert_eq!(err.text, ".");
    }

    #[test]
    fn test_lines_without_a_value_are_ignored() {
        let text = "Chip area for module '\\top': 10.0\n\
                    Chip area for module '\\top': \n\
                    Chip area for module '\\top': -5\n\
                    of which used for sequential elements: nan\n";
        let report = parse_synthesis_output(text).unwrap();
        assert_eq!(report.total_area, Some(10.0));
        assert_eq!(report.sequential_area, None);
    }

    #[test]
    fn test_other_modules_are_ignored() {
        let text = "Chip area for module '\\det': 99.0\n";
        let report = parse_synthesis_output(text).unwrap();
        assert_eq!(report.total_area, None);
    }

    #[test]
    fn test_violated_timing() {
        let report = parse_timing_output(STA_VIOLATED);
        assert!(!report.passed);
        assert_eq!(report.violations, 1);
        assert_eq!(report.worst_slack, Some(-0.53));
    }

    #[test]
    fn test_met_timing() {
        let report = parse_timing_output(STA_MET);
        assert!(report.passed);
        assert_eq!(report.violations, 0);
        assert_eq!(report.worst_slack, Some(0.12));

        assert_eq!(parse_timing_output(""), TimingReport::default());
    }

    #[test]
    fn test_violation_is_sticky() {
        let text = format!("{STA_VIOLATED}{STA_MET}{STA_MET}");
        let report = parse_timing_output(&text);
        assert!(!report.passed);
        assert_eq!(report.worst_slack, Some(-0.53));
    }
}
