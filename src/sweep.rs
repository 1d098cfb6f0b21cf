use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Width used when a project does not list any widths.
pub const DEFAULT_WIDTH: u32 = 32;

/// The clock frequencies (in MHz) to sweep for a project.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FrequencyAxis {
    /// A single target frequency.
    Single(u32),
    /// Every frequency `lo, lo + step, ...` that does not exceed `hi`.
    Range { lo: u32, hi: u32, step: u32 },
}

impl FrequencyAxis {
    #[inline]
    pub fn range(lo: u32, hi: u32, step: u32) -> Self {
        Self::Range { lo, hi, step }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            Self::Single(0) => Err(ConfigError::ZeroFrequency),
            Self::Single(_) => Ok(()),
            Self::Range { step: 0, .. } => Err(ConfigError::ZeroStep),
            Self::Range { lo: 0, .. } => Err(ConfigError::ZeroFrequency),
            Self::Range { .. } => Ok(()),
        }
    }

    /// Validates the axis and returns the sequence of frequencies it describes.
    ///
    /// A range with `lo > hi` is valid and yields no frequencies.
    pub fn expand(&self) -> Result<FrequencySweep, ConfigError> {
        self.validate()?;
        let sweep = match *self {
            Self::Single(f) => FrequencySweep {
                next: Some(f),
                hi: f,
                step: 1,
            },
            Self::Range { lo, hi, step } => {
                if lo > hi {
                    log::warn!("frequency sweep {self} is empty");
                }
                FrequencySweep {
                    next: Some(lo),
                    hi,
                    step,
                }
            }
        };
        Ok(sweep)
    }
}

impl Display for FrequencyAxis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single(freq) => write!(f, "{freq}"),
            Self::Range { lo, hi, step } => write!(f, "{lo},{hi},{step}"),
        }
    }
}

impl FromStr for FrequencyAxis {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ConfigError::MalformedFrequency(s.to_string());
        let parts = s
            .split(',')
            .map(|part| part.trim().parse::<u32>().map_err(|_| malformed()))
            .collect::<Result<Vec<_>, _>>()?;

        let axis = match parts[..] {
            [freq] => Self::Single(freq),
            [lo, hi, step] => Self::Range { lo, hi, step },
            _ => return Err(malformed()),
        };
        axis.validate()?;
        Ok(axis)
    }
}

/// A lazy, finite sequence of frequencies produced by [`FrequencyAxis::expand`].
///
/// Cloning the sequence restarts it from the clone point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencySweep {
    next: Option<u32>,
    hi: u32,
    step: u32,
}

impl Iterator for FrequencySweep {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        let current = self.next?;
        if current > self.hi {
            self.next = None;
            return None;
        }
        self.next = current.checked_add(self.step);
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = match self.next {
            Some(current) if current <= self.hi => ((self.hi - current) / self.step) as usize + 1,
            _ => 0,
        };
        (n, Some(n))
    }
}

impl ExactSizeIterator for FrequencySweep {}

/// Returns the widths to sweep: the given list verbatim, or [`DEFAULT_WIDTH`].
pub fn expand_widths(widths: Option<&[u32]>) -> Result<Vec<u32>, ConfigError> {
    match widths {
        None => Ok(vec![DEFAULT_WIDTH]),
        Some(widths) => {
            if widths.contains(&0) {
                return Err(ConfigError::ZeroWidth);
            }
            if widths.is_empty() {
                log::warn!("width list is empty; no runs will be planned");
            }
            Ok(widths.to_vec())
        }
    }
}

/// Parses a comma separated list of widths, such as `8,16,32`.
pub fn parse_widths(s: &str) -> Result<Vec<u32>, ConfigError> {
    let widths = s
        .split(',')
        .map(|w| w.trim().parse::<u32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| ConfigError::MalformedWidths(s.to_string()))?;
    expand_widths(Some(&widths))
}
