use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

use crate::compare::TaskMode;
use crate::data::loader::Layout;
use crate::error::{Error, Result};
use crate::preprocess::GramianMethod;

// ---------------------------------------------------------------------------
// Top level
// ---------------------------------------------------------------------------

/// A whole run: where traces come from, how they are reshaped, what is
/// compared and where results go.
///
/// ```json
/// {
///   "reader": { "kind": "csv_full", "dir": "traces/", "columns": ["time", "cpu"] },
///   "sizing": { "mode": "fraction", "step": 60 },
///   "preprocessors": [ { "kind": "normalize", "column": "cpu" } ],
///   "comparators": [ { "level": "task", "metric": "l1", "column": "cpu", "mode": "per_fraction" } ],
///   "output": "out.json"
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    pub reader: ReaderConfig,
    #[serde(default)]
    pub sizing: Option<SizingConfig>,
    #[serde(default)]
    pub preprocessors: Vec<PreprocessorConfig>,
    pub comparators: Vec<ComparatorConfig>,
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub report: Option<ReportConfig>,
}

impl PipelineConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

// ---------------------------------------------------------------------------
// Readers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReaderConfig {
    CsvFull {
        dir: PathBuf,
        #[serde(default)]
        layout: Layout,
        #[serde(default)]
        columns: Option<Vec<String>>,
    },
    CsvFraction {
        dir: PathBuf,
        #[serde(default)]
        layout: Layout,
        #[serde(default)]
        columns: Option<Vec<String>>,
    },
    ImageFull {
        dir: PathBuf,
        #[serde(default)]
        layout: Layout,
    },
    ImageFraction {
        dir: PathBuf,
        #[serde(default)]
        layout: Layout,
    },
    ParquetUsage {
        path: PathBuf,
        #[serde(default)]
        job_column: Option<String>,
        #[serde(default)]
        task_column: Option<String>,
        #[serde(default)]
        time_column: Option<String>,
        #[serde(default)]
        columns: Option<Vec<String>>,
    },
}

// ---------------------------------------------------------------------------
// Sizing
// ---------------------------------------------------------------------------

/// How differing task lengths are reconciled before a fixed-length metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizingMode {
    Pad,
    Trim,
    Fraction,
    Full,
}

impl FromStr for SizingMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pad" => Ok(SizingMode::Pad),
            "trim" => Ok(SizingMode::Trim),
            "fraction" => Ok(SizingMode::Fraction),
            "full" => Ok(SizingMode::Full),
            other => Err(Error::UnknownSizingMode(other.to_string())),
        }
    }
}

impl fmt::Display for SizingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SizingMode::Pad => "pad",
            SizingMode::Trim => "trim",
            SizingMode::Fraction => "fraction",
            SizingMode::Full => "full",
        };
        f.write_str(s)
    }
}

/// `mode` stays a string here so an unknown value surfaces as
/// [`Error::UnknownSizingMode`] rather than a JSON error.
#[derive(Debug, Clone, Deserialize)]
pub struct SizingConfig {
    pub mode: String,
    /// Fraction length for `fraction`.
    #[serde(default)]
    pub step: Option<usize>,
    /// Sampling step for `pad`, e.g. `"300s"`.
    #[serde(default)]
    pub freq: Option<String>,
}

// ---------------------------------------------------------------------------
// Preprocessors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PreprocessorConfig {
    Pad {
        freq: String,
    },
    Trim,
    Slice {
        step: usize,
    },
    Crop {
        #[serde(default)]
        llim: usize,
        #[serde(default)]
        ulim: Option<usize>,
    },
    Outlier {
        column: String,
        llim: f64,
        ulim: f64,
    },
    Normalize {
        column: String,
    },
    Aggregate {
        column: String,
        window: usize,
    },
    Time {
        column: String,
        unit: String,
        freq: String,
    },
    Image {
        column: String,
        image_size: usize,
    },
    IouBand {
        epsilon: usize,
        #[serde(default = "default_border")]
        border: usize,
    },
    Gramian {
        column: String,
        image_size: usize,
        #[serde(default)]
        method: GramianMethod,
        #[serde(default)]
        sample_range: Option<(f64, f64)>,
    },
}

fn default_border() -> usize {
    1
}

// ---------------------------------------------------------------------------
// Comparators
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "level", rename_all = "snake_case")]
pub enum ComparatorConfig {
    Job {
        #[serde(default)]
        name: Option<String>,
        metric: String,
        #[serde(default)]
        column: Option<String>,
        #[serde(default)]
        fraction: u32,
    },
    Task {
        #[serde(default)]
        name: Option<String>,
        metric: String,
        #[serde(default)]
        column: Option<String>,
        #[serde(default)]
        mode: Option<TaskMode>,
    },
    Fraction {
        #[serde(default)]
        name: Option<String>,
        metric: String,
        #[serde(default)]
        column: Option<String>,
    },
}

impl ComparatorConfig {
    pub fn metric(&self) -> &str {
        match self {
            ComparatorConfig::Job { metric, .. }
            | ComparatorConfig::Task { metric, .. }
            | ComparatorConfig::Fraction { metric, .. } => metric,
        }
    }

    /// Output part name; defaults to the metric name.
    pub fn name(&self) -> &str {
        match self {
            ComparatorConfig::Job { name, .. }
            | ComparatorConfig::Task { name, .. }
            | ComparatorConfig::Fraction { name, .. } => {
                name.as_deref().unwrap_or_else(|| self.metric())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Optional detail report for one baseline of one part.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    pub part: String,
    /// Baseline id as written in the output: `"7"`, `"7-0"` or `"7-0-3"`.
    pub baseline: String,
    pub threshold: f64,
    #[serde(default)]
    pub path: Option<PathBuf>,
}
