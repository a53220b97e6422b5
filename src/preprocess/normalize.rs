use super::{single_series, TaskHook};
use crate::data::model::Task;
use crate::error::Result;

/// Min-max scales one column of a task's single series into `[0, 1]`.
/// A constant column becomes all zeros.
#[derive(Debug, Clone)]
pub struct Normalizer {
    column: String,
}

impl Normalizer {
    pub fn new(column: impl Into<String>) -> Self {
        Normalizer {
            column: column.into(),
        }
    }
}

/// In-place min-max scaling, ignoring NaN.
pub fn min_max(values: &mut [f64]) {
    let (lo, hi) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if lo > hi {
        return;
    }
    let range = hi - lo;
    for v in values.iter_mut().filter(|v| !v.is_nan()) {
        *v = if range == 0.0 { 0.0 } else { (*v - lo) / range };
    }
}

impl TaskHook for Normalizer {
    fn name(&self) -> &str {
        "normalize"
    }

    fn apply(&self, task: &mut Task) -> Result<()> {
        if let Some(series) = single_series(task, "normalize") {
            min_max(series.as_table_mut()?.column_mut(&self.column)?);
        }
        Ok(())
    }
}
