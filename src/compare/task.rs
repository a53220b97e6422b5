use std::sync::Arc;

use serde::Deserialize;

use super::TaskCompare;
use crate::data::model::Task;
use crate::data::payload::Payload;
use crate::error::{Error, Result};
use crate::metric::Calculator;
use crate::output::Value;

/// Which part of a task is compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskMode {
    /// One designated fraction of each task → scalar.
    Designated(u32),
    /// Fraction `i` against fraction `i` → one score per fraction.
    PerFraction,
    /// All fractions joined in index order → scalar.
    Concatenated,
}

impl Default for TaskMode {
    fn default() -> Self {
        TaskMode::Designated(0)
    }
}

/// Task-level comparator driven by an injected [`Calculator`].
#[derive(Clone)]
pub struct TaskMetricComparator {
    calculator: Arc<dyn Calculator>,
    column: Option<String>,
    mode: TaskMode,
}

impl TaskMetricComparator {
    pub fn new(calculator: Arc<dyn Calculator>, column: Option<String>) -> Self {
        TaskMetricComparator {
            calculator,
            column,
            mode: TaskMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: TaskMode) -> Self {
        self.mode = mode;
        self
    }

    fn calculate(&self, a: &Payload, b: &Payload) -> Result<f64> {
        self.calculator.calculate(a, b, self.column.as_deref())
    }
}

/// Both tasks must hold the same number of fractions.
fn matching_fraction_count(a: &Task, b: &Task) -> Result<usize> {
    let (na, nb) = (a.fraction_count(), b.fraction_count());
    if na != nb {
        return Err(Error::FractionCountMismatch {
            left: a.id(),
            left_count: na,
            right: b.id(),
            right_count: nb,
        });
    }
    Ok(na)
}

impl TaskCompare for TaskMetricComparator {
    fn compare_tasks(&self, a: &Task, b: &Task) -> Result<Value> {
        match self.mode {
            TaskMode::Designated(idx) => {
                let (fa, fb) = (a.fraction(idx)?, b.fraction(idx)?);
                Ok(Value::Scalar(self.calculate(fa.data(), fb.data())?))
            }
            TaskMode::PerFraction => {
                let n = matching_fraction_count(a, b)?;
                let scores = (0..n as u32)
                    .map(|i| self.calculate(a.fraction(i)?.data(), b.fraction(i)?.data()))
                    .collect::<Result<Vec<f64>>>()?;
                Ok(Value::List(scores))
            }
            TaskMode::Concatenated => {
                matching_fraction_count(a, b)?;
                let joined_a = Payload::concat(a.fractions().map(|f| f.data()))?;
                let joined_b = Payload::concat(b.fractions().map(|f| f.data()))?;
                Ok(Value::Scalar(self.calculate(&joined_a, &joined_b)?))
            }
        }
    }
}
