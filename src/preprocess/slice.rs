use log::{debug, warn};

use super::{single_series, TaskHook};
use crate::data::model::Task;
use crate::error::{Error, Result};

/// Cuts a task's single series into contiguous fractions of `step` rows.
/// The last fraction keeps the remainder.
#[derive(Debug, Clone)]
pub struct Slicer {
    step: usize,
}

impl Slicer {
    pub fn new(step: usize) -> Result<Self> {
        if step == 0 {
            return Err(Error::invalid("step", "slice step must be positive"));
        }
        Ok(Slicer { step })
    }

    pub fn step(&self) -> usize {
        self.step
    }
}

impl TaskHook for Slicer {
    fn name(&self) -> &str {
        "slice"
    }

    fn apply(&self, task: &mut Task) -> Result<()> {
        let id = task.id();
        let Some(series) = single_series(task, "slice") else {
            return Ok(());
        };
        let n = series.len();
        if n == 0 {
            warn!("slice: task {id} is empty, skipping");
            return Ok(());
        }
        let parts = (0..n)
            .step_by(self.step)
            .map(|start| series.slice_rows(start..start + self.step))
            .collect::<Vec<_>>();
        debug!("slice: task {id} -> {} fractions", parts.len());
        task.replace_fractions(parts);
        Ok(())
    }
}
