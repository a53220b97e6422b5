use super::{single_series, TaskHook};
use crate::data::model::Task;
use crate::error::{Error, Result};

/// Keeps rows `[llim, ulim)` of a task's single series; `ulim = None` keeps
/// everything from `llim` on.
#[derive(Debug, Clone)]
pub struct Cropper {
    llim: usize,
    ulim: Option<usize>,
}

impl Cropper {
    pub fn new(llim: usize, ulim: Option<usize>) -> Result<Self> {
        if let Some(ulim) = ulim {
            if ulim < llim {
                return Err(Error::invalid(
                    "ulim",
                    format!("upper limit {ulim} below lower limit {llim}"),
                ));
            }
        }
        Ok(Cropper { llim, ulim })
    }
}

impl TaskHook for Cropper {
    fn name(&self) -> &str {
        "crop"
    }

    fn apply(&self, task: &mut Task) -> Result<()> {
        if let Some(series) = single_series(task, "crop") {
            let end = self.ulim.unwrap_or(usize::MAX);
            *series = series.slice_rows(self.llim..end);
        }
        Ok(())
    }
}
