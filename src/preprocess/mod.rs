//! In-place transforms over the trace hierarchy.
//!
//! ```text
//!   Preprocessor::run(&mut Input)
//!        │
//!        ├── Input-level   Padder, Trimmer         (whole tree, two passes)
//!        ├── PerJob<P>     JobHook::apply(&mut Job)
//!        ├── PerTask<P>    TaskHook::apply(&mut Task)
//!        └── PerFraction<P> FractionHook::apply(Payload) -> Payload
//! ```
//!
//! Transforms that need one contiguous series skip sliced tasks with a
//! warning (see [`single_series`]).

pub mod aggregate;
pub mod crop;
pub mod encode;
pub mod normalize;
pub mod outlier;
pub mod pad;
pub mod slice;
pub mod time;
pub mod trim;

use log::{debug, warn};

use crate::data::model::{Input, Job, Task};
use crate::data::payload::Payload;
use crate::error::Result;

pub use aggregate::Aggregator;
pub use crop::Cropper;
pub use encode::{GramianField, GramianMethod, ImageCreator, IouBand};
pub use normalize::Normalizer;
pub use outlier::OutlierClipper;
pub use pad::Padder;
pub use slice::Slicer;
pub use time::{TimeAligner, TimeUnit};
pub use trim::Trimmer;

/// A transform applied to the whole tree in place.
///
/// `run` mutates the input rather than returning it. Steps are chained by
/// [`Pipeline`](crate::pipeline::Pipeline), which runs them in order over one
/// `Input`.
pub trait Preprocessor {
    fn name(&self) -> &str;

    fn run(&self, input: &mut Input) -> Result<()>;
}

impl<P: Preprocessor + ?Sized> Preprocessor for Box<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn run(&self, input: &mut Input) -> Result<()> {
        (**self).run(input)
    }
}

// ---------------------------------------------------------------------------
// Per-granularity hooks
// ---------------------------------------------------------------------------

pub trait JobHook {
    fn name(&self) -> &str;

    fn apply(&self, job: &mut Job) -> Result<()>;
}

pub trait TaskHook {
    fn name(&self) -> &str;

    fn apply(&self, task: &mut Task) -> Result<()>;
}

/// Fraction-level transforms take the payload by value and hand back its
/// replacement.
pub trait FractionHook {
    fn name(&self) -> &str;

    fn apply(&self, data: Payload) -> Result<Payload>;
}

// ---------------------------------------------------------------------------
// Wrappers: own the traversal
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PerJob<P>(pub P);

impl<P: JobHook> Preprocessor for PerJob<P> {
    fn name(&self) -> &str {
        self.0.name()
    }

    fn run(&self, input: &mut Input) -> Result<()> {
        for job in input.jobs_mut() {
            self.0.apply(job)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PerTask<P>(pub P);

impl<P: TaskHook> Preprocessor for PerTask<P> {
    fn name(&self) -> &str {
        self.0.name()
    }

    fn run(&self, input: &mut Input) -> Result<()> {
        for task in input.tasks_mut() {
            self.0.apply(task)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PerFraction<P>(pub P);

impl<P: FractionHook> Preprocessor for PerFraction<P> {
    fn name(&self) -> &str {
        self.0.name()
    }

    fn run(&self, input: &mut Input) -> Result<()> {
        for fraction in input.fractions_mut() {
            let data = fraction.take_data();
            let out = self.0.apply(data)?;
            debug!("{}: {} -> {}", self.0.name(), fraction.id(), out);
            fraction.replace_data(out);
        }
        Ok(())
    }
}

/// The series of an unsliced task, or `None` after warning that `what`
/// skips it.
pub fn single_series<'a>(task: &'a mut Task, what: &str) -> Option<&'a mut Payload> {
    if !task.is_unsliced() {
        warn!(
            "{what}: task {} holds {} fractions, skipping",
            task.id(),
            task.fraction_count()
        );
        return None;
    }
    task.series_mut()
}

/// Read-only variant of [`single_series`] for statistics passes. Does not warn.
pub(crate) fn series_len(task: &Task) -> Option<usize> {
    task.series().map(Payload::len)
}

#[cfg(test)]
pub(crate) mod testutil {
    use crate::data::model::{Input, Task};
    use crate::data::payload::{Payload, Table};

    pub fn column(values: &[f64]) -> Payload {
        Payload::Table(Table::from_columns(vec![("v", values.to_vec())]).unwrap())
    }

    pub fn indexed(values: &[f64], step: i64) -> Payload {
        let index = (0..values.len() as i64).map(|i| i * step).collect();
        Payload::Table(
            Table::from_columns(vec![("v", values.to_vec())])
                .unwrap()
                .with_index(index)
                .unwrap(),
        )
    }

    pub fn values(p: &Payload) -> Vec<f64> {
        p.values(Some("v")).unwrap().to_vec()
    }

    pub fn sliced_task(job: u64, idx: u32) -> Task {
        let mut task = Task::new(job, idx);
        task.replace_fractions(vec![column(&[1.0, 2.0]), column(&[3.0])]);
        task
    }

    pub fn input_of(series: &[&[f64]]) -> Input {
        let mut input = Input::new();
        for (i, s) in series.iter().enumerate() {
            input
                .job_entry(1)
                .task_entry(i as u32)
                .insert_fraction(0, column(s));
        }
        input
    }
}
