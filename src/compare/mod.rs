//! All-pairs comparison at job, task or fraction granularity.
//!
//! Each granularity has a one-method hook trait ([`JobCompare`],
//! [`TaskCompare`], [`FractionCompare`]) and a wrapper that owns the
//! traversal and implements [`Comparator`]. The wrappers share one driver,
//! [`all_pairs`], which builds the result skeleton over every ordered pair of
//! distinct entities and fills it in.

pub mod fraction;
pub mod job;
pub mod task;

use log::{debug, info};

use crate::data::model::{EntityId, Fraction, Input, Job, Task};
use crate::error::Result;
use crate::output::{ComparisonResult, Output, PartialOutput, Value};

pub use fraction::FractionMetricComparator;
pub use job::JobProfileComparator;
pub use task::{TaskMetricComparator, TaskMode};

/// Something that contributes one named matrix to an [`Output`].
pub trait Comparator {
    fn name(&self) -> &str;

    /// Compare every ordered pair of entities and insert the resulting part
    /// under [`name`](Comparator::name). On error nothing is inserted.
    fn compare(&self, input: &Input, output: &mut Output) -> Result<()>;
}

impl<C: Comparator + ?Sized> Comparator for Box<C> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn compare(&self, input: &Input, output: &mut Output) -> Result<()> {
        (**self).compare(input, output)
    }
}

// ---------------------------------------------------------------------------
// Per-granularity hooks
// ---------------------------------------------------------------------------

pub trait JobCompare: Sync {
    fn compare_jobs(&self, a: &Job, b: &Job) -> Result<Value>;
}

pub trait TaskCompare: Sync {
    fn compare_tasks(&self, a: &Task, b: &Task) -> Result<Value>;
}

pub trait FractionCompare: Sync {
    fn compare_fractions(&self, a: &Fraction, b: &Fraction) -> Result<Value>;
}

// ---------------------------------------------------------------------------
// Wrappers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct JobComparator<C> {
    name: String,
    inner: C,
}

impl<C: JobCompare> JobComparator<C> {
    pub fn new(name: impl Into<String>, inner: C) -> Self {
        JobComparator {
            name: name.into(),
            inner,
        }
    }
}

impl<C: JobCompare> Comparator for JobComparator<C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn compare(&self, input: &Input, output: &mut Output) -> Result<()> {
        let jobs: Vec<(EntityId, &Job)> = input.jobs().map(|j| (j.entity_id(), j)).collect();
        let part = all_pairs(&self.name, &jobs, |a, b| self.inner.compare_jobs(a, b))?;
        output.insert(part);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct TaskComparator<C> {
    name: String,
    inner: C,
}

impl<C: TaskCompare> TaskComparator<C> {
    pub fn new(name: impl Into<String>, inner: C) -> Self {
        TaskComparator {
            name: name.into(),
            inner,
        }
    }
}

impl<C: TaskCompare> Comparator for TaskComparator<C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn compare(&self, input: &Input, output: &mut Output) -> Result<()> {
        let tasks: Vec<(EntityId, &Task)> = input.tasks().map(|t| (t.id(), t)).collect();
        let part = all_pairs(&self.name, &tasks, |a, b| self.inner.compare_tasks(a, b))?;
        output.insert(part);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct FractionComparator<C> {
    name: String,
    inner: C,
}

impl<C: FractionCompare> FractionComparator<C> {
    pub fn new(name: impl Into<String>, inner: C) -> Self {
        FractionComparator {
            name: name.into(),
            inner,
        }
    }
}

impl<C: FractionCompare> Comparator for FractionComparator<C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn compare(&self, input: &Input, output: &mut Output) -> Result<()> {
        let fractions: Vec<(EntityId, &Fraction)> =
            input.fractions().map(|f| (f.id(), f)).collect();
        let part = all_pairs(&self.name, &fractions, |a, b| {
            self.inner.compare_fractions(a, b)
        })?;
        output.insert(part);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Empty matrix over every ordered pair of distinct ids.
fn skeleton(name: &str, ids: &[EntityId]) -> PartialOutput {
    let mut part = PartialOutput::new(name);
    for &baseline in ids {
        let mut result = ComparisonResult::new(baseline);
        for &other in ids.iter().filter(|&&id| id != baseline) {
            result.insert(other, Value::default());
        }
        part.insert(result);
    }
    part
}

/// Scores of one baseline against every other entity.
fn row<E, F>(
    baseline: (EntityId, &E),
    entities: &[(EntityId, &E)],
    f: &F,
) -> Result<(EntityId, Vec<(EntityId, Value)>)>
where
    F: Fn(&E, &E) -> Result<Value>,
{
    let (base_id, base) = baseline;
    let mut values = Vec::with_capacity(entities.len().saturating_sub(1));
    for &(id, other) in entities {
        if id == base_id {
            continue;
        }
        values.push((id, f(base, other)?));
    }
    Ok((base_id, values))
}

/// Compute `f` over every ordered pair of distinct entities.
///
/// Self pairs are skipped by identity. Each baseline row is independent, so
/// with the `parallel` feature the rows are spread across the rayon pool;
/// each row is still written by exactly one worker. The first error aborts
/// the whole run.
pub fn all_pairs<E, F>(name: &str, entities: &[(EntityId, &E)], f: F) -> Result<PartialOutput>
where
    E: Sync,
    F: Fn(&E, &E) -> Result<Value> + Sync,
{
    let ids: Vec<EntityId> = entities.iter().map(|(id, _)| *id).collect();
    let mut part = skeleton(name, &ids);
    info!(
        "{name}: comparing {} entities ({} pairs)",
        ids.len(),
        ids.len() * ids.len().saturating_sub(1)
    );

    #[cfg(feature = "parallel")]
    let rows: Vec<(EntityId, Vec<(EntityId, Value)>)> = {
        use rayon::prelude::*;
        entities
            .par_iter()
            .map(|&baseline| row(baseline, entities, &f))
            .collect::<Result<_>>()?
    };

    #[cfg(not(feature = "parallel"))]
    let rows: Vec<(EntityId, Vec<(EntityId, Value)>)> = entities
        .iter()
        .map(|&baseline| row(baseline, entities, &f))
        .collect::<Result<_>>()?;

    for (baseline, values) in rows {
        let result = part.result_mut(baseline)?;
        for (id, value) in values {
            debug!("{name}: {baseline} vs {id} = {value}");
            result.partial_mut(id)?.value = value;
        }
    }
    Ok(part)
}
