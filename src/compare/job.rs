use std::sync::Arc;

use super::JobCompare;
use crate::data::model::Job;
use crate::data::payload::Payload;
use crate::error::{Error, Result};
use crate::metric::Calculator;
use crate::output::Value;

/// Compares jobs through their mean task profile.
///
/// Each job is reduced to the element-wise mean of one fraction's column over
/// all of its tasks, and the two profiles are handed to the calculator as
/// vectors.
#[derive(Clone)]
pub struct JobProfileComparator {
    calculator: Arc<dyn Calculator>,
    column: Option<String>,
    fraction: u32,
}

impl JobProfileComparator {
    pub fn new(calculator: Arc<dyn Calculator>, column: Option<String>) -> Self {
        JobProfileComparator {
            calculator,
            column,
            fraction: 0,
        }
    }

    /// Which fraction of each task feeds the profile (default 0).
    pub fn with_fraction(mut self, idx: u32) -> Self {
        self.fraction = idx;
        self
    }

    /// Element-wise mean of every task's series. Tasks must agree on length.
    pub fn profile(&self, job: &Job) -> Result<Vec<f64>> {
        let series = job
            .tasks()
            .map(|task| -> Result<_> {
                let fraction = task.fraction(self.fraction)?;
                Ok((fraction.id(), fraction.data().values(self.column.as_deref())?))
            })
            .collect::<Result<Vec<_>>>()?;
        let Some((_, first)) = series.first() else {
            return Ok(Vec::new());
        };

        let mut profile = vec![0.0; first.len()];
        for (id, values) in &series {
            if values.len() != profile.len() {
                return Err(Error::shape(
                    format!("{} ({} samples)", job.entity_id(), profile.len()),
                    format!("{id} ({} samples)", values.len()),
                ));
            }
            profile.iter_mut().zip(values.iter()).for_each(|(p, v)| *p += v);
        }
        let n = series.len() as f64;
        profile.iter_mut().for_each(|p| *p /= n);
        Ok(profile)
    }
}

impl JobCompare for JobProfileComparator {
    fn compare_jobs(&self, a: &Job, b: &Job) -> Result<Value> {
        let pa = Payload::Vector(self.profile(a)?);
        let pb = Payload::Vector(self.profile(b)?);
        Ok(Value::Scalar(self.calculator.calculate(&pa, &pb, None)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::{Comparator, JobComparator};
    use crate::data::model::{EntityId, Input};
    use crate::metric::MetricKind;
    use crate::output::Output;

    fn input() -> Input {
        let mut input = Input::new();
        let job = input.job_entry(1);
        job.task_entry(0).insert_fraction(0, Payload::Vector(vec![1.0, 3.0]));
        job.task_entry(1).insert_fraction(0, Payload::Vector(vec![3.0, 5.0]));
        input
            .job_entry(2)
            .task_entry(0)
            .insert_fraction(0, Payload::Vector(vec![2.0, 2.0]));
        input
    }

    #[test]
    fn profile_is_task_mean() {
        let input = input();
        let cmp = JobProfileComparator::new(Arc::new(MetricKind::L1.calculator()), None);
        assert_eq!(cmp.profile(input.job(1).unwrap()).unwrap(), vec![2.0, 4.0]);
        assert_eq!(cmp.profile(input.job(2).unwrap()).unwrap(), vec![2.0, 2.0]);
    }

    #[test]
    fn jobs_compared_by_profile() {
        let input = input();
        let mut output = Output::new();
        let cmp = JobProfileComparator::new(Arc::new(MetricKind::L1.calculator()), None);
        JobComparator::new("job_l1", cmp)
            .compare(&input, &mut output)
            .unwrap();
        let v = output
            .part("job_l1")
            .unwrap()
            .value(EntityId::Job(1), EntityId::Job(2))
            .unwrap();
        assert_eq!(v, &Value::Scalar(2.0));
    }

    #[test]
    fn uneven_tasks_are_a_shape_mismatch() {
        let mut input = input();
        input
            .job_entry(2)
            .task_entry(1)
            .insert_fraction(0, Payload::Vector(vec![1.0]));
        let cmp = JobProfileComparator::new(Arc::new(MetricKind::L1.calculator()), None);
        let err = cmp.profile(input.job(2).unwrap()).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }
}
