use std::sync::Arc;

use super::FractionCompare;
use crate::data::model::Fraction;
use crate::error::Result;
use crate::metric::Calculator;
use crate::output::Value;

/// Fraction-level comparator: one calculator call per ordered pair.
#[derive(Clone)]
pub struct FractionMetricComparator {
    calculator: Arc<dyn Calculator>,
    column: Option<String>,
}

impl FractionMetricComparator {
    pub fn new(calculator: Arc<dyn Calculator>, column: Option<String>) -> Self {
        FractionMetricComparator { calculator, column }
    }
}

impl FractionCompare for FractionMetricComparator {
    fn compare_fractions(&self, a: &Fraction, b: &Fraction) -> Result<Value> {
        let score = self
            .calculator
            .calculate(a.data(), b.data(), self.column.as_deref())?;
        Ok(Value::Scalar(score))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::{Comparator, FractionComparator};
    use crate::data::model::{EntityId, Input};
    use crate::data::payload::Payload;
    use crate::error::Error;
    use crate::metric::MetricKind;
    use crate::output::Output;

    #[test]
    fn fractions_across_tasks_and_jobs() {
        let mut input = Input::new();
        let task = input.job_entry(1).task_entry(0);
        task.insert_fraction(0, Payload::Vector(vec![0.0, 0.0]));
        task.insert_fraction(1, Payload::Vector(vec![3.0, 4.0]));
        input
            .job_entry(2)
            .task_entry(0)
            .insert_fraction(0, Payload::Vector(vec![0.0, 1.0]));

        let mut output = Output::new();
        let cmp = FractionMetricComparator::new(Arc::new(MetricKind::L2.calculator()), None);
        FractionComparator::new("l2", cmp)
            .compare(&input, &mut output)
            .unwrap();

        let part = output.part("l2").unwrap();
        assert_eq!(part.result_ids().len(), 3);
        let v = part
            .value(EntityId::Fraction(1, 0, 0), EntityId::Fraction(1, 0, 1))
            .unwrap();
        assert_eq!(v, &Value::Scalar(5.0));
        let v = part
            .value(EntityId::Fraction(2, 0, 0), EntityId::Fraction(1, 0, 0))
            .unwrap();
        assert_eq!(v, &Value::Scalar(1.0));
    }

    #[test]
    fn shape_mismatch_leaves_output_untouched() {
        let mut input = Input::new();
        let task = input.job_entry(1).task_entry(0);
        task.insert_fraction(0, Payload::Vector(vec![0.0, 0.0]));
        task.insert_fraction(1, Payload::Vector(vec![0.0]));

        let mut output = Output::new();
        let cmp = FractionMetricComparator::new(Arc::new(MetricKind::L1.calculator()), None);
        let err = FractionComparator::new("l1", cmp).compare(&input, &mut output);
        assert!(matches!(err, Err(Error::ShapeMismatch { .. })));
        assert!(output.part_names().is_empty());
    }
}
