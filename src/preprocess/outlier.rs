use super::{single_series, TaskHook};
use crate::data::model::Task;
use crate::error::{Error, Result};

/// Winsorizes one column to its `[q(llim), q(ulim)]` quantile range.
#[derive(Debug, Clone)]
pub struct OutlierClipper {
    column: String,
    llim: f64,
    ulim: f64,
}

impl OutlierClipper {
    pub fn new(column: impl Into<String>, llim: f64, ulim: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&llim) || !(0.0..=1.0).contains(&ulim) || llim > ulim {
            return Err(Error::invalid(
                "quantiles",
                format!("need 0 <= llim <= ulim <= 1, got {llim} and {ulim}"),
            ));
        }
        Ok(OutlierClipper {
            column: column.into(),
            llim,
            ulim,
        })
    }
}

/// Quantile with linear interpolation between closest ranks, over the finite
/// values only. NaNs and infinities are ignored.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        return Some(sorted[lo]);
    }
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64))
}

impl TaskHook for OutlierClipper {
    fn name(&self) -> &str {
        "outlier"
    }

    fn apply(&self, task: &mut Task) -> Result<()> {
        let Some(series) = single_series(task, "outlier") else {
            return Ok(());
        };
        let values = series.as_table_mut()?.column_mut(&self.column)?;
        let (Some(lo), Some(hi)) = (quantile(values, self.llim), quantile(values, self.ulim))
        else {
            return Ok(());
        };
        for v in values.iter_mut().filter(|v| !v.is_nan()) {
            *v = v.max(lo).min(hi);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::*;
    use super::*;

    #[test]
    fn quantiles_interpolate_linearly() {
        let xs: Vec<f64> = (0..10).map(f64::from).collect();
        assert!((quantile(&xs, 0.1).unwrap() - 0.9).abs() < 1e-12);
        assert!((quantile(&xs, 0.9).unwrap() - 8.1).abs() < 1e-12);
        assert_eq!(quantile(&xs, 0.5), Some(4.5));
        assert_eq!(quantile(&[], 0.5), None);
    }

    #[test]
    fn clips_into_quantile_range() {
        let xs: Vec<f64> = (0..10).map(f64::from).collect();
        let mut task = Task::unsliced(1, 0, column(&xs));
        OutlierClipper::new("v", 0.1, 0.9)
            .unwrap()
            .apply(&mut task)
            .unwrap();
        let out = values(task.series().unwrap());
        assert!(out.iter().all(|v| (0.9 - 1e-12..=8.1 + 1e-12).contains(v)));
        assert!((out[0] - 0.9).abs() < 1e-12);
        assert_eq!(out[5], 5.0);
        assert!((out[9] - 8.1).abs() < 1e-12);
    }

    #[test]
    fn infinities_are_clipped_to_finite_range() {
        let mut task = Task::unsliced(1, 0, column(&[f64::NEG_INFINITY, 1.0, 2.0, f64::INFINITY]));
        OutlierClipper::new("v", 0.0, 1.0)
            .unwrap()
            .apply(&mut task)
            .unwrap();
        assert_eq!(values(task.series().unwrap()), vec![1.0, 1.0, 2.0, 2.0]);

        assert_eq!(quantile(&[f64::INFINITY, 3.0], 1.0), Some(3.0));
        assert_eq!(quantile(&[f64::INFINITY, f64::NEG_INFINITY], 0.5), None);
    }

    #[test]
    fn rejects_bad_limits() {
        assert!(OutlierClipper::new("v", 0.9, 0.1).is_err());
        assert!(OutlierClipper::new("v", -0.1, 0.5).is_err());
    }

    #[test]
    fn missing_column_is_an_error() {
        let mut task = Task::unsliced(1, 0, column(&[1.0]));
        let err = OutlierClipper::new("cpu", 0.0, 1.0)
            .unwrap()
            .apply(&mut task)
            .unwrap_err();
        assert!(matches!(err, Error::MissingColumn(_)));
    }
}
