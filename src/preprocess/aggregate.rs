use super::FractionHook;
use crate::data::payload::Payload;
use crate::error::{Error, Result};

/// Downsamples a column by a moving average of `window` rows.
///
/// Rows `window-1, 2·window-1, …` are kept with the window mean in place of
/// the column value; windows containing a NaN are dropped.
#[derive(Debug, Clone)]
pub struct Aggregator {
    column: String,
    window: usize,
}

impl Aggregator {
    pub fn new(column: impl Into<String>, window: usize) -> Result<Self> {
        if window == 0 {
            return Err(Error::invalid("window", "aggregation window must be positive"));
        }
        Ok(Aggregator {
            column: column.into(),
            window,
        })
    }
}

impl FractionHook for Aggregator {
    fn name(&self) -> &str {
        "aggregate"
    }

    fn apply(&self, data: Payload) -> Result<Payload> {
        let table = data.into_table()?;
        let values = table.column(&self.column)?;

        let (rows, means): (Vec<usize>, Vec<f64>) = values
            .chunks_exact(self.window)
            .enumerate()
            .map(|(i, chunk)| {
                let mean = chunk.iter().sum::<f64>() / self.window as f64;
                ((i + 1) * self.window - 1, mean)
            })
            .filter(|(_, mean)| !mean.is_nan())
            .unzip();

        let mut out = table.take_rows(&rows);
        out.push_column(self.column.clone(), means)?;
        Ok(Payload::Table(out))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::*;
    use super::*;
    use crate::data::payload::Table;

    #[test]
    fn keeps_every_window_end() {
        let data = indexed(&[1.0, 3.0, 5.0, 7.0, 9.0], 10);
        let out = Aggregator::new("v", 2).unwrap().apply(data).unwrap();
        let t = out.as_table().unwrap();
        assert_eq!(t.column("v").unwrap(), &[2.0, 6.0]);
        assert_eq!(t.index().unwrap(), &[10, 30]);
    }

    #[test]
    fn nan_windows_are_dropped() {
        let data = Payload::Table(
            Table::from_columns(vec![
                ("v", vec![1.0, f64::NAN, 2.0, 4.0]),
                ("w", vec![0.0, 1.0, 2.0, 3.0]),
            ])
            .unwrap(),
        );
        let out = Aggregator::new("v", 2).unwrap().apply(data).unwrap();
        let t = out.as_table().unwrap();
        assert_eq!(t.column("v").unwrap(), &[3.0]);
        assert_eq!(t.column("w").unwrap(), &[3.0]);
    }

    #[test]
    fn zero_window_is_rejected() {
        assert!(Aggregator::new("v", 0).is_err());
    }
}
