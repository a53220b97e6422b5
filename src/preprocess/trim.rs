use log::info;

use super::{series_len, single_series, Preprocessor};
use crate::data::model::Input;
use crate::error::Result;

/// Truncates every unsliced task to the length of the shortest one.
#[derive(Debug, Clone, Default)]
pub struct Trimmer;

impl Trimmer {
    pub fn new() -> Self {
        Trimmer
    }
}

impl Preprocessor for Trimmer {
    fn name(&self) -> &str {
        "trim"
    }

    fn run(&self, input: &mut Input) -> Result<()> {
        let Some(target) = input.tasks().filter_map(series_len).min() else {
            return Ok(());
        };
        info!("trim: target length {target}");

        for task in input.tasks_mut() {
            if let Some(series) = single_series(task, "trim") {
                if series.len() > target {
                    *series = series.slice_rows(0..target);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::*;
    use super::*;

    #[test]
    fn trims_to_shortest() {
        let mut input = input_of(&[&[1.0, 2.0, 3.0], &[4.0, 5.0], &[6.0, 7.0, 8.0, 9.0]]);
        Trimmer::new().run(&mut input).unwrap();
        let lens: Vec<usize> = input.fractions().map(|f| f.data().len()).collect();
        assert_eq!(lens, vec![2, 2, 2]);
        assert_eq!(values(input.task(1, 2).unwrap().series().unwrap()), vec![6.0, 7.0]);
    }

    #[test]
    fn trimming_twice_is_idempotent() {
        let mut input = input_of(&[&[1.0, 2.0, 3.0], &[4.0, 5.0]]);
        Trimmer::new().run(&mut input).unwrap();
        let once: Vec<_> = input.fractions().map(|f| f.data().clone()).collect();
        Trimmer::new().run(&mut input).unwrap();
        let twice: Vec<_> = input.fractions().map(|f| f.data().clone()).collect();
        assert_eq!(once, twice);
    }

    #[test]
    fn sliced_tasks_do_not_set_the_target() {
        let mut input = input_of(&[&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]]);
        input.job_entry(2).insert_task(sliced_task(2, 0)).unwrap();
        Trimmer::new().run(&mut input).unwrap();
        assert_eq!(input.task(1, 0).unwrap().series().unwrap().len(), 3);
        assert_eq!(input.task(2, 0).unwrap().fraction_count(), 2);
    }
}
