use log::{info, warn};

use super::{series_len, single_series, Preprocessor};
use crate::data::model::Input;
use crate::data::payload::{Payload, Table};
use crate::error::{Error, Result};

/// Pads every unsliced task to the longest one by repeating it.
///
/// Repetition `k` is shifted in time by `k · T · freq` nanoseconds, where `T`
/// is the task's natural length. A final partial repetition covers
/// `L mod T` rows.
#[derive(Debug, Clone)]
pub struct Padder {
    freq: i64,
}

impl Padder {
    /// `freq`: sampling step of the time index, in nanoseconds.
    pub fn new(freq: i64) -> Self {
        Padder { freq }
    }
}

impl Preprocessor for Padder {
    fn name(&self) -> &str {
        "pad"
    }

    fn run(&self, input: &mut Input) -> Result<()> {
        let target = input.tasks().filter_map(series_len).max().unwrap_or(0);
        info!("pad: target length {target}");

        for task in input.tasks_mut() {
            let id = task.id();
            let Some(series) = single_series(task, "pad") else {
                continue;
            };
            if series.is_empty() {
                warn!("pad: task {id} is empty, skipping");
                continue;
            }
            if series.len() < target {
                *series = repeat_to(series, target, self.freq)?;
            }
        }
        Ok(())
    }
}

/// `data` repeated until it is `target` rows long.
pub fn repeat_to(data: &Payload, target: usize, freq: i64) -> Result<Payload> {
    let n = data.len();
    if n == 0 || target <= n {
        return Ok(data.clone());
    }
    let (reps, rest) = (target / n, target % n);
    let period = n as i64 * freq;

    match data {
        Payload::Table(t) => {
            let mut out = t.clone();
            for k in 1..reps {
                out.append(&t.shifted(k as i64 * period))?;
            }
            if rest > 0 {
                let tail: Table = t.slice_rows(0..rest);
                out.append(&tail.shifted(reps as i64 * period))?;
            }
            Ok(Payload::Table(out))
        }
        Payload::Vector(v) => Ok(Payload::Vector(v.iter().copied().cycle().take(target).collect())),
        Payload::Matrix(_) => Err(Error::PayloadKind {
            expected: "table",
            actual: data.kind(),
        }),
    }
}
