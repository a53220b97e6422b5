use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use log::debug;

use super::TaskHook;
use crate::data::model::Task;
use crate::data::payload::{Payload, Table};
use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Units and frequencies
// ---------------------------------------------------------------------------

/// Unit of a raw numeric timestamp column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Seconds,
    Millis,
    Micros,
    Nanos,
}

impl TimeUnit {
    pub fn nanos(self) -> i64 {
        match self {
            TimeUnit::Seconds => 1_000_000_000,
            TimeUnit::Millis => 1_000_000,
            TimeUnit::Micros => 1_000,
            TimeUnit::Nanos => 1,
        }
    }
}

impl FromStr for TimeUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "s" => Ok(TimeUnit::Seconds),
            "ms" => Ok(TimeUnit::Millis),
            "us" => Ok(TimeUnit::Micros),
            "ns" => Ok(TimeUnit::Nanos),
            other => Err(Error::UnknownTimeUnit(other.to_string())),
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TimeUnit::Seconds => "s",
            TimeUnit::Millis => "ms",
            TimeUnit::Micros => "us",
            TimeUnit::Nanos => "ns",
        };
        f.write_str(s)
    }
}

/// Parse a step such as `"300s"`, `"5min"`, `"1h"` or `"250ms"` into nanoseconds.
/// A bare number is taken as nanoseconds.
pub fn parse_freq(s: &str) -> Result<i64> {
    let s = s.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, unit) = s.split_at(split);
    let count: i64 = digits
        .parse()
        .map_err(|_| Error::invalid("freq", format!("'{s}' does not start with a count")))?;
    let scale = match unit {
        "" => 1,
        "min" => 60 * TimeUnit::Seconds.nanos(),
        "h" => 3600 * TimeUnit::Seconds.nanos(),
        other => other.parse::<TimeUnit>()?.nanos(),
    };
    let nanos = count * scale;
    if nanos <= 0 {
        return Err(Error::invalid("freq", format!("'{s}' must be positive")));
    }
    Ok(nanos)
}

// ---------------------------------------------------------------------------
// TimeAligner
// ---------------------------------------------------------------------------

/// Turns a numeric timestamp column into the table's time index and
/// resamples every fraction of a task onto a fixed grid.
///
/// Duplicate timestamps keep their first row. Each bucket holds the mean of
/// its samples; empty buckets repeat the previous bucket.
#[derive(Debug, Clone)]
pub struct TimeAligner {
    column: String,
    unit: TimeUnit,
    freq: i64,
}

impl TimeAligner {
    /// `freq` is the bucket width in nanoseconds.
    pub fn new(column: impl Into<String>, unit: TimeUnit, freq: i64) -> Result<Self> {
        if freq <= 0 {
            return Err(Error::invalid("freq", "resampling step must be positive"));
        }
        Ok(TimeAligner {
            column: column.into(),
            unit,
            freq,
        })
    }

    fn align(&self, data: Payload) -> Result<Payload> {
        let mut table = data.into_table()?;
        let raw = table.take_column(&self.column)?;

        let scale = self.unit.nanos() as f64;
        let mut seen = HashSet::new();
        let (rows, stamps): (Vec<usize>, Vec<i64>) = raw
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.is_nan())
            .map(|(row, t)| (row, (t * scale).round() as i64))
            .filter(|(_, ns)| seen.insert(*ns))
            .unzip();
        if rows.len() < raw.len() {
            debug!(
                "time: dropped {} duplicate or missing timestamps",
                raw.len() - rows.len()
            );
        }

        let kept = table.take_rows(&rows);
        Ok(Payload::Table(resample(&kept, &stamps, self.freq)?))
    }
}

impl TaskHook for TimeAligner {
    fn name(&self) -> &str {
        "time"
    }

    fn apply(&self, task: &mut Task) -> Result<()> {
        for fraction in task.fractions_mut() {
            let data = fraction.take_data();
            fraction.replace_data(self.align(data)?);
        }
        Ok(())
    }
}

/// Bucket means over `[floor(min), max]` in steps of `freq`, forward-filled.
fn resample(table: &Table, stamps: &[i64], freq: i64) -> Result<Table> {
    let names: Vec<String> = table.column_names().map(str::to_string).collect();
    let (Some(&first), Some(&last)) = (stamps.iter().min(), stamps.iter().max()) else {
        let empty: Vec<(String, Vec<f64>)> = names.into_iter().map(|n| (n, Vec::new())).collect();
        return Table::from_columns(empty)?.with_index(Vec::new());
    };

    let origin = first.div_euclid(freq) * freq;
    let buckets = ((last - origin) / freq + 1) as usize;
    let slot: Vec<usize> = stamps.iter().map(|ts| ((ts - origin) / freq) as usize).collect();

    let mut columns = Vec::with_capacity(names.len());
    for name in names {
        let mut sums = vec![0.0; buckets];
        let mut counts = vec![0usize; buckets];
        for (&b, &v) in slot.iter().zip(table.column(&name)?) {
            if !v.is_nan() {
                sums[b] += v;
                counts[b] += 1;
            }
        }
        let mut prev = f64::NAN;
        let means: Vec<f64> = sums
            .iter()
            .zip(&counts)
            .map(|(&s, &c)| {
                if c > 0 {
                    prev = s / c as f64;
                }
                prev
            })
            .collect();
        columns.push((name, means));
    }

    let index = (0..buckets as i64).map(|i| origin + i * freq).collect();
    Table::from_columns(columns)?.with_index(index)
}
