use log::debug;
use serde::Serialize;

use crate::data::model::{EntityId, Input};
use crate::data::payload::Payload;
use crate::error::Result;
use crate::output::{Output, Value};

// ---------------------------------------------------------------------------
// DetailReport – one baseline's row, ranked
// ---------------------------------------------------------------------------

/// One compared entity in a [`DetailReport`].
#[derive(Debug, Clone, Serialize)]
pub struct DetailEntry {
    pub id: EntityId,
    /// Ranking key: the value itself, or the mean of a per-fraction list.
    pub score: f64,
    pub value: Value,
    #[serde(skip)]
    pub payload: Option<Payload>,
}

/// A baseline's payload next to every compared entity's payload and score,
/// closest first.
#[derive(Debug, Clone, Serialize)]
pub struct DetailReport {
    pub part: String,
    pub baseline: EntityId,
    #[serde(skip)]
    pub baseline_payload: Option<Payload>,
    pub entries: Vec<DetailEntry>,
}

impl DetailReport {
    pub fn build(input: &Input, output: &Output, part: &str, baseline: EntityId) -> Result<Self> {
        let result = output.part(part)?.result(baseline)?;
        let mut entries = result
            .partials()
            .map(|p| -> Result<DetailEntry> {
                Ok(DetailEntry {
                    id: p.id,
                    score: p.value.summary(),
                    value: p.value.clone(),
                    payload: input.payload(p.id)?.cloned(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        entries.sort_by(|a, b| a.score.total_cmp(&b.score));
        debug!("{part}: detail for {baseline} with {} entries", entries.len());

        Ok(DetailReport {
            part: part.to_string(),
            baseline,
            baseline_payload: input.payload(baseline)?.cloned(),
            entries,
        })
    }

    pub fn summary(&self, threshold: f64) -> MatchSummary {
        MatchSummary::evaluate(self, threshold)
    }
}

// ---------------------------------------------------------------------------
// MatchSummary – threshold classification against job membership
// ---------------------------------------------------------------------------

/// Confusion counts for "score ≤ threshold" against "same job as baseline".
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MatchSummary {
    pub threshold: f64,
    pub true_match: usize,
    pub false_match: usize,
    pub true_no_match: usize,
    pub false_no_match: usize,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl MatchSummary {
    pub fn evaluate(report: &DetailReport, threshold: f64) -> Self {
        let job = report.baseline.job_id();
        let (mut tm, mut fm, mut tn, mut fnm) = (0, 0, 0, 0);
        for entry in &report.entries {
            let matching = entry.score <= threshold;
            match (entry.id.job_id() == job, matching) {
                (true, true) => tm += 1,
                (true, false) => fnm += 1,
                (false, true) => fm += 1,
                (false, false) => tn += 1,
            }
        }
        MatchSummary {
            threshold,
            true_match: tm,
            false_match: fm,
            true_no_match: tn,
            false_no_match: fnm,
            accuracy: ratio(tm + tn, tm + tn + fm + fnm),
            precision: ratio(tm, tm + fm),
            recall: ratio(tm, tm + fnm),
        }
    }

    /// `[[true_match, false_no_match], [false_match, true_no_match]]`
    pub fn confusion(&self) -> [[usize; 2]; 2] {
        [
            [self.true_match, self.false_no_match],
            [self.false_match, self.true_no_match],
        ]
    }
}
