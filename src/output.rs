use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use serde::Serialize;

use crate::data::model::EntityId;
use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Value / PartialResult – one cell of a comparison matrix
// ---------------------------------------------------------------------------

/// A pairwise score: a single number or one number per fraction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Scalar(f64),
    List(Vec<f64>),
}

impl Value {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Value::Scalar(v) => Some(*v),
            Value::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[f64]> {
        match self {
            Value::Scalar(_) => None,
            Value::List(v) => Some(v),
        }
    }

    /// Single number summarizing the value (lists are averaged; empty → NaN).
    pub fn summary(&self) -> f64 {
        match self {
            Value::Scalar(v) => *v,
            Value::List(v) if v.is_empty() => f64::NAN,
            Value::List(v) => v.iter().sum::<f64>() / v.len() as f64,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Scalar(0.0)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Scalar(v) => write!(f, "{v:.4}"),
            Value::List(v) => write!(f, "{v:.4?}"),
        }
    }
}

/// Score of one compared entity against the baseline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartialResult {
    pub id: EntityId,
    pub value: Value,
}

// ---------------------------------------------------------------------------
// Result – one baseline's row
// ---------------------------------------------------------------------------

/// Scores of every other entity against one baseline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonResult {
    baseline: EntityId,
    compared: BTreeMap<EntityId, PartialResult>,
}

impl ComparisonResult {
    pub fn new(baseline: EntityId) -> Self {
        ComparisonResult {
            baseline,
            compared: BTreeMap::new(),
        }
    }

    pub fn baseline(&self) -> EntityId {
        self.baseline
    }

    pub fn insert(&mut self, id: EntityId, value: Value) {
        self.compared.insert(id, PartialResult { id, value });
    }

    pub fn partial(&self, id: EntityId) -> Result<&PartialResult> {
        self.compared.get(&id).ok_or(Error::NotFound(id))
    }

    pub(crate) fn partial_mut(&mut self, id: EntityId) -> Result<&mut PartialResult> {
        self.compared.get_mut(&id).ok_or(Error::NotFound(id))
    }

    pub fn partials(&self) -> impl Iterator<Item = &PartialResult> {
        self.compared.values()
    }

    pub fn partial_ids(&self) -> Vec<EntityId> {
        self.compared.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.compared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compared.is_empty()
    }
}

// ---------------------------------------------------------------------------
// PartialOutput – one comparator's full matrix
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartialOutput {
    name: String,
    results: BTreeMap<EntityId, ComparisonResult>,
}

impl PartialOutput {
    pub fn new(name: impl Into<String>) -> Self {
        PartialOutput {
            name: name.into(),
            results: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn insert(&mut self, result: ComparisonResult) {
        self.results.insert(result.baseline, result);
    }

    pub fn result(&self, id: EntityId) -> Result<&ComparisonResult> {
        self.results.get(&id).ok_or(Error::NotFound(id))
    }

    pub(crate) fn result_mut(&mut self, id: EntityId) -> Result<&mut ComparisonResult> {
        self.results.get_mut(&id).ok_or(Error::NotFound(id))
    }

    pub fn results(&self) -> impl Iterator<Item = &ComparisonResult> {
        self.results.values()
    }

    pub fn result_ids(&self) -> Vec<EntityId> {
        self.results.keys().copied().collect()
    }

    /// Shortcut for `result(baseline)?.partial(compared)?.value`.
    pub fn value(&self, baseline: EntityId, compared: EntityId) -> Result<&Value> {
        Ok(&self.result(baseline)?.partial(compared)?.value)
    }
}

// ---------------------------------------------------------------------------
// Output – every comparator's contribution, by name
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Output {
    parts: BTreeMap<String, PartialOutput>,
}

impl Output {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a part under its own name, replacing any previous run of the same name.
    pub fn insert(&mut self, part: PartialOutput) -> Option<PartialOutput> {
        self.parts.insert(part.name.clone(), part)
    }

    pub fn part(&self, name: &str) -> Result<&PartialOutput> {
        self.parts
            .get(name)
            .ok_or_else(|| Error::PartNotFound(name.to_string()))
    }

    pub fn parts(&self) -> impl Iterator<Item = &PartialOutput> {
        self.parts.values()
    }

    pub fn part_names(&self) -> Vec<&str> {
        self.parts.keys().map(String::as_str).collect()
    }

    pub fn to_json_file(&self, path: &Path) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}
