use std::fmt;
use std::ops::Range;

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Table – a time-indexed frame of named f64 columns
// ---------------------------------------------------------------------------

/// Columnar series data as produced by the CSV / Parquet readers.
///
/// All columns share the row count. The optional index holds timestamps in
/// nanoseconds once [`TimeAligner`](crate::preprocess::time::TimeAligner)
/// has run. Missing cells are `NaN`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    index: Option<Vec<i64>>,
    columns: Vec<(String, Vec<f64>)>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from `(name, values)` pairs; all columns must be the same length.
    pub fn from_columns<S: Into<String>>(columns: Vec<(S, Vec<f64>)>) -> Result<Self> {
        let mut table = Table::new();
        for (name, values) in columns {
            table.push_column(name, values)?;
        }
        Ok(table)
    }

    /// Attach a time index (nanoseconds). Its length must equal the row count.
    pub fn with_index(mut self, index: Vec<i64>) -> Result<Self> {
        self.set_index(index)?;
        Ok(self)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        match (&self.index, self.columns.first()) {
            (Some(idx), _) => idx.len(),
            (None, Some((_, col))) => col.len(),
            (None, None) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn index(&self) -> Option<&[i64]> {
        self.index.as_deref()
    }

    pub fn set_index(&mut self, index: Vec<i64>) -> Result<()> {
        if !self.columns.is_empty() && index.len() != self.len() {
            return Err(Error::shape(
                format!("index of {} rows", index.len()),
                format!("table of {} rows", self.len()),
            ));
        }
        self.index = Some(index);
        Ok(())
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|(n, _)| n == name)
    }

    pub fn column(&self, name: &str) -> Result<&[f64]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, values)| values.as_slice())
            .ok_or_else(|| Error::MissingColumn(name.to_string()))
    }

    /// Mutable view of a column. The row count cannot change through it.
    pub fn column_mut(&mut self, name: &str) -> Result<&mut [f64]> {
        self.columns
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, values)| values.as_mut_slice())
            .ok_or_else(|| Error::MissingColumn(name.to_string()))
    }

    /// Append a column, or replace one with the same name.
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<()> {
        let name = name.into();
        let expected = self.len();
        let first = self.index.is_none() && self.columns.is_empty();
        if !first && values.len() != expected {
            return Err(Error::shape(
                format!("column '{name}' of {} rows", values.len()),
                format!("table of {expected} rows"),
            ));
        }
        match self.columns.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = values,
            None => self.columns.push((name, values)),
        }
        Ok(())
    }

    /// Remove a column and hand back its values.
    pub fn take_column(&mut self, name: &str) -> Result<Vec<f64>> {
        let pos = self
            .columns
            .iter()
            .position(|(n, _)| n == name)
            .ok_or_else(|| Error::MissingColumn(name.to_string()))?;
        Ok(self.columns.remove(pos).1)
    }

    /// Rows `[range.start, range.end)`, clamped to the table length.
    pub fn slice_rows(&self, range: Range<usize>) -> Table {
        let end = range.end.min(self.len());
        let start = range.start.min(end);
        Table {
            index: self.index.as_ref().map(|idx| idx[start..end].to_vec()),
            columns: self
                .columns
                .iter()
                .map(|(n, v)| (n.clone(), v[start..end].to_vec()))
                .collect(),
        }
    }

    /// Select rows by position, in the given order.
    pub fn take_rows(&self, rows: &[usize]) -> Table {
        Table {
            index: self
                .index
                .as_ref()
                .map(|idx| rows.iter().map(|&r| idx[r]).collect()),
            columns: self
                .columns
                .iter()
                .map(|(n, v)| (n.clone(), rows.iter().map(|&r| v[r]).collect()))
                .collect(),
        }
    }

    /// Copy of the table with every timestamp moved by `delta` nanoseconds.
    pub fn shifted(&self, delta: i64) -> Table {
        let mut out = self.clone();
        if let Some(idx) = out.index.as_mut() {
            for ts in idx.iter_mut() {
                *ts += delta;
            }
        }
        out
    }

    /// Append the rows of `other`. Both tables must have the same columns.
    pub fn append(&mut self, other: &Table) -> Result<()> {
        let same_columns = self.columns.len() == other.columns.len()
            && self
                .columns
                .iter()
                .zip(&other.columns)
                .all(|((a, _), (b, _))| a == b);
        if !same_columns || self.index.is_some() != other.index.is_some() {
            return Err(Error::shape(
                format!("columns {:?}", self.column_names().collect::<Vec<_>>()),
                format!("columns {:?}", other.column_names().collect::<Vec<_>>()),
            ));
        }
        if let (Some(a), Some(b)) = (self.index.as_mut(), other.index.as_ref()) {
            a.extend_from_slice(b);
        }
        for ((_, a), (_, b)) in self.columns.iter_mut().zip(&other.columns) {
            a.extend_from_slice(b);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Matrix – dense row-major 2-D data (images, encoded fields)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    pub fn new(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        if rows * cols != data.len() {
            return Err(Error::shape(
                format!("{rows}x{cols}"),
                format!("{} values", data.len()),
            ));
        }
        Ok(Matrix { rows, cols, data })
    }

    pub fn filled(rows: usize, cols: usize, value: f64) -> Self {
        Matrix {
            rows,
            cols,
            data: vec![value; rows * cols],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.cols + col] = value;
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Values of one column, top to bottom.
    pub fn column(&self, col: usize) -> Vec<f64> {
        (0..self.rows).map(|r| self.get(r, col)).collect()
    }

    /// Rows `[range.start, range.end)`, clamped.
    pub fn slice_rows(&self, range: Range<usize>) -> Matrix {
        let end = range.end.min(self.rows);
        let start = range.start.min(end);
        Matrix {
            rows: end - start,
            cols: self.cols,
            data: self.data[start * self.cols..end * self.cols].to_vec(),
        }
    }

    /// Place `other` to the right of `self`. Row counts must agree.
    pub fn hconcat(&self, other: &Matrix) -> Result<Matrix> {
        if self.rows != other.rows {
            return Err(Error::shape(
                format!("{}x{}", self.rows, self.cols),
                format!("{}x{}", other.rows, other.cols),
            ));
        }
        let cols = self.cols + other.cols;
        let mut data = Vec::with_capacity(self.rows * cols);
        for r in 0..self.rows {
            data.extend_from_slice(&self.data[r * self.cols..(r + 1) * self.cols]);
            data.extend_from_slice(&other.data[r * other.cols..(r + 1) * other.cols]);
        }
        Ok(Matrix {
            rows: self.rows,
            cols,
            data,
        })
    }
}

// ---------------------------------------------------------------------------
// Payload – what a Fraction holds
// ---------------------------------------------------------------------------

/// The data held by a fraction. Its shape depends on the reader or
/// preprocessor that produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Table(Table),
    Matrix(Matrix),
    Vector(Vec<f64>),
}

impl Default for Payload {
    fn default() -> Self {
        Payload::Vector(Vec::new())
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Table(t) => write!(f, "table[{} rows]", t.len()),
            Payload::Matrix(m) => write!(f, "matrix[{}x{}]", m.rows, m.cols),
            Payload::Vector(v) => write!(f, "vector[{}]", v.len()),
        }
    }
}

impl Payload {
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Table(_) => "table",
            Payload::Matrix(_) => "matrix",
            Payload::Vector(_) => "vector",
        }
    }

    /// Sample count: rows for tables and matrices, elements for vectors.
    pub fn len(&self) -> usize {
        match self {
            Payload::Table(t) => t.len(),
            Payload::Matrix(m) => m.rows,
            Payload::Vector(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_table(&self) -> Result<&Table> {
        match self {
            Payload::Table(t) => Ok(t),
            other => Err(Error::PayloadKind {
                expected: "table",
                actual: other.kind(),
            }),
        }
    }

    pub fn as_table_mut(&mut self) -> Result<&mut Table> {
        match self {
            Payload::Table(t) => Ok(t),
            other => Err(Error::PayloadKind {
                expected: "table",
                actual: other.kind(),
            }),
        }
    }

    pub fn into_table(self) -> Result<Table> {
        match self {
            Payload::Table(t) => Ok(t),
            other => Err(Error::PayloadKind {
                expected: "table",
                actual: other.kind(),
            }),
        }
    }

    pub fn as_matrix(&self) -> Result<&Matrix> {
        match self {
            Payload::Matrix(m) => Ok(m),
            other => Err(Error::PayloadKind {
                expected: "matrix",
                actual: other.kind(),
            }),
        }
    }

    /// The flat values a series metric compares.
    ///
    /// * table: the named column (or the only column when `column` is `None`)
    /// * vector: all elements
    /// * matrix: row-major data
    pub fn values(&self, column: Option<&str>) -> Result<&[f64]> {
        match (self, column) {
            (Payload::Table(t), Some(col)) => t.column(col),
            (Payload::Table(t), None) => match t.columns.as_slice() {
                [(_, only)] => Ok(only.as_slice()),
                _ => Err(Error::MissingColumn("<unspecified>".to_string())),
            },
            (Payload::Vector(v), _) => Ok(v.as_slice()),
            (Payload::Matrix(m), _) => Ok(m.as_slice()),
        }
    }

    /// Rows (or elements) `[range.start, range.end)`, clamped.
    pub fn slice_rows(&self, range: Range<usize>) -> Payload {
        match self {
            Payload::Table(t) => Payload::Table(t.slice_rows(range)),
            Payload::Matrix(m) => Payload::Matrix(m.slice_rows(range)),
            Payload::Vector(v) => {
                let end = range.end.min(v.len());
                let start = range.start.min(end);
                Payload::Vector(v[start..end].to_vec())
            }
        }
    }

    /// Join payloads end to end: rows for tables and vectors, columns for
    /// matrices. All parts must be the same kind.
    pub fn concat<'a>(parts: impl IntoIterator<Item = &'a Payload>) -> Result<Payload> {
        let mut parts = parts.into_iter();
        let Some(first) = parts.next() else {
            return Ok(Payload::default());
        };
        let mut acc = first.clone();
        for part in parts {
            match (&mut acc, part) {
                (Payload::Table(a), Payload::Table(b)) => a.append(b)?,
                (Payload::Vector(a), Payload::Vector(b)) => a.extend_from_slice(b),
                (Payload::Matrix(a), Payload::Matrix(b)) => *a = a.hconcat(b)?,
                (a, b) => return Err(Error::shape(a.kind(), b.kind())),
            }
        }
        Ok(acc)
    }
}
