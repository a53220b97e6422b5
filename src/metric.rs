//! Distance calculators and the registry that resolves them by name.
//!
//! A calculator is a pure function of two equal-shape payloads (plus a column
//! name for tabular payloads). It never touches the entity hierarchy: the
//! comparators extract the payloads first.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::data::payload::{Matrix, Payload};
use crate::error::{Error, Result};

/// A pairwise distance (or similarity) between two payloads.
pub trait Calculator: Send + Sync {
    fn calculate(&self, a: &Payload, b: &Payload, column: Option<&str>) -> Result<f64>;
}

impl<F> Calculator for F
where
    F: Fn(&Payload, &Payload, Option<&str>) -> Result<f64> + Send + Sync,
{
    fn calculate(&self, a: &Payload, b: &Payload, column: Option<&str>) -> Result<f64> {
        self(a, b, column)
    }
}

pub type CalculatorFn = fn(&Payload, &Payload, Option<&str>) -> Result<f64>;

// ---------------------------------------------------------------------------
// MetricKind – the built-in metrics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    L1,
    L2,
    Mae,
    Mse,
    Mape,
    Cosine,
    Ssim,
    Sdsim,
    Iou,
    DtwL2,
}

impl MetricKind {
    pub const ALL: [MetricKind; 10] = [
        MetricKind::L1,
        MetricKind::L2,
        MetricKind::Mae,
        MetricKind::Mse,
        MetricKind::Mape,
        MetricKind::Cosine,
        MetricKind::Ssim,
        MetricKind::Sdsim,
        MetricKind::Iou,
        MetricKind::DtwL2,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MetricKind::L1 => "l1",
            MetricKind::L2 => "l2",
            MetricKind::Mae => "mae",
            MetricKind::Mse => "mse",
            MetricKind::Mape => "mape",
            MetricKind::Cosine => "cosine",
            MetricKind::Ssim => "ssim",
            MetricKind::Sdsim => "sdsim",
            MetricKind::Iou => "iou",
            MetricKind::DtwL2 => "dtwl2",
        }
    }

    pub fn calculator(self) -> CalculatorFn {
        match self {
            MetricKind::L1 => l1,
            MetricKind::L2 => l2,
            MetricKind::Mae => mae,
            MetricKind::Mse => mse,
            MetricKind::Mape => mape,
            MetricKind::Cosine => cosine,
            MetricKind::Ssim => ssim,
            MetricKind::Sdsim => sdsim,
            MetricKind::Iou => iou,
            MetricKind::DtwL2 => dtwl2,
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MetricKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        MetricKind::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::UnknownMetric(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Name → calculator mapping. Built-ins are registered up front; callers may
/// add their own under new names (or shadow a built-in).
#[derive(Clone)]
pub struct MetricRegistry {
    calculators: HashMap<String, Arc<dyn Calculator>>,
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for MetricRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricRegistry")
            .field("metrics", &self.names())
            .finish()
    }
}

impl MetricRegistry {
    pub fn empty() -> Self {
        MetricRegistry {
            calculators: HashMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        for kind in MetricKind::ALL {
            registry.register(kind.name(), kind.calculator());
        }
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, calculator: impl Calculator + 'static) {
        self.calculators
            .insert(name.into().to_ascii_lowercase(), Arc::new(calculator));
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Calculator>> {
        self.calculators
            .get(&name.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| Error::UnknownMetric(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.calculators.contains_key(&name.to_ascii_lowercase())
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.calculators.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

// ---------------------------------------------------------------------------
// Built-in calculators
// ---------------------------------------------------------------------------

/// Both payloads' compared values, after checking they have the same shape.
fn paired<'a>(
    a: &'a Payload,
    b: &'a Payload,
    column: Option<&str>,
) -> Result<(&'a [f64], &'a [f64])> {
    if let (Payload::Matrix(ma), Payload::Matrix(mb)) = (a, b) {
        if ma.shape() != mb.shape() {
            return Err(Error::shape(a, b));
        }
    }
    let xs = a.values(column)?;
    let ys = b.values(column)?;
    if xs.len() != ys.len() {
        return Err(Error::shape(
            format!("{} samples", xs.len()),
            format!("{} samples", ys.len()),
        ));
    }
    Ok((xs, ys))
}

pub fn l1(a: &Payload, b: &Payload, column: Option<&str>) -> Result<f64> {
    let (xs, ys) = paired(a, b, column)?;
    Ok(xs.iter().zip(ys).map(|(x, y)| (x - y).abs()).sum())
}

pub fn l2(a: &Payload, b: &Payload, column: Option<&str>) -> Result<f64> {
    let (xs, ys) = paired(a, b, column)?;
    Ok(xs.iter().zip(ys).map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt())
}

pub fn mae(a: &Payload, b: &Payload, column: Option<&str>) -> Result<f64> {
    let n = paired(a, b, column)?.0.len();
    if n == 0 {
        return Ok(0.0);
    }
    Ok(l1(a, b, column)? / n as f64)
}

pub fn mse(a: &Payload, b: &Payload, column: Option<&str>) -> Result<f64> {
    let (xs, ys) = paired(a, b, column)?;
    if xs.is_empty() {
        return Ok(0.0);
    }
    let sum: f64 = xs.iter().zip(ys).map(|(x, y)| (x - y).powi(2)).sum();
    Ok(sum / xs.len() as f64)
}

/// Mean absolute percentage error relative to `a`; zero baselines contribute 0.
pub fn mape(a: &Payload, b: &Payload, column: Option<&str>) -> Result<f64> {
    let (xs, ys) = paired(a, b, column)?;
    if xs.is_empty() {
        return Ok(0.0);
    }
    let sum: f64 = xs
        .iter()
        .zip(ys)
        .map(|(x, y)| if *x != 0.0 { ((x - y) / x).abs() } else { 0.0 })
        .sum();
    Ok(sum / xs.len() as f64 * 100.0)
}

/// `1 - cosine similarity`. A zero vector is treated as orthogonal to everything.
pub fn cosine(a: &Payload, b: &Payload, column: Option<&str>) -> Result<f64> {
    let (xs, ys) = paired(a, b, column)?;
    let dot: f64 = xs.iter().zip(ys).map(|(x, y)| x * y).sum();
    let norm_a = xs.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = ys.iter().map(|y| y * y).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(1.0);
    }
    Ok(1.0 - dot / (norm_a * norm_b))
}

/// Mean structural similarity. Series are treated as `1 × n` images.
pub fn ssim(a: &Payload, b: &Payload, column: Option<&str>) -> Result<f64> {
    let (xs, ys) = paired(a, b, column)?;
    let (rows, cols) = match a {
        Payload::Matrix(m) => m.shape(),
        _ => (1, xs.len()),
    };
    Ok(ssim_grid(xs, ys, rows, cols))
}

/// Structural dissimilarity, `1 - ssim`.
pub fn sdsim(a: &Payload, b: &Payload, column: Option<&str>) -> Result<f64> {
    Ok(1.0 - ssim(a, b, column)?)
}

/// Mean per-column intersection-over-union of the grey (127) bands produced
/// by the IoU band encoder. Higher means closer.
pub fn iou(a: &Payload, b: &Payload, _column: Option<&str>) -> Result<f64> {
    let (ma, mb) = (a.as_matrix()?, b.as_matrix()?);
    if ma.shape() != mb.shape() {
        return Err(Error::shape(a, b));
    }
    if ma.cols() == 0 {
        return Ok(0.0);
    }

    let band = |m: &Matrix, col: usize| -> Option<(usize, usize)> {
        let rows: Vec<usize> = (0..m.rows()).filter(|&r| m.get(r, col) == 127.0).collect();
        Some((*rows.first()?, *rows.last()?))
    };

    let total: f64 = (0..ma.cols())
        .map(|col| {
            let (Some((lo_a, hi_a)), Some((lo_b, hi_b))) = (band(ma, col), band(mb, col)) else {
                return 0.0;
            };
            let top = lo_a.max(lo_b);
            let bottom = hi_a.min(hi_b);
            let inter = bottom.saturating_sub(top) as f64;
            if inter == 0.0 {
                return 0.0;
            }
            let union = (hi_a - lo_a) as f64 + (hi_b - lo_b) as f64 - inter;
            inter / union
        })
        .sum();
    Ok(total / ma.cols() as f64)
}

/// Dynamic time warping with absolute-difference cost. Lengths may differ.
pub fn dtwl2(a: &Payload, b: &Payload, column: Option<&str>) -> Result<f64> {
    let xs = a.values(column)?;
    let ys = b.values(column)?;
    let (n, m) = (xs.len(), ys.len());
    if n == 0 || m == 0 {
        return Ok(if n == m { 0.0 } else { f64::INFINITY });
    }

    let mut prev = vec![f64::INFINITY; m + 1];
    let mut curr = vec![f64::INFINITY; m + 1];
    prev[0] = 0.0;
    for x in xs {
        curr[0] = f64::INFINITY;
        for (j, y) in ys.iter().enumerate() {
            let cost = (x - y).abs();
            curr[j + 1] = cost + prev[j].min(prev[j + 1]).min(curr[j]);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    Ok(prev[m])
}

/// Largest odd window ≤ 7 that fits in `n`.
fn window(n: usize) -> usize {
    let w = n.min(7).max(1);
    if w % 2 == 0 {
        w - 1
    } else {
        w
    }
}

fn ssim_grid(xs: &[f64], ys: &[f64], rows: usize, cols: usize) -> f64 {
    if xs.is_empty() {
        return 1.0;
    }
    let (wr, wc) = (window(rows), window(cols));
    let np = (wr * wc) as f64;
    let cov_norm = if np > 1.0 { np / (np - 1.0) } else { 1.0 };

    let lo = xs.iter().chain(ys).copied().fold(f64::INFINITY, f64::min);
    let hi = xs.iter().chain(ys).copied().fold(f64::NEG_INFINITY, f64::max);
    let range = if hi > lo { hi - lo } else { 1.0 };
    let c1 = (0.01 * range).powi(2);
    let c2 = (0.03 * range).powi(2);

    let mut total = 0.0;
    let mut count = 0usize;
    for r0 in 0..=(rows - wr) {
        for c0 in 0..=(cols - wc) {
            let (mut sx, mut sy, mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0, 0.0, 0.0);
            for r in r0..r0 + wr {
                for c in c0..c0 + wc {
                    let (x, y) = (xs[r * cols + c], ys[r * cols + c]);
                    sx += x;
                    sy += y;
                    sxx += x * x;
                    syy += y * y;
                    sxy += x * y;
                }
            }
            let (ux, uy) = (sx / np, sy / np);
            let vx = cov_norm * (sxx / np - ux * ux);
            let vy = cov_norm * (syy / np - uy * uy);
            let vxy = cov_norm * (sxy / np - ux * uy);
            let num = (2.0 * ux * uy + c1) * (2.0 * vxy + c2);
            let den = (ux * ux + uy * uy + c1) * (vx + vy + c2);
            total += num / den;
            count += 1;
        }
    }
    total / count as f64
}
