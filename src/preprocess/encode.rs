//! Fraction encoders that turn a series into a 2-D matrix.

use serde::Deserialize;

use super::normalize::min_max;
use super::FractionHook;
use crate::data::payload::{Matrix, Payload};
use crate::error::{Error, Result};

const WHITE: f64 = 255.0;
const GREY: f64 = 127.0;
const BLACK: f64 = 0.0;

// ---------------------------------------------------------------------------
// ImageCreator – polyline raster of a [0, 1] column
// ---------------------------------------------------------------------------

/// Draws a `[0, 1]` column as a one-pixel black polyline on a white
/// `size × size` raster. Sample `i` sits at column `i`, value 1 at the top row.
#[derive(Debug, Clone)]
pub struct ImageCreator {
    column: String,
    size: usize,
}

impl ImageCreator {
    pub fn new(column: impl Into<String>, size: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::invalid("image_size", "must be positive"));
        }
        Ok(ImageCreator {
            column: column.into(),
            size,
        })
    }
}

impl FractionHook for ImageCreator {
    fn name(&self) -> &str {
        "image"
    }

    fn apply(&self, data: Payload) -> Result<Payload> {
        let top = (self.size - 1) as f64;
        // Rows outside the raster collapse onto the row just past its edge.
        let (above, below) = (-1.0, self.size as f64);
        let points: Vec<(i64, i64)> = data
            .values(Some(self.column.as_str()))?
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_nan())
            .map(|(x, v)| {
                let y = (top - (v * top).trunc()).max(above).min(below);
                (x as i64, y as i64)
            })
            .collect();

        let mut img = Matrix::filled(self.size, self.size, WHITE);
        match points.as_slice() {
            [] => {}
            [only] => plot(&mut img, *only),
            _ => {
                for pair in points.windows(2) {
                    line(&mut img, pair[0], pair[1]);
                }
            }
        }
        Ok(Payload::Matrix(img))
    }
}

fn plot(img: &mut Matrix, (x, y): (i64, i64)) {
    if (0..img.cols() as i64).contains(&x) && (0..img.rows() as i64).contains(&y) {
        img.set(y as usize, x as usize, BLACK);
    }
}

/// Bresenham line, clipped to the raster.
fn line(img: &mut Matrix, (x0, y0): (i64, i64), (x1, y1): (i64, i64)) {
    let (dx, dy) = ((x1 - x0).abs(), -(y1 - y0).abs());
    let (sx, sy) = ((x1 - x0).signum(), (y1 - y0).signum());
    let (mut x, mut y, mut err) = (x0, y0, dx + dy);
    loop {
        plot(img, (x, y));
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

// ---------------------------------------------------------------------------
// IouBand – grey tolerance band around the polyline
// ---------------------------------------------------------------------------

/// Adds `border` white rows above and below a raster, then marks `epsilon`
/// grey pixels above and below each column's black extent.
#[derive(Debug, Clone)]
pub struct IouBand {
    epsilon: usize,
    border: usize,
}

impl IouBand {
    pub fn new(epsilon: usize, border: usize) -> Self {
        IouBand { epsilon, border }
    }
}

impl FractionHook for IouBand {
    fn name(&self) -> &str {
        "iou_band"
    }

    fn apply(&self, data: Payload) -> Result<Payload> {
        let src = data.as_matrix()?;
        let (rows, cols) = (src.rows() + 2 * self.border, src.cols());
        let mut img = Matrix::filled(rows, cols, WHITE);
        for r in 0..src.rows() {
            for c in 0..cols {
                img.set(r + self.border, c, src.get(r, c));
            }
        }

        for c in 0..cols {
            let mut black = (0..rows).filter(|&r| img.get(r, c) == BLACK);
            let Some(lo) = black.next() else {
                continue;
            };
            let hi = black.last().unwrap_or(lo);
            for j in 1..=self.epsilon {
                img.set(lo.saturating_sub(j), c, GREY);
                img.set((hi + j).min(rows - 1), c, GREY);
            }
        }
        Ok(Payload::Matrix(img))
    }
}

// ---------------------------------------------------------------------------
// GramianField – angular summation / difference field
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GramianMethod {
    #[default]
    Summation,
    Difference,
}

/// Gramian angular field of one column, reduced to `size` points by
/// piecewise aggregate approximation.
#[derive(Debug, Clone)]
pub struct GramianField {
    column: String,
    size: usize,
    method: GramianMethod,
    sample_range: (f64, f64),
}

impl GramianField {
    pub fn new(column: impl Into<String>, size: usize, method: GramianMethod) -> Result<Self> {
        if size == 0 {
            return Err(Error::invalid("image_size", "must be positive"));
        }
        Ok(GramianField {
            column: column.into(),
            size,
            method,
            sample_range: (-1.0, 1.0),
        })
    }

    /// Range the reduced series is scaled into before taking `acos`; must lie
    /// within `[-1, 1]`.
    pub fn with_sample_range(mut self, lo: f64, hi: f64) -> Result<Self> {
        if !(-1.0..=1.0).contains(&lo) || !(-1.0..=1.0).contains(&hi) || lo >= hi {
            return Err(Error::invalid(
                "sample_range",
                format!("({lo}, {hi}) is not an ordered range inside [-1, 1]"),
            ));
        }
        self.sample_range = (lo, hi);
        Ok(self)
    }
}

/// Piecewise aggregate approximation: mean of `size` near-equal segments.
fn paa(values: &[f64], size: usize) -> Vec<f64> {
    let n = values.len();
    (0..size)
        .map(|i| {
            let start = i * n / size;
            let end = ((i + 1) * n).div_ceil(size).max(start + 1);
            let seg = &values[start..end];
            seg.iter().sum::<f64>() / seg.len() as f64
        })
        .collect()
}

impl FractionHook for GramianField {
    fn name(&self) -> &str {
        "gramian"
    }

    fn apply(&self, data: Payload) -> Result<Payload> {
        let values = data.values(Some(self.column.as_str()))?;
        if values.len() < self.size {
            return Err(Error::invalid(
                "image_size",
                format!("{} exceeds series length {}", self.size, values.len()),
            ));
        }

        let mut reduced = paa(values, self.size);
        min_max(&mut reduced);
        let (lo, hi) = self.sample_range;
        let phi: Vec<f64> = reduced
            .iter()
            .map(|v| (lo + v * (hi - lo)).clamp(-1.0, 1.0).acos())
            .collect();

        let mut field = Matrix::filled(self.size, self.size, 0.0);
        for (i, a) in phi.iter().enumerate() {
            for (j, b) in phi.iter().enumerate() {
                let v = match self.method {
                    GramianMethod::Summation => (a + b).cos(),
                    GramianMethod::Difference => (a - b).sin(),
                };
                field.set(i, j, v);
            }
        }
        Ok(Payload::Matrix(field))
    }
}
