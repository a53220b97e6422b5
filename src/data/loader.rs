use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use arrow::array::{Array, ArrayRef, AsArray, Float64Array, Int64Array};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type, Int64Type};
use log::{debug, info};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::Deserialize;

use super::model::Input;
use super::payload::{Matrix, Payload, Table};
use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Reader contract
// ---------------------------------------------------------------------------

/// Anything that materializes a complete [`Input`] tree.
pub trait Reader {
    fn read(&self) -> Result<Input>;
}

/// How trace files are arranged on disk.
///
/// Full readers (one file per task):
/// * `Structured`   – `dir/<job_id>/<task_idx>-*.ext`
/// * `Unstructured` – `dir/<job_id>-<task_idx>-*.ext`
///
/// Fraction readers (one file per fraction):
/// * `Structured`   – `dir/<job_id>-<task_idx>[-*]/<fraction_idx>.ext`
/// * `Unstructured` – `dir/<job_id>-<task_idx>-<fraction_idx>[-*].ext`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    #[default]
    Structured,
    Unstructured,
}

/// A single-file decoder plugged into the directory walkers below.
trait FileDecoder {
    const EXTENSION: &'static str;
    fn decode(&self, path: &Path) -> Result<Payload>;
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

/// CSV with a header row. Every selected column is parsed as `f64`;
/// empty or non-numeric cells become `NaN`.
#[derive(Debug, Clone, Default)]
struct CsvDecoder {
    columns: Option<Vec<String>>,
}

impl FileDecoder for CsvDecoder {
    const EXTENSION: &'static str = "csv";

    fn decode(&self, path: &Path) -> Result<Payload> {
        let mut reader = csv::Reader::from_path(path)?;
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

        let selected: Vec<(usize, String)> = match &self.columns {
            Some(wanted) => wanted
                .iter()
                .map(|name| {
                    headers
                        .iter()
                        .position(|h| h == name)
                        .map(|i| (i, name.clone()))
                        .ok_or_else(|| Error::MissingColumn(name.clone()))
                })
                .collect::<Result<_>>()?,
            None => headers.iter().cloned().enumerate().collect(),
        };

        let mut values: Vec<Vec<f64>> = vec![Vec::new(); selected.len()];
        for record in reader.records() {
            let record = record?;
            for (slot, (col_idx, _)) in values.iter_mut().zip(&selected) {
                let cell = record.get(*col_idx).unwrap_or("").trim();
                slot.push(cell.parse::<f64>().unwrap_or(f64::NAN));
            }
        }

        let table = Table::from_columns(
            selected
                .into_iter()
                .map(|(_, name)| name)
                .zip(values)
                .collect(),
        )?;
        Ok(Payload::Table(table))
    }
}

/// One CSV per task, read as an unsliced fraction 0.
#[derive(Debug, Clone)]
pub struct CsvFullReader {
    pub dir: PathBuf,
    pub layout: Layout,
    pub columns: Option<Vec<String>>,
}

impl Reader for CsvFullReader {
    fn read(&self) -> Result<Input> {
        let decoder = CsvDecoder {
            columns: self.columns.clone(),
        };
        read_full(&self.dir, self.layout, &decoder)
    }
}

/// One CSV per fraction of an already sliced task.
#[derive(Debug, Clone)]
pub struct CsvFractionReader {
    pub dir: PathBuf,
    pub layout: Layout,
    pub columns: Option<Vec<String>>,
}

impl Reader for CsvFractionReader {
    fn read(&self) -> Result<Input> {
        let decoder = CsvDecoder {
            columns: self.columns.clone(),
        };
        read_fractions(&self.dir, self.layout, &decoder)
    }
}

// ---------------------------------------------------------------------------
// PNG
// ---------------------------------------------------------------------------

/// Grayscale raster → `Matrix` of 0..=255 values, one row per pixel row.
struct PngDecoder;

impl FileDecoder for PngDecoder {
    const EXTENSION: &'static str = "png";

    fn decode(&self, path: &Path) -> Result<Payload> {
        let img = image::open(path)?.to_luma8();
        let (width, height) = img.dimensions();
        let data = img.into_raw().into_iter().map(f64::from).collect();
        Ok(Payload::Matrix(Matrix::new(
            height as usize,
            width as usize,
            data,
        )?))
    }
}

#[derive(Debug, Clone)]
pub struct ImageFullReader {
    pub dir: PathBuf,
    pub layout: Layout,
}

impl Reader for ImageFullReader {
    fn read(&self) -> Result<Input> {
        read_full(&self.dir, self.layout, &PngDecoder)
    }
}

#[derive(Debug, Clone)]
pub struct ImageFractionReader {
    pub dir: PathBuf,
    pub layout: Layout,
}

impl Reader for ImageFractionReader {
    fn read(&self) -> Result<Input> {
        read_fractions(&self.dir, self.layout, &PngDecoder)
    }
}

// ---------------------------------------------------------------------------
// Directory walkers
// ---------------------------------------------------------------------------

fn read_full<D: FileDecoder>(dir: &Path, layout: Layout, decoder: &D) -> Result<Input> {
    let mut input = Input::new();
    let files = match layout {
        Layout::Structured => {
            let mut files = Vec::new();
            for job_dir in list_subdirs(dir)? {
                files.extend(list_files(&job_dir, D::EXTENSION)?);
            }
            files
        }
        Layout::Unstructured => list_files(dir, D::EXTENSION)?,
    };

    for file in files {
        let (job_id, task_idx) = match layout {
            Layout::Structured => {
                let job_dir = file.parent().unwrap_or(dir);
                let job_id = parse_field(&file, &stem_of(job_dir), 0)?;
                let task_idx = parse_idx(&file, &stem_of(&file), 0)?;
                (job_id, task_idx)
            }
            Layout::Unstructured => {
                let stem = stem_of(&file);
                (parse_field(&file, &stem, 0)?, parse_idx(&file, &stem, 1)?)
            }
        };
        debug!("reading task {job_id}-{task_idx} from {}", file.display());
        let data = decoder.decode(&file)?;
        input
            .job_entry(job_id)
            .task_entry(task_idx)
            .insert_fraction(0, data);
    }

    info!(
        "read {} tasks across {} jobs from {}",
        input.tasks().count(),
        input.job_ids().len(),
        dir.display()
    );
    Ok(input)
}

fn read_fractions<D: FileDecoder>(dir: &Path, layout: Layout, decoder: &D) -> Result<Input> {
    let mut input = Input::new();
    let mut entries: Vec<(u64, u32, u32, PathBuf)> = Vec::new();

    match layout {
        Layout::Structured => {
            for task_dir in list_subdirs(dir)? {
                let task_stem = stem_of(&task_dir);
                let job_id = parse_field(&task_dir, &task_stem, 0)?;
                let task_idx = parse_idx(&task_dir, &task_stem, 1)?;
                for file in list_files(&task_dir, D::EXTENSION)? {
                    let idx = parse_idx(&file, &stem_of(&file), 0)?;
                    entries.push((job_id, task_idx, idx, file));
                }
            }
        }
        Layout::Unstructured => {
            for file in list_files(dir, D::EXTENSION)? {
                let stem = stem_of(&file);
                let job_id = parse_field(&file, &stem, 0)?;
                let task_idx = parse_idx(&file, &stem, 1)?;
                let idx = parse_idx(&file, &stem, 2)?;
                entries.push((job_id, task_idx, idx, file));
            }
        }
    }

    for (job_id, task_idx, idx, file) in entries {
        let data = decoder.decode(&file)?;
        input
            .job_entry(job_id)
            .task_entry(task_idx)
            .insert_fraction(idx, data);
    }

    // Fraction indices must be contiguous from 0.
    for task in input.tasks() {
        let idxs = task.fraction_idxs();
        let contiguous = idxs.iter().enumerate().all(|(i, &idx)| i as u32 == idx);
        if !contiguous {
            return Err(Error::Layout {
                path: dir.to_path_buf(),
                reason: format!("task {} has non-contiguous fractions {idxs:?}", task.id()),
            });
        }
    }

    info!(
        "read {} fractions across {} tasks from {}",
        input.fractions().count(),
        input.tasks().count(),
        dir.display()
    );
    Ok(input)
}

fn list_subdirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn list_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(extension));
        if path.is_file() && matches {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn stem_of(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_string()
}

/// The `pos`-th `-`-separated field of `stem`, as an integer.
fn parse_field(path: &Path, stem: &str, pos: usize) -> Result<u64> {
    let field = stem.split('-').nth(pos).ok_or_else(|| Error::Layout {
        path: path.to_path_buf(),
        reason: format!("expected at least {} '-'-separated fields in '{stem}'", pos + 1),
    })?;
    field.trim().parse::<u64>().map_err(|_| Error::Layout {
        path: path.to_path_buf(),
        reason: format!("'{field}' is not an integer id"),
    })
}

/// Task and fraction indices are `u32`.
fn parse_idx(path: &Path, stem: &str, pos: usize) -> Result<u32> {
    narrow_id(path, parse_field(path, stem, pos)?)
}

fn narrow_id(path: &Path, value: u64) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::Layout {
        path: path.to_path_buf(),
        reason: format!("index {value} does not fit in 32 bits"),
    })
}

// ---------------------------------------------------------------------------
// Parquet usage table
// ---------------------------------------------------------------------------

/// Long-format usage table: one row per sample, keyed by job and task.
///
/// Rows are grouped into `(job, task)`, sorted by the time column and turned
/// into unsliced tasks whose table keeps the time column as a plain numeric
/// column (ready for time alignment).
#[derive(Debug, Clone)]
pub struct ParquetUsageReader {
    pub path: PathBuf,
    pub job_column: String,
    pub task_column: String,
    pub time_column: String,
    /// Value columns to keep. `None` keeps every non-key column.
    pub columns: Option<Vec<String>>,
}

impl ParquetUsageReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ParquetUsageReader {
            path: path.into(),
            job_column: "collection_id".to_string(),
            task_column: "instance_index".to_string(),
            time_column: "time".to_string(),
            columns: None,
        }
    }
}

/// Samples of one task: (time, values in `value_names` order).
type TaskRows = Vec<(i64, Vec<f64>)>;

impl Reader for ParquetUsageReader {
    fn read(&self) -> Result<Input> {
        let file = File::open(&self.path)?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

        let mut value_names: Option<Vec<String>> = None;
        let mut grouped: BTreeMap<(u64, u32), TaskRows> = BTreeMap::new();

        for batch in reader {
            let batch = batch?;
            let schema = batch.schema();

            let names = value_names.get_or_insert_with(|| match &self.columns {
                Some(cols) => cols.clone(),
                None => schema
                    .fields()
                    .iter()
                    .map(|f| f.name().clone())
                    .filter(|n| *n != self.job_column && *n != self.task_column && *n != self.time_column)
                    .collect(),
            });

            let column = |name: &str| -> Result<ArrayRef> {
                let idx = schema
                    .index_of(name)
                    .map_err(|_| Error::MissingColumn(name.to_string()))?;
                Ok(batch.column(idx).clone())
            };

            let jobs = as_i64(&column(&self.job_column)?)?;
            let tasks = as_i64(&column(&self.task_column)?)?;
            let times = as_i64(&column(&self.time_column)?)?;
            let values: Vec<Float64Array> = names
                .iter()
                .map(|n| as_f64(&column(n)?))
                .collect::<Result<_>>()?;

            for row in 0..batch.num_rows() {
                if jobs.is_null(row) || tasks.is_null(row) || times.is_null(row) {
                    continue;
                }
                let key = (
                    key_id(&self.path, jobs.value(row))?,
                    narrow_id(&self.path, key_id(&self.path, tasks.value(row))?)?,
                );
                let sample = values
                    .iter()
                    .map(|arr| if arr.is_null(row) { f64::NAN } else { arr.value(row) })
                    .collect();
                grouped
                    .entry(key)
                    .or_default()
                    .push((times.value(row), sample));
            }
        }

        let names = value_names.unwrap_or_default();
        let mut input = Input::new();
        for ((job_id, task_idx), mut rows) in grouped {
            rows.sort_by_key(|(t, _)| *t);
            let mut table = Table::new();
            table.push_column(
                self.time_column.clone(),
                rows.iter().map(|(t, _)| *t as f64).collect(),
            )?;
            for (i, name) in names.iter().enumerate() {
                table.push_column(name.clone(), rows.iter().map(|(_, v)| v[i]).collect())?;
            }
            input
                .job_entry(job_id)
                .task_entry(task_idx)
                .insert_fraction(0, Payload::Table(table));
        }

        info!(
            "read {} tasks across {} jobs from {}",
            input.tasks().count(),
            input.job_ids().len(),
            self.path.display()
        );
        Ok(input)
    }
}

fn as_i64(col: &ArrayRef) -> Result<Int64Array> {
    Ok(cast(col, &DataType::Int64)?.as_primitive::<Int64Type>().clone())
}

fn as_f64(col: &ArrayRef) -> Result<Float64Array> {
    Ok(cast(col, &DataType::Float64)?.as_primitive::<Float64Type>().clone())
}

fn key_id(path: &Path, value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|_| Error::Layout {
        path: path.to_path_buf(),
        reason: format!("negative id {value}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::EntityId;
    use std::fs;

    fn write(path: &Path, body: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    #[test]
    fn oversized_task_index_is_a_layout_error() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("7-4294967296.csv"), "cpu\n1\n");
        write(&dir.path().join("7-0.csv"), "cpu\n1\n");
        let reader = CsvFullReader {
            dir: dir.path().to_path_buf(),
            layout: Layout::Unstructured,
            columns: None,
        };
        assert!(matches!(reader.read(), Err(Error::Layout { .. })));
        assert_eq!(narrow_id(dir.path(), u64::from(u32::MAX)).unwrap(), u32::MAX);
    }

    #[test]
    fn csv_full_structured() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("12/0-100-200.csv"), "time,cpu\n1,0.5\n2,0.7\n");
        write(&dir.path().join("12/1-100-200.csv"), "time,cpu\n1,0.1\n2,\n");
        write(&dir.path().join("40/0-5-9.csv"), "time,cpu\n1,0.9\n");

        let reader = CsvFullReader {
            dir: dir.path().to_path_buf(),
            layout: Layout::Structured,
            columns: None,
        };
        let input = reader.read().unwrap();
        assert_eq!(input.job_ids(), vec![12, 40]);
        assert_eq!(
            input.task_ids(),
            vec![EntityId::Task(12, 0), EntityId::Task(12, 1), EntityId::Task(40, 0)]
        );
        let cpu = input.fraction(12, 1, 0).unwrap().data().values(Some("cpu")).unwrap();
        assert_eq!(cpu[0], 0.1);
        assert!(cpu[1].is_nan());
    }

    #[test]
    fn csv_full_unstructured_with_column_subset() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("7-3-a.csv"), "time,cpu,mem\n1,0.5,9\n");
        let reader = CsvFullReader {
            dir: dir.path().to_path_buf(),
            layout: Layout::Unstructured,
            columns: Some(vec!["cpu".to_string()]),
        };
        let input = reader.read().unwrap();
        let table = input.fraction(7, 3, 0).unwrap().data().as_table().unwrap();
        assert_eq!(table.column_names().collect::<Vec<_>>(), vec!["cpu"]);
    }

    #[test]
    fn csv_fraction_reader_requires_contiguous_indices() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("7-3-0.csv"), "v\n1\n");
        write(&dir.path().join("7-3-2.csv"), "v\n2\n");
        let reader = CsvFractionReader {
            dir: dir.path().to_path_buf(),
            layout: Layout::Unstructured,
            columns: None,
        };
        assert!(matches!(reader.read(), Err(Error::Layout { .. })));

        write(&dir.path().join("7-3-1.csv"), "v\n3\n");
        let input = reader.read().unwrap();
        assert_eq!(input.task(7, 3).unwrap().fraction_count(), 3);
    }

    #[test]
    fn malformed_file_name_is_a_layout_error() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("notanid.csv"), "v\n1\n");
        let reader = CsvFullReader {
            dir: dir.path().to_path_buf(),
            layout: Layout::Unstructured,
            columns: None,
        };
        assert!(matches!(reader.read(), Err(Error::Layout { .. })));
    }

    #[test]
    fn png_images_become_matrices() {
        let dir = tempfile::tempdir().unwrap();
        let task_dir = dir.path().join("5-1");
        fs::create_dir_all(&task_dir).unwrap();
        let img = image::GrayImage::from_fn(3, 2, |x, y| image::Luma([(x + 10 * y) as u8]));
        img.save(task_dir.join("0.png")).unwrap();

        let reader = ImageFractionReader {
            dir: dir.path().to_path_buf(),
            layout: Layout::Structured,
        };
        let input = reader.read().unwrap();
        let m = input.fraction(5, 1, 0).unwrap().data().as_matrix().unwrap();
        assert_eq!(m.shape(), (2, 3));
        assert_eq!(m.get(1, 2), 12.0);
    }
}
