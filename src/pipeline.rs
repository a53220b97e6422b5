use std::sync::Arc;

use log::info;

use crate::compare::{
    Comparator, FractionComparator, FractionMetricComparator, JobComparator,
    JobProfileComparator, TaskComparator, TaskMetricComparator, TaskMode,
};
use crate::config::{ComparatorConfig, PipelineConfig, PreprocessorConfig, ReaderConfig, SizingMode};
use crate::data::loader::{
    CsvFractionReader, CsvFullReader, ImageFractionReader, ImageFullReader, ParquetUsageReader,
    Reader,
};
use crate::data::model::Input;
use crate::error::{Error, Result};
use crate::metric::MetricRegistry;
use crate::output::Output;
use crate::preprocess::time::parse_freq;
use crate::preprocess::{
    Aggregator, Cropper, GramianField, ImageCreator, IouBand, Normalizer, OutlierClipper, Padder,
    PerFraction, PerTask, Preprocessor, Slicer, TimeAligner, TimeUnit, Trimmer,
};

/// Reader → preprocessors (in order) → comparators, all writing into one
/// [`Output`].
pub struct Pipeline {
    reader: Box<dyn Reader>,
    preprocessors: Vec<Box<dyn Preprocessor>>,
    comparators: Vec<Box<dyn Comparator>>,
}

impl Pipeline {
    pub fn new(reader: impl Reader + 'static) -> Self {
        Pipeline {
            reader: Box::new(reader),
            preprocessors: Vec::new(),
            comparators: Vec::new(),
        }
    }

    pub fn with_preprocessor(mut self, preprocessor: impl Preprocessor + 'static) -> Self {
        self.preprocessors.push(Box::new(preprocessor));
        self
    }

    pub fn with_comparator(mut self, comparator: impl Comparator + 'static) -> Self {
        self.comparators.push(Box::new(comparator));
        self
    }

    /// Build a pipeline from its configuration.
    ///
    /// Every metric name, sizing mode, time unit and numeric parameter is
    /// validated here, so configuration errors surface before any file is
    /// read.
    pub fn from_config(config: &PipelineConfig, registry: &MetricRegistry) -> Result<Self> {
        let mut preprocessors = config
            .preprocessors
            .iter()
            .map(build_preprocessor)
            .collect::<Result<Vec<_>>>()?;

        let sizing = match &config.sizing {
            Some(sizing) => {
                let mode: SizingMode = sizing.mode.parse()?;
                match mode {
                    SizingMode::Pad => {
                        let freq = sizing
                            .freq
                            .as_deref()
                            .ok_or_else(|| Error::invalid("freq", "pad sizing needs a freq"))?;
                        preprocessors.push(Box::new(Padder::new(parse_freq(freq)?)));
                    }
                    SizingMode::Trim => preprocessors.push(Box::new(Trimmer::new())),
                    SizingMode::Fraction => {
                        let step = sizing
                            .step
                            .ok_or_else(|| Error::invalid("step", "fraction sizing needs a step"))?;
                        preprocessors.push(Box::new(PerTask(Slicer::new(step)?)));
                    }
                    SizingMode::Full => {}
                }
                mode
            }
            None => SizingMode::Full,
        };

        let comparators = config
            .comparators
            .iter()
            .map(|c| build_comparator(c, registry, sizing))
            .collect::<Result<Vec<_>>>()?;

        info!(
            "pipeline: sizing {sizing}, {} preprocessors, {} comparators",
            preprocessors.len(),
            comparators.len()
        );
        Ok(Pipeline {
            reader: build_reader(&config.reader),
            preprocessors,
            comparators,
        })
    }

    pub fn preprocess(&self, input: &mut Input) -> Result<()> {
        for p in &self.preprocessors {
            info!("running preprocessor {}", p.name());
            p.run(input)?;
        }
        Ok(())
    }

    pub fn compare(&self, input: &Input) -> Result<Output> {
        let mut output = Output::new();
        for c in &self.comparators {
            info!("running comparator {}", c.name());
            c.compare(input, &mut output)?;
        }
        Ok(output)
    }

    /// Read, transform and compare. The transformed input is returned with
    /// the output so callers can attach payloads to reports.
    pub fn run(&self) -> Result<(Input, Output)> {
        let mut input = self.reader.read()?;
        info!(
            "read {} jobs, {} tasks",
            input.job_ids().len(),
            input.task_ids().len()
        );
        self.preprocess(&mut input)?;
        let output = self.compare(&input)?;
        Ok((input, output))
    }
}

fn build_reader(config: &ReaderConfig) -> Box<dyn Reader> {
    match config.clone() {
        ReaderConfig::CsvFull { dir, layout, columns } => {
            Box::new(CsvFullReader { dir, layout, columns })
        }
        ReaderConfig::CsvFraction { dir, layout, columns } => {
            Box::new(CsvFractionReader { dir, layout, columns })
        }
        ReaderConfig::ImageFull { dir, layout } => Box::new(ImageFullReader { dir, layout }),
        ReaderConfig::ImageFraction { dir, layout } => {
            Box::new(ImageFractionReader { dir, layout })
        }
        ReaderConfig::ParquetUsage {
            path,
            job_column,
            task_column,
            time_column,
            columns,
        } => {
            let mut reader = ParquetUsageReader::new(path);
            if let Some(c) = job_column {
                reader.job_column = c;
            }
            if let Some(c) = task_column {
                reader.task_column = c;
            }
            if let Some(c) = time_column {
                reader.time_column = c;
            }
            reader.columns = columns;
            Box::new(reader)
        }
    }
}

fn build_preprocessor(config: &PreprocessorConfig) -> Result<Box<dyn Preprocessor>> {
    let p: Box<dyn Preprocessor> = match config.clone() {
        PreprocessorConfig::Pad { freq } => Box::new(Padder::new(parse_freq(&freq)?)),
        PreprocessorConfig::Trim => Box::new(Trimmer::new()),
        PreprocessorConfig::Slice { step } => Box::new(PerTask(Slicer::new(step)?)),
        PreprocessorConfig::Crop { llim, ulim } => Box::new(PerTask(Cropper::new(llim, ulim)?)),
        PreprocessorConfig::Outlier { column, llim, ulim } => {
            Box::new(PerTask(OutlierClipper::new(column, llim, ulim)?))
        }
        PreprocessorConfig::Normalize { column } => Box::new(PerTask(Normalizer::new(column))),
        PreprocessorConfig::Aggregate { column, window } => {
            Box::new(PerFraction(Aggregator::new(column, window)?))
        }
        PreprocessorConfig::Time { column, unit, freq } => {
            let unit: TimeUnit = unit.parse()?;
            Box::new(PerTask(TimeAligner::new(column, unit, parse_freq(&freq)?)?))
        }
        PreprocessorConfig::Image { column, image_size } => {
            Box::new(PerFraction(ImageCreator::new(column, image_size)?))
        }
        PreprocessorConfig::IouBand { epsilon, border } => {
            Box::new(PerFraction(IouBand::new(epsilon, border)))
        }
        PreprocessorConfig::Gramian {
            column,
            image_size,
            method,
            sample_range,
        } => {
            let mut field = GramianField::new(column, image_size, method)?;
            if let Some((lo, hi)) = sample_range {
                field = field.with_sample_range(lo, hi)?;
            }
            Box::new(PerFraction(field))
        }
    };
    Ok(p)
}

fn build_comparator(
    config: &ComparatorConfig,
    registry: &MetricRegistry,
    sizing: SizingMode,
) -> Result<Box<dyn Comparator>> {
    let calculator = registry.resolve(config.metric())?;
    let name = config.name().to_string();
    let c: Box<dyn Comparator> = match config.clone() {
        ComparatorConfig::Job {
            column, fraction, ..
        } => Box::new(JobComparator::new(
            name,
            JobProfileComparator::new(Arc::clone(&calculator), column).with_fraction(fraction),
        )),
        ComparatorConfig::Task { column, mode, .. } => {
            let mode = mode.unwrap_or(match sizing {
                SizingMode::Fraction => TaskMode::PerFraction,
                _ => TaskMode::default(),
            });
            Box::new(TaskComparator::new(
                name,
                TaskMetricComparator::new(Arc::clone(&calculator), column).with_mode(mode),
            ))
        }
        ComparatorConfig::Fraction { column, .. } => Box::new(FractionComparator::new(
            name,
            FractionMetricComparator::new(calculator, column),
        )),
    };
    Ok(c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::EntityId;
    use crate::data::payload::{Payload, Table};

    struct Fixed(Input);

    impl Reader for Fixed {
        fn read(&self) -> Result<Input> {
            Ok(self.0.clone())
        }
    }

    fn series(values: &[f64]) -> Payload {
        Payload::Table(Table::from_columns(vec![("cpu", values.to_vec())]).unwrap())
    }

    fn config(json: &str) -> PipelineConfig {
        PipelineConfig::from_json_str(json).unwrap()
    }

    #[test]
    fn unknown_metric_fails_before_reading() {
        let cfg = config(
            r#"{ "reader": { "kind": "csv_full", "dir": "/nonexistent" },
                 "comparators": [ { "level": "task", "metric": "nope" } ] }"#,
        );
        let err = Pipeline::from_config(&cfg, &MetricRegistry::with_builtins());
        assert!(matches!(err, Err(Error::UnknownMetric(name)) if name == "nope"));
    }

    #[test]
    fn unknown_sizing_and_unit_fail_fast() {
        let cfg = config(
            r#"{ "reader": { "kind": "csv_full", "dir": "x" },
                 "sizing": { "mode": "stretch" },
                 "comparators": [] }"#,
        );
        let err = Pipeline::from_config(&cfg, &MetricRegistry::with_builtins());
        assert!(matches!(err, Err(Error::UnknownSizingMode(_))));

        let cfg = config(
            r#"{ "reader": { "kind": "csv_full", "dir": "x" },
                 "preprocessors": [ { "kind": "time", "column": "t", "unit": "weeks", "freq": "1s" } ],
                 "comparators": [] }"#,
        );
        let err = Pipeline::from_config(&cfg, &MetricRegistry::with_builtins());
        assert!(matches!(err, Err(Error::UnknownTimeUnit(_))));
    }

    #[test]
    fn fraction_sizing_slices_and_compares_per_fraction() {
        let cfg = config(
            r#"{ "reader": { "kind": "csv_full", "dir": "unused" },
                 "sizing": { "mode": "fraction", "step": 2 },
                 "comparators": [ { "level": "task", "metric": "l1", "column": "cpu" } ] }"#,
        );
        let built = Pipeline::from_config(&cfg, &MetricRegistry::with_builtins()).unwrap();

        let mut input = Input::new();
        let job = input.job_entry(1);
        job.task_entry(0).insert_fraction(0, series(&[1.0, 2.0, 3.0, 4.0]));
        job.task_entry(1).insert_fraction(0, series(&[1.0, 1.0, 3.0, 3.0]));

        built.preprocess(&mut input).unwrap();
        assert_eq!(input.task(1, 0).unwrap().fraction_count(), 2);
        let output = built.compare(&input).unwrap();
        let v = output
            .part("l1")
            .unwrap()
            .value(EntityId::Task(1, 0), EntityId::Task(1, 1))
            .unwrap();
        assert_eq!(v.as_list(), Some(&[1.0, 1.0][..]));
    }

    #[test]
    fn builder_chains_steps() {
        let mut input = Input::new();
        input.job_entry(1).task_entry(0).insert_fraction(0, series(&[1.0, 2.0]));
        input.job_entry(2).task_entry(0).insert_fraction(0, series(&[1.0, 2.0, 3.0]));

        let registry = MetricRegistry::with_builtins();
        let pipeline = Pipeline::new(Fixed(input))
            .with_preprocessor(Trimmer::new())
            .with_comparator(TaskComparator::new(
                "mse",
                TaskMetricComparator::new(registry.resolve("mse").unwrap(), Some("cpu".into())),
            ));
        let (input, output) = pipeline.run().unwrap();
        assert_eq!(input.task(2, 0).unwrap().series().unwrap().len(), 2);
        assert_eq!(output.part_names(), vec!["mse"]);
    }
}
