//! End-to-end scenarios over the public API.

use std::sync::Arc;

use trace_twins::compare::{TaskComparator, TaskMetricComparator, TaskMode};
use trace_twins::preprocess::{OutlierClipper, Padder, PerTask, Slicer, Trimmer};
use trace_twins::{
    Calculator, Comparator, EntityId, Error, Input, MetricKind, MetricRegistry, Output, Payload,
    Pipeline, PipelineConfig, Preprocessor, Table, Value,
};

fn column(values: &[f64]) -> Payload {
    Payload::Table(Table::from_columns(vec![("v", values.to_vec())]).unwrap())
}

fn l1_task_comparator(mode: TaskMode) -> TaskComparator<TaskMetricComparator> {
    let calc = Arc::new(MetricKind::L1.calculator());
    TaskComparator::new("l1", TaskMetricComparator::new(calc, Some("v".into())).with_mode(mode))
}

#[test]
fn l1_between_two_tasks_of_one_job() {
    let mut input = Input::new();
    let job = input.job_entry(1);
    job.task_entry(0).insert_fraction(0, column(&[1.0, 2.0, 3.0, 4.0, 5.0]));
    job.task_entry(1).insert_fraction(0, column(&[5.0, 4.0, 3.0, 2.0, 1.0]));

    let mut output = Output::new();
    l1_task_comparator(TaskMode::default())
        .compare(&input, &mut output)
        .unwrap();

    let part = output.part("l1").unwrap();
    let forward = part.value(EntityId::Task(1, 0), EntityId::Task(1, 1)).unwrap();
    let reverse = part.value(EntityId::Task(1, 1), EntityId::Task(1, 0)).unwrap();
    // |1-5| + |2-4| + 0 + |4-2| + |5-1|
    assert_eq!(forward, &Value::Scalar(12.0));
    assert_eq!(forward, reverse);
    assert!(part
        .result(EntityId::Task(1, 0))
        .unwrap()
        .partial(EntityId::Task(1, 0))
        .is_err());
}

#[test]
fn symmetric_metrics_vanish_on_identical_input() {
    let x = column(&[0.3, 1.7, -2.0, 4.5]);
    let y = column(&[1.0, 1.0, 1.0, 0.0]);
    let registry = MetricRegistry::with_builtins();
    for name in ["l1", "l2", "mse"] {
        let calc = registry.resolve(name).unwrap();
        let xy = calc.calculate(&x, &y, Some("v")).unwrap();
        let yx = calc.calculate(&y, &x, Some("v")).unwrap();
        assert_eq!(xy, yx, "{name} is not symmetric");
        assert_eq!(calc.calculate(&x, &x, Some("v")).unwrap(), 0.0);
    }
}

#[test]
fn pad_three_to_seven_with_time_shift() {
    let base = Table::from_columns(vec![("v", vec![1.0, 2.0, 3.0])])
        .unwrap()
        .with_index(vec![0, 100, 200])
        .unwrap();
    let mut input = Input::new();
    let job = input.job_entry(1);
    job.task_entry(0).insert_fraction(0, Payload::Table(base.clone()));
    job.task_entry(1).insert_fraction(0, column(&[0.0; 7]));

    Padder::new(100).run(&mut input).unwrap();

    let padded = input.task(1, 0).unwrap().series().unwrap().as_table().unwrap();
    assert_eq!(padded.len(), 7);
    let v = padded.column("v").unwrap();
    assert_eq!(&v[0..3], base.column("v").unwrap());
    assert_eq!(&v[3..6], base.column("v").unwrap());
    assert_eq!(v[6], 1.0);
    let idx = padded.index().unwrap();
    assert_eq!(&idx[3..6], &[300, 400, 500]);
    assert_eq!(idx[6], 600);
}

#[test]
fn slice_then_compare_per_fraction() {
    let mut input = Input::new();
    let job = input.job_entry(1);
    job.task_entry(0)
        .insert_fraction(0, column(&[1.0, 2.0, 3.0, 4.0, 5.0]));
    job.task_entry(1)
        .insert_fraction(0, column(&[1.0, 2.0, 3.0, 4.0, 9.0]));

    PerTask(Slicer::new(2).unwrap()).run(&mut input).unwrap();
    let task = input.task(1, 0).unwrap();
    assert_eq!(task.fraction_count(), 3);
    let total: usize = task.fractions().map(|f| f.data().len()).sum();
    assert_eq!(total, 5);

    let mut output = Output::new();
    l1_task_comparator(TaskMode::PerFraction)
        .compare(&input, &mut output)
        .unwrap();
    let v = output
        .part("l1")
        .unwrap()
        .value(EntityId::Task(1, 0), EntityId::Task(1, 1))
        .unwrap();
    assert_eq!(v, &Value::List(vec![0.0, 0.0, 4.0]));
}

#[test]
fn sliced_tasks_are_skipped_untouched() {
    let mut input = Input::new();
    let task = input.job_entry(1).task_entry(0);
    task.replace_fractions(vec![column(&[9.0, 0.0]), column(&[5.0])]);
    let before: Vec<Payload> = input.fractions().map(|f| f.data().clone()).collect();

    Trimmer::new().run(&mut input).unwrap();
    PerTask(OutlierClipper::new("v", 0.1, 0.9).unwrap())
        .run(&mut input)
        .unwrap();
    Padder::new(1).run(&mut input).unwrap();

    let after: Vec<Payload> = input.fractions().map(|f| f.data().clone()).collect();
    assert_eq!(before, after);
}

#[test]
fn outlier_scenario() {
    let xs: Vec<f64> = (0..10).map(f64::from).collect();
    let mut input = Input::new();
    input.job_entry(1).task_entry(0).insert_fraction(0, column(&xs));
    PerTask(OutlierClipper::new("v", 0.1, 0.9).unwrap())
        .run(&mut input)
        .unwrap();
    let out = input.fraction(1, 0, 0).unwrap().data().values(Some("v")).unwrap();
    let (lo, hi) = (0.9 - 1e-9, 8.1 + 1e-9);
    assert!(out.iter().all(|v| *v >= lo && *v <= hi));
}

#[test]
fn shape_mismatch_aborts_the_run() {
    let mut input = Input::new();
    let job = input.job_entry(1);
    job.task_entry(0).insert_fraction(0, column(&[1.0, 2.0]));
    job.task_entry(1).insert_fraction(0, column(&[1.0, 2.0, 3.0]));

    let mut output = Output::new();
    let err = l1_task_comparator(TaskMode::default()).compare(&input, &mut output);
    assert!(matches!(err, Err(Error::ShapeMismatch { .. })));
    assert!(output.part_names().is_empty());
}

#[test]
fn unknown_metric_fails_before_reading() {
    // The reader would fail on this directory; config validation must come first.
    let config = PipelineConfig::from_json_str(
        r#"{ "reader": { "kind": "csv_full", "dir": "/definitely/not/here" },
             "comparators": [ { "level": "task", "metric": "manhattan" } ] }"#,
    )
    .unwrap();
    match Pipeline::from_config(&config, &MetricRegistry::with_builtins()) {
        Err(Error::UnknownMetric(name)) => assert_eq!(name, "manhattan"),
        Err(other) => panic!("unexpected error {other}"),
        Ok(_) => panic!("pipeline built with an unknown metric"),
    }
}

#[test]
fn custom_metric_is_resolvable_from_config() {
    fn max_gap(a: &Payload, b: &Payload, column: Option<&str>) -> trace_twins::Result<f64> {
        let (xs, ys) = (a.values(column)?, b.values(column)?);
        Ok(xs
            .iter()
            .zip(ys)
            .map(|(x, y)| (x - y).abs())
            .fold(0.0, f64::max))
    }

    let mut registry = MetricRegistry::with_builtins();
    registry.register("max_gap", max_gap);
    let config = PipelineConfig::from_json_str(
        r#"{ "reader": { "kind": "csv_full", "dir": "unused" },
             "comparators": [ { "level": "fraction", "metric": "max_gap", "column": "v" } ] }"#,
    )
    .unwrap();
    let pipeline = Pipeline::from_config(&config, &registry).unwrap();

    let mut input = Input::new();
    let job = input.job_entry(1);
    job.task_entry(0).insert_fraction(0, column(&[1.0, 5.0]));
    job.task_entry(1).insert_fraction(0, column(&[2.0, 2.0]));
    let output = pipeline.compare(&input).unwrap();
    let v = output
        .part("max_gap")
        .unwrap()
        .value(EntityId::Fraction(1, 0, 0), EntityId::Fraction(1, 1, 0))
        .unwrap();
    assert_eq!(v, &Value::Scalar(3.0));
}
