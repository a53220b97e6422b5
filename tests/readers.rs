//! Readers feeding the pipeline from files on disk.

use std::fs;
use std::sync::Arc;

use arrow::array::{Float64Array, Int64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

use trace_twins::data::loader::ParquetUsageReader;
use trace_twins::{EntityId, MetricRegistry, Pipeline, PipelineConfig, Reader};

fn write_usage(path: &std::path::Path) {
    let schema = Arc::new(Schema::new(vec![
        Field::new("collection_id", DataType::Int64, false),
        Field::new("instance_index", DataType::Int64, false),
        Field::new("time", DataType::Int64, false),
        Field::new("cpu", DataType::Float64, true),
    ]));
    // Rows deliberately out of time order.
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int64Array::from(vec![1, 1, 1, 2, 2])),
            Arc::new(Int64Array::from(vec![0, 0, 1, 0, 0])),
            Arc::new(Int64Array::from(vec![20, 10, 10, 10, 20])),
            Arc::new(Float64Array::from(vec![Some(0.2), Some(0.1), Some(0.5), None, Some(0.4)])),
        ],
    )
    .unwrap();
    let file = fs::File::create(path).unwrap();
    let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();
}

#[test]
fn parquet_rows_grouped_and_time_sorted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("usage.parquet");
    write_usage(&path);

    let input = ParquetUsageReader::new(&path).read().unwrap();
    assert_eq!(
        input.task_ids(),
        vec![EntityId::Task(1, 0), EntityId::Task(1, 1), EntityId::Task(2, 0)]
    );
    let t = input.task(1, 0).unwrap().series().unwrap().as_table().unwrap();
    assert_eq!(t.column("time").unwrap(), &[10.0, 20.0]);
    assert_eq!(t.column("cpu").unwrap(), &[0.1, 0.2]);
    let t = input.task(2, 0).unwrap().series().unwrap().as_table().unwrap();
    assert!(t.column("cpu").unwrap()[0].is_nan());
}

#[test]
fn csv_pipeline_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let traces = dir.path().join("traces");
    for (job, task, rows) in [
        (1, 0, "time,cpu\n0,1\n60,2\n120,3\n180,4\n"),
        (1, 1, "time,cpu\n0,1\n60,2\n120,3\n"),
        (2, 0, "time,cpu\n0,4\n60,4\n120,0\n180,0\n240,9\n"),
    ] {
        let job_dir = traces.join(job.to_string());
        fs::create_dir_all(&job_dir).unwrap();
        fs::write(job_dir.join(format!("{task}-trace.csv")), rows).unwrap();
    }
    let out_path = dir.path().join("out.json");

    let config = PipelineConfig::from_json_str(&format!(
        r#"{{
            "reader": {{ "kind": "csv_full", "dir": {traces:?} }},
            "preprocessors": [ {{ "kind": "time", "column": "time", "unit": "s", "freq": "60s" }} ],
            "sizing": {{ "mode": "trim" }},
            "comparators": [ {{ "level": "task", "metric": "l1", "column": "cpu" }} ],
            "output": {out_path:?}
        }}"#
    ))
    .unwrap();
    let pipeline = Pipeline::from_config(&config, &MetricRegistry::with_builtins()).unwrap();
    let (input, output) = pipeline.run().unwrap();

    for task in input.tasks() {
        assert_eq!(task.series().unwrap().len(), 3);
    }
    let part = output.part("l1").unwrap();
    let v = part.value(EntityId::Task(1, 0), EntityId::Task(2, 0)).unwrap();
    // [1,2,3] vs [4,4,0]
    assert_eq!(v.as_scalar(), Some(3.0 + 2.0 + 3.0));

    output.to_json_file(config.output.as_ref().unwrap()).unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&out_path).unwrap()).unwrap();
    assert_eq!(json["parts"]["l1"]["results"]["1-1"]["compared"]["1-0"]["value"], 0.0);
}
