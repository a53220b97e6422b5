//! Writes `sample_usage.parquet`: a long-format usage table of a few synthetic
//! jobs whose tasks share a load shape, for trying the comparison pipeline.

use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Float64Array, Int64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use parquet::arrow::ArrowWriter;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }
}

/// Load shape of one job: a periodic base with a per-job period and level.
struct JobShape {
    id: i64,
    tasks: i64,
    period: f64,
    level: f64,
    swing: f64,
}

impl JobShape {
    fn cpu(&self, step: usize, phase: f64) -> f64 {
        let angle = 2.0 * std::f64::consts::PI * (step as f64 / self.period) + phase;
        (self.level + self.swing * angle.sin()).max(0.0)
    }
}

const STEP_SECONDS: i64 = 300;

fn main() -> Result<()> {
    let mut rng = SimpleRng::new(42);

    let jobs = [
        JobShape { id: 100, tasks: 3, period: 24.0, level: 0.4, swing: 0.2 },
        JobShape { id: 200, tasks: 3, period: 12.0, level: 0.2, swing: 0.1 },
        JobShape { id: 300, tasks: 2, period: 48.0, level: 0.7, swing: 0.15 },
        JobShape { id: 400, tasks: 4, period: 6.0, level: 0.3, swing: 0.25 },
    ];

    let mut collection_id: Vec<i64> = Vec::new();
    let mut instance_index: Vec<i64> = Vec::new();
    let mut time: Vec<i64> = Vec::new();
    let mut cpu: Vec<f64> = Vec::new();
    let mut memory: Vec<f64> = Vec::new();

    for job in &jobs {
        for task in 0..job.tasks {
            // Tasks of one job differ in length, start time and noise.
            let samples = 60 + (rng.next_u64() % 60) as usize;
            let start = 1_700_000_000 + (rng.next_u64() % 3600) as i64;
            let phase = rng.uniform(0.0, 0.3);
            let mem_base = rng.uniform(0.05, 0.5);
            for step in 0..samples {
                collection_id.push(job.id);
                instance_index.push(task);
                time.push(start + step as i64 * STEP_SECONDS);
                cpu.push(job.cpu(step, phase) + rng.uniform(-0.02, 0.02));
                memory.push(mem_base + rng.uniform(0.0, 0.01));
            }
        }
    }

    let rows = time.len();
    let schema = Arc::new(Schema::new(vec![
        Field::new("collection_id", DataType::Int64, false),
        Field::new("instance_index", DataType::Int64, false),
        Field::new("time", DataType::Int64, false),
        Field::new("cpu", DataType::Float64, false),
        Field::new("memory", DataType::Float64, false),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int64Array::from(collection_id)),
            Arc::new(Int64Array::from(instance_index)),
            Arc::new(Int64Array::from(time)),
            Arc::new(Float64Array::from(cpu)),
            Arc::new(Float64Array::from(memory)),
        ],
    )
    .context("building record batch")?;

    let output_path = "sample_usage.parquet";
    let file = std::fs::File::create(output_path).context("creating output file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing batch")?;
    writer.close().context("closing writer")?;

    println!("{}", pretty_format_batches(&[batch.slice(0, 5)])?);
    println!("Wrote {rows} samples from {} jobs to {output_path}", jobs.len());
    Ok(())
}
