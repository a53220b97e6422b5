use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use log::info;

use trace_twins::{DetailReport, EntityId, MetricRegistry, Pipeline, PipelineConfig};

fn main() -> Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let (Some(config_path), None) = (args.next(), args.next()) else {
        bail!("usage: trace-twins <config.json>");
    };
    let config_path = PathBuf::from(config_path);

    let config = PipelineConfig::from_json_file(&config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;
    let pipeline = Pipeline::from_config(&config, &MetricRegistry::with_builtins())
        .context("building pipeline")?;

    let (input, output) = pipeline.run().context("running pipeline")?;

    let out_path = config
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from("output.json"));
    output
        .to_json_file(&out_path)
        .with_context(|| format!("writing {}", out_path.display()))?;
    info!("wrote {} parts to {}", output.part_names().len(), out_path.display());

    if let Some(report) = &config.report {
        let baseline: EntityId = report
            .baseline
            .parse()
            .context("parsing report baseline")?;
        let detail = DetailReport::build(&input, &output, &report.part, baseline)
            .with_context(|| format!("building report for {baseline}"))?;
        let summary = detail.summary(report.threshold);
        info!(
            "{baseline} @ {}: accuracy {:.3}, precision {:.3}, recall {:.3}",
            report.threshold, summary.accuracy, summary.precision, summary.recall
        );

        if let Some(path) = &report.path {
            let writer = BufWriter::new(
                File::create(path).with_context(|| format!("creating {}", path.display()))?,
            );
            serde_json::to_writer_pretty(
                writer,
                &serde_json::json!({ "detail": detail, "summary": summary }),
            )?;
        }
    }

    Ok(())
}
