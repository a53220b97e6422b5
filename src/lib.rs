//! Job / task / fraction trace hierarchy with composable preprocessing and
//! all-pairs comparison.
//!
//! ```text
//!  Reader ──► Input ──► Preprocessor* ──► Comparator+ ──► Output ──► JSON / DetailReport
//! ```

pub mod compare;
pub mod config;
pub mod data;
pub mod error;
pub mod metric;
pub mod output;
pub mod pipeline;
pub mod preprocess;
pub mod report;

pub use compare::Comparator;
pub use config::PipelineConfig;
pub use data::loader::Reader;
pub use data::model::{EntityId, Fraction, Input, Job, Task};
pub use data::payload::{Matrix, Payload, Table};
pub use error::{Error, Result};
pub use metric::{Calculator, MetricKind, MetricRegistry};
pub use output::{ComparisonResult, Output, PartialOutput, PartialResult, Value};
pub use pipeline::Pipeline;
pub use preprocess::Preprocessor;
pub use report::{DetailReport, MatchSummary};
