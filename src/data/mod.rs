/// Data layer: the trace hierarchy, its payloads, and the readers that build it.
///
/// Architecture:
/// ```text
///  .csv / .png / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse files → Input
///   └──────────┘
///        │
///        ▼
///   ┌──────────────────────────────┐
///   │ model: Input → Job → Task →  │
///   │        Fraction(Payload)     │
///   └──────────────────────────────┘
/// ```

pub mod loader;
pub mod model;
pub mod payload;
