/// Data layer: core types, loading, filtering and cleaning.
///
/// Architecture:
/// ```text
///  .csv / .tsv / .xlsx / .json / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader  │  parse file → Dataset
///   └──────────┘
///        │
///        ▼
///   ┌─────────────┐
///   │ DataManager │  Arc<Dataset> + current selection (TableView)
///   └─────────────┘
///        │  user expression
///        ▼
///   ┌──────────┐     ┌──────┐
///   │  filter  │ ──▶ │ expr │  quote names → parse → bind → evaluate per row
///   └──────────┘     └──────┘
///        │
///        ▼
///   TableView  →  table preview, stats, plots, export
/// ```
pub mod clean;
pub mod export;
pub mod expr;
pub mod filter;
pub mod jobs;
pub mod loader;
pub mod manager;
pub mod model;
pub mod stats;
