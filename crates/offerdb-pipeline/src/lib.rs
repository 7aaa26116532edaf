//! The deal pipeline: ingest sources into raw candidates, group them into
//! processing batches, structure and rate them, and round-trip batches
//! through an external curation step.

pub mod batch;
pub mod correction;
pub mod dedup;
pub mod error;
pub mod ingest;
pub mod rating;
pub mod store;
pub mod structuring;

pub use batch::{
    export_batch, import_batch, parse_import, BatchExport, BatchImport, ExportedDeal,
    ImportReport, ImportedDeal,
};
pub use correction::{correct_deal, DealPatch};
pub use dedup::{Classification, Deduplicator};
pub use error::{PipelineError, StoreError, StructuringError};
pub use ingest::{run_source, run_sources, select_sources, IngestContext, SourceRunReport};
pub use rating::{rate_deal, rescore_all, RescoreReport};
pub use store::{DealStore, MemoryStore, PgStore};
pub use structuring::{
    auto_structure, process_batch, structure_pending, BatchReport, StructuringRules,
};
