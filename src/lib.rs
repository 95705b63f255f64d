//! fitdb - FIT activity file ingestion
//!
//! fitdb turns binary FIT activity files into activity records through a
//! linear pipeline: header validation → record stream decoding → metric
//! aggregation → storage.
//!
//! ## Modules
//!
//! - **Decoding**: [`header`], [`decoder`] and [`aggregator`] turn one file
//!   into an [`ActivitySummary`]
//! - **Ingestion**: [`pipeline::FitProcessor`] walks a directory tree and
//!   hands every summary to an [`ActivityStore`]

pub mod aggregator;
pub mod config;
pub mod decoder;
pub mod error;
pub mod header;
pub mod pipeline;
pub mod storage;
pub mod types;

#[cfg(feature = "cli")]
pub mod logging;

pub use config::Config;
pub use error::{FailureKind, IngestError};
pub use pipeline::{decode_file, decode_file_with_records, decode_reader, FitProcessor};
pub use storage::{ActivityStore, MemoryStore, NdjsonStore, StoredActivity};
pub use types::{
    ActivitySummary, DecodedActivity, FileHeader, IngestReport, RawRecord, RecordDetail,
};

/// fitdb version
pub const FITDB_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by the CLI
pub const PRODUCER_NAME: &str = "fitdb";
