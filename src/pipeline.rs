//! Pipeline orchestration
//!
//! This module provides the public API for fitdb. It runs the per-file
//! pipeline (header → data section → record stream → aggregation) and walks
//! directory trees, handing each result to an [`ActivityStore`].

use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Seek};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::aggregator::MetricAggregator;
use crate::decoder::{read_data_section, RecordStream};
use crate::error::{IngestError, Result};
use crate::header::read_header;
use crate::storage::ActivityStore;
use crate::types::{DecodedActivity, FileFailure, IngestReport, RawRecord, StopReason};

/// File extension selected by the tree walk, compared case-insensitively
pub const FIT_EXTENSION: &str = "fit";

/// Decode one FIT document from a seekable byte source.
///
/// Pipeline stages:
/// 1. Header - read and validate the 12-byte prefix
/// 2. Data section - seek to `header_size`, read `data_size` bytes
/// 3. Record stream - walk the data section lazily
/// 4. Aggregation - fold records into an activity summary
///
/// # Arguments
/// * `reader` - Byte source positioned at the start of the file header
///
/// # Returns
/// The validated header, the aggregated summary, the number of records
/// decoded and why decoding stopped
///
/// # Example
/// ```ignore
/// let bytes = std::fs::read("ride.fit")?;
/// let decoded = decode_reader(&mut std::io::Cursor::new(bytes))?;
/// println!("{} km", decoded.summary.distance);
/// ```
pub fn decode_reader<R: Read + Seek>(reader: &mut R) -> Result<DecodedActivity> {
    decode_with(reader, |_| {})
}

/// Decode the FIT file at `path`.
///
/// # Arguments
/// * `path` - FIT file on disk
///
/// # Returns
/// The decoded activity, or the I/O or decode error that stopped the file
///
/// # Example
/// ```ignore
/// let decoded = decode_file("activities/2024-01-15-run.fit")?;
/// assert_eq!(decoded.summary.name, "FIT Activity");
/// ```
pub fn decode_file(path: impl AsRef<Path>) -> Result<DecodedActivity> {
    let file = File::open(path.as_ref())?;
    decode_reader(&mut BufReader::new(file))
}

/// Decode the FIT file at `path` and keep every record alongside the summary.
///
/// The file is read once; the returned records are exactly the ones that were
/// aggregated into the summary.
///
/// # Arguments
/// * `path` - FIT file on disk
///
/// # Returns
/// The decoded activity and its records in data-section order
///
/// # Example
/// ```ignore
/// let (decoded, records) = decode_file_with_records("ride.fit")?;
/// assert_eq!(decoded.record_count, records.len());
/// ```
pub fn decode_file_with_records(
    path: impl AsRef<Path>,
) -> Result<(DecodedActivity, Vec<RawRecord>)> {
    let mut reader = BufReader::new(File::open(path.as_ref())?);
    let mut records = Vec::new();
    let decoded = decode_with(&mut reader, |record| records.push(record.clone()))?;
    Ok((decoded, records))
}

fn decode_with<R, F>(reader: &mut R, mut on_record: F) -> Result<DecodedActivity>
where
    R: Read + Seek,
    F: FnMut(&RawRecord),
{
    let header = read_header(reader)?;
    let data = read_data_section(reader, &header)?;

    let mut stream = RecordStream::new(&data);
    let mut aggregator = MetricAggregator::new();
    let mut record_count = 0;

    for record in stream.by_ref() {
        aggregator.push(&record);
        on_record(&record);
        record_count += 1;
    }

    let stop_reason = stream.stop_reason().unwrap_or(StopReason::Exhausted);
    if let StopReason::EarlyTermination { unread } = stop_reason {
        debug!(
            record_count,
            unread,
            data_size = header.data_size,
            "Record decoding stopped before end of data section"
        );
    }

    Ok(DecodedActivity {
        header,
        summary: aggregator.finish(),
        record_count,
        stop_reason,
    })
}

/// Whether `path` carries a `.fit` extension in any letter case
pub fn is_fit_file(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| ext.eq_ignore_ascii_case(FIT_EXTENSION))
}

/// Walks FIT file trees and stores one activity per decoded file.
///
/// Files are processed one at a time in directory enumeration order. A failure
/// on one file is recorded in the [`IngestReport`] and never stops the walk.
pub struct FitProcessor<S: ActivityStore> {
    store: S,
}

impl<S: ActivityStore> FitProcessor<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Give back the store once processing is done
    pub fn into_store(self) -> S {
        self.store
    }

    /// Decode one file and store its activity
    pub fn process_file(&mut self, path: &Path) -> Result<DecodedActivity> {
        let decoded = decode_file(path)?;
        let stored = self.store.insert(&decoded.summary)?;

        info!(
            path = %path.display(),
            id = %stored.id,
            distance_km = decoded.summary.distance,
            calories = decoded.summary.calories,
            "Stored activity: {}",
            decoded.summary.name
        );

        Ok(decoded)
    }

    /// Process every `.fit` file below `root`.
    ///
    /// Fails only when `root` itself cannot be stat'ed or listed. Errors on
    /// entries below the root are recorded in the report.
    pub fn process_tree(&mut self, root: impl AsRef<Path>) -> Result<IngestReport> {
        let root = root.as_ref();
        let metadata = fs::metadata(root).map_err(|source| root_unreadable(root, source))?;
        if metadata.is_dir() {
            fs::read_dir(root).map_err(|source| root_unreadable(root, source))?;
        }

        let mut report = IngestReport::default();

        for entry in WalkDir::new(root) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) if err.depth() == 0 => {
                    let source = err.into_io_error().unwrap_or_else(|| {
                        io::Error::new(io::ErrorKind::Other, "directory walk failed at root")
                    });
                    return Err(root_unreadable(root, source));
                }
                Err(err) => {
                    let path = err
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| root.to_path_buf());
                    record_failure(&mut report, path, IngestError::Walk(err));
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            if !is_fit_file(path) {
                debug!(path = %path.display(), "Skipping non-FIT file");
                report.skipped += 1;
                continue;
            }

            report.files_seen += 1;
            info!(path = %path.display(), "Processing FIT file");

            match self.process_file(path) {
                Ok(decoded) => {
                    report.processed += 1;
                    if matches!(decoded.stop_reason, StopReason::EarlyTermination { .. }) {
                        report.early_terminations += 1;
                    }
                }
                Err(err) => record_failure(&mut report, path.to_path_buf(), err),
            }
        }

        info!(
            root = %root.display(),
            files = report.files_seen,
            processed = report.processed,
            failed = report.failed,
            skipped = report.skipped,
            "Finished processing FIT files"
        );

        Ok(report)
    }
}

fn root_unreadable(root: &Path, source: io::Error) -> IngestError {
    IngestError::RootUnreadable {
        path: root.to_path_buf(),
        source,
    }
}

fn record_failure(report: &mut IngestReport, path: PathBuf, err: IngestError) {
    warn!(
        path = %path.display(),
        kind = err.kind().as_str(),
        error = %err,
        "Failed to process file"
    );
    report.failed += 1;
    report.failures.push(FileFailure {
        path,
        kind: err.kind(),
        message: err.to_string(),
    });
}
