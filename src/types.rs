//! Core types for the fitdb pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: the file header, decoded records, the aggregated activity summary,
//! and the report produced by a directory walk.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::FailureKind;

/// Size of the fixed header prefix read from every file
pub const FILE_HEADER_LEN: usize = 12;

/// Required value of the header's data type literal
pub const FIT_DATA_TYPE: [u8; 4] = *b".FIT";

/// Name given to every aggregated activity
pub const DEFAULT_ACTIVITY_NAME: &str = "FIT Activity";

/// Type given to every aggregated activity
pub const DEFAULT_ACTIVITY_TYPE: &str = "unknown";

/// Layout of [`ActivitySummary::start_time`]
pub const START_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Fixed-size file header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHeader {
    /// Header length in bytes; the data section starts at this offset
    pub header_size: u8,
    /// Protocol version (informational)
    pub protocol_version: u8,
    /// Profile version (informational)
    pub profile_version: u16,
    /// Length of the data section in bytes
    pub data_size: u32,
    /// Data type literal, always `.FIT` once validated
    pub data_type: [u8; 4],
}

impl FileHeader {
    /// Absolute offset of the first data section byte
    pub fn data_offset(&self) -> u64 {
        u64::from(self.header_size)
    }
}

/// Record framing selected by bit 7 of the record header byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum RecordKind {
    /// Normal header followed by a 32-bit little-endian value
    Normal { value: u32 },
    /// Compressed-timestamp header, no payload
    CompressedTimestamp,
}

/// One decoded unit of the data section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Leading header byte
    pub header_byte: u8,
    /// Decoded payload
    #[serde(flatten)]
    pub kind: RecordKind,
    /// Wall-clock time at which the record was decoded
    pub captured_at: DateTime<Utc>,
}

impl RawRecord {
    /// Value stored under `tag`. Only tag 0 is ever populated.
    pub fn field(&self, tag: u8) -> Option<u32> {
        match (tag, self.kind) {
            (0, RecordKind::Normal { value }) => Some(value),
            _ => None,
        }
    }

    pub fn is_compressed(&self) -> bool {
        self.header_byte & 0x80 != 0
    }

    /// Local message number carried in the header byte
    pub fn local_message(&self) -> u8 {
        if self.is_compressed() {
            (self.header_byte >> 5) & 0x03
        } else {
            self.header_byte & 0x0F
        }
    }

    /// Whether a normal header announces a definition message
    pub fn is_definition(&self) -> bool {
        !self.is_compressed() && self.header_byte & 0x40 != 0
    }

    /// 5-bit time offset of a compressed-timestamp header
    pub fn time_offset(&self) -> Option<u8> {
        self.is_compressed().then_some(self.header_byte & 0x1F)
    }
}

/// A record with its header-byte fields spelled out, as printed by `inspect`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordDetail {
    pub header_byte: u8,
    #[serde(flatten)]
    pub kind: RecordKind,
    pub local_message: u8,
    pub definition: bool,
    /// Present only on compressed-timestamp headers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_offset: Option<u8>,
    pub captured_at: DateTime<Utc>,
}

impl From<&RawRecord> for RecordDetail {
    fn from(record: &RawRecord) -> Self {
        Self {
            header_byte: record.header_byte,
            kind: record.kind,
            local_message: record.local_message(),
            definition: record.is_definition(),
            time_offset: record.time_offset(),
            captured_at: record.captured_at,
        }
    }
}

/// Aggregated activity produced from one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivitySummary {
    pub name: String,
    #[serde(rename = "type")]
    pub activity_type: String,
    /// Local time of aggregation, `YYYY-MM-DD HH:MM:SS`
    pub start_time: String,
    /// Duration (seconds)
    pub duration: u64,
    /// Distance (kilometers)
    pub distance: f64,
    pub calories: u64,
    /// Average heart rate (bpm)
    pub avg_hr: u32,
    /// Maximum heart rate (bpm)
    pub max_hr: u32,
    /// Elevation gain (meters)
    pub elevation_gain: u32,
}

/// Why a record stream stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Every byte of the data section was consumed
    Exhausted,
    /// Decoding stopped with `unread` trailing bytes left over
    EarlyTermination { unread: usize },
}

/// Result of running the per-file pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedActivity {
    pub header: FileHeader,
    pub summary: ActivitySummary,
    pub record_count: usize,
    pub stop_reason: StopReason,
}

/// A file the tree walk could not process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub kind: FailureKind,
    pub message: String,
}

/// Outcome of a directory walk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Files with a `.fit` extension that were attempted
    pub files_seen: usize,
    /// Files decoded and stored
    pub processed: usize,
    /// Files (or directory entries) that failed
    pub failed: usize,
    /// Regular files ignored for their extension
    pub skipped: usize,
    /// Processed files whose decoding stopped before the end of the data section
    pub early_terminations: usize,
    pub failures: Vec<FileFailure>,
}

impl IngestReport {
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(header_byte: u8, kind: RecordKind) -> RawRecord {
        RawRecord {
            header_byte,
            kind,
            captured_at: Utc::now(),
        }
    }

    #[test]
    fn test_field_lookup_only_tag_zero() {
        let rec = record(0x00, RecordKind::Normal { value: 42 });
        assert_eq!(rec.field(0), Some(42));
        assert_eq!(rec.field(1), None);

        let rec = record(0x80, RecordKind::CompressedTimestamp);
        assert_eq!(rec.field(0), None);
    }

    #[test]
    fn test_header_byte_accessors() {
        let normal = record(0x45, RecordKind::Normal { value: 0 });
        assert!(!normal.is_compressed());
        assert!(normal.is_definition());
        assert_eq!(normal.local_message(), 5);
        assert_eq!(normal.time_offset(), None);

        // 1 01 10011: local message 1, offset 19
        let compressed = record(0b1011_0011, RecordKind::CompressedTimestamp);
        assert!(compressed.is_compressed());
        assert!(!compressed.is_definition());
        assert_eq!(compressed.local_message(), 1);
        assert_eq!(compressed.time_offset(), Some(19));
    }

    #[test]
    fn test_record_detail_spells_out_header_byte() {
        let detail = RecordDetail::from(&record(0x43, RecordKind::Normal { value: 7 }));
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["kind"], "normal");
        assert_eq!(json["value"], 7);
        assert_eq!(json["local_message"], 3);
        assert_eq!(json["definition"], true);
        assert!(json.get("time_offset").is_none());

        let detail = RecordDetail::from(&record(0b1110_0100, RecordKind::CompressedTimestamp));
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["kind"], "compressed_timestamp");
        assert_eq!(json["local_message"], 3);
        assert_eq!(json["definition"], false);
        assert_eq!(json["time_offset"], 4);
    }

    #[test]
    fn test_summary_serializes_type_column() {
        let summary = ActivitySummary {
            name: DEFAULT_ACTIVITY_NAME.to_string(),
            activity_type: DEFAULT_ACTIVITY_TYPE.to_string(),
            start_time: "2024-01-15 06:30:00".to_string(),
            duration: 0,
            distance: 0.0,
            calories: 0,
            avg_hr: 0,
            max_hr: 0,
            elevation_gain: 0,
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["type"], "unknown");
        assert_eq!(json["name"], "FIT Activity");
    }
}
