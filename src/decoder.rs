//! Record stream decoding
//!
//! The data section is loaded fully into memory and then walked lazily by
//! [`RecordStream`]. Each record is either a normal header byte followed by a
//! 32-bit little-endian value, or a single compressed-timestamp header byte.
//!
//! This is a simplified framing: message definitions, developer fields and
//! timestamp deltas are not decoded, so the number of records yielded is an
//! under-approximation of the records actually present.

use chrono::Utc;
use std::io::{Read, Seek, SeekFrom};
use std::iter::FusedIterator;

use crate::error::{IngestError, Result};
use crate::types::{FileHeader, RawRecord, RecordKind, StopReason};

/// Bit 7 of the record header byte selects the compressed-timestamp framing
const COMPRESSED_HEADER_MASK: u8 = 0x80;

/// Header byte plus a 32-bit value
const NORMAL_RECORD_LEN: usize = 5;

/// Read the data section described by `header`.
///
/// Seeks to the absolute offset `header_size` and reads exactly `data_size`
/// bytes. A short read is reported as [`IngestError::TruncatedInput`].
pub fn read_data_section<R: Read + Seek>(reader: &mut R, header: &FileHeader) -> Result<Vec<u8>> {
    reader.seek(SeekFrom::Start(header.data_offset()))?;

    let expected = header.data_size as usize;
    // Grow with the bytes actually present; data_size is untrusted.
    let mut data = Vec::new();
    reader
        .by_ref()
        .take(u64::from(header.data_size))
        .read_to_end(&mut data)?;

    if data.len() < expected {
        return Err(IngestError::TruncatedInput {
            section: "data section",
            expected,
            actual: data.len(),
        });
    }

    Ok(data)
}

/// Lazy, non-restartable iterator over the records of a data section
#[derive(Debug)]
pub struct RecordStream<'a> {
    data: &'a [u8],
    offset: usize,
    stop: Option<StopReason>,
}

impl<'a> RecordStream<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            offset: 0,
            stop: None,
        }
    }

    /// Current cursor position within the data section
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Why the stream stopped, or `None` while records may still follow
    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop
    }

    fn halt(&mut self) {
        let unread = self.data.len() - self.offset;
        self.stop = Some(if unread == 0 {
            StopReason::Exhausted
        } else {
            StopReason::EarlyTermination { unread }
        });
    }
}

impl Iterator for RecordStream<'_> {
    type Item = RawRecord;

    fn next(&mut self) -> Option<RawRecord> {
        if self.stop.is_some() {
            return None;
        }

        let len = self.data.len();
        let offset = self.offset;

        if offset + 1 >= len {
            self.halt();
            return None;
        }

        let header_byte = self.data[offset];
        let kind = if header_byte & COMPRESSED_HEADER_MASK == 0 {
            if offset + 4 >= len {
                self.halt();
                return None;
            }
            let d = &self.data[offset + 1..offset + NORMAL_RECORD_LEN];
            self.offset += NORMAL_RECORD_LEN;
            RecordKind::Normal {
                value: u32::from_le_bytes([d[0], d[1], d[2], d[3]]),
            }
        } else {
            self.offset += 1;
            RecordKind::CompressedTimestamp
        };

        let record = RawRecord {
            header_byte,
            kind,
            captured_at: Utc::now(),
        };

        // Stop once fewer than five bytes follow, even if a compressed
        // header could still be read.
        if self.offset + 4 >= len {
            self.halt();
        }

        Some(record)
    }
}

impl FusedIterator for RecordStream<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn decode_kinds(data: &[u8]) -> (Vec<RecordKind>, Option<StopReason>) {
        let mut stream = RecordStream::new(data);
        let kinds = stream.by_ref().map(|r| r.kind).collect();
        (kinds, stream.stop_reason())
    }

    #[test]
    fn test_zero_bytes_yield_single_record() {
        for len in 5..=8 {
            let (kinds, stop) = decode_kinds(&vec![0u8; len]);
            assert_eq!(kinds, vec![RecordKind::Normal { value: 0 }]);
            let expected = if len == 5 {
                StopReason::Exhausted
            } else {
                StopReason::EarlyTermination { unread: len - 5 }
            };
            assert_eq!(stop, Some(expected));
        }
    }

    #[test]
    fn test_continuation_needs_five_trailing_bytes() {
        // After the first record 4 bytes remain, which is not enough for the
        // continuation check, so only one record is produced.
        let (kinds, _) = decode_kinds(&[0u8; 9]);
        assert_eq!(kinds.len(), 1);

        let (kinds, stop) = decode_kinds(&[0u8; 10]);
        assert_eq!(kinds.len(), 2);
        assert_eq!(stop, Some(StopReason::Exhausted));
    }

    #[test]
    fn test_value_is_little_endian() {
        let (kinds, _) = decode_kinds(&[0x00, 0x39, 0x30, 0x00, 0x00]);
        assert_eq!(kinds, vec![RecordKind::Normal { value: 12345 }]);
    }

    #[test]
    fn test_compressed_header_advances_one_byte() {
        let data = [0x80, 0x00];
        let mut stream = RecordStream::new(&data);
        let record = stream.next().unwrap();
        assert!(record.is_compressed());
        assert_eq!(record.field(0), None);
        assert_eq!(stream.offset(), 1);
        assert!(stream.next().is_none());
        assert_eq!(
            stream.stop_reason(),
            Some(StopReason::EarlyTermination { unread: 1 })
        );
    }

    #[test]
    fn test_single_byte_section_yields_nothing() {
        let (kinds, stop) = decode_kinds(&[0x80]);
        assert!(kinds.is_empty());
        assert_eq!(stop, Some(StopReason::EarlyTermination { unread: 1 }));

        let (kinds, stop) = decode_kinds(&[]);
        assert!(kinds.is_empty());
        assert_eq!(stop, Some(StopReason::Exhausted));
    }

    #[test]
    fn test_normal_header_without_payload_stops() {
        let (kinds, stop) = decode_kinds(&[0x00, 0x01, 0x02, 0x03]);
        assert!(kinds.is_empty());
        assert_eq!(stop, Some(StopReason::EarlyTermination { unread: 4 }));
    }

    #[test]
    fn test_mixed_records() {
        let data = [
            0x80, // compressed
            0x00, 0x0A, 0x00, 0x00, 0x00, // normal, 10
            0x81, // compressed
            0x00, 0x03, 0x00, 0x00, 0x00, // normal, 3
        ];
        let (kinds, stop) = decode_kinds(&data);
        assert_eq!(
            kinds,
            vec![
                RecordKind::CompressedTimestamp,
                RecordKind::Normal { value: 10 },
                RecordKind::CompressedTimestamp,
                RecordKind::Normal { value: 3 },
            ]
        );
        assert_eq!(stop, Some(StopReason::Exhausted));
    }

    #[test]
    fn test_stream_is_fused() {
        let data = [0u8; 5];
        let mut stream = RecordStream::new(&data);
        assert!(stream.next().is_some());
        assert!(stream.next().is_none());
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_read_data_section_seeks_to_header_size() {
        let mut bytes = vec![14, 0x10, 0, 0, 5, 0, 0, 0];
        bytes.extend_from_slice(b".FIT");
        bytes.extend_from_slice(&[0xEE, 0xEE]); // header CRC
        bytes.extend_from_slice(&[0x00, 0x0A, 0x00, 0x00, 0x00]);
        bytes.extend_from_slice(&[0xAB, 0xCD]); // file CRC

        let mut cursor = Cursor::new(bytes);
        let header = crate::header::read_header(&mut cursor).unwrap();
        let data = read_data_section(&mut cursor, &header).unwrap();
        assert_eq!(data, vec![0x00, 0x0A, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_read_data_section_truncated() {
        let mut bytes = vec![12, 0x10, 0, 0, 0xFF, 0, 0, 0];
        bytes.extend_from_slice(b".FIT");
        bytes.extend_from_slice(&[0u8; 10]);

        let mut cursor = Cursor::new(bytes);
        let header = crate::header::read_header(&mut cursor).unwrap();
        match read_data_section(&mut cursor, &header) {
            Err(IngestError::TruncatedInput {
                expected, actual, ..
            }) => {
                assert_eq!(expected, 255);
                assert_eq!(actual, 10);
            }
            other => panic!("expected truncation, got {other:?}"),
        }
    }
}
