//! File header decoding
//!
//! Reads the fixed 12-byte prefix of a FIT file. Only the data type literal is
//! validated; the version fields are kept for the caller.

use std::io::Read;

use crate::error::{IngestError, Result};
use crate::types::{FileHeader, FILE_HEADER_LEN, FIT_DATA_TYPE};

/// Read and validate the file header from the start of `reader`.
///
/// Consumes exactly [`FILE_HEADER_LEN`] bytes on success. Callers must seek to
/// [`FileHeader::data_offset`] before reading the data section, since
/// `header_size` may exceed the bytes read here.
pub fn read_header<R: Read>(reader: &mut R) -> Result<FileHeader> {
    let mut buf = Vec::with_capacity(FILE_HEADER_LEN);
    reader
        .by_ref()
        .take(FILE_HEADER_LEN as u64)
        .read_to_end(&mut buf)?;

    let bytes: [u8; FILE_HEADER_LEN] = buf
        .as_slice()
        .try_into()
        .map_err(|_| IngestError::TruncatedInput {
            section: "header",
            expected: FILE_HEADER_LEN,
            actual: buf.len(),
        })?;

    parse_header(bytes)
}

/// Decode header fields from a 12-byte array
pub fn parse_header(r: [u8; FILE_HEADER_LEN]) -> Result<FileHeader> {
    let header = FileHeader {
        header_size: r[0],
        protocol_version: r[1],
        profile_version: u16::from_le_bytes([r[2], r[3]]),
        data_size: u32::from_le_bytes([r[4], r[5], r[6], r[7]]),
        data_type: [r[8], r[9], r[10], r[11]],
    };

    if header.data_type != FIT_DATA_TYPE {
        return Err(IngestError::InvalidMagic {
            found: header.data_type,
        });
    }

    Ok(header)
}
