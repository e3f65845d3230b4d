//! Compressed-stream header parsing.
//!
//! Every stream handed to `CREATE_HANDLE` starts with a fixed 20-byte
//! little-endian header:
//!
//! ```text
//! offset  size  field
//!      0     2  tag, ASCII "20" (format generation)
//!      2     2  reserved, must be zero
//!      4     4  block_count   — compressed blocks in the stream
//!      8     4  out_size      — decompressed output size in bytes
//!     12     4  in_size       — valid compressed data length in bytes
//!     16     4  crc           — XXH32 (seed 0) over bytes [0, 16)
//! ```
//!
//! All three counts must be non-zero. Any violation — short buffer, wrong
//! tag, non-zero reserved bytes, zero field, checksum mismatch — fails
//! with [`Error::InvalidParameter`] and records no state.

use xxhash_rust::xxh32::xxh32;

use crate::error::{Error, Result};

/// Total header size in bytes.
pub const HEADER_SIZE: usize = 20;

/// Expected format tag.
pub const HEADER_TAG: [u8; 2] = *b"20";

/// Number of header bytes covered by the trailing checksum.
const CRC_COVERED: usize = 16;

/// Decoded header fields carried through `CONFIG`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderInfo {
    /// Compressed blocks in the stream.
    pub block_count: u32,
    /// Decompressed output size in bytes.
    pub out_size: u32,
    /// Valid compressed input length in bytes.
    pub in_size: u32,
}

/// Parses and validates a stream header.
pub fn parse_header(bytes: &[u8]) -> Result<HeaderInfo> {
    if bytes.len() < HEADER_SIZE {
        return Err(Error::InvalidParameter);
    }
    if bytes[0..2] != HEADER_TAG || bytes[2] != 0 || bytes[3] != 0 {
        return Err(Error::InvalidParameter);
    }

    let stored_crc = read_le32(&bytes[16..20]);
    if xxh32(&bytes[..CRC_COVERED], 0) != stored_crc {
        return Err(Error::InvalidParameter);
    }

    let info = HeaderInfo {
        block_count: read_le32(&bytes[4..8]),
        out_size: read_le32(&bytes[8..12]),
        in_size: read_le32(&bytes[12..16]),
    };
    if info.block_count == 0 || info.out_size == 0 || info.in_size == 0 {
        return Err(Error::InvalidParameter);
    }
    Ok(info)
}

/// Serializes a header, computing the checksum. Used by stream producers
/// and test fixtures.
pub fn write_header(info: &HeaderInfo) -> [u8; HEADER_SIZE] {
    let mut out = [0u8; HEADER_SIZE];
    out[0..2].copy_from_slice(&HEADER_TAG);
    out[4..8].copy_from_slice(&info.block_count.to_le_bytes());
    out[8..12].copy_from_slice(&info.out_size.to_le_bytes());
    out[12..16].copy_from_slice(&info.in_size.to_le_bytes());
    let crc = xxh32(&out[..CRC_COVERED], 0);
    out[16..20].copy_from_slice(&crc.to_le_bytes());
    out
}

#[inline]
fn read_le32(b: &[u8]) -> u32 {
    u32::from_le_bytes([b[0], b[1], b[2], b[3]])
}
