//! Compressed block extraction.
//!
//! After the optional volume header record, a chunk is a run of
//! `[control word][bzip2 block]` pairs. The control word is a big-endian
//! i32 whose magnitude is the block size; its sign carries no meaning here.

use std::io::Read;

use bytes::Bytes;
use bzip2::read::BzDecoder;

use crate::error::{DecodeError, Result};
use crate::observer::DecodeObserver;

/// Largest compressed block we accept.
pub const MAX_BLOCK_SIZE: u32 = 100_000_000;

const CONTROL_WORD_SIZE: usize = 4;

/// Blocks recovered from one chunk payload.
#[derive(Debug, Default, Clone)]
pub struct DecompressedChunk {
    pub blocks: Vec<Bytes>,
    /// Blocks that failed to decompress and were skipped
    pub failed_blocks: usize,
    /// Why the walk stopped before the end of the payload, if it did
    pub stopped: Option<DecodeError>,
}

impl DecompressedChunk {
    pub fn is_truncated(&self) -> bool {
        self.stopped.is_some()
    }
}

/// Split a chunk payload into decompressed blocks.
///
/// A bad control word or size ends the walk; whatever decoded before it is
/// kept. A block that fails to decompress is skipped on its own.
pub fn decompress_blocks(payload: &[u8], observer: &dyn DecodeObserver) -> DecompressedChunk {
    let mut result = DecompressedChunk::default();
    let mut pos = 0;
    let mut index = 0;

    while pos < payload.len() {
        let remaining = payload.len() - pos;
        if remaining < CONTROL_WORD_SIZE {
            let err = DecodeError::ControlWordTruncated { remaining };
            observer.chunk_truncated(&err);
            result.stopped = Some(err);
            break;
        }

        let control = i32::from_be_bytes([
            payload[pos],
            payload[pos + 1],
            payload[pos + 2],
            payload[pos + 3],
        ]);
        pos += CONTROL_WORD_SIZE;

        let size = control.unsigned_abs();
        let remaining = payload.len() - pos;
        if size == 0 || size > MAX_BLOCK_SIZE || size as usize > remaining {
            let err = DecodeError::BlockSize { size, remaining };
            observer.chunk_truncated(&err);
            result.stopped = Some(err);
            break;
        }

        let compressed = &payload[pos..pos + size as usize];
        pos += size as usize;

        match decompress_block(compressed) {
            Ok(block) => {
                observer.block_decompressed(index, compressed.len(), block.len());
                result.blocks.push(block);
            }
            Err(e) => {
                observer.block_failed(index, &e);
                result.failed_blocks += 1;
            }
        }
        index += 1;
    }

    result
}

/// Decompress a single bzip2 block.
pub fn decompress_block(compressed: &[u8]) -> Result<Bytes> {
    let mut decoder = BzDecoder::new(compressed);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| DecodeError::Decompression(e.to_string()))?;
    Ok(Bytes::from(decompressed))
}
