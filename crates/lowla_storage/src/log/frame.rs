//! Log frame layout.
//!
//! ```text
//! +-------+---------+------+-------------+-------------+-------+
//! | magic | version | kind | payload len | CBOR ops    | crc32 |
//! | 4     | 2 (LE)  | 1    | 4 (LE)      | payload len | 4 (LE)|
//! +-------+---------+------+-------------+-------------+-------+
//! ```
//!
//! The checksum covers header and payload. One frame holds every write of
//! one committed transaction, so a frame is applied entirely or not at all.

use crate::error::{StorageError, StorageResult};
use crate::record::RecordKey;
use lowla_codec::JsonDocument;
use serde::{Deserialize, Serialize};

pub(crate) const LOG_MAGIC: [u8; 4] = *b"LWLG";
pub(crate) const LOG_VERSION: u16 = 1;
pub(crate) const HEADER_SIZE: usize = 11;
pub(crate) const CRC_SIZE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum FrameKind {
    /// Writes of one transaction, applied on top of prior state.
    Batch = 1,
    /// Complete store image; replaces prior state.
    Snapshot = 2,
}

impl FrameKind {
    fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Batch),
            2 => Some(Self::Snapshot),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) enum LogOp {
    Put { key: RecordKey, document: JsonDocument },
    Delete { key: RecordKey },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Frame {
    pub(crate) kind: FrameKind,
    pub(crate) ops: Vec<LogOp>,
}

/// Outcome of reading one frame from the head of a buffer.
#[derive(Debug)]
pub(crate) enum FrameRead {
    Complete { frame: Frame, len: usize },
    /// The buffer ends inside this frame.
    Incomplete,
    /// Fully present but fails its checksum or payload decoding.
    Damaged { len: usize, error: StorageError },
}

impl Frame {
    pub(crate) fn encode(&self) -> StorageResult<Vec<u8>> {
        let mut payload = Vec::new();
        ciborium::into_writer(&self.ops, &mut payload)
            .map_err(|e| StorageError::serialization(e.to_string()))?;
        let len = u32::try_from(payload.len()).map_err(|_| {
            StorageError::serialization(format!("frame payload too large: {}", payload.len()))
        })?;

        let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
        buf.extend_from_slice(&LOG_MAGIC);
        buf.extend_from_slice(&LOG_VERSION.to_le_bytes());
        buf.push(self.kind as u8);
        buf.extend_from_slice(&len.to_le_bytes());
        buf.extend_from_slice(&payload);
        let crc = compute_crc32(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());
        Ok(buf)
    }

    /// Reads the frame at the start of `buf`; `offset` is only for messages.
    ///
    /// A bad magic number or unknown version is a hard error: it means the
    /// bytes were never written by this engine.
    pub(crate) fn read(buf: &[u8], offset: u64) -> StorageResult<FrameRead> {
        if buf.len() < HEADER_SIZE {
            return Ok(FrameRead::Incomplete);
        }
        if buf[0..4] != LOG_MAGIC {
            return Err(StorageError::corrupted(format!(
                "invalid frame magic at offset {offset}"
            )));
        }
        let version = u16::from_le_bytes([buf[4], buf[5]]);
        if version > LOG_VERSION {
            return Err(StorageError::corrupted(format!(
                "unsupported log version {version} at offset {offset}"
            )));
        }
        let payload_len = u32::from_le_bytes([buf[7], buf[8], buf[9], buf[10]]) as usize;
        let total = HEADER_SIZE + payload_len + CRC_SIZE;
        if buf.len() < total {
            return Ok(FrameRead::Incomplete);
        }

        let body_end = HEADER_SIZE + payload_len;
        let stored = u32::from_le_bytes([
            buf[body_end],
            buf[body_end + 1],
            buf[body_end + 2],
            buf[body_end + 3],
        ]);
        let actual = compute_crc32(&buf[..body_end]);
        if stored != actual {
            return Ok(FrameRead::Damaged {
                len: total,
                error: StorageError::ChecksumMismatch {
                    offset,
                    expected: stored,
                    actual,
                },
            });
        }

        let Some(kind) = FrameKind::from_byte(buf[6]) else {
            return Ok(FrameRead::Damaged {
                len: total,
                error: StorageError::corrupted(format!(
                    "unknown frame kind {} at offset {offset}",
                    buf[6]
                )),
            });
        };
        match ciborium::from_reader::<Vec<LogOp>, _>(&buf[HEADER_SIZE..body_end]) {
            Ok(ops) => Ok(FrameRead::Complete {
                frame: Frame { kind, ops },
                len: total,
            }),
            Err(e) => Ok(FrameRead::Damaged {
                len: total,
                error: StorageError::serialization(e.to_string()),
            }),
        }
    }
}

/// CRC32 (IEEE polynomial).
pub(crate) fn compute_crc32(data: &[u8]) -> u32 {
    const TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                crc = if crc & 1 != 0 {
                    (crc >> 1) ^ 0xEDB8_8320
                } else {
                    crc >> 1
                };
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        crc = (crc >> 8) ^ TABLE[((crc ^ u32::from(byte)) & 0xFF) as usize];
    }
    !crc
}
