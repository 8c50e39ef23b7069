//! Record framing on top of a [`StorageBackend`].

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};

/// Bytes added around every payload: length, kind, oid and checksum.
pub const RECORD_OVERHEAD: usize = HEADER_SIZE + CRC_SIZE;

const HEADER_SIZE: usize = 4 + 1 + 8;
const CRC_SIZE: usize = 4;

/// What a record holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RecordKind {
    /// A stored object (row plus extent link).
    Object = 1,
    /// A B-tree node.
    Node = 2,
    /// A B-tree header (name, degree, size, root).
    TreeHeader = 3,
    /// Class and index catalog.
    Catalog = 4,
}

impl TryFrom<u8> for RecordKind {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Object),
            2 => Ok(Self::Node),
            3 => Ok(Self::TreeHeader),
            4 => Ok(Self::Catalog),
            other => Err(other),
        }
    }
}

/// A single framed record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Record kind.
    pub kind: RecordKind,
    /// Object identifier the record is stored under.
    pub oid: u64,
    /// Opaque payload.
    pub payload: Vec<u8>,
}

impl Record {
    /// Creates a record.
    #[must_use]
    pub fn new(kind: RecordKind, oid: u64, payload: Vec<u8>) -> Self {
        Self { kind, oid, payload }
    }

    /// Total framed size in bytes.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        RECORD_OVERHEAD + self.payload.len()
    }

    /// Encodes the record frame.
    pub fn encode(&self) -> StorageResult<Vec<u8>> {
        let total = self.encoded_len();
        let len = u32::try_from(total).map_err(|_| StorageError::RecordTooLarge {
            len: self.payload.len(),
        })?;

        let mut buf = Vec::with_capacity(total);
        buf.extend_from_slice(&len.to_le_bytes());
        buf.push(self.kind as u8);
        buf.extend_from_slice(&self.oid.to_le_bytes());
        buf.extend_from_slice(&self.payload);
        let crc = crc32fast::hash(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());
        Ok(buf)
    }

    /// Decodes a full frame read from `offset`.
    pub fn decode(offset: u64, frame: &[u8]) -> StorageResult<Self> {
        if frame.len() < RECORD_OVERHEAD {
            return Err(StorageError::corrupt(offset, "frame shorter than header"));
        }

        let body = &frame[..frame.len() - CRC_SIZE];
        let mut crc_bytes = [0u8; 4];
        crc_bytes.copy_from_slice(&frame[frame.len() - CRC_SIZE..]);
        let stored = u32::from_le_bytes(crc_bytes);
        let computed = crc32fast::hash(body);
        if stored != computed {
            return Err(StorageError::ChecksumMismatch {
                offset,
                stored,
                computed,
            });
        }

        let kind = RecordKind::try_from(frame[4])
            .map_err(|k| StorageError::corrupt(offset, format!("unknown record kind {k}")))?;
        let mut oid_bytes = [0u8; 8];
        oid_bytes.copy_from_slice(&frame[5..13]);

        Ok(Self {
            kind,
            oid: u64::from_le_bytes(oid_bytes),
            payload: body[HEADER_SIZE..].to_vec(),
        })
    }
}

/// Append-only log of [`Record`]s.
#[derive(Debug)]
pub struct RecordLog<B: StorageBackend> {
    backend: B,
}

impl<B: StorageBackend> RecordLog<B> {
    /// Wraps a backend.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Appends a record and returns the offset of its frame.
    pub fn append(&mut self, record: &Record) -> StorageResult<u64> {
        let frame = record.encode()?;
        self.backend.append(&frame)
    }

    /// Reads the record whose frame starts at `offset`.
    pub fn read(&self, offset: u64) -> StorageResult<Record> {
        let len = self.frame_len(offset)?;
        let frame = self.backend.read_at(offset, len)?;
        Record::decode(offset, &frame)
    }

    /// Reads every record from the start of the log.
    ///
    /// A torn or corrupt record at the tail ends the scan; everything before
    /// it is returned.
    pub fn scan(&self) -> StorageResult<Vec<(u64, Record)>> {
        let size = self.backend.size()?;
        let mut offset = 0u64;
        let mut records = Vec::new();

        while offset < size {
            let len = match self.frame_len(offset) {
                Ok(len) if offset + len as u64 <= size => len,
                _ => break,
            };
            let frame = self.backend.read_at(offset, len)?;
            match Record::decode(offset, &frame) {
                Ok(record) => records.push((offset, record)),
                Err(_) => break,
            }
            offset += len as u64;
        }

        Ok(records)
    }

    /// Flushes and syncs the backend.
    pub fn sync(&mut self) -> StorageResult<()> {
        self.backend.flush()?;
        self.backend.sync()
    }

    /// Current size of the log in bytes.
    pub fn size(&self) -> StorageResult<u64> {
        self.backend.size()
    }

    /// Returns the backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Unwraps the backend.
    pub fn into_backend(self) -> B {
        self.backend
    }

    fn frame_len(&self, offset: u64) -> StorageResult<usize> {
        let prefix = self.backend.read_at(offset, 4)?;
        let len = u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
        if len < RECORD_OVERHEAD {
            return Err(StorageError::corrupt(offset, format!("frame length {len}")));
        }
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryBackend;

    #[test]
    fn append_then_read() {
        let mut log = RecordLog::new(MemoryBackend::new());
        let a = log
            .append(&Record::new(RecordKind::Node, 3, vec![1, 2, 3]))
            .unwrap();
        let b = log
            .append(&Record::new(RecordKind::Object, 4, Vec::new()))
            .unwrap();

        assert_eq!(a, 0);
        assert_eq!(b, (RECORD_OVERHEAD + 3) as u64);
        assert_eq!(log.read(a).unwrap().payload, vec![1, 2, 3]);
        assert_eq!(log.read(b).unwrap().kind, RecordKind::Object);
    }

    #[test]
    fn flipped_byte_fails_checksum() {
        let mut log = RecordLog::new(MemoryBackend::new());
        log.append(&Record::new(RecordKind::Object, 9, b"payload".to_vec()))
            .unwrap();

        let mut bytes = log.backend().data();
        bytes[15] ^= 0xFF;
        let log = RecordLog::new(MemoryBackend::with_data(bytes));

        assert!(matches!(
            log.read(0),
            Err(StorageError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn scan_stops_at_torn_tail() {
        let mut log = RecordLog::new(MemoryBackend::new());
        for oid in 1..=3 {
            log.append(&Record::new(RecordKind::Node, oid, vec![oid as u8; 10]))
                .unwrap();
        }

        let mut bytes = log.backend().data();
        bytes.truncate(bytes.len() - 5);
        let log = RecordLog::new(MemoryBackend::with_data(bytes));

        let records = log.scan().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].1.oid, 2);
    }

    #[test]
    fn unknown_kind_is_corrupt() {
        let mut frame = Record::new(RecordKind::Node, 1, Vec::new()).encode().unwrap();
        frame[4] = 0x7F;
        let body_len = frame.len() - 4;
        let crc = crc32fast::hash(&frame[..body_len]);
        frame[body_len..].copy_from_slice(&crc.to_le_bytes());

        assert!(matches!(
            Record::decode(0, &frame),
            Err(StorageError::CorruptRecord { .. })
        ));
    }
}
