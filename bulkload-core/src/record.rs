//! Record and batch types.
//!
//! A [`Record`] is an opaque key/value pair plus a one-byte metadata tag. The
//! writer never interprets any of the three fields; encoding keys and values
//! is the producer's business.
//!
//! A [`Batch`] is an ordered, capacity-bounded run of records that is written
//! to the store as one unit. Records keep the order in which they were
//! appended.

use bytes::Bytes;

use crate::types::BatchId;

/// An immutable key/value record with a metadata tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    key: Bytes,
    value: Bytes,
    meta: u8,
}

impl Record {
    /// Creates a new record.
    #[must_use]
    pub fn new(key: impl Into<Bytes>, value: impl Into<Bytes>, meta: u8) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            meta,
        }
    }

    /// Returns the record key.
    #[must_use]
    pub const fn key(&self) -> &Bytes {
        &self.key
    }

    /// Returns the record value.
    #[must_use]
    pub const fn value(&self) -> &Bytes {
        &self.value
    }

    /// Returns the metadata tag.
    #[must_use]
    pub const fn meta(&self) -> u8 {
        self.meta
    }

    /// Returns the payload size in bytes (key + value + meta).
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.key.len() + self.value.len() + 1
    }
}

/// An ordered group of records written to the store as one unit.
///
/// The capacity is the batch threshold: once `len() == capacity()` the batch
/// is full and the writer cuts it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    id: BatchId,
    capacity: u32,
    records: Vec<Record>,
}

impl Batch {
    /// Creates an empty batch that holds up to `capacity` records.
    #[must_use]
    pub fn with_capacity(id: BatchId, capacity: u32) -> Self {
        Self {
            id,
            capacity,
            records: Vec::with_capacity(capacity as usize),
        }
    }

    /// Creates a batch from existing records. Capacity is the record count.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // Batch sizes are bounded by Limits.
    pub fn from_records(id: BatchId, records: Vec<Record>) -> Self {
        Self {
            id,
            capacity: records.len() as u32,
            records,
        }
    }

    /// Appends a record. Returns true if the batch is now full.
    ///
    /// Pushing into a full batch is a caller bug; the writer cuts a batch
    /// as soon as it reports full.
    pub fn push(&mut self, record: Record) -> bool {
        debug_assert!(!self.is_full(), "push into full batch {}", self.id);
        self.records.push(record);
        self.is_full()
    }

    /// Returns the batch id.
    #[must_use]
    pub const fn id(&self) -> BatchId {
        self.id
    }

    /// Returns the batch threshold.
    #[must_use]
    pub const fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the batch holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns true if the batch reached its threshold.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.records.len() >= self.capacity as usize
    }

    /// Returns the records in append order.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Consumes the batch, returning its records.
    #[must_use]
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    /// Returns the total payload size of all records.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.records.iter().map(Record::size_bytes).sum()
    }
}
