//! Storage keys for tables and rows.
//!
//! All keys start with a version byte and a record type discriminator:
//!
//! ```text
//! | version (u8) | type (u8) | ... record-specific fields ... |
//! ```
//!
//! - `Table` (0x01): `| terminated(table) |`, marks that a table exists.
//! - `Row` (0x02): `| terminated(table) | terminated(partition_key) | row_key |`
//!
//! The row key is written raw and last, so byte order within a partition is
//! row-key string order.

use bytes::{BufMut, Bytes, BytesMut};

use super::DeserializeError;
use super::terminated_bytes;
use crate::util::BytesRange;

/// Key format version.
pub const KEY_VERSION: u8 = 0x01;

/// Record type discriminators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    Table = 0x01,
    Row = 0x02,
}

impl RecordType {
    pub fn id(&self) -> u8 {
        *self as u8
    }

    pub fn from_id(id: u8) -> Result<Self, DeserializeError> {
        match id {
            0x01 => Ok(RecordType::Table),
            0x02 => Ok(RecordType::Row),
            _ => Err(DeserializeError::new(format!(
                "invalid record type: 0x{:02x}",
                id
            ))),
        }
    }

    fn write_prefix(&self, buf: &mut BytesMut) {
        buf.put_u8(KEY_VERSION);
        buf.put_u8(self.id());
    }
}

fn read_prefix(data: &[u8], expected: RecordType) -> Result<&[u8], DeserializeError> {
    if data.len() < 2 {
        return Err(DeserializeError::new("buffer too short for key prefix"));
    }
    if data[0] != KEY_VERSION {
        return Err(DeserializeError::new(format!(
            "unsupported key version: 0x{:02x}",
            data[0]
        )));
    }
    let record_type = RecordType::from_id(data[1])?;
    if record_type != expected {
        return Err(DeserializeError::new(format!(
            "invalid record type: expected {:?}, got {:?}",
            expected, record_type
        )));
    }
    Ok(&data[2..])
}

/// Key of the marker record for a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableKey {
    pub table: String,
}

impl TableKey {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
        }
    }

    pub fn serialize(&self) -> Bytes {
        let mut buf = BytesMut::new();
        RecordType::Table.write_prefix(&mut buf);
        terminated_bytes::serialize(self.table.as_bytes(), &mut buf);
        buf.freeze()
    }
}

/// Key of a stored row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowStorageKey {
    pub table: String,
    pub partition_key: String,
    pub row_key: String,
}

impl RowStorageKey {
    pub fn new(
        table: impl Into<String>,
        partition_key: impl Into<String>,
        row_key: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            partition_key: partition_key.into(),
            row_key: row_key.into(),
        }
    }

    pub fn serialize(&self) -> Bytes {
        let mut buf = Self::partition_prefix(&self.table, &self.partition_key);
        buf.put_slice(self.row_key.as_bytes());
        buf.freeze()
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, DeserializeError> {
        let mut buf = read_prefix(data, RecordType::Row)?;
        let table = utf8(terminated_bytes::deserialize(&mut buf)?)?;
        let partition_key = utf8(terminated_bytes::deserialize(&mut buf)?)?;
        let row_key = utf8(Bytes::copy_from_slice(buf))?;
        Ok(Self {
            table,
            partition_key,
            row_key,
        })
    }

    /// Range covering every row of `table`.
    pub fn table_range(table: &str) -> BytesRange {
        let mut buf = BytesMut::new();
        RecordType::Row.write_prefix(&mut buf);
        terminated_bytes::serialize(table.as_bytes(), &mut buf);
        BytesRange::prefix(buf.freeze())
    }

    /// Range covering every row of one partition of `table`.
    pub fn partition_range(table: &str, partition_key: &str) -> BytesRange {
        BytesRange::prefix(Self::partition_prefix(table, partition_key).freeze())
    }

    fn partition_prefix(table: &str, partition_key: &str) -> BytesMut {
        let mut buf = BytesMut::new();
        RecordType::Row.write_prefix(&mut buf);
        terminated_bytes::serialize(table.as_bytes(), &mut buf);
        terminated_bytes::serialize(partition_key.as_bytes(), &mut buf);
        buf
    }
}

fn utf8(bytes: Bytes) -> Result<String, DeserializeError> {
    String::from_utf8(bytes.to_vec())
        .map_err(|e| DeserializeError::new(format!("key is not valid utf-8: {}", e)))
}
