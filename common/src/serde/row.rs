//! Value encoding for stored rows.
//!
//! ```text
//! | ts_secs (i64 BE) | ts_nanos (u32 BE) | column_count (u16 BE) | column* |
//! ```
//!
//! Each column is `| name_len (u16 BE) | name (utf-8) | type (u8) | payload |`
//! where `type` is [`EdmType::id`] and the payload is:
//!
//! - `String`: `| len (u32 BE) | utf-8 |`
//! - `DateTime`: `| secs (i64 BE) | nanos (u32 BE) |`
//! - `Char`: the scalar value as `u32 BE`
//! - `Boolean`: one byte, 0 or 1
//! - numeric kinds: their big-endian fixed-width representation
//!
//! The partition and row keys are not repeated in the value; they are
//! recovered from the storage key.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use chrono::{DateTime, Utc};

use super::DeserializeError;
use crate::entity::{EdmType, EntityProperty, TableRow};
use crate::storage::{StorageError, StorageResult};

/// Encodes the timestamp and columns of `row`.
pub fn serialize(row: &TableRow) -> StorageResult<Bytes> {
    let count = u16::try_from(row.properties.len())
        .map_err(|_| StorageError::Internal("too many columns in row".to_string()))?;
    let mut buf = BytesMut::new();
    put_datetime(&row.timestamp, &mut buf);
    buf.put_u16(count);
    for (name, value) in &row.properties {
        let name_len = u16::try_from(name.len())
            .map_err(|_| StorageError::Internal(format!("column name too long: {}", name)))?;
        buf.put_u16(name_len);
        buf.put_slice(name.as_bytes());
        buf.put_u8(value.edm_type().id());
        put_value(value, &mut buf)?;
    }
    Ok(buf.freeze())
}

/// Decodes a row value, attaching the keys recovered from its storage key.
pub fn deserialize(
    partition_key: String,
    row_key: String,
    data: &[u8],
) -> Result<TableRow, DeserializeError> {
    let mut buf = data;
    let timestamp = get_datetime(&mut buf)?;
    let count = get_u16(&mut buf)?;
    let mut row = TableRow::new(partition_key, row_key, timestamp);
    for _ in 0..count {
        let name_len = get_u16(&mut buf)? as usize;
        let name = get_utf8(&mut buf, name_len)?;
        ensure(&buf, 1)?;
        let tag = buf.get_u8();
        let edm_type = EdmType::from_id(tag)
            .ok_or_else(|| DeserializeError::new(format!("unknown column type: 0x{:02x}", tag)))?;
        let value = get_value(edm_type, &mut buf)?;
        row.properties.insert(name, value);
    }
    if buf.has_remaining() {
        return Err(DeserializeError::new(format!(
            "{} trailing bytes after row value",
            buf.remaining()
        )));
    }
    Ok(row)
}

fn put_value(value: &EntityProperty, buf: &mut BytesMut) -> StorageResult<()> {
    match value {
        EntityProperty::String(v) => {
            let len = u32::try_from(v.len())
                .map_err(|_| StorageError::Internal("string column too long".to_string()))?;
            buf.put_u32(len);
            buf.put_slice(v.as_bytes());
        }
        EntityProperty::Int32(v) => buf.put_i32(*v),
        EntityProperty::Int64(v) => buf.put_i64(*v),
        EntityProperty::Double(v) => buf.put_f64(*v),
        EntityProperty::Boolean(v) => buf.put_u8(u8::from(*v)),
        EntityProperty::DateTime(v) => put_datetime(v, buf),
        EntityProperty::Byte(v) => buf.put_u8(*v),
        EntityProperty::Char(v) => buf.put_u32(u32::from(*v)),
        EntityProperty::Float(v) => buf.put_f32(*v),
        EntityProperty::Short(v) => buf.put_i16(*v),
    }
    Ok(())
}

fn get_value(edm_type: EdmType, buf: &mut &[u8]) -> Result<EntityProperty, DeserializeError> {
    let value = match edm_type {
        EdmType::String => {
            ensure(buf, 4)?;
            let len = buf.get_u32() as usize;
            EntityProperty::String(get_utf8(buf, len)?)
        }
        EdmType::Int32 => {
            ensure(buf, 4)?;
            EntityProperty::Int32(buf.get_i32())
        }
        EdmType::Int64 => {
            ensure(buf, 8)?;
            EntityProperty::Int64(buf.get_i64())
        }
        EdmType::Double => {
            ensure(buf, 8)?;
            EntityProperty::Double(buf.get_f64())
        }
        EdmType::Boolean => {
            ensure(buf, 1)?;
            EntityProperty::Boolean(buf.get_u8() != 0)
        }
        EdmType::DateTime => EntityProperty::DateTime(get_datetime(buf)?),
        EdmType::Byte => {
            ensure(buf, 1)?;
            EntityProperty::Byte(buf.get_u8())
        }
        EdmType::Char => {
            ensure(buf, 4)?;
            let raw = buf.get_u32();
            let c = char::from_u32(raw)
                .ok_or_else(|| DeserializeError::new(format!("invalid char: {}", raw)))?;
            EntityProperty::Char(c)
        }
        EdmType::Float => {
            ensure(buf, 4)?;
            EntityProperty::Float(buf.get_f32())
        }
        EdmType::Short => {
            ensure(buf, 2)?;
            EntityProperty::Short(buf.get_i16())
        }
    };
    Ok(value)
}

fn put_datetime(value: &DateTime<Utc>, buf: &mut BytesMut) {
    buf.put_i64(value.timestamp());
    buf.put_u32(value.timestamp_subsec_nanos());
}

fn get_datetime(buf: &mut &[u8]) -> Result<DateTime<Utc>, DeserializeError> {
    ensure(buf, 12)?;
    let secs = buf.get_i64();
    let nanos = buf.get_u32();
    DateTime::from_timestamp(secs, nanos)
        .ok_or_else(|| DeserializeError::new(format!("timestamp out of range: {}.{}", secs, nanos)))
}

fn get_u16(buf: &mut &[u8]) -> Result<u16, DeserializeError> {
    ensure(buf, 2)?;
    Ok(buf.get_u16())
}

fn get_utf8(buf: &mut &[u8], len: usize) -> Result<String, DeserializeError> {
    ensure(buf, len)?;
    let s = std::str::from_utf8(&buf[..len])
        .map_err(|e| DeserializeError::new(format!("invalid utf-8: {}", e)))?
        .to_string();
    buf.advance(len);
    Ok(s)
}

fn ensure(buf: &[u8], needed: usize) -> Result<(), DeserializeError> {
    if buf.len() < needed {
        return Err(DeserializeError::new(format!(
            "buffer too short: need {} bytes, have {}",
            needed,
            buf.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn sample_row() -> TableRow {
        let ts = Utc.with_ymd_and_hms(2024, 3, 9, 8, 30, 0).unwrap()
            + chrono::Duration::nanoseconds(123_456_789);
        TableRow::new("orders", "2517", ts)
            .with_property("s", EntityProperty::String("h%C3%A9llo".into()))
            .with_property("i32", EntityProperty::Int32(-42))
            .with_property("i64", EntityProperty::Int64(i64::MAX))
            .with_property("f64", EntityProperty::Double(1.5))
            .with_property("b", EntityProperty::Boolean(true))
            .with_property("dt", EntityProperty::DateTime(ts))
            .with_property("u8", EntityProperty::Byte(255))
            .with_property("c", EntityProperty::Char('λ'))
            .with_property("f32", EntityProperty::Float(0.25))
            .with_property("i16", EntityProperty::Short(-7))
    }

    #[test]
    fn should_preserve_every_column_kind() {
        // given
        let row = sample_row();

        // when
        let bytes = serialize(&row).unwrap();
        let decoded = deserialize("orders".into(), "2517".into(), &bytes).unwrap();

        // then
        assert_eq!(decoded, row);
    }

    #[test]
    fn should_fail_on_truncated_value() {
        let bytes = serialize(&sample_row()).unwrap();
        let truncated = &bytes[..bytes.len() - 1];
        assert!(deserialize("p".into(), "r".into(), truncated).is_err());
    }

    #[test]
    fn should_fail_on_unknown_column_type() {
        // given
        let row = TableRow::new("p", "r", Utc::now()).with_property("x", EntityProperty::Byte(1));
        let mut bytes = serialize(&row).unwrap().to_vec();
        let tag_offset = 12 + 2 + 2 + 1;
        bytes[tag_offset] = 0x7F;

        // when
        let result = deserialize("p".into(), "r".into(), &bytes);

        // then
        assert!(result.unwrap_err().message.contains("unknown column type"));
    }
}
