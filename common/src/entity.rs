//! Entity data model of the table store.
//!
//! A [`TableRow`] is the unit the store persists: a partition key, a row key,
//! a timestamp and a set of named, typed columns. Column values are held as
//! [`EntityProperty`], whose scalar kind is described by [`EdmType`].

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};

/// Name of the reserved partition key property.
pub const PARTITION_KEY: &str = "PartitionKey";

/// Name of the reserved row key property.
pub const ROW_KEY: &str = "RowKey";

/// Name of the reserved timestamp property.
pub const TIMESTAMP: &str = "Timestamp";

/// Scalar kind of a column value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdmType {
    String,
    Int32,
    Int64,
    Double,
    Boolean,
    DateTime,
    Byte,
    Char,
    Float,
    Short,
}

impl EdmType {
    /// Returns the one-byte tag used by the binary row codec.
    pub fn id(&self) -> u8 {
        match self {
            EdmType::String => 0x01,
            EdmType::Int32 => 0x02,
            EdmType::Int64 => 0x03,
            EdmType::Double => 0x04,
            EdmType::Boolean => 0x05,
            EdmType::DateTime => 0x06,
            EdmType::Byte => 0x07,
            EdmType::Char => 0x08,
            EdmType::Float => 0x09,
            EdmType::Short => 0x0A,
        }
    }

    /// Converts a codec tag back to an `EdmType`.
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0x01 => Some(EdmType::String),
            0x02 => Some(EdmType::Int32),
            0x03 => Some(EdmType::Int64),
            0x04 => Some(EdmType::Double),
            0x05 => Some(EdmType::Boolean),
            0x06 => Some(EdmType::DateTime),
            0x07 => Some(EdmType::Byte),
            0x08 => Some(EdmType::Char),
            0x09 => Some(EdmType::Float),
            0x0A => Some(EdmType::Short),
            _ => None,
        }
    }
}

impl fmt::Display for EdmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EdmType::String => "Edm.String",
            EdmType::Int32 => "Edm.Int32",
            EdmType::Int64 => "Edm.Int64",
            EdmType::Double => "Edm.Double",
            EdmType::Boolean => "Edm.Boolean",
            EdmType::DateTime => "Edm.DateTime",
            EdmType::Byte => "Edm.Byte",
            EdmType::Char => "Edm.Char",
            EdmType::Float => "Edm.Single",
            EdmType::Short => "Edm.Int16",
        };
        f.write_str(name)
    }
}

/// A typed column value.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityProperty {
    String(String),
    Int32(i32),
    Int64(i64),
    Double(f64),
    Boolean(bool),
    DateTime(DateTime<Utc>),
    Byte(u8),
    Char(char),
    Float(f32),
    Short(i16),
}

impl EntityProperty {
    /// Returns the scalar kind of this value.
    pub fn edm_type(&self) -> EdmType {
        match self {
            EntityProperty::String(_) => EdmType::String,
            EntityProperty::Int32(_) => EdmType::Int32,
            EntityProperty::Int64(_) => EdmType::Int64,
            EntityProperty::Double(_) => EdmType::Double,
            EntityProperty::Boolean(_) => EdmType::Boolean,
            EntityProperty::DateTime(_) => EdmType::DateTime,
            EntityProperty::Byte(_) => EdmType::Byte,
            EntityProperty::Char(_) => EdmType::Char,
            EntityProperty::Float(_) => EdmType::Float,
            EntityProperty::Short(_) => EdmType::Short,
        }
    }

    /// Returns the string payload if this is a string column.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            EntityProperty::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for EntityProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityProperty::String(v) => f.write_str(v),
            EntityProperty::Int32(v) => write!(f, "{}", v),
            EntityProperty::Int64(v) => write!(f, "{}", v),
            EntityProperty::Double(v) => write!(f, "{}", v),
            EntityProperty::Boolean(v) => write!(f, "{}", v),
            EntityProperty::DateTime(v) => {
                f.write_str(&v.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            EntityProperty::Byte(v) => write!(f, "{}", v),
            EntityProperty::Char(v) => write!(f, "{}", v),
            EntityProperty::Float(v) => write!(f, "{}", v),
            EntityProperty::Short(v) => write!(f, "{}", v),
        }
    }
}

/// A row of a partitioned table.
///
/// Rows are addressed by `(partition_key, row_key)`. Within a partition,
/// the store returns rows in ascending row-key order.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub partition_key: String,
    pub row_key: String,
    pub timestamp: DateTime<Utc>,
    pub properties: BTreeMap<String, EntityProperty>,
}

impl TableRow {
    /// Creates a row with no columns.
    pub fn new(
        partition_key: impl Into<String>,
        row_key: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
            timestamp,
            properties: BTreeMap::new(),
        }
    }

    /// Adds or replaces a column, returning the row for chaining.
    pub fn with_property(mut self, name: impl Into<String>, value: EntityProperty) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    /// Looks up a column by name.
    pub fn property(&self, name: &str) -> Option<&EntityProperty> {
        self.properties.get(name)
    }

    /// Resolves a property for filter evaluation.
    ///
    /// The reserved key names resolve to the row's keys; any other name
    /// resolves to a string column.
    pub fn filter_value(&self, name: &str) -> Option<&str> {
        match name {
            PARTITION_KEY => Some(&self.partition_key),
            ROW_KEY => Some(&self.row_key),
            other => self.properties.get(other).and_then(EntityProperty::as_str),
        }
    }
}
