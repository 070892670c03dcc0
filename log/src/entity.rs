//! Projection between log records and table rows.
//!
//! A record type describes its fields through [`LogRecord`], usually by
//! invoking [`log_record!`](crate::log_record). Projection reads every field,
//! routes the partition-key and row-key fields into the row's keys and stores
//! the rest as typed columns. Keys and string columns are URL-encoded on the
//! way in and decoded on the way out.

use chrono::{DateTime, Utc};
use common::{EntityProperty, TableRow};

use crate::config::UnsupportedFieldPolicy;
use crate::error::{Error, Result};
use crate::keys;

/// The value of one record field as seen by projection.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// A value with a column representation.
    Scalar(EntityProperty),
    /// A value of a type with no column representation, with its text form.
    Unsupported {
        type_name: &'static str,
        text: String,
    },
}

impl FieldValue {
    /// Text used when the value becomes a key.
    fn key_text(&self) -> String {
        match self {
            FieldValue::Scalar(p) => p.to_string(),
            FieldValue::Unsupported { text, .. } => text.clone(),
        }
    }
}

/// Conversion of a record field into a [`FieldValue`].
///
/// `None` means the field has no value and is left out of the row.
pub trait ToFieldValue {
    fn to_field_value(&self) -> Option<FieldValue>;
}

macro_rules! scalar_field {
    ($($ty:ty => $variant:ident),+ $(,)?) => {
        $(
            impl ToFieldValue for $ty {
                fn to_field_value(&self) -> Option<FieldValue> {
                    Some(FieldValue::Scalar(EntityProperty::$variant(self.clone())))
                }
            }

            impl FromProperty for $ty {
                fn from_property(value: EntityProperty) -> Result<Self> {
                    match value {
                        EntityProperty::$variant(v) => Ok(v),
                        other => Err(Error::Mapping(format!(
                            "expected {} column, found {}",
                            stringify!($variant),
                            other.edm_type()
                        ))),
                    }
                }

                fn from_key_text(text: &str) -> Result<Self> {
                    text.parse::<$ty>().map_err(|e| {
                        Error::Mapping(format!(
                            "'{}' is not a valid {} key: {}",
                            text,
                            stringify!($variant),
                            e
                        ))
                    })
                }
            }
        )+
    };
}

scalar_field! {
    String => String,
    i32 => Int32,
    i64 => Int64,
    f64 => Double,
    bool => Boolean,
    DateTime<Utc> => DateTime,
    u8 => Byte,
    char => Char,
    f32 => Float,
    i16 => Short,
}

macro_rules! unsupported_field {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl ToFieldValue for $ty {
                fn to_field_value(&self) -> Option<FieldValue> {
                    Some(FieldValue::Unsupported {
                        type_name: stringify!($ty),
                        text: self.to_string(),
                    })
                }
            }

            impl FromProperty for $ty {
                fn from_property(value: EntityProperty) -> Result<Self> {
                    match value {
                        EntityProperty::String(s) => s.parse::<$ty>().map_err(|e| {
                            Error::Mapping(format!(
                                "'{}' is not a valid {}: {}",
                                s,
                                stringify!($ty),
                                e
                            ))
                        }),
                        other => Err(Error::Mapping(format!(
                            "expected stringified {} column, found {}",
                            stringify!($ty),
                            other.edm_type()
                        ))),
                    }
                }

                // Dropped columns read back as the default.
                fn from_absent() -> Option<Self> {
                    Some(<$ty>::default())
                }
            }
        )+
    };
}

unsupported_field!(i8, u16, u32, u64, i128, u128, usize, isize);

impl<T: ToFieldValue> ToFieldValue for Option<T> {
    fn to_field_value(&self) -> Option<FieldValue> {
        self.as_ref().and_then(ToFieldValue::to_field_value)
    }
}

/// Conversion of a stored column back into a record field.
pub trait FromProperty: Sized {
    fn from_property(value: EntityProperty) -> Result<Self>;

    /// Value used when the column is absent, if the field tolerates that.
    fn from_absent() -> Option<Self> {
        None
    }

    /// Converts a decoded partition or row key into the field's type.
    fn from_key_text(text: &str) -> Result<Self> {
        Self::from_property(EntityProperty::String(text.to_string()))
    }
}

impl<T: FromProperty> FromProperty for Option<T> {
    fn from_property(value: EntityProperty) -> Result<Self> {
        T::from_property(value).map(Some)
    }

    fn from_absent() -> Option<Self> {
        Some(None)
    }

    fn from_key_text(text: &str) -> Result<Self> {
        T::from_key_text(text).map(Some)
    }
}

/// Converts the column for `field` into the field's type.
#[doc(hidden)]
pub fn read_property<T: FromProperty>(field: &str, value: Option<EntityProperty>) -> Result<T> {
    match value {
        Some(v) => T::from_property(v)
            .map_err(|e| Error::Mapping(format!("field '{}': {}", field, mapping_message(e)))),
        None => T::from_absent()
            .ok_or_else(|| Error::Mapping(format!("no column for field '{}'", field))),
    }
}

/// Converts the decoded key text for `field` into the field's type.
#[doc(hidden)]
pub fn read_key<T: FromProperty>(field: &str, text: &str) -> Result<T> {
    T::from_key_text(text)
        .map_err(|e| Error::Mapping(format!("key field '{}': {}", field, mapping_message(e))))
}

fn mapping_message(err: Error) -> String {
    match err {
        Error::Mapping(msg) => msg,
        other => other.to_string(),
    }
}

/// A record that can be tracked.
///
/// Implementations enumerate their fields by name. Field names are matched
/// against the configured partition-key and row-key field names, and the
/// remaining fields become columns under the same names.
pub trait LogRecord: Send + Sync {
    /// Names of every field, in declaration order.
    fn field_names(&self) -> &'static [&'static str];

    /// Current values of every field.
    fn read_fields(&self) -> Vec<(&'static str, Option<FieldValue>)>;

    /// Assigns a field from a stored value; `None` when no column exists.
    fn write_field(&mut self, name: &str, value: Option<EntityProperty>) -> Result<()>;

    /// Assigns a partition-key or row-key field from its decoded key text.
    fn write_key(&mut self, name: &str, text: &str) -> Result<()>;
}

/// Implements [`LogRecord`] for a struct by listing its fields.
///
/// Each entry maps a field name, as it appears in the table, to a struct
/// field whose type implements [`ToFieldValue`] and [`FromProperty`].
///
/// ```ignore
/// #[derive(Default)]
/// struct LogEntry {
///     log_name: String,
///     internal_id: String,
///     request_time: DateTime<Utc>,
/// }
///
/// table_log::log_record!(LogEntry {
///     "LogName" => log_name,
///     "internal_id" => internal_id,
///     "requestTime" => request_time,
/// });
/// ```
#[macro_export]
macro_rules! log_record {
    ($ty:ty { $($name:literal => $field:ident),+ $(,)? }) => {
        impl $crate::LogRecord for $ty {
            fn field_names(&self) -> &'static [&'static str] {
                &[$($name),+]
            }

            fn read_fields(&self) -> Vec<(&'static str, Option<$crate::FieldValue>)> {
                vec![$(($name, $crate::ToFieldValue::to_field_value(&self.$field))),+]
            }

            fn write_field(
                &mut self,
                name: &str,
                value: Option<$crate::EntityProperty>,
            ) -> $crate::Result<()> {
                match name {
                    $(
                        $name => {
                            self.$field = $crate::entity::read_property($name, value)?;
                            Ok(())
                        }
                    )+
                    other => Err($crate::Error::Mapping(format!("unknown field '{}'", other))),
                }
            }

            fn write_key(&mut self, name: &str, text: &str) -> $crate::Result<()> {
                match name {
                    $(
                        $name => {
                            self.$field = $crate::entity::read_key($name, text)?;
                            Ok(())
                        }
                    )+
                    other => Err($crate::Error::Mapping(format!("unknown field '{}'", other))),
                }
            }
        }
    };
}

/// Builds a row from `record`.
///
/// With no `row_key_field`, the row key is the inverted time key of `now`.
/// Fails with [`Error::Mapping`] when a named key field is missing from the
/// record or has no value.
pub fn project(
    partition_key_field: &str,
    row_key_field: Option<&str>,
    record: &dyn LogRecord,
    now: DateTime<Utc>,
    policy: UnsupportedFieldPolicy,
) -> Result<TableRow> {
    let row_key_field = row_key_field.filter(|f| !f.is_empty());
    let names = record.field_names();
    for key_field in std::iter::once(partition_key_field).chain(row_key_field) {
        if !names.iter().any(|n| *n == key_field) {
            return Err(Error::Mapping(format!(
                "record has no field named '{}'",
                key_field
            )));
        }
    }

    let mut partition_key = None;
    let mut row_key = match row_key_field {
        Some(_) => None,
        None => Some(keys::inverted_time_key(now).ok_or_else(|| {
            Error::InvalidInput(format!("{} has no inverted time key", now))
        })?),
    };
    let mut row = TableRow::new(String::new(), String::new(), now);

    for (name, value) in record.read_fields() {
        let Some(value) = value else {
            continue;
        };
        if name == partition_key_field {
            partition_key = Some(encode(&value.key_text()));
        } else if Some(name) == row_key_field {
            row_key = Some(encode(&value.key_text()));
        } else if let Some(column) = column_value(name, value, policy)? {
            row.properties.insert(name.to_string(), column);
        }
    }

    row.partition_key = partition_key.ok_or_else(|| {
        Error::Mapping(format!("partition key field '{}' has no value", partition_key_field))
    })?;
    row.row_key = row_key.ok_or_else(|| {
        Error::Mapping(format!(
            "row key field '{}' has no value",
            row_key_field.unwrap_or_default()
        ))
    })?;
    Ok(row)
}

fn column_value(
    name: &str,
    value: FieldValue,
    policy: UnsupportedFieldPolicy,
) -> Result<Option<EntityProperty>> {
    match value {
        FieldValue::Scalar(EntityProperty::String(s)) => {
            Ok(Some(EntityProperty::String(encode(&s))))
        }
        FieldValue::Scalar(other) => Ok(Some(other)),
        FieldValue::Unsupported { type_name, text } => match policy {
            UnsupportedFieldPolicy::Drop => {
                tracing::trace!(field = name, type_name, "dropping unsupported field");
                Ok(None)
            }
            UnsupportedFieldPolicy::Error => Err(Error::Mapping(format!(
                "field '{}' has unsupported type {}",
                name, type_name
            ))),
            UnsupportedFieldPolicy::Stringify => Ok(Some(EntityProperty::String(encode(&text)))),
        },
    }
}

/// Rebuilds a record from `row`, or `None` when it does not fit `R`.
///
/// Failures are logged rather than returned.
pub fn to_record<R: LogRecord + Default>(
    row: &TableRow,
    partition_key_field: &str,
    row_key_field: Option<&str>,
) -> Option<R> {
    match try_to_record(row, partition_key_field, row_key_field) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::error!(
                partition_key = %row.partition_key,
                row_key = %row.row_key,
                error = %e,
                "failed to map row to record"
            );
            None
        }
    }
}

/// Rebuilds a record from `row`.
///
/// The partition-key field receives the decoded partition key, the row-key
/// field the decoded row key, each parsed into the field's type. Every other
/// field receives the column of the same name.
pub fn try_to_record<R: LogRecord + Default>(
    row: &TableRow,
    partition_key_field: &str,
    row_key_field: Option<&str>,
) -> Result<R> {
    if partition_key_field.is_empty() {
        return Err(Error::Mapping("partition key field name is empty".into()));
    }
    let row_key_field = row_key_field.filter(|f| !f.is_empty());

    let mut record = R::default();
    for &name in record.field_names() {
        if name == partition_key_field {
            record.write_key(name, &decode(&row.partition_key)?)?;
        } else if Some(name) == row_key_field {
            record.write_key(name, &decode(&row.row_key)?)?;
        } else {
            let value = match row.property(name) {
                Some(EntityProperty::String(s)) => Some(EntityProperty::String(decode(s)?)),
                other => other.cloned(),
            };
            record.write_field(name, value)?;
        }
    }
    Ok(record)
}

/// Decodes every URL-encoded key and string column of `row` in place.
pub fn decode_row(row: &mut TableRow) -> Result<()> {
    row.partition_key = decode(&row.partition_key)?;
    row.row_key = decode(&row.row_key)?;
    for value in row.properties.values_mut() {
        if let EntityProperty::String(s) = value {
            *s = decode(s)?;
        }
    }
    Ok(())
}

pub(crate) fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

fn decode(value: &str) -> Result<String> {
    urlencoding::decode(value)
        .map(|s| s.into_owned())
        .map_err(|e| Error::Mapping(format!("'{}' is not valid URL-encoded text: {}", value, e)))
}
