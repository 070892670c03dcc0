//! Configuration for a [`TableLog`](crate::TableLog).
//!
//! A config names the backing store, the table, and which record fields
//! become the partition key and row key. It can be deserialized from YAML
//! or built from the positional construction arguments
//! `[connection_string, table_name, partition_key_field, row_key_field?]`.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Configuration for opening a [`TableLog`](crate::TableLog).
///
/// # Example
///
/// ```ignore
/// use table_log::{Config, TableLog};
///
/// let config = Config::from_args(&["UseDevelopmentStorage=true", "requestlogs", "LogName"])?;
/// let log = TableLog::open(config).await?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Store connection string, see
    /// [`StorageConfig::from_connection_string`](common::StorageConfig::from_connection_string).
    pub connection_string: String,

    /// Name of the table rows are written to.
    pub table_name: String,

    /// Record field whose value becomes the partition key.
    pub partition_key_field: String,

    /// Record field whose value becomes the row key.
    ///
    /// When `None`, row keys are generated from the current time so that
    /// newer rows sort first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_key_field: Option<String>,

    /// Collision retry behavior for inserts.
    #[serde(default)]
    pub retry: RetryConfig,

    /// What projection does with fields of unsupported types.
    #[serde(default)]
    pub unsupported_fields: UnsupportedFieldPolicy,
}

impl Config {
    /// Builds a config from positional arguments.
    ///
    /// At least three arguments are required. A fourth, non-empty argument
    /// names the row-key field; anything past the fourth is ignored.
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> Result<Self> {
        if args.len() < 3 {
            return Err(Error::Config(format!(
                "expected at least 3 arguments (connection string, table name, partition key field), got {}",
                args.len()
            )));
        }
        let row_key_field = args
            .get(3)
            .map(|s| s.as_ref().to_string())
            .filter(|s| !s.is_empty());
        let config = Self {
            connection_string: args[0].as_ref().to_string(),
            table_name: args[1].as_ref().to_string(),
            partition_key_field: args[2].as_ref().to_string(),
            row_key_field,
            retry: RetryConfig::default(),
            unsupported_fields: UnsupportedFieldPolicy::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks that every mandatory value is present.
    pub fn validate(&self) -> Result<()> {
        let mandatory = [
            ("connection_string", &self.connection_string),
            ("table_name", &self.table_name),
            ("partition_key_field", &self.partition_key_field),
        ];
        for (name, value) in mandatory {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("{} must not be empty", name)));
            }
        }
        self.retry.validate()
    }

    /// The row-key field name, treating an empty name as absent.
    pub fn row_key_field(&self) -> Option<&str> {
        self.row_key_field.as_deref().filter(|s| !s.is_empty())
    }
}

/// Collision retry settings for inserts.
///
/// On a conflict the row key, if numeric, is bumped by one for the first
/// `linear_attempts` retries and by a random offset in
/// `[jitter_min, jitter_max)` afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total insert attempts, including the first.
    pub max_attempts: u32,

    /// Number of retries that bump the row key by exactly one.
    pub linear_attempts: u32,

    /// Inclusive lower bound of the random bump.
    pub jitter_min: i64,

    /// Exclusive upper bound of the random bump.
    pub jitter_max: i64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            linear_attempts: 2,
            jitter_min: 2,
            jitter_max: 10,
        }
    }
}

impl RetryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::Config("retry.max_attempts must be at least 1".into()));
        }
        if self.jitter_min < 1 || self.jitter_max <= self.jitter_min {
            return Err(Error::Config(format!(
                "retry jitter range [{}, {}) must be non-empty and positive",
                self.jitter_min, self.jitter_max
            )));
        }
        Ok(())
    }
}

/// Handling of record fields whose type has no column representation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnsupportedFieldPolicy {
    /// Leave the field out of the row.
    #[default]
    Drop,
    /// Fail the projection with a mapping error.
    Error,
    /// Store the field's text form as a string column.
    Stringify,
}
