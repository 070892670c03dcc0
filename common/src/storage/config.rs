//! Storage configuration types.
//!
//! A [`StorageConfig`] selects the backend behind a table store. It can be
//! loaded from a config file through serde or parsed from a
//! `Key=Value;Key=Value` connection string.

use serde::{Deserialize, Serialize};

use super::{StorageError, StorageResult};

/// Top-level storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum StorageConfig {
    InMemory,
    SlateDb(SlateDbStorageConfig),
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::SlateDb(SlateDbStorageConfig {
            path: "data".to_string(),
            object_store: ObjectStoreConfig::Local(LocalObjectStoreConfig {
                path: ".data".to_string(),
            }),
            settings_path: None,
        })
    }
}

/// SlateDB-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlateDbStorageConfig {
    /// Path prefix for SlateDB data in the object store.
    pub path: String,

    /// Object store provider configuration.
    pub object_store: ObjectStoreConfig,

    /// Optional path to a SlateDB settings file (TOML/YAML/JSON).
    ///
    /// If not provided, uses SlateDB's `Settings::load()`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings_path: Option<String>,
}

impl Default for SlateDbStorageConfig {
    fn default() -> Self {
        Self {
            path: "data".to_string(),
            object_store: ObjectStoreConfig::default(),
            settings_path: None,
        }
    }
}

/// Object store provider configuration for SlateDB.
#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ObjectStoreConfig {
    #[default]
    InMemory,

    Aws(AwsObjectStoreConfig),

    Local(LocalObjectStoreConfig),
}

/// AWS S3 object store configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AwsObjectStoreConfig {
    pub region: String,
    pub bucket: String,
}

/// Local filesystem object store configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocalObjectStoreConfig {
    pub path: String,
}

impl StorageConfig {
    /// Parses a connection string of `Key=Value` pairs separated by `;`.
    ///
    /// Recognized forms:
    ///
    /// ```text
    /// UseDevelopmentStorage=true
    /// Type=InMemory
    /// Type=SlateDb;Path=logs;ObjectStore=Local;LocalPath=/var/lib/logs
    /// Type=SlateDb;Path=logs;ObjectStore=Aws;Region=eu-west-1;Bucket=my-logs
    /// ```
    ///
    /// Keys and type names are case-insensitive. `Path` defaults to `data`
    /// and `ObjectStore` to `InMemory`.
    pub fn from_connection_string(connection_string: &str) -> StorageResult<Self> {
        let pairs = ConnectionPairs::parse(connection_string)?;

        if let Some(dev) = pairs.get("usedevelopmentstorage") {
            if dev.eq_ignore_ascii_case("true") {
                return Ok(StorageConfig::InMemory);
            }
        }

        let kind = pairs.require("type")?;
        if kind.eq_ignore_ascii_case("inmemory") {
            return Ok(StorageConfig::InMemory);
        }
        if !kind.eq_ignore_ascii_case("slatedb") {
            return Err(config_error(format!("unknown storage type '{}'", kind)));
        }

        let object_store = match pairs.get("objectstore") {
            None => ObjectStoreConfig::InMemory,
            Some(v) if v.eq_ignore_ascii_case("inmemory") => ObjectStoreConfig::InMemory,
            Some(v) if v.eq_ignore_ascii_case("local") => {
                ObjectStoreConfig::Local(LocalObjectStoreConfig {
                    path: pairs.require("localpath")?.to_string(),
                })
            }
            Some(v) if v.eq_ignore_ascii_case("aws") => {
                ObjectStoreConfig::Aws(AwsObjectStoreConfig {
                    region: pairs.require("region")?.to_string(),
                    bucket: pairs.require("bucket")?.to_string(),
                })
            }
            Some(v) => return Err(config_error(format!("unknown object store '{}'", v))),
        };

        Ok(StorageConfig::SlateDb(SlateDbStorageConfig {
            path: pairs.get("path").unwrap_or("data").to_string(),
            object_store,
            settings_path: pairs.get("settingspath").map(str::to_string),
        }))
    }
}

fn config_error(message: String) -> StorageError {
    StorageError::Storage(format!("invalid connection string: {}", message))
}

/// Lower-cased keys with their values, in input order.
struct ConnectionPairs<'a> {
    pairs: Vec<(String, &'a str)>,
}

impl<'a> ConnectionPairs<'a> {
    fn parse(input: &'a str) -> StorageResult<Self> {
        let mut pairs = Vec::new();
        for segment in input.split(';') {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            let (key, value) = segment
                .split_once('=')
                .ok_or_else(|| config_error(format!("segment '{}' is not Key=Value", segment)))?;
            pairs.push((key.trim().to_ascii_lowercase(), value.trim()));
        }
        Ok(Self { pairs })
    }

    fn get(&self, key: &str) -> Option<&'a str> {
        self.pairs
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| *v)
            .filter(|v| !v.is_empty())
    }

    fn require(&self, key: &str) -> StorageResult<&'a str> {
        self.get(key)
            .ok_or_else(|| config_error(format!("missing '{}'", key)))
    }
}
