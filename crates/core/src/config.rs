//! Archive configuration.
//!
//! A single TOML document describes every archive served by the API:
//!
//! ```toml
//! [pagination]
//! page_size = 100
//! max_page_size = 1000
//!
//! [archives.demo]
//! table_prefix = "demo_"
//! root = "/srv/archives/demo"
//! disabled_lookups = ["regex", "iregex"]
//!
//! [archives.demo.disabled_fields]
//! core = ["remote_url"]
//!
//! [[archives.demo.namespaces]]
//! name = "mynamespace"
//! fields = [
//!     { name = "counter", type = "long" },
//!     { name = "note", type = "text", optional = true },
//! ]
//!
//! [archives.demo.serializers.default]
//! base = "core"
//! ```
//!
//! Defaults are merged exactly once, when the document is loaded.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::pagination::PaginationConfig;
use crate::schema::{
    is_valid_identifier, NamespaceSchema, CORE_NAMESPACE, PRIMARY_KEY, SOURCE_PRODUCTS_KEY,
    TAGS_KEY,
};
use crate::shape::{SerializerBase, SerializerProfile};

/// Mode used for GET requests without a `mode` parameter.
pub const DEFAULT_MODE: &str = "default";

/// Mode that always renders the complete record.
pub const EXTENDED_MODE: &str = "extended";

/// Optional serializer key overriding the shape used for writes.
pub const WRITE_PROFILE: &str = "write";

/// Top-level paths served by the API itself.
pub const RESERVED_ARCHIVE_NAMES: &[&str] = &["health", "schema"];

/// Errors raised while loading or validating the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config for archive '{archive}': {message}")]
    Invalid { archive: String, message: String },
}

/// Top-level configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MuninnConfig {
    #[serde(default)]
    pub pagination: PaginationConfig,
    #[serde(default)]
    pub archives: BTreeMap<String, ArchiveConfig>,
}

/// Settings of one archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Prefix of every table name of the archive.
    #[serde(default)]
    pub table_prefix: String,
    /// Root directory of the archived product files. Without it, deleting a
    /// product never touches the filesystem.
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default)]
    pub namespaces: Vec<NamespaceSchema>,
    /// Fields hidden from serialization, per namespace (`core` included).
    #[serde(default)]
    pub disabled_fields: BTreeMap<String, Vec<String>>,
    /// Lookups removed from every filter.
    #[serde(default)]
    pub disabled_lookups: Vec<String>,
    /// Serializer profiles by mode name.
    #[serde(default)]
    pub serializers: BTreeMap<String, SerializerProfile>,
    /// Reject every non-safe method.
    #[serde(default)]
    pub read_only: bool,
    /// Store geometries as PostGIS `geography` (otherwise as GeoJSON `jsonb`).
    #[serde(default = "default_true")]
    pub spatial: bool,
    /// Create missing tables at startup.
    #[serde(default)]
    pub managed: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            table_prefix: String::new(),
            root: None,
            namespaces: Vec::new(),
            disabled_fields: BTreeMap::new(),
            disabled_lookups: Vec::new(),
            serializers: BTreeMap::new(),
            read_only: false,
            spatial: true,
            managed: false,
        }
    }
}

impl MuninnConfig {
    /// Read, parse, default and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse, default and validate a configuration document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let mut config: MuninnConfig = toml::from_str(content)?;
        config.apply_defaults();
        config.validate()?;
        Ok(config)
    }

    /// Give every archive without serializer profiles the stock
    /// `default` (core) and `extended` (complete) modes.
    pub fn apply_defaults(&mut self) {
        for archive in self.archives.values_mut() {
            archive.apply_defaults();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, archive) in &self.archives {
            archive.validate(name)?;
        }
        Ok(())
    }
}

impl ArchiveConfig {
    pub fn apply_defaults(&mut self) {
        if self.serializers.is_empty() {
            self.serializers = default_serializers();
        }
    }

    pub fn namespace(&self, name: &str) -> Option<&NamespaceSchema> {
        self.namespaces.iter().find(|ns| ns.name == name)
    }

    pub fn namespace_names(&self) -> impl Iterator<Item = &str> {
        self.namespaces.iter().map(|ns| ns.name.as_str())
    }

    pub fn disabled_fields(&self, namespace: &str) -> &[String] {
        self.disabled_fields
            .get(namespace)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn validate(&self, archive: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::Invalid {
            archive: archive.to_string(),
            message,
        };

        if !is_valid_identifier(archive) {
            return Err(invalid(format!("archive name '{archive}' is not a valid identifier")));
        }
        if RESERVED_ARCHIVE_NAMES.contains(&archive) {
            return Err(invalid(format!("archive name '{archive}' is reserved")));
        }
        if !self.table_prefix.is_empty() && !is_valid_identifier(&self.table_prefix) {
            return Err(invalid(format!(
                "table_prefix '{}' is not a valid identifier",
                self.table_prefix
            )));
        }

        let mut seen = HashSet::new();
        for ns in &self.namespaces {
            if !is_valid_identifier(&ns.name) {
                return Err(invalid(format!("namespace '{}' is not a valid identifier", ns.name)));
            }
            if matches!(ns.name.as_str(), CORE_NAMESPACE | "tag" | "link" | TAGS_KEY | SOURCE_PRODUCTS_KEY)
            {
                return Err(invalid(format!("namespace name '{}' is reserved", ns.name)));
            }
            if !seen.insert(ns.name.as_str()) {
                return Err(invalid(format!("namespace '{}' is declared twice", ns.name)));
            }

            let mut fields = HashSet::new();
            for field in &ns.fields {
                if !is_valid_identifier(&field.name) {
                    return Err(invalid(format!(
                        "field '{}.{}' is not a valid identifier",
                        ns.name, field.name
                    )));
                }
                if field.name == PRIMARY_KEY {
                    return Err(invalid(format!(
                        "field '{}.{}' clashes with the primary key",
                        ns.name, field.name
                    )));
                }
                if !fields.insert(field.name.as_str()) {
                    return Err(invalid(format!(
                        "field '{}.{}' is declared twice",
                        ns.name, field.name
                    )));
                }
            }
        }

        for ns in self.disabled_fields.keys() {
            if ns != CORE_NAMESPACE && self.namespace(ns).is_none() {
                return Err(invalid(format!(
                    "disabled_fields names unknown namespace '{ns}'"
                )));
            }
        }

        for lookup in &self.disabled_lookups {
            if crate::field::Lookup::from_name(lookup).is_none() {
                return Err(invalid(format!("unknown lookup '{lookup}' in disabled_lookups")));
            }
        }

        if self.serializers.is_empty() {
            return Err(invalid("no serializer profiles configured".into()));
        }
        for (mode, profile) in &self.serializers {
            for ns in profile.namespaces.iter().flatten() {
                if self.namespace(ns).is_none() {
                    return Err(invalid(format!(
                        "serializer '{mode}' names unknown namespace '{ns}'"
                    )));
                }
            }
        }

        Ok(())
    }
}

/// The stock serializer profiles.
pub fn default_serializers() -> BTreeMap<String, SerializerProfile> {
    BTreeMap::from([
        (
            DEFAULT_MODE.to_string(),
            SerializerProfile::of(SerializerBase::Core),
        ),
        (
            EXTENDED_MODE.to_string(),
            SerializerProfile::of(SerializerBase::Complete),
        ),
    ])
}
