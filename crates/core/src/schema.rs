//! Core and namespace schemas.
//!
//! The core table has a fixed layout shared by every archive. Namespaces
//! are declared per archive in the configuration and joined one-to-one to
//! the core record.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::field::FieldType;

/// Name under which the core table is addressed in `disabled_fields`.
pub const CORE_NAMESPACE: &str = "core";

/// Primary key column shared by core and namespace tables.
pub const PRIMARY_KEY: &str = "uuid";

/// Payload key for the tag list.
pub const TAGS_KEY: &str = "tags";

/// Payload key for the source product id list.
pub const SOURCE_PRODUCTS_KEY: &str = "source_products";

static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z_][a-z0-9_]*$").expect("valid regex"));

/// Whether `name` is safe to use unquoted as a SQL identifier fragment.
pub fn is_valid_identifier(name: &str) -> bool {
    name.len() <= 63 && IDENTIFIER_RE.is_match(name)
}

/// One column of a core or namespace table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub optional: bool,
}

/// A schema-defined extension table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceSchema {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

impl NamespaceSchema {
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Static description of a core column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoreField {
    pub name: &'static str,
    pub field_type: FieldType,
    pub optional: bool,
    /// Whether clients may set the value.
    pub writable: bool,
}

const fn core(name: &'static str, field_type: FieldType, optional: bool) -> CoreField {
    CoreField {
        name,
        field_type,
        optional,
        writable: true,
    }
}

const fn read_only(name: &'static str, field_type: FieldType) -> CoreField {
    CoreField {
        name,
        field_type,
        optional: false,
        writable: false,
    }
}

/// Columns of the core table, in rendering order.
pub const CORE_FIELDS: &[CoreField] = &[
    read_only("uuid", FieldType::Uuid),
    core("active", FieldType::Boolean, false),
    core("hash", FieldType::Text, true),
    core("size", FieldType::Long, true),
    read_only("metadata_date", FieldType::Timestamp),
    core("archive_date", FieldType::Timestamp, true),
    core("archive_path", FieldType::Text, true),
    core("product_type", FieldType::Text, false),
    core("product_name", FieldType::Text, false),
    core("physical_name", FieldType::Text, false),
    core("validity_start", FieldType::Timestamp, true),
    core("validity_stop", FieldType::Timestamp, true),
    core("creation_date", FieldType::Timestamp, true),
    core("remote_url", FieldType::Text, true),
    core("footprint", FieldType::Geometry, true),
];

/// Look up a core column by name.
pub fn core_field(name: &str) -> Option<&'static CoreField> {
    CORE_FIELDS.iter().find(|f| f.name == name)
}

/// Core fields with a default on create; they are not required in payloads.
pub const CORE_DEFAULTED: &[&str] = &["active"];

/// Default ordering of product listings.
pub const DEFAULT_ORDERING: &str = "validity_start";

/// Quoted table names of one archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveTables {
    prefix: String,
}

impl ArchiveTables {
    /// `prefix` must already have been validated as an identifier fragment.
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
        }
    }

    pub fn core(&self) -> String {
        self.quoted("core")
    }

    pub fn tag(&self) -> String {
        self.quoted("tag")
    }

    pub fn link(&self) -> String {
        self.quoted("link")
    }

    pub fn namespace(&self, name: &str) -> String {
        self.quoted(name)
    }

    /// Unquoted table name, used to derive constraint names.
    pub fn raw(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    fn quoted(&self, name: &str) -> String {
        format!("\"{}{}\"", self.prefix, name)
    }
}
