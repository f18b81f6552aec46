//! Serializer shapes.
//!
//! A shape is the resolved field set of one serializer mode of one archive:
//! which core fields are visible, whether tags and source products are
//! included, and which namespaces (with which of their fields) are nested.
//! Shapes render stored rows to JSON and split incoming nested payloads
//! into per-relation values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::config::ArchiveConfig;
use crate::error::CoreError;
use crate::field::{FieldType, FieldValue};
use crate::schema::{
    CoreField, FieldDef, CORE_DEFAULTED, CORE_FIELDS, CORE_NAMESPACE, SOURCE_PRODUCTS_KEY,
    TAGS_KEY,
};

/// Starting point of a serializer profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SerializerBase {
    /// Core fields only.
    Core,
    /// Core fields, tags, writable source products and namespaces.
    Complete,
}

/// Configured serializer for one mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializerProfile {
    pub base: SerializerBase,
    /// Namespaces to nest. Defaults to none for `core` and all for `complete`.
    #[serde(default)]
    pub namespaces: Option<Vec<String>>,
    /// Core fields, `tags` or `source_products` to leave out.
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl SerializerProfile {
    pub fn of(base: SerializerBase) -> Self {
        Self {
            base,
            namespaces: None,
            exclude: Vec::new(),
        }
    }
}

/// How a payload is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// POST: required fields must be present.
    Create,
    /// PUT: required fields must be present.
    Replace,
    /// PATCH: every field is optional.
    Partial,
}

/// A nested namespace within a shape.
#[derive(Debug, Clone, PartialEq)]
pub struct NamespaceShape {
    pub name: String,
    /// Visible fields, in schema order.
    pub fields: Vec<FieldDef>,
}

impl NamespaceShape {
    /// Required fields absent from `values`.
    pub fn missing_required(&self, values: &BTreeMap<String, FieldValue>) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| !f.optional && !values.contains_key(&f.name))
            .map(|f| f.name.clone())
            .collect()
    }
}

/// Nested payload split into per-relation values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductInput {
    pub core: BTreeMap<String, FieldValue>,
    /// `None` when the payload did not mention tags.
    pub tags: Option<Vec<String>>,
    /// `None` when the payload did not mention source products.
    pub source_products: Option<Vec<Uuid>>,
    pub namespaces: BTreeMap<String, BTreeMap<String, FieldValue>>,
}

/// Resolved serializer of one archive mode.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductShape {
    pub archive: String,
    pub name: String,
    pub core_fields: Vec<&'static CoreField>,
    pub tags: bool,
    pub source_products: bool,
    pub namespaces: Vec<NamespaceShape>,
    archive_namespaces: Vec<String>,
}

impl ProductShape {
    /// Resolve `profile` against the archive configuration.
    pub fn build(
        archive: &str,
        config: &ArchiveConfig,
        name: &str,
        profile: &SerializerProfile,
    ) -> Self {
        let excluded = |field: &str| {
            profile.exclude.iter().any(|e| e == field)
                || config.disabled_fields(CORE_NAMESPACE).iter().any(|e| e == field)
        };

        let core_fields = CORE_FIELDS.iter().filter(|f| !excluded(f.name)).collect();
        let complete = profile.base == SerializerBase::Complete;

        let namespace_names: Vec<&str> = match (&profile.namespaces, complete) {
            (Some(listed), _) => listed.iter().map(String::as_str).collect(),
            (None, true) => config.namespace_names().collect(),
            (None, false) => Vec::new(),
        };

        let namespaces = namespace_names
            .into_iter()
            .filter_map(|ns| config.namespace(ns))
            .map(|schema| {
                let disabled = config.disabled_fields(&schema.name);
                NamespaceShape {
                    name: schema.name.clone(),
                    fields: schema
                        .fields
                        .iter()
                        .filter(|f| !disabled.contains(&f.name))
                        .cloned()
                        .collect(),
                }
            })
            .collect();

        Self {
            archive: archive.to_string(),
            name: name.to_string(),
            core_fields,
            tags: complete && !profile.exclude.iter().any(|e| e == TAGS_KEY),
            source_products: complete && !profile.exclude.iter().any(|e| e == SOURCE_PRODUCTS_KEY),
            namespaces,
            archive_namespaces: config.namespace_names().map(str::to_string).collect(),
        }
    }

    pub fn namespace(&self, name: &str) -> Option<&NamespaceShape> {
        self.namespaces.iter().find(|ns| ns.name == name)
    }

    pub fn namespace_names(&self) -> impl Iterator<Item = &str> {
        self.namespaces.iter().map(|ns| ns.name.as_str())
    }

    /// Render one product.
    ///
    /// `core` is the stored core row as a JSON object; `namespaces` holds the
    /// stored namespace rows by name (absent rows render as `null`).
    pub fn render(
        &self,
        core: &Map<String, Value>,
        tags: &[String],
        source_products: &[Uuid],
        namespaces: &BTreeMap<String, Map<String, Value>>,
    ) -> Value {
        let mut out = Map::new();

        for field in &self.core_fields {
            out.insert(
                field.name.to_string(),
                core.get(field.name).cloned().unwrap_or(Value::Null),
            );
        }

        for ns in &self.namespaces {
            let value = match namespaces.get(&ns.name) {
                Some(row) => Value::Object(
                    ns.fields
                        .iter()
                        .map(|f| {
                            (
                                f.name.clone(),
                                row.get(&f.name).cloned().unwrap_or(Value::Null),
                            )
                        })
                        .collect(),
                ),
                None => Value::Null,
            };
            out.insert(ns.name.clone(), value);
        }

        if self.tags {
            out.insert(
                TAGS_KEY.to_string(),
                Value::Array(tags.iter().cloned().map(Value::String).collect()),
            );
        }
        if self.source_products {
            out.insert(
                SOURCE_PRODUCTS_KEY.to_string(),
                Value::Array(
                    source_products
                        .iter()
                        .map(|id| Value::String(id.to_string()))
                        .collect(),
                ),
            );
        }

        Value::Object(out)
    }

    /// Split a nested payload into core values, tags, source ids and
    /// namespace values.
    ///
    /// Read-only, hidden and unknown keys are ignored. Naming an archive
    /// namespace that this shape does not nest is a bad request.
    pub fn parse_input(&self, payload: &Value, mode: WriteMode) -> Result<ProductInput, CoreError> {
        let Value::Object(obj) = payload else {
            return Err(CoreError::Validation(format!(
                "Invalid data. Expected a dictionary, but got {}.",
                json_type_name(payload)
            )));
        };

        let mut errors = FieldErrors::default();
        let mut input = ProductInput::default();

        for field in self.core_fields.iter().filter(|f| f.writable) {
            match obj.get(field.name) {
                Some(value) => match field.field_type.decode_json(value, field.optional) {
                    Ok(decoded) => {
                        input.core.insert(field.name.to_string(), decoded);
                    }
                    Err(msg) => errors.push(field.name, msg),
                },
                None if mode != WriteMode::Partial
                    && !field.optional
                    && !CORE_DEFAULTED.contains(&field.name) =>
                {
                    errors.push(field.name, "This field is required.");
                }
                None => {}
            }
        }

        if self.tags {
            if let Some(value) = obj.get(TAGS_KEY) {
                match parse_tag_list(value) {
                    Ok(tags) => input.tags = Some(tags),
                    Err(msg) => errors.push(TAGS_KEY, msg),
                }
            }
        }

        if self.source_products {
            if let Some(value) = obj.get(SOURCE_PRODUCTS_KEY) {
                match parse_source_list(value) {
                    Ok(ids) => input.source_products = Some(ids),
                    Err(msg) => errors.push(SOURCE_PRODUCTS_KEY, msg),
                }
            }
        }

        for name in &self.archive_namespaces {
            let Some(value) = obj.get(name) else {
                continue;
            };
            let Some(ns) = self.namespace(name) else {
                if is_empty_payload(value) {
                    continue;
                }
                return Err(CoreError::BadRequest(format!(
                    "namespace '{name}' provided to an endpoint that does not accept it"
                )));
            };
            let Value::Object(ns_obj) = value else {
                errors.push(
                    name,
                    format!(
                        "Invalid data. Expected a dictionary, but got {}.",
                        json_type_name(value)
                    ),
                );
                continue;
            };

            let mut values = BTreeMap::new();
            for field in &ns.fields {
                let path = format!("{name}.{}", field.name);
                match ns_obj.get(&field.name) {
                    Some(v) => match field.field_type.decode_json(v, field.optional) {
                        Ok(decoded) => {
                            values.insert(field.name.clone(), decoded);
                        }
                        Err(msg) => errors.push(&path, msg),
                    },
                    None if mode != WriteMode::Partial && !field.optional => {
                        errors.push(&path, "This field is required.");
                    }
                    None => {}
                }
            }
            input.namespaces.insert(name.clone(), values);
        }

        errors.into_result()?;
        Ok(input)
    }

    /// Decode the body of the `tag` / `untag` actions.
    pub fn parse_tags_body(&self, body: &Value) -> Result<Vec<String>, CoreError> {
        if !self.tags {
            return Err(CoreError::BadRequest(
                "tags are not writable through this endpoint".into(),
            ));
        }
        parse_tag_list(body).map_err(|msg| CoreError::Validation(format!("{TAGS_KEY}: {msg}")))
    }

    /// Decode the body of the `link` / `unlink` actions.
    pub fn parse_source_products_body(&self, body: &Value) -> Result<Vec<Uuid>, CoreError> {
        if !self.source_products {
            return Err(CoreError::BadRequest(
                "source products are not writable through this endpoint".into(),
            ));
        }
        parse_source_list(body)
            .map_err(|msg| CoreError::Validation(format!("{SOURCE_PRODUCTS_KEY}: {msg}")))
    }
}

/// A namespace key with an empty object or `null` carries no data.
fn is_empty_payload(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(obj) => obj.is_empty(),
        _ => false,
    }
}

fn parse_tag_list(value: &Value) -> Result<Vec<String>, String> {
    let Value::Array(items) = value else {
        return Err(format!(
            "Expected a list of items but got type \"{}\".",
            json_type_name(value)
        ));
    };
    items
        .iter()
        .map(|item| match FieldType::Text.decode_json(item, false)? {
            FieldValue::Text(tag) => Ok(tag),
            _ => Err("Not a valid string.".to_string()),
        })
        .collect()
}

fn parse_source_list(value: &Value) -> Result<Vec<Uuid>, String> {
    let Value::Array(items) = value else {
        return Err(format!(
            "Expected a list of items but got type \"{}\".",
            json_type_name(value)
        ));
    };
    items
        .iter()
        .map(|item| match item {
            Value::String(s) => {
                Uuid::parse_str(s).map_err(|_| format!("\u{201c}{s}\u{201d} is not a valid UUID."))
            }
            other => Err(format!(
                "Incorrect type. Expected pk value, received {}.",
                json_type_name(other)
            )),
        })
        .collect()
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

/// Field errors collected over a whole payload.
#[derive(Default)]
struct FieldErrors(Vec<(String, String)>);

impl FieldErrors {
    fn push(&mut self, field: &str, message: impl Into<String>) {
        self.0.push((field.to_string(), message.into()));
    }

    fn into_result(self) -> Result<(), CoreError> {
        if self.0.is_empty() {
            return Ok(());
        }
        let message = self
            .0
            .iter()
            .map(|(field, msg)| format!("{field}: {msg}"))
            .collect::<Vec<_>>()
            .join("; ");
        Err(CoreError::Validation(message))
    }
}
