//! Field types and their codecs.
//!
//! Every column of an archive (core or namespace) has one of the schema
//! types below. This module is the single mapping table from a type to its
//! SQL column type, the filter lookups it supports, and how JSON payload
//! values and query-string values decode into a typed [`FieldValue`].

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::datetime::{self, ACCEPTED_FORMATS_HINT};
use crate::types::Timestamp;

/// Schema type of a field, named as in archive schema descriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Long,
    Integer,
    Real,
    Boolean,
    Text,
    Timestamp,
    Uuid,
    Geometry,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Long => "long",
            Self::Integer => "integer",
            Self::Real => "real",
            Self::Boolean => "boolean",
            Self::Text => "text",
            Self::Timestamp => "timestamp",
            Self::Uuid => "uuid",
            Self::Geometry => "geometry",
        }
    }

    /// PostgreSQL column type. Geometry depends on whether PostGIS is used.
    pub fn sql_type(&self, spatial: bool) -> &'static str {
        match self {
            Self::Long => "bigint",
            Self::Integer => "integer",
            Self::Real => "double precision",
            Self::Boolean => "boolean",
            Self::Text => "text",
            Self::Timestamp => "timestamp",
            Self::Uuid => "uuid",
            Self::Geometry if spatial => "geography",
            Self::Geometry => "jsonb",
        }
    }

    /// Filter lookups that apply to this type.
    ///
    /// Geometry fields are not filterable at all: spatial predicates on
    /// `geography` columns are not portable across backends.
    pub fn lookups(&self) -> &'static [Lookup] {
        use Lookup::*;
        match self {
            Self::Long | Self::Integer | Self::Real => {
                &[Exact, Ne, In, Range, Gt, Gte, Lt, Lte, Isnull]
            }
            Self::Boolean => &[Exact, Ne, In, Isnull],
            Self::Text => &[
                Exact, Iexact, Ne, Contains, Icontains, Startswith, Istartswith, Endswith,
                Iendswith, In, Range, Gt, Gte, Lt, Lte, Isnull, Regex, Iregex,
            ],
            Self::Timestamp => &[
                Exact, Ne, In, Range, Gt, Gte, Lt, Lte, Isnull, Year, Month, Day, Date,
            ],
            Self::Uuid => &[Exact, Ne, In, Isnull],
            Self::Geometry => &[],
        }
    }

    /// Decode a JSON payload value.
    ///
    /// `null` is accepted only for optional fields. Blank strings are
    /// rejected for required text fields.
    pub fn decode_json(&self, value: &Value, optional: bool) -> Result<FieldValue, String> {
        if value.is_null() {
            return if optional {
                Ok(FieldValue::Null(*self))
            } else {
                Err("This field may not be null.".into())
            };
        }

        match self {
            Self::Long => json_integer(value).map(FieldValue::Long),
            Self::Integer => json_integer(value).and_then(|v| {
                i32::try_from(v)
                    .map(FieldValue::Integer)
                    .map_err(|_| "Ensure this value fits in a 32-bit integer.".to_string())
            }),
            Self::Real => match value {
                Value::Number(n) => n
                    .as_f64()
                    .map(FieldValue::Real)
                    .ok_or_else(|| "A valid number is required.".to_string()),
                Value::String(s) => parse_real(s).map(FieldValue::Real),
                _ => Err("A valid number is required.".into()),
            },
            Self::Boolean => match value {
                Value::Bool(b) => Ok(FieldValue::Boolean(*b)),
                Value::Number(n) if n.as_i64() == Some(1) => Ok(FieldValue::Boolean(true)),
                Value::Number(n) if n.as_i64() == Some(0) => Ok(FieldValue::Boolean(false)),
                Value::String(s) => parse_bool(s).map(FieldValue::Boolean),
                _ => Err("Must be a valid boolean.".into()),
            },
            Self::Text => {
                let text = match value {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    _ => return Err("Not a valid string.".into()),
                };
                if text.is_empty() && !optional {
                    return Err("This field may not be blank.".into());
                }
                Ok(FieldValue::Text(text))
            }
            Self::Timestamp => match value {
                Value::String(s) => parse_timestamp(s).map(FieldValue::Timestamp),
                _ => Err(timestamp_error()),
            },
            Self::Uuid => match value {
                Value::String(s) => parse_uuid(s).map(FieldValue::Uuid),
                _ => Err("Must be a valid UUID.".into()),
            },
            Self::Geometry => match value {
                Value::Object(obj) if obj.contains_key("type") => {
                    Ok(FieldValue::Geometry(value.clone()))
                }
                Value::String(s) => match serde_json::from_str::<Value>(s) {
                    Ok(parsed @ Value::Object(_)) if parsed.get("type").is_some() => {
                        Ok(FieldValue::Geometry(parsed))
                    }
                    _ => Err("Invalid format: string is not a GeoJSON geometry.".into()),
                },
                _ => Err("Invalid format: value is not a GeoJSON geometry.".into()),
            },
        }
    }

    /// Decode a single query-string value for a filter.
    pub fn parse_query(&self, text: &str) -> Result<FieldValue, String> {
        match self {
            Self::Long => text
                .trim()
                .parse::<i64>()
                .map(FieldValue::Long)
                .map_err(|_| "Enter a whole number.".to_string()),
            Self::Integer => text
                .trim()
                .parse::<i32>()
                .map(FieldValue::Integer)
                .map_err(|_| "Enter a whole number.".to_string()),
            Self::Real => parse_real(text).map(FieldValue::Real),
            Self::Boolean => parse_bool(text).map(FieldValue::Boolean),
            Self::Text => Ok(FieldValue::Text(text.to_string())),
            Self::Timestamp => parse_timestamp(text).map(FieldValue::Timestamp),
            Self::Uuid => parse_uuid(text).map(FieldValue::Uuid),
            Self::Geometry => Err("Geometry fields cannot be filtered.".into()),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed value ready to be bound to a query.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Long(i64),
    Integer(i32),
    Real(f64),
    Boolean(bool),
    Text(String),
    Timestamp(Timestamp),
    Uuid(Uuid),
    /// GeoJSON geometry object.
    Geometry(Value),
    /// SQL `NULL` of the given type.
    Null(FieldType),
}

/// Filter lookup, the suffix after `__` in a filter parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lookup {
    Exact,
    Iexact,
    Ne,
    Contains,
    Icontains,
    Startswith,
    Istartswith,
    Endswith,
    Iendswith,
    In,
    Range,
    Gt,
    Gte,
    Lt,
    Lte,
    Isnull,
    Regex,
    Iregex,
    Year,
    Month,
    Day,
    Date,
}

impl Lookup {
    pub const ALL: &'static [Lookup] = &[
        Self::Exact,
        Self::Iexact,
        Self::Ne,
        Self::Contains,
        Self::Icontains,
        Self::Startswith,
        Self::Istartswith,
        Self::Endswith,
        Self::Iendswith,
        Self::In,
        Self::Range,
        Self::Gt,
        Self::Gte,
        Self::Lt,
        Self::Lte,
        Self::Isnull,
        Self::Regex,
        Self::Iregex,
        Self::Year,
        Self::Month,
        Self::Day,
        Self::Date,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Iexact => "iexact",
            Self::Ne => "ne",
            Self::Contains => "contains",
            Self::Icontains => "icontains",
            Self::Startswith => "startswith",
            Self::Istartswith => "istartswith",
            Self::Endswith => "endswith",
            Self::Iendswith => "iendswith",
            Self::In => "in",
            Self::Range => "range",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Isnull => "isnull",
            Self::Regex => "regex",
            Self::Iregex => "iregex",
            Self::Year => "year",
            Self::Month => "month",
            Self::Day => "day",
            Self::Date => "date",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|l| l.as_str() == name)
    }
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn json_integer(value: &Value) -> Result<i64, String> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .ok_or_else(|| "A valid integer is required.".to_string()),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| "A valid integer is required.".to_string()),
        _ => Err("A valid integer is required.".into()),
    }
}

fn parse_real(text: &str) -> Result<f64, String> {
    text.trim()
        .parse::<f64>()
        .map_err(|_| "A valid number is required.".to_string())
}

fn parse_bool(text: &str) -> Result<bool, String> {
    match text.trim() {
        "true" | "True" | "TRUE" | "1" | "yes" | "on" => Ok(true),
        "false" | "False" | "FALSE" | "0" | "no" | "off" => Ok(false),
        _ => Err("Must be a valid boolean.".into()),
    }
}

fn parse_timestamp(text: &str) -> Result<Timestamp, String> {
    datetime::parse_naive_datetime(text).ok_or_else(timestamp_error)
}

fn timestamp_error() -> String {
    format!("Datetime has wrong format. Use one of these formats instead: {ACCEPTED_FORMATS_HINT}.")
}

fn parse_uuid(text: &str) -> Result<Uuid, String> {
    Uuid::parse_str(text.trim()).map_err(|_| "Must be a valid UUID.".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_only_for_optional() {
        assert_eq!(
            FieldType::Text.decode_json(&Value::Null, true),
            Ok(FieldValue::Null(FieldType::Text))
        );
        assert!(FieldType::Text.decode_json(&Value::Null, false).is_err());
    }

    #[test]
    fn integers_accept_numeric_strings() {
        assert_eq!(
            FieldType::Long.decode_json(&json!("42"), false),
            Ok(FieldValue::Long(42))
        );
        assert_eq!(
            FieldType::Long.decode_json(&json!(7.0), false),
            Ok(FieldValue::Long(7))
        );
        assert!(FieldType::Long.decode_json(&json!(7.5), false).is_err());
        assert!(FieldType::Integer
            .decode_json(&json!(i64::MAX), false)
            .is_err());
    }

    #[test]
    fn booleans() {
        assert_eq!(
            FieldType::Boolean.decode_json(&json!("false"), false),
            Ok(FieldValue::Boolean(false))
        );
        assert_eq!(
            FieldType::Boolean.decode_json(&json!(1), false),
            Ok(FieldValue::Boolean(true))
        );
        assert!(FieldType::Boolean.decode_json(&json!("maybe"), false).is_err());
    }

    #[test]
    fn blank_text_requires_optional() {
        assert!(FieldType::Text.decode_json(&json!(""), false).is_err());
        assert_eq!(
            FieldType::Text.decode_json(&json!(""), true),
            Ok(FieldValue::Text(String::new()))
        );
    }

    #[test]
    fn timestamps_use_naive_parser() {
        let a = FieldType::Timestamp
            .decode_json(&json!("2020-01-01T00:00:00"), false)
            .unwrap();
        let b = FieldType::Timestamp
            .decode_json(&json!("20200101T000000"), false)
            .unwrap();
        assert_eq!(a, b);
        assert!(FieldType::Timestamp
            .decode_json(&json!("not-a-date"), false)
            .is_err());
    }

    #[test]
    fn geometry_accepts_geojson() {
        let point = json!({"type": "Point", "coordinates": [5.0, 52.0]});
        assert_eq!(
            FieldType::Geometry.decode_json(&point, true),
            Ok(FieldValue::Geometry(point.clone()))
        );
        assert_eq!(
            FieldType::Geometry.decode_json(&json!(point.to_string()), true),
            Ok(FieldValue::Geometry(point))
        );
        assert!(FieldType::Geometry
            .decode_json(&json!("POINT(5 52)"), true)
            .is_err());
    }

    #[test]
    fn geometry_is_not_filterable() {
        assert!(FieldType::Geometry.lookups().is_empty());
        assert!(FieldType::Geometry.parse_query("x").is_err());
    }

    #[test]
    fn lookup_names_roundtrip() {
        for lookup in Lookup::ALL {
            assert_eq!(Lookup::from_name(lookup.as_str()), Some(*lookup));
        }
        assert_eq!(Lookup::from_name("bogus"), None);
    }

    #[test]
    fn sql_types() {
        assert_eq!(FieldType::Geometry.sql_type(true), "geography");
        assert_eq!(FieldType::Geometry.sql_type(false), "jsonb");
        assert_eq!(FieldType::Long.sql_type(true), "bigint");
    }
}
