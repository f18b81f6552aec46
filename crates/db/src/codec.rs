//! Decoding of schema-defined columns into JSON values.

use muninn_core::datetime::format_naive_datetime;
use muninn_core::field::FieldType;
use muninn_core::types::Timestamp;
use serde_json::{Map, Number, Value};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::Row;
use uuid::Uuid;

/// Read column `name` of `row` as the JSON value rendered to clients.
pub fn decode_column(row: &PgRow, name: &str, field_type: FieldType) -> Result<Value, sqlx::Error> {
    let value = match field_type {
        FieldType::Long => row.try_get::<Option<i64>, _>(name)?.map(Value::from),
        FieldType::Integer => row.try_get::<Option<i32>, _>(name)?.map(Value::from),
        FieldType::Real => row
            .try_get::<Option<f64>, _>(name)?
            .and_then(Number::from_f64)
            .map(Value::Number),
        FieldType::Boolean => row.try_get::<Option<bool>, _>(name)?.map(Value::Bool),
        FieldType::Text => row.try_get::<Option<String>, _>(name)?.map(Value::String),
        FieldType::Timestamp => row
            .try_get::<Option<Timestamp>, _>(name)?
            .map(|ts| Value::String(format_naive_datetime(&ts))),
        FieldType::Uuid => row
            .try_get::<Option<Uuid>, _>(name)?
            .map(|id| Value::String(id.to_string())),
        FieldType::Geometry => row
            .try_get::<Option<Json<Value>>, _>(name)?
            .map(|json| json.0),
    };
    Ok(value.unwrap_or(Value::Null))
}

/// Decode the listed columns of `row` into a JSON object.
pub fn decode_row<'a, I>(row: &PgRow, columns: I) -> Result<Map<String, Value>, sqlx::Error>
where
    I: IntoIterator<Item = (&'a str, FieldType)>,
{
    columns
        .into_iter()
        .map(|(name, field_type)| Ok((name.to_string(), decode_column(row, name, field_type)?)))
        .collect()
}
