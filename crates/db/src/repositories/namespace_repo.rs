//! Repository for schema-defined namespace tables.
//!
//! Namespace columns are only known at runtime, so rows are decoded
//! column by column through [`crate::codec`] instead of a `FromRow` struct.

use std::collections::{BTreeMap, HashMap};

use muninn_core::field::FieldValue;
use muninn_core::registry::Archive;
use muninn_core::schema::NamespaceSchema;
use muninn_core::types::ProductId;
use serde_json::{Map, Value};
use sqlx::{PgConnection, Row};

use crate::codec;
use crate::sql::{self, Bind, BindValue, Binds};

/// Provides access to namespace rows, one per product at most.
pub struct NamespaceRepo;

impl NamespaceRepo {
    /// Rows of `namespace` for the given products, keyed by product.
    pub async fn fetch_many(
        conn: &mut PgConnection,
        archive: &Archive,
        namespace: &NamespaceSchema,
        uuids: &[ProductId],
    ) -> Result<HashMap<ProductId, Map<String, Value>>, sqlx::Error> {
        let mut result = HashMap::new();
        if uuids.is_empty() {
            return Ok(result);
        }

        let spatial = archive.config().spatial;
        let mut columns = vec!["uuid".to_string()];
        columns.extend(
            namespace
                .fields
                .iter()
                .map(|f| sql::column_expr(None, &f.name, f.field_type, spatial)),
        );
        let query = format!(
            "SELECT {} FROM {} WHERE uuid = ANY($1)",
            columns.join(", "),
            archive.tables().namespace(&namespace.name),
        );

        let rows = sqlx::query(&query)
            .bind(uuids)
            .fetch_all(&mut *conn)
            .await?;
        for row in rows {
            let uuid: ProductId = row.try_get("uuid")?;
            let values = codec::decode_row(
                &row,
                namespace.fields.iter().map(|f| (f.name.as_str(), f.field_type)),
            )?;
            result.insert(uuid, values);
        }
        Ok(result)
    }

    /// Whether the product has a row in `namespace`.
    pub async fn exists(
        conn: &mut PgConnection,
        archive: &Archive,
        namespace: &str,
        uuid: ProductId,
    ) -> Result<bool, sqlx::Error> {
        let query = format!(
            "SELECT EXISTS (SELECT 1 FROM {} WHERE uuid = $1)",
            archive.tables().namespace(namespace)
        );
        sqlx::query_scalar::<_, bool>(&query)
            .bind(uuid)
            .fetch_one(&mut *conn)
            .await
    }

    /// Create the product's row in `namespace`.
    pub async fn insert(
        conn: &mut PgConnection,
        archive: &Archive,
        namespace: &str,
        uuid: ProductId,
        values: &BTreeMap<String, FieldValue>,
    ) -> Result<(), sqlx::Error> {
        let spatial = archive.config().spatial;
        let mut binds = Binds::new();
        let mut columns = vec!["uuid".to_string()];
        let mut placeholders = vec![binds.push(BindValue::Field(FieldValue::Uuid(uuid)))];
        for (name, value) in values {
            columns.push(sql::ident(name));
            placeholders.push(binds.value(value, spatial));
        }

        let query = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            archive.tables().namespace(namespace),
            columns.join(", "),
            placeholders.join(", "),
        );
        sqlx::query(&query)
            .bind_all(&binds)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Update the given columns of the product's row in `namespace`.
    /// Returns `true` if a row was updated.
    pub async fn update(
        conn: &mut PgConnection,
        archive: &Archive,
        namespace: &str,
        uuid: ProductId,
        values: &BTreeMap<String, FieldValue>,
    ) -> Result<bool, sqlx::Error> {
        if values.is_empty() {
            return Self::exists(conn, archive, namespace, uuid).await;
        }

        let spatial = archive.config().spatial;
        let mut binds = Binds::new();
        let key = binds.push(BindValue::Field(FieldValue::Uuid(uuid)));
        let sets: Vec<String> = values
            .iter()
            .map(|(name, value)| format!("{} = {}", sql::ident(name), binds.value(value, spatial)))
            .collect();

        let query = format!(
            "UPDATE {} SET {} WHERE uuid = {key}",
            archive.tables().namespace(namespace),
            sets.join(", "),
        );
        let result = sqlx::query(&query)
            .bind_all(&binds)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
