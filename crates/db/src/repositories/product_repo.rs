//! Repository for an archive's core table.

use std::collections::BTreeMap;

use muninn_core::field::FieldValue;
use muninn_core::filter::Predicate;
use muninn_core::ordering::OrderTerm;
use muninn_core::pagination::Page;
use muninn_core::registry::Archive;
use muninn_core::types::{ProductId, Timestamp};
use sqlx::PgConnection;

use crate::models::product::Product;
use crate::sql::{self, Bind, BindValue, Binds, CORE_ALIAS};

/// Provides listing and CRUD operations on products.
pub struct ProductRepo;

impl ProductRepo {
    /// List products matching `predicates`, in `ordering` (ties broken by
    /// uuid), restricted to `page` when given.
    pub async fn list(
        conn: &mut PgConnection,
        archive: &Archive,
        predicates: &[Predicate],
        ordering: &[OrderTerm],
        page: Option<&Page>,
    ) -> Result<Vec<Product>, sqlx::Error> {
        let mut binds = Binds::new();
        let where_clause = sql::where_clause(archive, predicates, &mut binds);
        let mut query = format!(
            "SELECT {columns} FROM {core} {CORE_ALIAS}{joins}{where_clause}{order_by}",
            columns = sql::core_columns(Some(CORE_ALIAS), archive.config().spatial),
            core = archive.tables().core(),
            joins = sql::joins(archive, predicates, ordering),
            order_by = sql::order_by(ordering),
        );
        if let Some(page) = page {
            let limit = binds.push(BindValue::BigInt(to_i64(page.limit())));
            let offset = binds.push(BindValue::BigInt(to_i64(page.offset())));
            query.push_str(&format!(" LIMIT {limit} OFFSET {offset}"));
        }

        sqlx::query_as::<_, Product>(&query)
            .bind_all(&binds)
            .fetch_all(&mut *conn)
            .await
    }

    /// Count products matching `predicates`.
    pub async fn count(
        conn: &mut PgConnection,
        archive: &Archive,
        predicates: &[Predicate],
    ) -> Result<i64, sqlx::Error> {
        let mut binds = Binds::new();
        let where_clause = sql::where_clause(archive, predicates, &mut binds);
        let query = format!(
            "SELECT COUNT(*)::BIGINT FROM {core} {CORE_ALIAS}{joins}{where_clause}",
            core = archive.tables().core(),
            joins = sql::joins(archive, predicates, &[]),
        );

        sqlx::query_scalar::<_, i64>(&query)
            .bind_all(&binds)
            .fetch_one(&mut *conn)
            .await
    }

    pub async fn find_by_id(
        conn: &mut PgConnection,
        archive: &Archive,
        uuid: ProductId,
    ) -> Result<Option<Product>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM {} WHERE uuid = $1",
            sql::core_columns(None, archive.config().spatial),
            archive.tables().core(),
        );
        sqlx::query_as::<_, Product>(&query)
            .bind(uuid)
            .fetch_optional(&mut *conn)
            .await
    }

    /// Find a product by its alternate key.
    pub async fn find_by_type_and_name(
        conn: &mut PgConnection,
        archive: &Archive,
        product_type: &str,
        product_name: &str,
    ) -> Result<Option<Product>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM {} WHERE product_type = $1 AND product_name = $2",
            sql::core_columns(None, archive.config().spatial),
            archive.tables().core(),
        );
        sqlx::query_as::<_, Product>(&query)
            .bind(product_type)
            .bind(product_name)
            .fetch_optional(&mut *conn)
            .await
    }

    /// Insert a product. `active` defaults to true when not given.
    pub async fn insert(
        conn: &mut PgConnection,
        archive: &Archive,
        uuid: ProductId,
        metadata_date: Timestamp,
        values: &BTreeMap<String, FieldValue>,
    ) -> Result<Product, sqlx::Error> {
        let spatial = archive.config().spatial;
        let mut binds = Binds::new();
        let mut columns = vec!["uuid".to_string(), "metadata_date".to_string()];
        let mut placeholders = vec![
            binds.push(BindValue::Field(FieldValue::Uuid(uuid))),
            binds.push(BindValue::Field(FieldValue::Timestamp(metadata_date))),
        ];
        if !values.contains_key("active") {
            columns.push("active".to_string());
            placeholders.push(binds.push(BindValue::Field(FieldValue::Boolean(true))));
        }
        for (name, value) in values {
            columns.push(sql::ident(name));
            placeholders.push(binds.value(value, spatial));
        }

        let query = format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            archive.tables().core(),
            columns.join(", "),
            placeholders.join(", "),
            sql::core_columns(None, spatial),
        );
        sqlx::query_as::<_, Product>(&query)
            .bind_all(&binds)
            .fetch_one(&mut *conn)
            .await
    }

    /// Update the given columns and refresh `metadata_date`.
    ///
    /// Returns `None` if no product with `uuid` exists.
    pub async fn update(
        conn: &mut PgConnection,
        archive: &Archive,
        uuid: ProductId,
        metadata_date: Timestamp,
        values: &BTreeMap<String, FieldValue>,
    ) -> Result<Option<Product>, sqlx::Error> {
        let spatial = archive.config().spatial;
        let mut binds = Binds::new();
        let key = binds.push(BindValue::Field(FieldValue::Uuid(uuid)));
        let mut sets = vec![format!(
            "metadata_date = {}",
            binds.push(BindValue::Field(FieldValue::Timestamp(metadata_date)))
        )];
        for (name, value) in values {
            sets.push(format!("{} = {}", sql::ident(name), binds.value(value, spatial)));
        }

        let query = format!(
            "UPDATE {} SET {} WHERE uuid = {key} RETURNING {}",
            archive.tables().core(),
            sets.join(", "),
            sql::core_columns(None, spatial),
        );
        sqlx::query_as::<_, Product>(&query)
            .bind_all(&binds)
            .fetch_optional(&mut *conn)
            .await
    }

    /// Delete a product; tags, links and namespace rows cascade.
    /// Returns `true` if a row was removed.
    pub async fn delete(
        conn: &mut PgConnection,
        archive: &Archive,
        uuid: ProductId,
    ) -> Result<bool, sqlx::Error> {
        let query = format!("DELETE FROM {} WHERE uuid = $1", archive.tables().core());
        let result = sqlx::query(&query).bind(uuid).execute(&mut *conn).await?;
        Ok(result.rows_affected() > 0)
    }

    /// The subset of `ids` that exist in the archive.
    pub async fn existing_ids(
        conn: &mut PgConnection,
        archive: &Archive,
        ids: &[ProductId],
    ) -> Result<Vec<ProductId>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = format!(
            "SELECT uuid FROM {} WHERE uuid = ANY($1)",
            archive.tables().core()
        );
        sqlx::query_scalar::<_, ProductId>(&query)
            .bind(ids)
            .fetch_all(&mut *conn)
            .await
    }
}

fn to_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
