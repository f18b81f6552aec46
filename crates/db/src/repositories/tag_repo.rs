//! Repository for an archive's tag table.

use std::collections::HashMap;

use muninn_core::registry::Archive;
use muninn_core::types::ProductId;
use sqlx::PgConnection;

/// Provides tag operations for products.
pub struct TagRepo;

impl TagRepo {
    /// Tags of one product, in insertion order.
    pub async fn tags_for(
        conn: &mut PgConnection,
        archive: &Archive,
        uuid: ProductId,
    ) -> Result<Vec<String>, sqlx::Error> {
        let query = format!(
            "SELECT tag FROM {} WHERE uuid = $1 ORDER BY id",
            archive.tables().tag()
        );
        sqlx::query_scalar::<_, String>(&query)
            .bind(uuid)
            .fetch_all(&mut *conn)
            .await
    }

    /// Tags of several products at once, keyed by product.
    pub async fn tags_for_many(
        conn: &mut PgConnection,
        archive: &Archive,
        uuids: &[ProductId],
    ) -> Result<HashMap<ProductId, Vec<String>>, sqlx::Error> {
        let mut result: HashMap<ProductId, Vec<String>> = HashMap::new();
        if uuids.is_empty() {
            return Ok(result);
        }
        let query = format!(
            "SELECT uuid, tag FROM {} WHERE uuid = ANY($1) ORDER BY id",
            archive.tables().tag()
        );
        let rows: Vec<(ProductId, String)> = sqlx::query_as(&query)
            .bind(uuids)
            .fetch_all(&mut *conn)
            .await?;
        for (uuid, tag) in rows {
            result.entry(uuid).or_default().push(tag);
        }
        Ok(result)
    }

    /// Add tags to a product. Returns the number of rows inserted.
    pub async fn insert(
        conn: &mut PgConnection,
        archive: &Archive,
        uuid: ProductId,
        tags: &[String],
    ) -> Result<u64, sqlx::Error> {
        if tags.is_empty() {
            return Ok(0);
        }
        let query = format!(
            "INSERT INTO {} (uuid, tag) SELECT $1, UNNEST($2::text[])",
            archive.tables().tag()
        );
        let result = sqlx::query(&query)
            .bind(uuid)
            .bind(tags)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }

    /// Remove tags from a product. Returns the number of rows deleted.
    pub async fn delete(
        conn: &mut PgConnection,
        archive: &Archive,
        uuid: ProductId,
        tags: &[String],
    ) -> Result<u64, sqlx::Error> {
        if tags.is_empty() {
            return Ok(0);
        }
        let query = format!(
            "DELETE FROM {} WHERE uuid = $1 AND tag = ANY($2)",
            archive.tables().tag()
        );
        let result = sqlx::query(&query)
            .bind(uuid)
            .bind(tags)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }
}
