//! Repository for an archive's link table (source / derived products).

use std::collections::HashMap;

use muninn_core::registry::Archive;
use muninn_core::types::ProductId;
use sqlx::PgConnection;

/// Provides source-product link operations.
pub struct LinkRepo;

impl LinkRepo {
    /// Source products of one product, in link order.
    pub async fn sources_for(
        conn: &mut PgConnection,
        archive: &Archive,
        uuid: ProductId,
    ) -> Result<Vec<ProductId>, sqlx::Error> {
        let query = format!(
            "SELECT source_uuid FROM {} WHERE uuid = $1 ORDER BY id",
            archive.tables().link()
        );
        sqlx::query_scalar::<_, ProductId>(&query)
            .bind(uuid)
            .fetch_all(&mut *conn)
            .await
    }

    /// Source products of several products at once, keyed by product.
    pub async fn sources_for_many(
        conn: &mut PgConnection,
        archive: &Archive,
        uuids: &[ProductId],
    ) -> Result<HashMap<ProductId, Vec<ProductId>>, sqlx::Error> {
        let mut result: HashMap<ProductId, Vec<ProductId>> = HashMap::new();
        if uuids.is_empty() {
            return Ok(result);
        }
        let query = format!(
            "SELECT uuid, source_uuid FROM {} WHERE uuid = ANY($1) ORDER BY id",
            archive.tables().link()
        );
        let rows: Vec<(ProductId, ProductId)> = sqlx::query_as(&query)
            .bind(uuids)
            .fetch_all(&mut *conn)
            .await?;
        for (uuid, source) in rows {
            result.entry(uuid).or_default().push(source);
        }
        Ok(result)
    }

    /// Link `uuid` to each of `sources`. Returns the number of rows inserted.
    pub async fn insert(
        conn: &mut PgConnection,
        archive: &Archive,
        uuid: ProductId,
        sources: &[ProductId],
    ) -> Result<u64, sqlx::Error> {
        if sources.is_empty() {
            return Ok(0);
        }
        let query = format!(
            "INSERT INTO {} (uuid, source_uuid) SELECT $1, UNNEST($2::uuid[])",
            archive.tables().link()
        );
        let result = sqlx::query(&query)
            .bind(uuid)
            .bind(sources)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }

    /// Unlink `uuid` from each of `sources`. Returns the number of rows deleted.
    pub async fn delete(
        conn: &mut PgConnection,
        archive: &Archive,
        uuid: ProductId,
        sources: &[ProductId],
    ) -> Result<u64, sqlx::Error> {
        if sources.is_empty() {
            return Ok(0);
        }
        let query = format!(
            "DELETE FROM {} WHERE uuid = $1 AND source_uuid = ANY($2)",
            archive.tables().link()
        );
        let result = sqlx::query(&query)
            .bind(uuid)
            .bind(sources)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }
}
