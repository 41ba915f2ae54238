//! PostgreSQL implementation of PoolIndex over the `items` and `item_tags`
//! tables.
//!
//! Each filter dimension becomes one `EXISTS` clause whose tag set is bound
//! as an array, so AND-across / OR-within is evaluated by the planner.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::collections::HashMap;

use crate::domain::foundation::ItemId;
use crate::domain::item::{Item, ItemStatus, TaxonomyDimension, TaxonomyFilter, TaxonomyTag};
use crate::ports::{PoolIndex, PoolIndexError};

/// PostgreSQL implementation of the PoolIndex port.
pub struct PostgresPoolIndex {
    pool: PgPool,
}

impl PostgresPoolIndex {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert or replace an item and its tags (seeding and tests).
    pub async fn upsert(&self, item: &Item) -> Result<(), PoolIndexError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("Failed to start transaction", e))?;

        sqlx::query(
            r#"
            INSERT INTO items (id, version, status, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (id) DO UPDATE
            SET version = EXCLUDED.version, status = EXCLUDED.status, updated_at = NOW()
            "#,
        )
        .bind(item.id.as_str())
        .bind(i32::try_from(item.version).unwrap_or(i32::MAX))
        .bind(item.status.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("Failed to upsert item", e))?;

        sqlx::query("DELETE FROM item_tags WHERE item_id = $1")
            .bind(item.id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("Failed to clear item tags", e))?;

        for tag in &item.tags {
            sqlx::query("INSERT INTO item_tags (item_id, dimension, tag) VALUES ($1, $2, $3)")
                .bind(item.id.as_str())
                .bind(tag.dimension.as_str())
                .bind(&tag.tag)
                .execute(&mut *tx)
                .await
                .map_err(|e| db_error("Failed to insert item tag", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| db_error("Failed to commit transaction", e))
    }

    async fn load_tags(
        &self,
        item_ids: &[String],
    ) -> Result<HashMap<String, Vec<TaxonomyTag>>, PoolIndexError> {
        let rows: Vec<(String, String, String)> = sqlx::query_as(
            "SELECT item_id, dimension, tag FROM item_tags WHERE item_id = ANY($1)",
        )
        .bind(item_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to load item tags", e))?;

        let mut tags: HashMap<String, Vec<TaxonomyTag>> = HashMap::new();
        for (item_id, dimension, tag) in rows {
            let dimension: TaxonomyDimension = dimension
                .parse()
                .map_err(|e| PoolIndexError::InvalidData(format!("{}", e)))?;
            tags.entry(item_id)
                .or_default()
                .push(TaxonomyTag::new(dimension, tag));
        }
        Ok(tags)
    }

    async fn hydrate(&self, rows: Vec<ItemRow>) -> Result<Vec<Item>, PoolIndexError> {
        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let mut tags = self.load_tags(&ids).await?;

        rows.into_iter()
            .map(|row| {
                let item_tags = tags.remove(&row.id).unwrap_or_default();
                let mut item = Item::try_from(row)?;
                item.tags.extend(item_tags);
                Ok(item)
            })
            .collect()
    }
}

/// Database row representation of an item (without tags).
#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    id: String,
    version: i32,
    status: String,
}

impl TryFrom<ItemRow> for Item {
    type Error = PoolIndexError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        let id = ItemId::new(row.id).map_err(|e| PoolIndexError::InvalidData(e.to_string()))?;
        let version = u32::try_from(row.version).map_err(|_| {
            PoolIndexError::InvalidData(format!("negative version for item {}", id))
        })?;
        Ok(Item::new(id, version, parse_status(&row.status)?))
    }
}

fn parse_status(s: &str) -> Result<ItemStatus, PoolIndexError> {
    match s {
        "draft" => Ok(ItemStatus::Draft),
        "review" => Ok(ItemStatus::Review),
        "published" => Ok(ItemStatus::Published),
        "retired" => Ok(ItemStatus::Retired),
        _ => Err(PoolIndexError::InvalidData(format!("Invalid status value: {}", s))),
    }
}

fn db_error(context: &str, e: sqlx::Error) -> PoolIndexError {
    PoolIndexError::Unavailable(format!("{}: {}", context, e))
}

/// Builds the published-item query for a filter.
fn build_query(filter: &TaxonomyFilter) -> QueryBuilder<'static, Postgres> {
    let mut builder: QueryBuilder<'static, Postgres> =
        QueryBuilder::new("SELECT i.id, i.version, i.status FROM items i WHERE i.status = 'published'");

    for (dimension, allowed) in filter.constraints() {
        let tags: Vec<String> = allowed.iter().cloned().collect();
        builder
            .push(" AND EXISTS (SELECT 1 FROM item_tags t WHERE t.item_id = i.id AND t.dimension = ")
            .push_bind(dimension.as_str().to_string())
            .push(" AND t.tag = ANY(")
            .push_bind(tags)
            .push("))");
    }

    builder.push(" ORDER BY i.id");
    builder
}

#[async_trait]
impl PoolIndex for PostgresPoolIndex {
    async fn query(&self, filter: &TaxonomyFilter) -> Result<Vec<Item>, PoolIndexError> {
        let mut builder = build_query(filter);
        let rows: Vec<ItemRow> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to query pool", e))?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }
        self.hydrate(rows).await
    }

    async fn get(&self, item_id: &ItemId) -> Result<Option<Item>, PoolIndexError> {
        let row: Option<ItemRow> =
            sqlx::query_as("SELECT id, version, status FROM items WHERE id = $1")
                .bind(item_id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("Failed to find item", e))?;

        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }
}
