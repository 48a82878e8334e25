use sqlx::SqlitePool;
use tracing::info;

use crate::db::models::StatRow;
use crate::error::Result;
use crate::source::RecordFetcher;
use crate::types::{MetricId, StatMap, StatRecord};

/// SQLite-backed stats source over the `computed_stats` table.
pub struct StatReader {
    pool: SqlitePool,
}

impl StatReader {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn row_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM computed_stats")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

impl RecordFetcher for StatReader {
    async fn fetch_records(&self, ids: &[MetricId]) -> Result<StatMap> {
        if ids.is_empty() {
            return Ok(StatMap::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT metric_id, computed_on, stat_value FROM computed_stats
             WHERE metric_id IN ({placeholders})
             ORDER BY metric_id, computed_on, id"
        );
        let mut query = sqlx::query_as::<_, StatRow>(&sql);
        for &id in ids {
            query = query.bind(i64::from(id));
        }
        let rows = query.fetch_all(&self.pool).await?;
        let fetched = rows.len();

        // Rows are ordered oldest first per metric, so later inserts win.
        let mut records = StatMap::new();
        for row in rows {
            let Ok(metric_id) = MetricId::try_from(row.metric_id) else {
                continue;
            };
            let stat_value = row
                .stat_value
                .map(serde_json::Value::String)
                .unwrap_or(serde_json::Value::Null);
            records.insert(
                metric_id,
                StatRecord { metric_id, computed_on: row.computed_on, stat_value },
            );
        }

        info!("Fetched {fetched} rows for {} ids ({} distinct metrics)", ids.len(), records.len());
        Ok(records)
    }
}
