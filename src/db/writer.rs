use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::info;

use crate::config::BAND_WIDTH;
use crate::error::Result;
use crate::source::MockStats;
use crate::types::{MetricType, StatRecord};

/// Open (creating if needed) the stats database and apply migrations.
pub async fn open_pool(db_path: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(options).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

/// Single-connection in-memory database; every connection to `:memory:` is
/// its own database, so the pool must not grow.
#[cfg(test)]
pub async fn open_memory_pool() -> Result<SqlitePool> {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

pub async fn insert_record<'e, E>(executor: E, record: &StatRecord) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let stat_value = match &record.stat_value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    };
    sqlx::query(
        r#"
        INSERT INTO computed_stats (metric_id, computed_on, stat_value)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(i64::from(record.metric_id))
    .bind(record.computed_on.clone())
    .bind(stat_value)
    .execute(executor)
    .await?;
    Ok(())
}

/// Fill every identifier band with mock records in one transaction.
pub async fn seed_mock_data(pool: &SqlitePool) -> Result<u64> {
    let mut tx = pool.begin().await?;
    let mut inserted = 0u64;
    for metric in MetricType::ALL {
        let base = metric.band_base();
        for id in base..base + BAND_WIDTH {
            let Some(record) = MockStats::record(id) else { continue };
            insert_record(&mut *tx, &record).await?;
            inserted += 1;
        }
    }
    tx.commit().await?;
    info!("Seeded {inserted} mock stat records");
    Ok(inserted)
}
