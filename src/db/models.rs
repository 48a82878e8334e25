/// Row type for the `computed_stats` table.
#[derive(Debug, sqlx::FromRow)]
pub struct StatRow {
    pub metric_id: i64,
    pub computed_on: Option<String>,
    pub stat_value: Option<String>,
}
