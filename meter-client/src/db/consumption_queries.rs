use anyhow::Result;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::domain::{DailyConsumption, DateRange, TodayConsumption};

/// Day buckets of one meter whose date falls in `range` (inclusive).
pub async fn daily_values(
    pool: &PgPool,
    device_id: i64,
    range: DateRange,
) -> Result<Vec<DailyConsumption>> {
    let rows = sqlx::query_as::<_, DailyConsumption>(
        r#"
        SELECT
            device_id,
            dt,
            value::float8 AS value
        FROM consumption_by_day
        WHERE device_id = $1
          AND dt >= $2
          AND dt <= $3
        ORDER BY dt
        "#,
    )
    .bind(device_id)
    .bind(range.start)
    .bind(range.end)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Latest intra-day snapshot of one meter taken on `as_of`'s date, no later
/// than `as_of`.
///
/// Rows in `consumption_by_today` are cumulative, so only the newest one is
/// meaningful.
pub async fn latest_today_value(
    pool: &PgPool,
    device_id: i64,
    as_of: PrimitiveDateTime,
) -> Result<Option<TodayConsumption>> {
    let day_start = as_of.date().midnight();

    let row = sqlx::query_as::<_, TodayConsumption>(
        r#"
        SELECT
            device_id,
            dt,
            value::float8 AS value
        FROM consumption_by_today
        WHERE device_id = $1
          AND dt >= $2
          AND dt <= $3
        ORDER BY dt DESC
        LIMIT 1
        "#,
    )
    .bind(device_id)
    .bind(day_start)
    .bind(as_of)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}
