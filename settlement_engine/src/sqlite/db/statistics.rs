//! The statistics rollup lives in a single row (`id = 1`) of `statistics_snapshot`.
//!
//! Both the incremental update and the full recompute are single statements, so a reader never sees a half-applied
//! snapshot. The average is rounded half-up in integer arithmetic: `(2 * volume + count) / (2 * count)`.
use log::trace;
use sqlx::SqliteConnection;

use crate::db_types::{StatisticsDelta, StatisticsSnapshot};

const SNAPSHOT_COLUMNS: &str = "initiated_count, awaiting_count, completed_count, failed_count, completed_volume, \
                                commission_volume, average_completed_amount, first_completed_at, last_completed_at";

pub async fn fetch_statistics(conn: &mut SqliteConnection) -> Result<StatisticsSnapshot, sqlx::Error> {
    let q = format!("SELECT {SNAPSHOT_COLUMNS} FROM statistics_snapshot WHERE id = 1");
    let snapshot: Option<StatisticsSnapshot> = sqlx::query_as(&q).fetch_optional(conn).await?;
    Ok(snapshot.unwrap_or_default())
}

pub async fn apply_delta(delta: &StatisticsDelta, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            UPDATE statistics_snapshot SET
                initiated_count = initiated_count + $1,
                awaiting_count = awaiting_count + $2,
                completed_count = completed_count + $3,
                failed_count = failed_count + $4,
                completed_volume = completed_volume + $5,
                commission_volume = commission_volume + $6,
                average_completed_amount = CASE
                    WHEN completed_count + $3 > 0
                    THEN (2 * (completed_volume + $5) + (completed_count + $3)) / (2 * (completed_count + $3))
                    ELSE 0
                END,
                first_completed_at = CASE
                    WHEN $7 IS NULL THEN first_completed_at
                    WHEN first_completed_at IS NULL
                        OR julianday($7) < julianday(first_completed_at)
                        OR (julianday($7) = julianday(first_completed_at) AND $7 < first_completed_at) THEN $7
                    ELSE first_completed_at
                END,
                last_completed_at = CASE
                    WHEN $7 IS NULL THEN last_completed_at
                    WHEN last_completed_at IS NULL
                        OR julianday($7) > julianday(last_completed_at)
                        OR (julianday($7) = julianday(last_completed_at) AND $7 > last_completed_at) THEN $7
                    ELSE last_completed_at
                END
            WHERE id = 1
        "#,
    )
    .bind(delta.initiated)
    .bind(delta.awaiting)
    .bind(delta.completed)
    .bind(delta.failed)
    .bind(delta.completed_volume.value())
    .bind(delta.commission_volume.value())
    .bind(delta.completed_at)
    .execute(conn)
    .await?;
    trace!("📊️ Statistics delta applied: {delta:?}");
    Ok(())
}

/// Rebuilds the rollup from `payment_intents` and returns the new snapshot.
pub async fn recompute(conn: &mut SqliteConnection) -> Result<StatisticsSnapshot, sqlx::Error> {
    let q = format!(
        r#"
            UPDATE statistics_snapshot SET ({SNAPSHOT_COLUMNS}) = (
                SELECT
                    initiated,
                    awaiting,
                    completed,
                    failed,
                    volume,
                    commission,
                    CASE WHEN completed > 0 THEN (2 * volume + completed) / (2 * completed) ELSE 0 END,
                    (SELECT completed_at FROM payment_intents WHERE status = 'Completed'
                        ORDER BY julianday(completed_at) ASC, completed_at ASC LIMIT 1),
                    (SELECT completed_at FROM payment_intents WHERE status = 'Completed'
                        ORDER BY julianday(completed_at) DESC, completed_at DESC LIMIT 1)
                FROM (
                    SELECT
                        COALESCE(SUM(status = 'Initiated'), 0) AS initiated,
                        COALESCE(SUM(status = 'AwaitingCollectionResult'), 0) AS awaiting,
                        COALESCE(SUM(status = 'Completed'), 0) AS completed,
                        COALESCE(SUM(status = 'Failed'), 0) AS failed,
                        COALESCE(SUM(CASE WHEN status = 'Completed' THEN total_amount ELSE 0 END), 0) AS volume,
                        COALESCE(SUM(CASE WHEN status = 'Completed' THEN commission_amount ELSE 0 END), 0) AS commission
                    FROM payment_intents
                )
            )
            WHERE id = 1
            RETURNING {SNAPSHOT_COLUMNS};
        "#
    );
    let snapshot = sqlx::query_as(&q).fetch_one(conn).await?;
    trace!("📊️ Statistics recomputed: {snapshot:?}");
    Ok(snapshot)
}
