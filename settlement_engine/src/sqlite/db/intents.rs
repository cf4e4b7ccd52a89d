use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db_types::{IntentEvent, NewPaymentIntent, Page, Pagination, PaymentIntent},
    traits::{IntentTransition, LedgerError, TransitionResult},
};

/// Inserts a new intent in the `Initiated` state and writes the first entry of its transition log.
///
/// This is not atomic on its own. Pass `&mut *tx` if the insert must be part of a larger transaction.
pub async fn insert_intent(
    intent: NewPaymentIntent,
    conn: &mut SqliteConnection,
) -> Result<PaymentIntent, LedgerError> {
    let now = Utc::now();
    let job_id = intent.job_id.clone();
    let application_id = intent.application_id.clone();
    let result: Result<PaymentIntent, sqlx::Error> = sqlx::query_as(
        r#"
            INSERT INTO payment_intents (
                job_id,
                application_id,
                payer_id,
                payee_id,
                payer_contact,
                payee_contact,
                description,
                currency,
                total_amount,
                payee_amount,
                commission_amount,
                commission_rate,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $13)
            RETURNING *;
        "#,
    )
    .bind(intent.job_id)
    .bind(intent.application_id)
    .bind(intent.payer_id)
    .bind(intent.payee_id)
    .bind(intent.payer_contact)
    .bind(intent.payee_contact)
    .bind(intent.description)
    .bind(intent.currency)
    .bind(intent.split.total.value())
    .bind(intent.split.payee_amount.value())
    .bind(intent.split.commission.value())
    .bind(intent.split.rate.to_string())
    .bind(now)
    .fetch_one(&mut *conn)
    .await;
    let intent = match result {
        Ok(intent) => intent,
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            debug!("🗃️ A live intent already exists for job {job_id}, application {application_id}");
            return Err(LedgerError::LiveIntentExists { job_id, application_id });
        },
        Err(e) => return Err(e.into()),
    };
    insert_event(intent.id, "collection", "None", &intent.status.to_string(), Some("created"), now, conn).await?;
    debug!("🗃️ Payment intent #{} for job {} inserted", intent.id, intent.job_id);
    Ok(intent)
}

/// Applies `transition` to intent `id` if, and only if, the intent is currently in the state the transition requires.
///
/// The guarded `UPDATE` is the first statement issued, so when this runs inside a transaction the write lock is taken
/// before anything is read. When the guard does not match, the intent is returned as it currently is.
pub async fn transition_intent(
    id: i64,
    transition: &IntentTransition,
    conn: &mut SqliteConnection,
) -> Result<TransitionResult, LedgerError> {
    let now = Utc::now();
    let mut builder = QueryBuilder::<Sqlite>::new("UPDATE payment_intents SET status = ");
    builder.push_bind(transition.target_status());
    builder.push(", payout_status = ");
    builder.push_bind(transition.target_payout_status());
    builder.push(", updated_at = ");
    builder.push_bind(now);
    match transition {
        IntentTransition::CollectionRequested { correlation_id } => {
            builder.push(", collection_correlation_id = ");
            builder.push_bind(correlation_id.clone());
        },
        IntentTransition::CollectionFailed { reason, code, .. } => {
            builder.push(", failure_reason = ");
            builder.push_bind(reason.clone());
            builder.push(", failure_code = ");
            builder.push_bind(code.clone());
        },
        IntentTransition::CollectionCompleted { receipt, completed_at } => {
            builder.push(", collection_receipt = ");
            builder.push_bind(receipt.clone());
            builder.push(", completed_at = ");
            builder.push_bind(*completed_at);
        },
        IntentTransition::PayoutClaimed { reference, .. } => {
            // A fresh attempt. Results for an earlier payout request must no longer find this intent.
            builder.push(", payout_correlation_id = NULL, payout_failure_reason = NULL, payout_reference = ");
            builder.push_bind(reference.clone());
        },
        IntentTransition::PayoutRequested { correlation_id } => {
            builder.push(", payout_correlation_id = ");
            builder.push_bind(correlation_id.clone());
        },
        IntentTransition::PayoutFailed { reason } => {
            builder.push(", payout_failure_reason = ");
            builder.push_bind(reason.clone());
        },
        IntentTransition::PayoutCompleted { completed_at } => {
            builder.push(", payout_completed_at = ");
            builder.push_bind(*completed_at);
        },
    }
    builder.push(" WHERE id = ");
    builder.push_bind(id);
    builder.push(" AND status = ");
    builder.push_bind(transition.required_status());
    if let Some(payout_status) = transition.required_payout_status() {
        builder.push(" AND payout_status = ");
        builder.push_bind(payout_status);
    }
    if matches!(transition, IntentTransition::PayoutRequested { .. }) {
        builder.push(" AND payout_correlation_id IS NULL");
    }
    builder.push(" RETURNING *;");
    trace!("🗃️ Executing query: {}", builder.sql());
    let updated: Option<PaymentIntent> = builder.build_query_as().fetch_optional(&mut *conn).await?;
    let intent = match updated {
        Some(intent) => intent,
        None => {
            let current = fetch_intent(id, &mut *conn).await?.ok_or(LedgerError::IntentNotFound(id))?;
            debug!(
                "🗃️ Intent #{id} is {}/{}. Transition [{transition}] does not apply",
                current.status, current.payout_status
            );
            return Ok(TransitionResult::Unchanged(current));
        },
    };
    let (phase, from, to) = if transition.is_payout_phase() {
        let from = transition.required_payout_status().map(|s| s.to_string()).unwrap_or_default();
        ("payout", from, transition.target_payout_status().to_string())
    } else {
        ("collection", transition.required_status().to_string(), transition.target_status().to_string())
    };
    insert_event(id, phase, &from, &to, transition.detail().as_deref(), now, &mut *conn).await?;
    if let IntentTransition::CollectionCompleted { completed_at, .. } = transition {
        sqlx::query("UPDATE jobs SET status = 'fulfilled', fulfilled_at = $1 WHERE id = $2")
            .bind(*completed_at)
            .bind(&intent.job_id)
            .execute(&mut *conn)
            .await?;
        debug!("🗃️ Job {} marked as fulfilled", intent.job_id);
    }
    debug!("🗃️ Intent #{id}: [{transition}] applied");
    Ok(TransitionResult::Applied(intent))
}

async fn insert_event(
    intent_id: i64,
    phase: &str,
    from_state: &str,
    to_state: &str,
    detail: Option<&str>,
    created_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            INSERT INTO payment_intent_events (intent_id, phase, from_state, to_state, detail, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(intent_id)
    .bind(phase)
    .bind(from_state)
    .bind(to_state)
    .bind(detail)
    .bind(created_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn fetch_intent(id: i64, conn: &mut SqliteConnection) -> Result<Option<PaymentIntent>, sqlx::Error> {
    let intent = sqlx::query_as("SELECT * FROM payment_intents WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(intent)
}

pub async fn fetch_intent_by_collection_id(
    correlation_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentIntent>, sqlx::Error> {
    let intent = sqlx::query_as("SELECT * FROM payment_intents WHERE collection_correlation_id = $1")
        .bind(correlation_id)
        .fetch_optional(conn)
        .await?;
    Ok(intent)
}

pub async fn fetch_intent_by_payout_id(
    correlation_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentIntent>, sqlx::Error> {
    let intent = sqlx::query_as("SELECT * FROM payment_intents WHERE payout_correlation_id = $1")
        .bind(correlation_id)
        .fetch_optional(conn)
        .await?;
    Ok(intent)
}

/// Fetches one page of the intents where `user_id` is the payer or the payee, newest first.
pub async fn fetch_intents_for_user(
    user_id: &str,
    pagination: Pagination,
    conn: &mut SqliteConnection,
) -> Result<Page<PaymentIntent>, sqlx::Error> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payment_intents WHERE payer_id = $1 OR payee_id = $1")
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;
    let items = sqlx::query_as(
        r#"
            SELECT * FROM payment_intents
            WHERE payer_id = $1 OR payee_id = $1
            ORDER BY julianday(created_at) DESC, id DESC
            LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(conn)
    .await?;
    Ok(Page { items, page: pagination.page, per_page: pagination.per_page, total })
}

/// Intents whose collection has not been resolved: still `Initiated` (the collection id may never have been stored) or
/// `AwaitingCollectionResult`.
pub async fn fetch_stale_collections(
    created_before: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentIntent>, sqlx::Error> {
    let intents = sqlx::query_as(
        r#"
            SELECT * FROM payment_intents
            WHERE status IN ('Initiated', 'AwaitingCollectionResult') AND julianday(created_at) < julianday($1)
            ORDER BY julianday(created_at) ASC, id ASC
        "#,
    )
    .bind(created_before)
    .fetch_all(conn)
    .await?;
    Ok(intents)
}

/// Payouts that were claimed before `claimed_before` but never had a gateway correlation id recorded.
pub async fn fetch_uncorrelated_payouts(
    claimed_before: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentIntent>, sqlx::Error> {
    let intents = sqlx::query_as(
        r#"
            SELECT * FROM payment_intents
            WHERE status = 'Completed'
              AND payout_status = 'AwaitingPayoutResult'
              AND payout_correlation_id IS NULL
              AND julianday(updated_at) < julianday($1)
            ORDER BY julianday(updated_at) ASC, id ASC
        "#,
    )
    .bind(claimed_before)
    .fetch_all(conn)
    .await?;
    Ok(intents)
}

pub async fn fetch_intent_events(intent_id: i64, conn: &mut SqliteConnection) -> Result<Vec<IntentEvent>, sqlx::Error> {
    let events = sqlx::query_as("SELECT * FROM payment_intent_events WHERE intent_id = $1 ORDER BY id ASC")
        .bind(intent_id)
        .fetch_all(conn)
        .await?;
    Ok(events)
}
