use log::trace;
use sqlx::SqliteConnection;

use crate::db_types::{Job, JobApplication};

pub async fn fetch_job(job_id: &str, conn: &mut SqliteConnection) -> Result<Option<Job>, sqlx::Error> {
    let job = sqlx::query_as("SELECT * FROM jobs WHERE id = $1").bind(job_id).fetch_optional(conn).await?;
    Ok(job)
}

pub async fn fetch_application(
    application_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<JobApplication>, sqlx::Error> {
    let application = sqlx::query_as("SELECT * FROM job_applications WHERE id = $1")
        .bind(application_id)
        .fetch_optional(conn)
        .await?;
    Ok(application)
}

/// Inserts the job, or overwrites the stored copy if one with the same id exists.
pub async fn upsert_job(job: Job, conn: &mut SqliteConnection) -> Result<Job, sqlx::Error> {
    let job = sqlx::query_as(
        r#"
            INSERT INTO jobs (id, owner_id, title, status, fulfilled_at) VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT(id) DO UPDATE SET
                owner_id = excluded.owner_id,
                title = excluded.title,
                status = excluded.status,
                fulfilled_at = excluded.fulfilled_at
            RETURNING *;
        "#,
    )
    .bind(job.id)
    .bind(job.owner_id)
    .bind(job.title)
    .bind(job.status)
    .bind(job.fulfilled_at)
    .fetch_one(conn)
    .await?;
    trace!("🗃️ Job saved: {job:?}");
    Ok(job)
}

pub async fn upsert_application(
    application: JobApplication,
    conn: &mut SqliteConnection,
) -> Result<JobApplication, sqlx::Error> {
    let application = sqlx::query_as(
        r#"
            INSERT INTO job_applications (id, job_id, applicant_id, status) VALUES ($1, $2, $3, $4)
            ON CONFLICT(id) DO UPDATE SET
                job_id = excluded.job_id,
                applicant_id = excluded.applicant_id,
                status = excluded.status
            RETURNING *;
        "#,
    )
    .bind(application.id)
    .bind(application.job_id)
    .bind(application.applicant_id)
    .bind(application.status)
    .fetch_one(conn)
    .await?;
    trace!("🗃️ Job application saved: {application:?}");
    Ok(application)
}
