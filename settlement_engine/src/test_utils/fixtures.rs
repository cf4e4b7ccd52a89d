use crate::{
    db_types::{ApplicationStatus, Job, JobApplication, JobStatus},
    traits::JobManagement,
};

/// Stores an open job owned by `owner` with an application from `applicant` in the given state.
pub async fn seed_job<B: JobManagement>(
    db: &B,
    job_id: &str,
    owner: &str,
    application_id: &str,
    applicant: &str,
    status: ApplicationStatus,
) -> (Job, JobApplication) {
    let job = Job {
        id: job_id.to_string(),
        owner_id: owner.to_string(),
        title: format!("Job {job_id}"),
        status: JobStatus::InProgress,
        fulfilled_at: None,
    };
    let job = db.upsert_job(job).await.expect("Error saving job");
    let application = JobApplication {
        id: application_id.to_string(),
        job_id: job_id.to_string(),
        applicant_id: applicant.to_string(),
        status,
    };
    let application = db.upsert_application(application).await.expect("Error saving application");
    (job, application)
}

/// Shorthand for a job with an accepted application.
pub async fn seed_accepted_job<B: JobManagement>(
    db: &B,
    job_id: &str,
    owner: &str,
    application_id: &str,
    applicant: &str,
) -> (Job, JobApplication) {
    seed_job(db, job_id, owner, application_id, applicant, ApplicationStatus::Accepted).await
}
