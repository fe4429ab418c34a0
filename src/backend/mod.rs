//! Collaborators the pipeline talks to: field catalog, sample template, job
//! creation and job status.

mod http;
#[cfg(test)]
pub mod mock;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{ImportError, Result};
use crate::models::{ColumnMode, EntityKind, FieldCatalog, ImportJob, JobStatus};

pub use http::HttpBackend;

#[async_trait]
pub trait ImportBackend: Send + Sync {
    async fn field_catalog(
        &self,
        entity: EntityKind,
        column_mode: Option<ColumnMode>,
    ) -> Result<FieldCatalog>;

    async fn download_template(&self, entity: EntityKind) -> Result<Vec<u8>>;

    async fn create_job(&self, request: JobRequest) -> Result<CreateJobResponse>;

    async fn job_status(&self, entity: EntityKind, import_id: &str) -> Result<JobStatusReport>;
}

/// Everything the job-creation endpoint receives.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRequest {
    pub entity: EntityKind,
    pub file_name: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
    /// Column header → field key.
    pub mapping: BTreeMap<String, String>,
    pub options: Vec<(&'static str, String)>,
}

impl JobRequest {
    pub fn option(&self, name: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Either a job handle or a synchronous result payload.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobResponse {
    #[serde(default, alias = "id")]
    pub import_id: Option<String>,
    #[serde(default)]
    pub status: Option<JobStatus>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default, alias = "successful")]
    pub created: Option<u64>,
    #[serde(default)]
    pub skipped: Option<u64>,
    #[serde(default)]
    pub failed: Option<u64>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl CreateJobResponse {
    pub fn deferred(import_id: &str) -> Self {
        Self {
            import_id: Some(import_id.to_string()),
            ..Self::default()
        }
    }

    fn has_counts(&self) -> bool {
        self.total.is_some() || self.created.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusReport {
    pub status: JobStatus,
    #[serde(default)]
    pub total: u64,
    #[serde(default, alias = "successful")]
    pub created: u64,
    #[serde(default)]
    pub skipped: u64,
    #[serde(default)]
    pub failed: u64,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl JobStatusReport {
    pub fn into_job(self, import_id: &str) -> ImportJob {
        ImportJob {
            id: Some(import_id.to_string()),
            status: self.status,
            total: self.total,
            created: self.created,
            skipped: self.skipped,
            failed: self.failed,
            error_message: self.error_message,
        }
    }
}

/// What to do when the backend accepts an upload without returning a job id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingJobPolicy {
    /// Treat the upload as finished and report the submitted count.
    SynthesizeResult,
    Fail,
}

/// How a submission resolved, decided once from the response shape.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionOutcome {
    /// Results are already known; nothing to poll.
    Immediate(ImportJob),
    /// A backend job was created and must be polled.
    Deferred(String),
}

impl SubmissionOutcome {
    pub fn from_response(
        response: CreateJobResponse,
        policy: MissingJobPolicy,
        submitted: u64,
    ) -> Result<Self> {
        if let Some(id) = response.import_id.as_deref().filter(|id| !id.is_empty()) {
            return Ok(Self::Deferred(id.to_string()));
        }
        if policy == MissingJobPolicy::Fail {
            return Err(ImportError::MissingJobId);
        }
        if !response.has_counts() {
            return Ok(Self::Immediate(ImportJob::completed_locally(submitted)));
        }
        let created = response.created.unwrap_or(0);
        Ok(Self::Immediate(ImportJob {
            id: None,
            status: response.status.unwrap_or(JobStatus::Completed),
            total: response.total.unwrap_or(created),
            created,
            skipped: response.skipped.unwrap_or(0),
            failed: response.failed.unwrap_or(0),
            error_message: response.error_message,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_means_deferred() {
        let outcome = SubmissionOutcome::from_response(
            CreateJobResponse::deferred("imp_1"),
            MissingJobPolicy::Fail,
            3,
        )
        .unwrap();
        assert_eq!(outcome, SubmissionOutcome::Deferred("imp_1".into()));
    }

    #[test]
    fn test_missing_id_synthesizes_completed_result() {
        let outcome = SubmissionOutcome::from_response(
            CreateJobResponse::default(),
            MissingJobPolicy::SynthesizeResult,
            2,
        )
        .unwrap();
        let SubmissionOutcome::Immediate(job) = outcome else {
            panic!("expected immediate outcome");
        };
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!((job.total, job.created, job.skipped, job.failed), (2, 2, 0, 0));
    }

    #[test]
    fn test_missing_id_uses_synchronous_counts() {
        let response: CreateJobResponse =
            serde_json::from_str(r#"{"total":5,"successful":4,"skipped":1,"failed":0}"#).unwrap();
        let outcome =
            SubmissionOutcome::from_response(response, MissingJobPolicy::SynthesizeResult, 9)
                .unwrap();
        let SubmissionOutcome::Immediate(job) = outcome else {
            panic!("expected immediate outcome");
        };
        assert_eq!((job.total, job.created, job.skipped), (5, 4, 1));
    }

    #[test]
    fn test_missing_id_fails_under_strict_policy() {
        let err = SubmissionOutcome::from_response(
            CreateJobResponse::default(),
            MissingJobPolicy::Fail,
            1,
        )
        .unwrap_err();
        assert!(matches!(err, ImportError::MissingJobId));
    }

    #[test]
    fn test_empty_id_is_treated_as_missing() {
        let response: CreateJobResponse = serde_json::from_str(r#"{"importId":""}"#).unwrap();
        assert!(SubmissionOutcome::from_response(response, MissingJobPolicy::Fail, 1).is_err());
    }

    #[test]
    fn test_status_report_accepts_successful_alias() {
        let report: JobStatusReport = serde_json::from_str(
            r#"{"status":"failed","total":3,"successful":1,"failed":2,"errorMessage":"bad rows"}"#,
        )
        .unwrap();
        let job = report.into_job("imp_9");
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.created, 1);
        assert_eq!(job.error_message.as_deref(), Some("bad rows"));
    }
}
