use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use super::{CreateJobResponse, ImportBackend, JobRequest, JobStatusReport};
use crate::error::{ImportError, Result};
use crate::models::{ColumnMode, EntityKind, FieldCatalog, JobStatus};

/// Scripted in-memory backend for pipeline tests.
#[derive(Default)]
pub struct MockBackend {
    pub catalog: Mutex<Option<FieldCatalog>>,
    pub create_response: Mutex<Option<Result<CreateJobResponse>>>,
    pub statuses: Mutex<VecDeque<Result<JobStatusReport>>>,
    pub requests: Mutex<Vec<JobRequest>>,
    pub catalog_modes: Mutex<Vec<Option<ColumnMode>>>,
    pub status_calls: AtomicUsize,
    /// When set, `create_job` records the request and then waits for a notification.
    pub create_gate: Mutex<Option<Arc<Notify>>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_create(self, response: Result<CreateJobResponse>) -> Self {
        *self.create_response.lock().unwrap() = Some(response);
        self
    }

    pub fn with_create_gate(self, gate: Arc<Notify>) -> Self {
        *self.create_gate.lock().unwrap() = Some(gate);
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn with_catalog(self, catalog: FieldCatalog) -> Self {
        *self.catalog.lock().unwrap() = Some(catalog);
        self
    }

    pub fn push_status(&self, status: JobStatus, total: u64, created: u64) {
        self.statuses.lock().unwrap().push_back(Ok(JobStatusReport {
            status,
            total,
            created,
            ..Default::default()
        }));
    }

    pub fn push_status_error(&self, message: &str) {
        self.statuses
            .lock()
            .unwrap()
            .push_back(Err(ImportError::Transport(message.to_string())));
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<JobRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ImportBackend for MockBackend {
    async fn field_catalog(
        &self,
        _entity: EntityKind,
        column_mode: Option<ColumnMode>,
    ) -> Result<FieldCatalog> {
        self.catalog_modes.lock().unwrap().push(column_mode);
        self.catalog
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ImportError::Transport("catalog unavailable".into()))
    }

    async fn download_template(&self, entity: EntityKind) -> Result<Vec<u8>> {
        Ok(format!("{entity} template\n").into_bytes())
    }

    async fn create_job(&self, request: JobRequest) -> Result<CreateJobResponse> {
        self.requests.lock().unwrap().push(request);
        let gate = self.create_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.create_response
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Ok(CreateJobResponse::default()))
    }

    async fn job_status(&self, _entity: EntityKind, _import_id: &str) -> Result<JobStatusReport> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(JobStatusReport::default()))
    }
}
