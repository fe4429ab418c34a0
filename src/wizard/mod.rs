//! The import wizard: a linear step machine that drives decoding, mapping,
//! transformation, selection and submission for one entity type.

mod profile;
mod steps;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::backend::{CreateJobResponse, ImportBackend, JobRequest, SubmissionOutcome};
use crate::decoder::{self, DecodeOptions, UploadKind, UploadedFile};
use crate::error::{ImportError, Result};
use crate::mapping::MappingEngine;
use crate::models::{FieldCatalog, ImportJob, JobStatus, RawWorkbook};
use crate::poller::{PollHandle, PollState, DEFAULT_POLL_INTERVAL};
use crate::selection::{build_filtered_csv, ExportPlan, SelectionSet};
use crate::transform::{CandidateRecord, TransformInput};

pub use profile::{ContactsProfile, ImportProfile, StepView, TransactionsProfile};
pub use steps::{ContactStep, StepKind, TransactionStep, WizardStep};

pub type ContactImport = ImportPipeline<ContactsProfile>;
pub type TransactionImport = ImportPipeline<TransactionsProfile>;

/// Everything one wizard instance owns.
pub struct WizardState<P: ImportProfile> {
    pub step: P::Step,
    pub upload: Option<UploadedFile>,
    pub workbook: Option<RawWorkbook>,
    pub has_header_row: bool,
    pub mapping: MappingEngine,
    pub options: P::Options,
    pub records: Vec<P::Record>,
    pub selection: SelectionSet,
    pub job: Option<ImportJob>,
    pub loading: bool,
    pub error: Option<String>,
    submission: Option<PendingSubmission>,
    poller: Option<PollHandle>,
}

/// An upload request handed to the runtime. It outlives a dropped
/// [`ImportPipeline::submit`] future, so the outcome can still be collected.
struct PendingSubmission {
    submitted: u64,
    task: JoinHandle<Result<CreateJobResponse>>,
}

impl<P: ImportProfile> WizardState<P> {
    fn new(has_header_row: bool, options: P::Options) -> Self {
        Self {
            step: P::Step::first(),
            upload: None,
            workbook: None,
            has_header_row,
            mapping: MappingEngine::new(),
            options,
            records: Vec::new(),
            selection: SelectionSet::new(),
            job: None,
            loading: false,
            error: None,
            submission: None,
            poller: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    pub has_header_row: bool,
    pub poll_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            has_header_row: true,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

pub struct ImportPipeline<P: ImportProfile> {
    backend: Arc<dyn ImportBackend>,
    config: PipelineConfig,
    initial_options: P::Options,
    state: WizardState<P>,
}

impl<P: ImportProfile> ImportPipeline<P> {
    pub fn new(backend: Arc<dyn ImportBackend>, config: PipelineConfig, options: P::Options) -> Self {
        Self {
            backend,
            config,
            state: WizardState::new(config.has_header_row, options.clone()),
            initial_options: options,
        }
    }

    pub fn state(&self) -> &WizardState<P> {
        &self.state
    }

    pub fn step(&self) -> P::Step {
        self.state.step
    }

    pub fn records(&self) -> &[P::Record] {
        &self.state.records
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.state.selection
    }

    pub fn job(&self) -> Option<&ImportJob> {
        self.state.job.as_ref()
    }

    pub fn mapping(&self) -> &MappingEngine {
        &self.state.mapping
    }

    pub fn options(&self) -> &P::Options {
        &self.state.options
    }

    // -----------------------------------------------------------------------
    // Upload
    // -----------------------------------------------------------------------

    /// Read, validate and decode a file from disk.
    pub async fn select_file(&mut self, path: &Path) -> Result<()> {
        self.state.loading = true;
        match UploadedFile::read(path).await {
            Ok(upload) => self.load_upload(upload),
            Err(e) => Err(self.file_error(e)),
        }
    }

    /// Decode an already-accepted upload and make it the current file.
    pub fn load_upload(&mut self, upload: UploadedFile) -> Result<()> {
        self.state.loading = true;
        let options = DecodeOptions {
            has_header_row: self.state.has_header_row,
            skip_blank_rows: P::SKIP_BLANK_ROWS,
        };
        let workbook = match decoder::decode(&upload, options) {
            Ok(wb) => wb,
            Err(e) => return Err(self.file_error(e)),
        };
        self.state.mapping.retain_columns(&workbook.column_names());
        self.state.upload = Some(upload);
        self.state.workbook = Some(workbook);
        self.set_records(Vec::new());
        self.state.error = None;
        self.state.loading = false;
        self.maybe_auto_map();
        Ok(())
    }

    fn file_error(&mut self, e: ImportError) -> ImportError {
        warn!(error = %e, "rejected upload");
        self.state.loading = false;
        self.state.error = Some(e.to_string());
        e
    }

    /// Toggle the header-row flag, re-decoding the current file if any.
    pub fn set_has_header_row(&mut self, has_header_row: bool) -> Result<()> {
        if self.state.has_header_row == has_header_row {
            return Ok(());
        }
        self.state.has_header_row = has_header_row;
        match self.state.upload.clone() {
            Some(upload) => self.load_upload(upload),
            None => Ok(()),
        }
    }

    // -----------------------------------------------------------------------
    // Fields and mapping
    // -----------------------------------------------------------------------

    /// Fetch the field catalog for the current entity and column mode.
    pub async fn load_fields(&mut self) -> Result<()> {
        self.state.loading = true;
        let mode = P::column_mode(&self.state.options);
        let result = self.backend.field_catalog(P::ENTITY, mode).await;
        self.state.loading = false;
        self.install_catalog(result)
    }

    /// Use the built-in field set without asking the backend.
    pub fn use_default_fields(&mut self) {
        let mode = P::column_mode(&self.state.options).unwrap_or_default();
        self.state.mapping.use_defaults(P::ENTITY, mode);
        self.fields_installed();
    }

    fn install_catalog(&mut self, result: Result<FieldCatalog>) -> Result<()> {
        let mode = P::column_mode(&self.state.options).unwrap_or_default();
        if let Err(e) = self.state.mapping.apply_catalog(result, P::ENTITY, mode) {
            warn!(entity = %P::ENTITY, error = %e, "failed to load field catalog");
            self.state.error = Some(e.to_string());
            return Err(e);
        }
        self.fields_installed();
        Ok(())
    }

    fn fields_installed(&mut self) {
        let date_format = P::date_format_mut(&mut self.state.options);
        if date_format.is_empty() {
            if let Some(first) = self.state.mapping.date_formats().first() {
                *date_format = first.clone();
            }
        }
        self.maybe_auto_map();
    }

    /// Auto-map only while the wizard sits on its mapping step.
    fn maybe_auto_map(&mut self) {
        if self.state.step.kind() != StepKind::Mapping {
            return;
        }
        if let Some(wb) = &self.state.workbook {
            self.state.mapping.auto_map(&wb.column_names());
        }
    }

    pub fn set_mapping(&mut self, key: &str, column: &str) {
        self.state.mapping.set(key, column);
    }

    /// Edit the format options. Returns true when the column mode changed,
    /// which invalidates the field catalog and mapping.
    pub fn update_options<F>(&mut self, edit: F) -> bool
    where
        F: FnOnce(&mut P::Options),
    {
        let before = P::column_mode(&self.state.options);
        edit(&mut self.state.options);
        let changed = before != P::column_mode(&self.state.options);
        if changed {
            debug!("column mode changed, clearing field catalog");
            self.state.mapping.clear();
        }
        changed
    }

    // -----------------------------------------------------------------------
    // Navigation
    // -----------------------------------------------------------------------

    /// Whether the "Continue" affordance is enabled. Not enforced by
    /// [`ImportPipeline::next_step`].
    pub fn can_proceed(&self) -> bool {
        if self.state.loading && !self.submission_ready() {
            return false;
        }
        let view = StepView {
            has_file: self.state.workbook.is_some(),
            mapping_valid: self.state.mapping.is_valid(),
            record_count: self.state.records.len(),
            options: &self.state.options,
        };
        P::can_proceed(self.state.step, &view)
    }

    /// Advance one step. Leaving the mapping step transforms the rows first;
    /// leaving review submits instead of moving.
    pub async fn next_step(&mut self) -> Result<()> {
        match self.state.step.kind() {
            StepKind::Review => {
                self.submit().await?;
                Ok(())
            }
            StepKind::Mapping => {
                self.transform();
                self.advance();
                Ok(())
            }
            _ => {
                self.advance();
                Ok(())
            }
        }
    }

    fn advance(&mut self) {
        if let Some(next) = self.state.step.next() {
            self.go_to_step(next);
        }
    }

    pub fn prev_step(&mut self) {
        if let Some(prev) = self.state.step.prev() {
            self.go_to_step(prev);
        }
    }

    pub fn go_to_step(&mut self, step: P::Step) {
        if self.state.step.kind() == StepKind::Results && step.kind() != StepKind::Results {
            if let Some(poller) = self.state.poller.take() {
                poller.cancel();
            }
        }
        debug!(from = ?self.state.step, to = ?step, "wizard step");
        self.state.step = step;
        self.maybe_auto_map();
    }

    // -----------------------------------------------------------------------
    // Records and selection
    // -----------------------------------------------------------------------

    /// Rebuild the candidate records from the current file, mapping and options.
    pub fn transform(&mut self) -> usize {
        let records = match &self.state.workbook {
            Some(workbook) => P::transform(&TransformInput {
                workbook,
                mapping: self.state.mapping.mapping(),
                fields: self.state.mapping.fields(),
                options: &self.state.options,
            }),
            None => Vec::new(),
        };
        let count = records.len();
        self.set_records(records);
        info!(entity = %P::ENTITY, records = count, "prepared candidate records");
        count
    }

    /// Replace the candidates wholesale; everything becomes selected.
    pub fn set_records(&mut self, records: Vec<P::Record>) {
        self.state
            .selection
            .replace(records.iter().map(|r| r.id().to_string()));
        self.state.records = records;
    }

    pub fn toggle(&mut self, id: &str) -> bool {
        self.state.selection.toggle(id)
    }

    pub fn select_all(&mut self) {
        self.state.selection.select_all();
    }

    pub fn deselect_all(&mut self) {
        self.state.selection.deselect_all();
    }

    // -----------------------------------------------------------------------
    // Submission and results
    // -----------------------------------------------------------------------

    fn build_request(&self) -> Result<(JobRequest, u64)> {
        let (upload, workbook) = match (&self.state.upload, &self.state.workbook) {
            (Some(u), Some(wb)) => (u, wb),
            _ => return Err(ImportError::Validation("no file selected".into())),
        };
        let records = &self.state.records;
        let rows: HashMap<&str, usize> = records
            .iter()
            .map(|r| (r.id(), r.row_index()))
            .collect();
        let plan = self
            .state
            .selection
            .export_plan(|id| rows.get(id).copied());
        let (file_name, mime, bytes) = match plan {
            ExportPlan::Original => (
                upload.file_name.clone(),
                upload.kind.mime(),
                upload.bytes.clone(),
            ),
            ExportPlan::Filtered(rows) => (
                filtered_name(&upload.file_name),
                UploadKind::Csv.mime(),
                build_filtered_csv(workbook, &rows)?,
            ),
        };
        let submitted = match self.state.selection.len() {
            0 => records.len() as u64,
            n => n as u64,
        };
        let request = JobRequest {
            entity: P::ENTITY,
            file_name,
            mime,
            bytes,
            mapping: self.state.mapping.mapping().inverse(),
            options: P::job_options(&self.state.options),
        };
        Ok((request, submitted))
    }

    /// Upload the selection. On success the wizard jumps to the results step;
    /// on failure it stays on review with the error recorded.
    ///
    /// If an earlier call was dropped before the backend answered, this waits
    /// for that same request instead of uploading again.
    pub async fn submit(&mut self) -> Result<SubmissionOutcome> {
        if self.state.submission.is_none() {
            let (request, submitted) = self.build_request()?;
            info!(
                entity = %P::ENTITY,
                file = %request.file_name,
                submitted,
                "submitting import"
            );
            self.state.loading = true;
            let backend = self.backend.clone();
            self.state.submission = Some(PendingSubmission {
                submitted,
                task: tokio::spawn(async move { backend.create_job(request).await }),
            });
        } else {
            debug!(entity = %P::ENTITY, "resuming submission already in flight");
        }
        let Some(pending) = self.state.submission.as_mut() else {
            return Err(ImportError::Other("no submission in flight".into()));
        };
        let joined = (&mut pending.task).await;
        let submitted = pending.submitted;
        self.state.submission = None;

        let outcome = joined
            .map_err(|e| ImportError::Other(format!("submission task failed: {e}")))
            .and_then(|response| response)
            .and_then(|r| SubmissionOutcome::from_response(r, P::MISSING_JOB, submitted));
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(entity = %P::ENTITY, error = %e, "import submission failed");
                self.state.loading = false;
                self.state.error = Some(e.to_string());
                return Err(e);
            }
        };

        self.state.error = None;
        match &outcome {
            SubmissionOutcome::Immediate(job) => {
                self.state.job = Some(job.clone());
                self.state.loading = false;
                self.go_to_step(P::Step::last());
            }
            SubmissionOutcome::Deferred(import_id) => {
                self.state.job = Some(ImportJob::pending(import_id));
                self.go_to_step(P::Step::last());
                self.state.poller = Some(PollHandle::spawn(
                    self.backend.clone(),
                    P::ENTITY,
                    import_id.clone(),
                    self.config.poll_interval,
                ));
            }
        }
        Ok(outcome)
    }

    /// Wait for the job to finish, reporting each pending status along the way.
    pub async fn wait_for_results_with<F>(&mut self, mut on_progress: F) -> Result<ImportJob>
    where
        F: FnMut(&ImportJob),
    {
        let Some(poller) = self.state.poller.as_mut() else {
            return self.settled_job();
        };
        // The poller stays in the state until it settles, so a dropped wait
        // can be resumed.
        let mut state = poller.current();
        loop {
            match state {
                PollState::Pending(job) => {
                    on_progress(&job);
                    self.state.job = Some(job);
                    state = poller.changed().await;
                }
                PollState::Finished(job) => {
                    self.state.poller = None;
                    self.state.loading = false;
                    self.state.job = Some(job);
                    return self.settled_job();
                }
                PollState::Errored(message) => {
                    self.state.poller = None;
                    self.state.loading = false;
                    self.state.error = Some(message.clone());
                    return Err(ImportError::Transport(message));
                }
            }
        }
    }

    pub async fn wait_for_results(&mut self) -> Result<ImportJob> {
        self.wait_for_results_with(|_| {}).await
    }

    fn settled_job(&mut self) -> Result<ImportJob> {
        let Some(job) = self.state.job.clone() else {
            return Err(ImportError::Other("nothing has been submitted".into()));
        };
        if job.status == JobStatus::Failed {
            let message = job
                .error_message
                .clone()
                .unwrap_or_else(|| "the import could not be completed".into());
            self.state.error = Some(message.clone());
            return Err(ImportError::JobFailure(message));
        }
        Ok(job)
    }

    pub async fn download_template(&self) -> Result<Vec<u8>> {
        self.backend.download_template(P::ENTITY).await
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Back to step one with nothing loaded. Stops any local polling and
    /// abandons an upload that has not answered yet.
    pub fn reset(&mut self) {
        if let Some(poller) = self.state.poller.take() {
            poller.cancel();
        }
        if let Some(pending) = self.state.submission.take() {
            pending.task.abort();
        }
        self.state = WizardState::new(self.config.has_header_row, self.initial_options.clone());
    }

    /// An upload request was sent and the backend has not answered yet.
    pub fn submission_pending(&self) -> bool {
        self.state
            .submission
            .as_ref()
            .is_some_and(|pending| !pending.task.is_finished())
    }

    /// The backend answered an upload whose outcome was never collected.
    fn submission_ready(&self) -> bool {
        self.state
            .submission
            .as_ref()
            .is_some_and(|pending| pending.task.is_finished())
    }

    /// Reset, unless an upload request is still in flight.
    pub fn close(&mut self) -> Result<()> {
        if self.submission_pending() {
            warn!(entity = %P::ENTITY, "refusing to close while submission is pending");
            return Err(ImportError::SubmissionPending);
        }
        self.reset();
        Ok(())
    }
}

fn filtered_name(original: &str) -> String {
    let stem = Path::new(original)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("import");
    format!("{stem}-selected.csv")
}
