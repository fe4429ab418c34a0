use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::backend::ImportBackend;
use crate::models::{EntityKind, ImportJob};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1500);

/// Latest thing the poller knows about a job.
#[derive(Debug, Clone, PartialEq)]
pub enum PollState {
    Pending(ImportJob),
    Finished(ImportJob),
    /// A status request failed; polling has stopped.
    Errored(String),
}

impl PollState {
    pub fn is_done(&self) -> bool {
        !matches!(self, Self::Pending(_))
    }
}

/// Handle to a running status poller. Dropping it stops polling locally;
/// the backend job is not cancelled.
pub struct PollHandle {
    state: watch::Receiver<PollState>,
    task: JoinHandle<()>,
}

impl PollHandle {
    /// Query once, then wait `interval` after each response before asking
    /// again, so at most one request is ever outstanding.
    pub fn spawn(
        backend: Arc<dyn ImportBackend>,
        entity: EntityKind,
        import_id: String,
        interval: Duration,
    ) -> Self {
        let (tx, rx) = watch::channel(PollState::Pending(ImportJob::pending(&import_id)));
        let task = tokio::spawn(async move {
            loop {
                let next = match backend.job_status(entity, &import_id).await {
                    Ok(report) => {
                        let job = report.into_job(&import_id);
                        debug!(import_id = %import_id, status = %job.status, "polled import job");
                        if job.is_terminal() {
                            info!(
                                import_id = %import_id,
                                status = %job.status,
                                created = job.created,
                                failed = job.failed,
                                "import job finished"
                            );
                            PollState::Finished(job)
                        } else {
                            PollState::Pending(job)
                        }
                    }
                    Err(e) => {
                        warn!(import_id = %import_id, error = %e, "polling import job failed");
                        PollState::Errored(e.to_string())
                    }
                };
                let done = next.is_done();
                if tx.send(next).is_err() || done {
                    break;
                }
                tokio::time::sleep(interval).await;
            }
        });
        Self { state: rx, task }
    }

    pub fn current(&self) -> PollState {
        self.state.borrow().clone()
    }

    /// Wait for the next state change.
    pub async fn changed(&mut self) -> PollState {
        if self.state.changed().await.is_err() {
            return self.stopped_state();
        }
        self.state.borrow_and_update().clone()
    }

    /// Wait until the job finishes or polling errors out.
    pub async fn finished(&mut self) -> PollState {
        loop {
            let state = self.state.borrow_and_update().clone();
            if state.is_done() {
                return state;
            }
            if self.state.changed().await.is_err() {
                return self.stopped_state();
            }
        }
    }

    fn stopped_state(&self) -> PollState {
        match self.current() {
            PollState::Pending(_) => PollState::Errored("polling stopped".into()),
            done => done,
        }
    }

    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
