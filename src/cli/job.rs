use crate::error::{ImportError, Result};
use crate::models::{EntityKind, JobStatus};
use crate::poller::{PollHandle, PollState};
use crate::settings::effective_settings;

use super::{connect, render};

/// Poll an existing job until it reaches a terminal status.
pub async fn run(entity: EntityKind, import_id: &str) -> Result<()> {
    let settings = effective_settings();
    let backend = connect(&settings)?;
    let mut poller = PollHandle::spawn(
        backend,
        entity,
        import_id.to_string(),
        settings.poll_interval(),
    );

    let mut state = poller.current();
    let job = loop {
        match state {
            PollState::Pending(job) => {
                if job.total > 0 {
                    println!("{}", render::status_line(&job));
                }
                state = poller.changed().await;
            }
            PollState::Finished(job) => break job,
            PollState::Errored(message) => return Err(ImportError::Transport(message)),
        }
    };

    println!("{}", render::status_line(&job));
    println!("{}", render::results_table(&job));
    if job.status == JobStatus::Failed {
        return Err(ImportError::JobFailure(
            job.error_message
                .unwrap_or_else(|| "the import could not be completed".into()),
        ));
    }
    Ok(())
}
