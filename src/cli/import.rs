use std::path::Path;

use colored::Colorize;

use crate::backend::SubmissionOutcome;
use crate::error::{ImportError, Result};
use crate::fmt::plural;
use crate::settings::{effective_settings, Settings};
use crate::transform::{CandidateRecord, ContactFormatOptions, TransactionFormatOptions};
use crate::wizard::{
    ContactImport, ImportPipeline, ImportProfile, PipelineConfig, StepKind, TransactionImport,
    WizardStep,
};

use super::render::{self, ReviewRow};
use super::{check_columns, connect, parse_map_overrides, AmountArgs, MappingArgs, SubmitArgs};

const REVIEW_LIMIT: usize = 50;

fn pipeline_config(settings: &Settings, args: &MappingArgs) -> PipelineConfig {
    PipelineConfig {
        has_header_row: settings.has_header_row && !args.no_header,
        poll_interval: settings.poll_interval(),
    }
}

pub async fn contacts(
    file: &str,
    contact_type: Option<String>,
    args: &MappingArgs,
    submit: &SubmitArgs,
) -> Result<()> {
    let settings = effective_settings();
    let options = ContactFormatOptions {
        date_format: args
            .date_format
            .clone()
            .unwrap_or_else(|| settings.date_format.clone()),
        contact_type,
    };
    let wizard: ContactImport =
        ImportPipeline::new(connect(&settings)?, pipeline_config(&settings, args), options);
    run_wizard(wizard, file, args, submit).await
}

pub async fn transactions(
    file: &str,
    account: &str,
    args: &MappingArgs,
    amounts: &AmountArgs,
    submit: &SubmitArgs,
) -> Result<()> {
    let settings = effective_settings();
    let options = TransactionFormatOptions {
        account_id: Some(account.to_string()),
        date_format: args
            .date_format
            .clone()
            .unwrap_or_else(|| settings.date_format.clone()),
        column_mode: amounts.column_mode,
        reverse: amounts.reverse,
    };
    let wizard: TransactionImport =
        ImportPipeline::new(connect(&settings)?, pipeline_config(&settings, args), options);
    run_wizard(wizard, file, args, submit).await
}

/// Walk the wizard non-interactively: upload, mapping, review, submit and
/// (unless told not to) wait for the job.
async fn run_wizard<P>(
    mut wizard: ImportPipeline<P>,
    file: &str,
    args: &MappingArgs,
    submit: &SubmitArgs,
) -> Result<()>
where
    P: ImportProfile,
    P::Record: ReviewRow,
{
    let overrides = parse_map_overrides(&args.map)?;
    wizard.select_file(Path::new(file)).await?;
    if let Some(workbook) = &wizard.state().workbook {
        check_columns(workbook, &overrides)?;
    }

    while wizard.step().kind() != StepKind::Mapping {
        if !wizard.can_proceed() {
            return Err(ImportError::Validation(format!(
                "cannot continue past '{}'",
                wizard.step().title()
            )));
        }
        wizard.next_step().await?;
    }

    if let Err(e) = wizard.load_fields().await {
        eprintln!("{} {e}. Using built-in fields.", "warning:".yellow().bold());
        wizard.use_default_fields();
    }
    for (key, column) in &overrides {
        wizard.set_mapping(key, column);
    }
    println!("Column mapping\n{}", render::mapping_table(wizard.mapping()));
    if !wizard.can_proceed() {
        return Err(ImportError::Validation(format!(
            "required fields are not mapped: {}. Use --map key=Column.",
            wizard.mapping().missing_required().join(", ")
        )));
    }

    wizard.next_step().await?;
    if wizard.records().is_empty() {
        return Err(ImportError::Validation("the file has no records to import".into()));
    }
    apply_selection(&mut wizard, submit)?;
    print_review(&wizard);

    match wizard.submit().await? {
        SubmissionOutcome::Immediate(job) => {
            println!("{}", render::status_line(&job));
            println!("{}", render::results_table(&job));
            Ok(())
        }
        SubmissionOutcome::Deferred(import_id) => {
            println!("Import {} queued", import_id.bold());
            if submit.no_wait {
                println!("Follow it with `ledgerport job {} {import_id}`", P::ENTITY);
                return Ok(());
            }
            let result = wizard
                .wait_for_results_with(|job| {
                    if job.total > 0 {
                        println!("{}", render::status_line(job));
                    }
                })
                .await;
            if let Some(job) = wizard.job().filter(|job| job.is_terminal()) {
                println!("{}", render::status_line(job));
                println!("{}", render::results_table(job));
            }
            result.map(|_| ())
        }
    }
}

fn apply_selection<P: ImportProfile>(
    wizard: &mut ImportPipeline<P>,
    submit: &SubmitArgs,
) -> Result<()> {
    if submit.none {
        wizard.deselect_all();
    }
    for id in &submit.exclude {
        if !wizard.records().iter().any(|r| r.id() == id.as_str()) {
            return Err(ImportError::Validation(format!("no record with id '{id}'")));
        }
        if wizard.selection().is_selected(id) {
            wizard.toggle(id);
        }
    }
    Ok(())
}

fn print_review<P>(wizard: &ImportPipeline<P>)
where
    P: ImportProfile,
    P::Record: ReviewRow,
{
    let records = wizard.records();
    let shown = &records[..records.len().min(REVIEW_LIMIT)];
    println!(
        "{}",
        render::review_table(shown, wizard.mapping().fields(), Some(wizard.selection()))
    );
    if records.len() > shown.len() {
        println!("... {} not shown", plural(records.len() - shown.len(), "more record"));
    }

    let selected = wizard.selection().len();
    if selected == 0 {
        println!("No records selected; the whole file will be sent.");
    } else {
        println!("Submitting {selected} of {}", plural(records.len(), "record"));
    }
}
