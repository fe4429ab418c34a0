use std::fmt;

use crate::backend::MissingJobPolicy;
use crate::models::{ColumnMode, EntityKind};
use crate::transform::{
    transform_contacts, transform_transactions, CandidateRecord, ContactFormatOptions,
    ContactRecord, TransactionFormatOptions, TransactionRecord, TransformInput,
};

use super::steps::{ContactStep, TransactionStep, WizardStep};

/// What the step-validity predicate gets to look at.
pub struct StepView<'a, O> {
    pub has_file: bool,
    pub mapping_valid: bool,
    pub record_count: usize,
    pub options: &'a O,
}

/// The entity-specific parts of an import wizard.
pub trait ImportProfile: Send + Sync + 'static {
    type Record: CandidateRecord;
    type Options: Clone + Default + fmt::Debug + PartialEq + Send + Sync;
    type Step: WizardStep;

    const ENTITY: EntityKind;
    const MISSING_JOB: MissingJobPolicy;
    /// Drop rows with no content before the header split.
    const SKIP_BLANK_ROWS: bool;

    fn column_mode(options: &Self::Options) -> Option<ColumnMode>;

    fn date_format_mut(options: &mut Self::Options) -> &mut String;

    fn transform(input: &TransformInput<'_, Self::Options>) -> Vec<Self::Record>;

    fn can_proceed(step: Self::Step, view: &StepView<'_, Self::Options>) -> bool;

    /// Extra form fields sent with the upload.
    fn job_options(options: &Self::Options) -> Vec<(&'static str, String)>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ContactsProfile;

impl ImportProfile for ContactsProfile {
    type Record = ContactRecord;
    type Options = ContactFormatOptions;
    type Step = ContactStep;

    const ENTITY: EntityKind = EntityKind::Contacts;
    const MISSING_JOB: MissingJobPolicy = MissingJobPolicy::SynthesizeResult;
    const SKIP_BLANK_ROWS: bool = true;

    fn column_mode(_options: &Self::Options) -> Option<ColumnMode> {
        None
    }

    fn date_format_mut(options: &mut Self::Options) -> &mut String {
        &mut options.date_format
    }

    fn transform(input: &TransformInput<'_, Self::Options>) -> Vec<Self::Record> {
        transform_contacts(input)
    }

    fn can_proceed(step: Self::Step, view: &StepView<'_, Self::Options>) -> bool {
        match step {
            ContactStep::Upload => view.has_file,
            ContactStep::Mapping => view.mapping_valid,
            ContactStep::Review => view.record_count > 0,
            ContactStep::Results => false,
        }
    }

    fn job_options(options: &Self::Options) -> Vec<(&'static str, String)> {
        let mut out = vec![("dateFormat", options.date_format.clone())];
        if let Some(kind) = options.contact_type.as_ref().filter(|t| !t.is_empty()) {
            out.push(("type", kind.clone()));
        }
        out
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionsProfile;

impl ImportProfile for TransactionsProfile {
    type Record = TransactionRecord;
    type Options = TransactionFormatOptions;
    type Step = TransactionStep;

    const ENTITY: EntityKind = EntityKind::Transactions;
    const MISSING_JOB: MissingJobPolicy = MissingJobPolicy::Fail;
    const SKIP_BLANK_ROWS: bool = false;

    fn column_mode(options: &Self::Options) -> Option<ColumnMode> {
        Some(options.column_mode)
    }

    fn date_format_mut(options: &mut Self::Options) -> &mut String {
        &mut options.date_format
    }

    fn transform(input: &TransformInput<'_, Self::Options>) -> Vec<Self::Record> {
        transform_transactions(input)
    }

    fn can_proceed(step: Self::Step, view: &StepView<'_, Self::Options>) -> bool {
        match step {
            TransactionStep::Upload => view.has_file,
            TransactionStep::Account => view
                .options
                .account_id
                .as_deref()
                .is_some_and(|id| !id.trim().is_empty()),
            TransactionStep::FileSetup => {
                view.mapping_valid && !view.options.date_format.trim().is_empty()
            }
            TransactionStep::Review => view.record_count > 0,
            TransactionStep::Results => false,
        }
    }

    fn job_options(options: &Self::Options) -> Vec<(&'static str, String)> {
        let mut out = Vec::with_capacity(4);
        if let Some(account) = &options.account_id {
            out.push(("accountId", account.clone()));
        }
        out.push(("dateFormat", options.date_format.clone()));
        out.push(("columnMode", options.column_mode.key().to_string()));
        out.push(("reverse", options.reverse.to_string()));
        out
    }
}
