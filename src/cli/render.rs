use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::fmt::{money, plural, truncate};
use crate::mapping::MappingEngine;
use crate::models::{FieldDefinition, ImportJob, JobStatus};
use crate::selection::SelectionSet;
use crate::transform::{CandidateRecord, ContactRecord, TransactionRecord};

const MAX_CELL: usize = 40;

/// How a candidate record shows up in the review table.
pub trait ReviewRow: CandidateRecord {
    fn header(fields: &[FieldDefinition]) -> Vec<String>;

    fn cells(&self, fields: &[FieldDefinition]) -> Vec<Cell>;
}

impl ReviewRow for ContactRecord {
    fn header(fields: &[FieldDefinition]) -> Vec<String> {
        fields.iter().map(|f| f.label.clone()).collect()
    }

    fn cells(&self, fields: &[FieldDefinition]) -> Vec<Cell> {
        fields
            .iter()
            .map(|f| {
                let text = self.field(&f.key).map(|v| v.as_text()).unwrap_or_default();
                Cell::new(truncate(&text, MAX_CELL))
            })
            .collect()
    }
}

impl ReviewRow for TransactionRecord {
    fn header(_fields: &[FieldDefinition]) -> Vec<String> {
        vec!["Date".into(), "Description".into(), "Amount".into()]
    }

    fn cells(&self, _fields: &[FieldDefinition]) -> Vec<Cell> {
        let amount = if self.amount < 0.0 {
            money(self.amount).red().to_string()
        } else {
            money(self.amount).green().to_string()
        };
        vec![
            Cell::new(&self.date),
            Cell::new(truncate(&self.description, MAX_CELL)),
            Cell::new(amount),
        ]
    }
}

pub fn mapping_table(engine: &MappingEngine) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Field", "Column", "Required"]);
    for field in engine.fields() {
        let column = match engine.mapping().get(&field.key) {
            Some(column) => column.to_string(),
            None if field.required => "(unmapped)".red().to_string(),
            None => "-".to_string(),
        };
        table.add_row(vec![
            Cell::new(&field.label),
            Cell::new(column),
            Cell::new(if field.required { "yes" } else { "" }),
        ]);
    }
    table
}

pub fn review_table<R: ReviewRow>(
    records: &[R],
    fields: &[FieldDefinition],
    selection: Option<&SelectionSet>,
) -> Table {
    let mut header = vec!["".to_string(), "ID".to_string()];
    header.extend(R::header(fields));
    let mut table = Table::new();
    table.set_header(header);
    for record in records {
        let mark = match selection {
            Some(sel) if !sel.is_selected(record.id()) => " ",
            _ => "✓",
        };
        let mut row = vec![Cell::new(mark), Cell::new(record.id())];
        row.extend(record.cells(fields));
        table.add_row(row);
    }
    table
}

pub fn fields_table(fields: &[FieldDefinition]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Key", "Label", "Required", "Format"]);
    for field in fields {
        table.add_row(vec![
            Cell::new(&field.key),
            Cell::new(&field.label),
            Cell::new(if field.required { "yes" } else { "" }),
            Cell::new(field.format_hint.as_deref().unwrap_or("")),
        ]);
    }
    table
}

pub fn status_line(job: &ImportJob) -> String {
    let status = match job.status {
        JobStatus::Completed => job.status.to_string().green().bold(),
        JobStatus::Failed => job.status.to_string().red().bold(),
        JobStatus::Pending => job.status.to_string().yellow(),
    };
    format!(
        "{status}: {} of {} processed",
        job.created + job.skipped + job.failed,
        plural(job.total as usize, "record")
    )
}

pub fn results_table(job: &ImportJob) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Total", "Created", "Skipped", "Failed"]);
    table.add_row(vec![
        Cell::new(job.total),
        Cell::new(job.created.to_string().green()),
        Cell::new(job.skipped),
        Cell::new(if job.failed > 0 {
            job.failed.to_string().red().to_string()
        } else {
            job.failed.to_string()
        }),
    ]);
    table
}
