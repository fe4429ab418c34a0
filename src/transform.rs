use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::mapping::FieldMapping;
use crate::models::{CellValue, ColumnMode, FieldDefinition, RawData, RawWorkbook};

/// A parsed row awaiting the user's approval.
pub trait CandidateRecord: Clone + Serialize + Send + Sync + 'static {
    fn id(&self) -> &str;
    /// Position in the data-row sequence of the source workbook.
    fn row_index(&self) -> usize;
    fn raw_data(&self) -> &RawData;
}

pub struct TransformInput<'a, O> {
    pub workbook: &'a RawWorkbook,
    pub mapping: &'a FieldMapping,
    pub fields: &'a [FieldDefinition],
    pub options: &'a O,
}

impl<O> TransformInput<'_, O> {
    /// Column index for a field key, resolved once per field.
    fn column_indices(&self) -> BTreeMap<&str, Option<usize>> {
        self.fields
            .iter()
            .map(|f| {
                let idx = self
                    .mapping
                    .get(&f.key)
                    .and_then(|column| self.workbook.column_index(column));
                (f.key.as_str(), idx)
            })
            .collect()
    }
}

fn cell<'a>(row: &'a [CellValue], idx: Option<usize>) -> Option<&'a CellValue> {
    idx.and_then(|i| row.get(i))
}

fn record_id(prefix: &str, position: usize) -> String {
    format!("{prefix}-{position}")
}

// ---------------------------------------------------------------------------
// Amount parsing
// ---------------------------------------------------------------------------

pub fn parse_amount(raw: &str) -> f64 {
    let s = raw.replace(',', "").replace('"', "").replace('$', "");
    let s = s.trim();
    if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        return -inner.trim().parse::<f64>().unwrap_or(0.0);
    }
    s.parse().unwrap_or(0.0)
}

fn cell_amount(value: Option<&CellValue>) -> f64 {
    match value {
        Some(CellValue::Float(f)) => *f,
        Some(CellValue::Int(i)) => *i as f64,
        Some(CellValue::Text(s)) => parse_amount(s),
        _ => 0.0,
    }
}

// ---------------------------------------------------------------------------
// Contacts
// ---------------------------------------------------------------------------

pub const CONTACT_ID_PREFIX: &str = "contact";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContactFormatOptions {
    pub date_format: String,
    /// Contact type sent with the upload, e.g. `customer` or `supplier`.
    pub contact_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactRecord {
    pub id: String,
    #[serde(flatten)]
    pub fields: BTreeMap<String, CellValue>,
    pub raw_data: RawData,
    #[serde(skip)]
    pub row_index: usize,
}

impl ContactRecord {
    pub fn field(&self, key: &str) -> Option<&CellValue> {
        self.fields.get(key)
    }
}

impl CandidateRecord for ContactRecord {
    fn id(&self) -> &str {
        &self.id
    }

    fn row_index(&self) -> usize {
        self.row_index
    }

    fn raw_data(&self) -> &RawData {
        &self.raw_data
    }
}

/// Mapped fields are copied verbatim; nothing is coerced or dropped.
pub fn transform_contacts(input: &TransformInput<'_, ContactFormatOptions>) -> Vec<ContactRecord> {
    let indices = input.column_indices();
    input
        .workbook
        .rows
        .iter()
        .enumerate()
        .map(|(position, row)| {
            let fields = indices
                .iter()
                .filter_map(|(key, idx)| cell(row, *idx).map(|v| (key.to_string(), v.clone())))
                .collect();
            ContactRecord {
                id: record_id(CONTACT_ID_PREFIX, position),
                fields,
                raw_data: input.workbook.raw_data(row),
                row_index: position,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

pub const TRANSACTION_ID_PREFIX: &str = "transaction";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionFormatOptions {
    pub account_id: Option<String>,
    pub date_format: String,
    pub column_mode: ColumnMode,
    /// Flip the sign of every computed amount.
    pub reverse: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub id: String,
    pub date: String,
    pub description: String,
    pub amount: f64,
    pub raw_data: RawData,
    #[serde(skip)]
    pub row_index: usize,
}

impl TransactionRecord {
    fn is_empty(&self) -> bool {
        self.date.is_empty()
            && self.description.is_empty()
            && (self.amount == 0.0 || self.amount.is_nan())
    }
}

impl CandidateRecord for TransactionRecord {
    fn id(&self) -> &str {
        &self.id
    }

    fn row_index(&self) -> usize {
        self.row_index
    }

    fn raw_data(&self) -> &RawData {
        &self.raw_data
    }
}

pub fn transform_transactions(
    input: &TransformInput<'_, TransactionFormatOptions>,
) -> Vec<TransactionRecord> {
    let indices = input.column_indices();
    let index_of = |key: &str| indices.get(key).copied().flatten();
    let (date_idx, desc_idx) = (index_of("date"), index_of("description"));
    let (amount_idx, credit_idx, debit_idx) =
        (index_of("amount"), index_of("credit"), index_of("debit"));
    let options = input.options;

    let mut records = Vec::with_capacity(input.workbook.rows.len());
    for (position, row) in input.workbook.rows.iter().enumerate() {
        let text = |idx| cell(row, idx).map(CellValue::as_text).unwrap_or_default();
        let mut amount = match options.column_mode {
            ColumnMode::Single => cell_amount(cell(row, amount_idx)),
            ColumnMode::Double => {
                cell_amount(cell(row, credit_idx)) - cell_amount(cell(row, debit_idx))
            }
        };
        if options.reverse {
            amount = -amount;
        }
        let record = TransactionRecord {
            id: record_id(TRANSACTION_ID_PREFIX, position),
            date: text(date_idx).trim().to_string(),
            description: text(desc_idx).trim().to_string(),
            amount,
            raw_data: input.workbook.raw_data(row),
            row_index: position,
        };
        if record.is_empty() {
            continue;
        }
        records.push(record);
    }
    debug!(
        rows = input.workbook.rows.len(),
        kept = records.len(),
        "transformed transaction rows"
    );
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{default_fields, MappingEngine};
    use crate::models::EntityKind;

    fn workbook(headers: &[&str], rows: &[&[&str]]) -> RawWorkbook {
        RawWorkbook {
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| CellValue::from(*c)).collect())
                .collect(),
        }
    }

    fn engine(entity: EntityKind, mode: ColumnMode, pairs: &[(&str, &str)]) -> MappingEngine {
        let mut engine = MappingEngine::with_fields(default_fields(entity, mode));
        for (key, column) in pairs {
            engine.set(key, column);
        }
        engine
    }

    fn run_transactions(
        wb: &RawWorkbook,
        engine: &MappingEngine,
        options: &TransactionFormatOptions,
    ) -> Vec<TransactionRecord> {
        transform_transactions(&TransformInput {
            workbook: wb,
            mapping: engine.mapping(),
            fields: engine.fields(),
            options,
        })
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1,234.56"), 1234.56);
        assert_eq!(parse_amount("\"500.00\""), 500.0);
        assert_eq!(parse_amount("  -42.50  "), -42.5);
        assert_eq!(parse_amount("(1,234.56)"), -1234.56);
        assert_eq!(parse_amount("$1,234.56"), 1234.56);
        assert_eq!(parse_amount("not_a_number"), 0.0);
    }

    #[test]
    fn test_contacts_copy_mapped_fields_and_keep_raw_row() {
        let wb = workbook(&["Name", "Email"], &[&["Ann", "a@x.com"], &["Bob", "b@x.com"]]);
        let engine = engine(
            EntityKind::Contacts,
            ColumnMode::Single,
            &[("displayName", "Name"), ("email", "Email")],
        );
        let records = transform_contacts(&TransformInput {
            workbook: &wb,
            mapping: engine.mapping(),
            fields: engine.fields(),
            options: &ContactFormatOptions::default(),
        });
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "contact-0");
        assert_eq!(records[1].id, "contact-1");
        assert_eq!(records[0].field("displayName"), Some(&CellValue::Text("Ann".into())));
        assert_eq!(records[1].field("email"), Some(&CellValue::Text("b@x.com".into())));
        assert_eq!(records[0].raw_data.len(), 2);
        assert_eq!(records[0].raw_data.get("Email"), Some(&CellValue::Text("a@x.com".into())));
    }

    #[test]
    fn test_contacts_keep_unmapped_columns_in_raw_data() {
        let wb = workbook(&["Name", "Notes"], &[&["Ann", "VIP"]]);
        let engine = engine(EntityKind::Contacts, ColumnMode::Single, &[("displayName", "Name")]);
        let records = transform_contacts(&TransformInput {
            workbook: &wb,
            mapping: engine.mapping(),
            fields: engine.fields(),
            options: &ContactFormatOptions::default(),
        });
        assert!(records[0].field("email").is_none());
        assert_eq!(records[0].raw_data.get("Notes"), Some(&CellValue::Text("VIP".into())));
    }

    #[test]
    fn test_contacts_without_headers_key_raw_data_by_index() {
        let wb = workbook(&[], &[&["Ann", "a@x.com"]]);
        let engine = engine(EntityKind::Contacts, ColumnMode::Single, &[("email", "1")]);
        let records = transform_contacts(&TransformInput {
            workbook: &wb,
            mapping: engine.mapping(),
            fields: engine.fields(),
            options: &ContactFormatOptions::default(),
        });
        assert_eq!(records[0].field("email"), Some(&CellValue::Text("a@x.com".into())));
        assert_eq!(records[0].raw_data.get("0"), Some(&CellValue::Text("Ann".into())));
    }

    #[test]
    fn test_transform_is_deterministic() {
        let wb = workbook(&["Name", "Email"], &[&["Ann", "a@x.com"], &["Bob", ""]]);
        let engine = engine(EntityKind::Contacts, ColumnMode::Single, &[("displayName", "Name")]);
        let input = TransformInput {
            workbook: &wb,
            mapping: engine.mapping(),
            fields: engine.fields(),
            options: &ContactFormatOptions::default(),
        };
        assert_eq!(transform_contacts(&input), transform_contacts(&input));
    }

    #[test]
    fn test_double_column_amount_and_reverse() {
        let wb = workbook(
            &["Date", "Memo", "Credit", "Debit"],
            &[&["2025-01-02", "Deposit", "100", "0"]],
        );
        let engine = engine(
            EntityKind::Transactions,
            ColumnMode::Double,
            &[("date", "Date"), ("description", "Memo"), ("credit", "Credit"), ("debit", "Debit")],
        );
        let mut options = TransactionFormatOptions {
            column_mode: ColumnMode::Double,
            ..Default::default()
        };
        assert_eq!(run_transactions(&wb, &engine, &options)[0].amount, 100.0);
        options.reverse = true;
        assert_eq!(run_transactions(&wb, &engine, &options)[0].amount, -100.0);
    }

    #[test]
    fn test_single_column_amount() {
        let wb = workbook(&["Date", "Memo", "Amount"], &[&["01/15/2025", "Adobe", "-50.00"]]);
        let engine = engine(
            EntityKind::Transactions,
            ColumnMode::Single,
            &[("date", "Date"), ("description", "Memo"), ("amount", "Amount")],
        );
        let records = run_transactions(&wb, &engine, &TransactionFormatOptions::default());
        assert_eq!(records[0].amount, -50.0);
        assert_eq!(records[0].date, "01/15/2025");
        assert_eq!(records[0].description, "Adobe");
    }

    #[test]
    fn test_numeric_cells_are_used_directly() {
        let mut wb = workbook(&["Date", "Memo", "Amount"], &[&["2025-01-02", "Fee", ""]]);
        wb.rows[0][2] = CellValue::Float(-12.5);
        let engine = engine(
            EntityKind::Transactions,
            ColumnMode::Single,
            &[("date", "Date"), ("description", "Memo"), ("amount", "Amount")],
        );
        let records = run_transactions(&wb, &engine, &TransactionFormatOptions::default());
        assert_eq!(records[0].amount, -12.5);
    }

    #[test]
    fn test_empty_transactions_are_dropped_but_ids_keep_position() {
        let wb = workbook(
            &["Date", "Memo", "Amount"],
            &[&["2025-01-02", "A", "1"], &["", "", "0"], &["2025-01-03", "B", "2"]],
        );
        let engine = engine(
            EntityKind::Transactions,
            ColumnMode::Single,
            &[("date", "Date"), ("description", "Memo"), ("amount", "Amount")],
        );
        let records = run_transactions(&wb, &engine, &TransactionFormatOptions::default());
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["transaction-0", "transaction-2"]);
        assert_eq!(records[1].row_index, 2);
    }

    #[test]
    fn test_zero_amount_with_description_is_kept() {
        let wb = workbook(&["Date", "Memo", "Amount"], &[&["", "Memo only", ""]]);
        let engine = engine(
            EntityKind::Transactions,
            ColumnMode::Single,
            &[("description", "Memo"), ("amount", "Amount")],
        );
        let records = run_transactions(&wb, &engine, &TransactionFormatOptions::default());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].amount, 0.0);
    }
}
