use std::fmt;
use std::str::FromStr;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::ImportError;

/// The two record families the import pipeline knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Contacts,
    Transactions,
}

impl EntityKind {
    /// Path segment used by the backend routes.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Contacts => "contacts",
            Self::Transactions => "transactions",
        }
    }
}

impl FromStr for EntityKind {
    type Err = ImportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "contacts" | "contact" => Ok(Self::Contacts),
            "transactions" | "transaction" => Ok(Self::Transactions),
            other => Err(ImportError::Validation(format!("unknown entity: {other}"))),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// How a transaction file expresses its amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnMode {
    /// One signed amount column.
    #[default]
    Single,
    /// Separate credit and debit columns.
    Double,
}

impl ColumnMode {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Double => "double",
        }
    }
}

impl FromStr for ColumnMode {
    type Err = ImportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "double" => Ok(Self::Double),
            other => Err(ImportError::Validation(format!("unknown column mode: {other}"))),
        }
    }
}

/// A single decoded spreadsheet cell.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl CellValue {
    /// Empty, or text that is empty after trimming.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(s) => s.clone(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Bool(b) => b.to_string(),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Empty => serializer.serialize_none(),
            Self::Text(s) => serializer.serialize_str(s),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::Bool(b) => serializer.serialize_bool(*b),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            Self::Empty
        } else {
            Self::Text(s.to_string())
        }
    }
}

/// Header sequence plus a rectangular grid of data rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawWorkbook {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl RawWorkbook {
    pub fn has_headers(&self) -> bool {
        !self.headers.is_empty()
    }

    pub fn width(&self) -> usize {
        self.rows.first().map_or(self.headers.len(), Vec::len)
    }

    /// Resolve a mapped column. Without headers, columns are addressed by
    /// their zero-based index.
    pub fn column_index(&self, column: &str) -> Option<usize> {
        if column.is_empty() {
            return None;
        }
        if self.has_headers() {
            return self.headers.iter().position(|h| h == column);
        }
        column.parse::<usize>().ok().filter(|idx| *idx < self.width())
    }

    /// Names a user can map against: headers, or column indices.
    pub fn column_names(&self) -> Vec<String> {
        if self.has_headers() {
            self.headers.clone()
        } else {
            (0..self.width()).map(|i| i.to_string()).collect()
        }
    }

    /// Key under which column `idx` is stored in a record's raw snapshot.
    pub fn column_key(&self, idx: usize) -> String {
        match self.headers.get(idx) {
            Some(h) => h.clone(),
            None => idx.to_string(),
        }
    }

    pub fn raw_data(&self, row: &[CellValue]) -> RawData {
        RawData(
            row.iter()
                .enumerate()
                .map(|(idx, cell)| (self.column_key(idx), cell.clone()))
                .collect(),
        )
    }
}

/// Snapshot of an original row keyed by header (or column index).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawData(Vec<(String, CellValue)>);

impl RawData {
    pub fn get(&self, key: &str) -> Option<&CellValue> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl Serialize for RawData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub key: String,
    pub label: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_hint: Option<String>,
}

impl FieldDefinition {
    pub fn new(key: &str, label: &str, required: bool) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            required,
            format_hint: None,
        }
    }

    pub fn with_hint(mut self, hint: &str) -> Self {
        self.format_hint = Some(hint.to_string());
        self
    }
}

/// Field catalog as returned by the backend.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldCatalog {
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
    #[serde(default)]
    pub date_formats: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        })
    }
}

/// Client-side view of a backend import job.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportJob {
    pub id: Option<String>,
    pub status: JobStatus,
    pub total: u64,
    pub created: u64,
    pub skipped: u64,
    pub failed: u64,
    pub error_message: Option<String>,
}

impl ImportJob {
    pub fn pending(id: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            ..Self::default()
        }
    }

    /// A locally synthesised success for `count` records.
    pub fn completed_locally(count: u64) -> Self {
        Self {
            id: None,
            status: JobStatus::Completed,
            total: count,
            created: count,
            skipped: 0,
            failed: 0,
            error_message: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
