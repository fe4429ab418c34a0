use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{ImportError, Result};
use crate::models::{CellValue, RawWorkbook};

// ---------------------------------------------------------------------------
// Upload pre-check
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Csv,
    Xlsx,
    Xls,
}

impl UploadKind {
    pub fn mime(&self) -> &'static str {
        match self {
            Self::Csv => "text/csv",
            Self::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            Self::Xls => "application/vnd.ms-excel",
        }
    }
}

const MIME_TYPES: &[(&str, UploadKind)] = &[
    ("text/csv", UploadKind::Csv),
    ("application/csv", UploadKind::Csv),
    (
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        UploadKind::Xlsx,
    ),
    ("application/vnd.ms-excel", UploadKind::Xls),
];

/// Accepts `.xlsx`, `.xls` and `.csv` by extension, or a known MIME type.
pub fn validate_upload(file_name: &str, mime: Option<&str>) -> Result<UploadKind> {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    let by_ext = match ext.as_deref() {
        Some("csv") => Some(UploadKind::Csv),
        Some("xlsx") => Some(UploadKind::Xlsx),
        Some("xls") => Some(UploadKind::Xls),
        _ => None,
    };
    if let Some(kind) = by_ext {
        return Ok(kind);
    }
    let by_mime = mime.and_then(|m| {
        let m = m.trim().to_ascii_lowercase();
        MIME_TYPES.iter().find(|(t, _)| *t == m).map(|(_, k)| *k)
    });
    by_mime.ok_or_else(|| {
        ImportError::Validation(format!(
            "{file_name}: please upload an Excel (.xlsx, .xls) or CSV file"
        ))
    })
}

/// An accepted upload, held in memory until the wizard is reset.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    pub file_name: String,
    pub kind: UploadKind,
    pub bytes: Vec<u8>,
    pub checksum: String,
}

impl UploadedFile {
    pub fn new(file_name: &str, mime: Option<&str>, bytes: Vec<u8>) -> Result<Self> {
        let kind = validate_upload(file_name, mime)?;
        let checksum = compute_checksum(&bytes);
        Ok(Self {
            file_name: file_name.to_string(),
            kind,
            bytes,
            checksum,
        })
    }

    pub async fn read(path: &Path) -> Result<Self> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        // Reject by type before touching the disk.
        validate_upload(&file_name, None)?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ImportError::Read(format!("{}: {e}", path.display())))?;
        Self::new(&file_name, None, bytes)
    }
}

fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct DecodeOptions {
    pub has_header_row: bool,
    pub skip_blank_rows: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            has_header_row: true,
            skip_blank_rows: true,
        }
    }
}

pub fn decode(upload: &UploadedFile, options: DecodeOptions) -> Result<RawWorkbook> {
    let mut grid = match upload.kind {
        UploadKind::Csv => read_csv_grid(&upload.bytes)?,
        UploadKind::Xlsx | UploadKind::Xls => read_sheet_grid(&upload.bytes)?,
    };

    if options.skip_blank_rows {
        let before = grid.len();
        grid.retain(|row| !row.iter().all(CellValue::is_blank));
        debug!(dropped = before - grid.len(), "dropped blank rows");
    }
    if grid.is_empty() {
        return Err(ImportError::Parse(format!("{} contains no data", upload.file_name)));
    }

    let width = grid.iter().map(Vec::len).max().unwrap_or(0);
    for row in grid.iter_mut() {
        row.resize(width, CellValue::Empty);
    }

    let headers = if options.has_header_row {
        header_names(&grid.remove(0))
    } else {
        Vec::new()
    };

    info!(
        file = %upload.file_name,
        checksum = %upload.checksum,
        columns = headers.len(),
        rows = grid.len(),
        "decoded upload"
    );
    Ok(RawWorkbook { headers, rows: grid })
}

/// Trailing blank header cells are dropped; interior ones get a positional name.
fn header_names(row: &[CellValue]) -> Vec<String> {
    let last = row.iter().rposition(|c| !c.is_blank()).map_or(0, |i| i + 1);
    row[..last]
        .iter()
        .enumerate()
        .map(|(i, cell)| {
            if cell.is_blank() {
                format!("Column {}", i + 1)
            } else {
                cell.as_text().trim().to_string()
            }
        })
        .collect()
}

fn read_csv_grid(bytes: &[u8]) -> Result<Vec<Vec<CellValue>>> {
    let content = String::from_utf8_lossy(bytes);
    let content = content.strip_prefix('\u{feff}').unwrap_or(&content);
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());
    let mut grid = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| ImportError::Parse(e.to_string()))?;
        grid.push(record.iter().map(CellValue::from).collect());
    }
    Ok(grid)
}

#[cfg(feature = "xlsx")]
fn read_sheet_grid(bytes: &[u8]) -> Result<Vec<Vec<CellValue>>> {
    use calamine::Reader;

    let cursor = std::io::Cursor::new(bytes.to_vec());
    let mut workbook = calamine::open_workbook_auto_from_rs(cursor)
        .map_err(|e| ImportError::Parse(format!("failed to open workbook: {e}")))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ImportError::Parse("workbook has no sheets".into()))?
        .map_err(|e| ImportError::Parse(format!("failed to read first sheet: {e}")))?;
    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_from_data).collect())
        .collect())
}

#[cfg(not(feature = "xlsx"))]
fn read_sheet_grid(_bytes: &[u8]) -> Result<Vec<Vec<CellValue>>> {
    Err(ImportError::Validation(
        "spreadsheet support is not enabled in this build; upload a CSV file".into(),
    ))
}

#[cfg(feature = "xlsx")]
fn cell_from_data(data: &calamine::Data) -> CellValue {
    use calamine::Data;
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::from(s.as_str()),
        Data::Int(i) => CellValue::Int(*i),
        Data::Float(f) => CellValue::Float(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => CellValue::Text(excel_serial_to_date(dt.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(_) => CellValue::Empty,
    }
}

#[cfg(any(feature = "xlsx", test))]
pub fn excel_serial_to_date(serial: f64) -> String {
    // Excel epoch is 1899-12-30 (accounting for the 1900 leap year bug).
    // Serials outside chrono's date range keep their numeric text.
    let date = chrono::NaiveDate::from_ymd_opt(1899, 12, 30)
        .zip(chrono::Duration::try_days(serial as i64))
        .and_then(|(base, days)| base.checked_add_signed(days));
    match date {
        Some(date) if serial.is_finite() => date.format("%Y-%m-%d").to_string(),
        _ => serial.to_string(),
    }
}
