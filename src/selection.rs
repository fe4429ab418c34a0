use std::collections::HashSet;

use crate::error::Result;
use crate::models::{CellValue, RawWorkbook};

/// The subset of candidate ids chosen for import.
///
/// Always a subset of the ids it was last given through [`SelectionSet::replace`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionSet {
    all: Vec<String>,
    known: HashSet<String>,
    selected: HashSet<String>,
}

/// What to upload for the current selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportPlan {
    /// Send the uploaded file unmodified.
    Original,
    /// Send a rebuilt file containing only these data rows, in order.
    Filtered(Vec<usize>),
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a new candidate id set with everything selected.
    pub fn replace<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.all = ids.into_iter().map(Into::into).collect();
        self.known = self.all.iter().cloned().collect();
        self.select_all();
    }

    /// Flip membership of `id`. Unknown ids are ignored; returns the new state.
    pub fn toggle(&mut self, id: &str) -> bool {
        if !self.known.contains(id) {
            return false;
        }
        if !self.selected.remove(id) {
            self.selected.insert(id.to_string());
            return true;
        }
        false
    }

    pub fn select_all(&mut self) {
        self.selected = self.known.clone();
    }

    pub fn deselect_all(&mut self) {
        self.selected.clear();
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.contains(id)
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn total(&self) -> usize {
        self.all.len()
    }

    /// Selected ids in candidate order.
    pub fn selected_ids(&self) -> Vec<&str> {
        self.all
            .iter()
            .filter(|id| self.selected.contains(*id))
            .map(String::as_str)
            .collect()
    }

    /// A partial selection needs a filtered export. Everything selected, or
    /// nothing selected, sends the original file.
    pub fn export_plan<F>(&self, row_of: F) -> ExportPlan
    where
        F: Fn(&str) -> Option<usize>,
    {
        let count = self.len();
        if count == 0 || count == self.total() {
            return ExportPlan::Original;
        }
        let mut rows: Vec<usize> = self.selected_ids().into_iter().filter_map(row_of).collect();
        rows.sort_unstable();
        rows.dedup();
        ExportPlan::Filtered(rows)
    }
}

/// Header row (when present) plus the given data rows, written as CSV.
pub fn build_filtered_csv(workbook: &RawWorkbook, rows: &[usize]) -> Result<Vec<u8>> {
    let mut wtr = csv::WriterBuilder::new().flexible(true).from_writer(Vec::new());
    if workbook.has_headers() {
        wtr.write_record(&workbook.headers)?;
    }
    for &idx in rows {
        if let Some(row) = workbook.rows.get(idx) {
            wtr.write_record(row.iter().map(CellValue::as_text))?;
        }
    }
    wtr.into_inner()
        .map_err(|e| crate::error::ImportError::Other(format!("failed to finish export: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selection(n: usize) -> SelectionSet {
        let mut s = SelectionSet::new();
        s.replace((0..n).map(|i| format!("contact-{i}")));
        s
    }

    fn row_of(id: &str) -> Option<usize> {
        id.rsplit('-').next()?.parse().ok()
    }

    #[test]
    fn test_replace_selects_everything() {
        let s = selection(3);
        assert_eq!(s.len(), 3);
        assert_eq!(s.total(), 3);
        assert!(s.is_selected("contact-2"));
    }

    #[test]
    fn test_replace_discards_stale_ids() {
        let mut s = selection(3);
        s.replace(vec!["transaction-0"]);
        assert!(!s.is_selected("contact-0"));
        assert_eq!(s.selected_ids(), vec!["transaction-0"]);
    }

    #[test]
    fn test_toggle_twice_restores_membership() {
        let mut s = selection(2);
        assert!(!s.toggle("contact-1"));
        assert!(!s.is_selected("contact-1"));
        assert!(s.toggle("contact-1"));
        assert!(s.is_selected("contact-1"));
        assert_eq!(s, selection(2));
    }

    #[test]
    fn test_toggle_ignores_unknown_ids() {
        let mut s = selection(1);
        s.deselect_all();
        assert!(!s.toggle("contact-9"));
        assert!(s.is_empty());
    }

    #[test]
    fn test_select_and_deselect_all() {
        let mut s = selection(3);
        s.deselect_all();
        assert_eq!(s.len(), 0);
        s.select_all();
        assert_eq!(s.len(), 3);
    }

    #[test]
    fn test_export_plan() {
        let mut s = selection(3);
        assert_eq!(s.export_plan(row_of), ExportPlan::Original);
        s.toggle("contact-1");
        assert_eq!(s.export_plan(row_of), ExportPlan::Filtered(vec![0, 2]));
        s.deselect_all();
        assert_eq!(s.export_plan(row_of), ExportPlan::Original);
    }

    #[test]
    fn test_large_selection_toggle_and_export() {
        let mut s = selection(50_000);
        for i in (0..50_000).step_by(2) {
            assert!(!s.toggle(&format!("contact-{i}")));
        }
        assert_eq!(s.len(), 25_000);
        match s.export_plan(row_of) {
            ExportPlan::Filtered(rows) => {
                assert_eq!(rows.len(), 25_000);
                assert_eq!(rows[0], 1);
                assert_eq!(rows[24_999], 49_999);
            }
            ExportPlan::Original => panic!("expected a filtered export"),
        }
    }

    #[test]
    fn test_filtered_csv_keeps_header_and_order() {
        let wb = RawWorkbook {
            headers: vec!["Name".into(), "Email".into()],
            rows: vec![
                vec!["Ann".into(), "a@x.com".into()],
                vec!["Bob".into(), CellValue::Empty],
                vec!["Cy".into(), "c@x.com".into()],
            ],
        };
        let bytes = build_filtered_csv(&wb, &[0, 2]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text, "Name,Email\nAnn,a@x.com\nCy,c@x.com\n");
    }

    #[test]
    fn test_filtered_csv_without_header() {
        let wb = RawWorkbook {
            headers: vec![],
            rows: vec![vec![CellValue::Int(1)], vec![CellValue::Int(2)]],
        };
        let text = String::from_utf8(build_filtered_csv(&wb, &[1]).unwrap()).unwrap();
        assert_eq!(text, "2\n");
    }
}
