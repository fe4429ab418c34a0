use std::collections::{BTreeMap, BTreeSet};

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::Result;
use crate::models::{ColumnMode, EntityKind, FieldCatalog, FieldDefinition};

/// Built-in field set used when the catalog answers with no fields.
pub fn default_fields(entity: EntityKind, mode: ColumnMode) -> Vec<FieldDefinition> {
    match entity {
        EntityKind::Contacts => vec![
            FieldDefinition::new("displayName", "Name", true),
            FieldDefinition::new("email", "Email", false).with_hint("name@example.com"),
            FieldDefinition::new("phone", "Phone", false),
            FieldDefinition::new("companyName", "Company", false),
        ],
        EntityKind::Transactions => {
            let mut fields = vec![
                FieldDefinition::new("date", "Date", true),
                FieldDefinition::new("description", "Description", true),
            ];
            match mode {
                ColumnMode::Single => {
                    fields.push(
                        FieldDefinition::new("amount", "Amount", true).with_hint("-42.50"),
                    );
                }
                ColumnMode::Double => {
                    fields.push(FieldDefinition::new("credit", "Credit", true));
                    fields.push(FieldDefinition::new("debit", "Debit", true));
                }
            }
            fields
        }
    }
}

/// Field key → column header. Empty string means "unmapped".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldMapping(BTreeMap<String, String>);

impl FieldMapping {
    /// The mapped header, or `None` when absent or empty.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .map(String::as_str)
            .filter(|column| !column.is_empty())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_mapped(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    fn insert(&mut self, key: &str, column: &str) {
        self.0.insert(key.to_string(), column.to_string());
    }

    fn remove(&mut self, key: &str) {
        self.0.remove(key);
    }

    /// Column header → field key, skipping unmapped entries.
    pub fn inverse(&self) -> BTreeMap<String, String> {
        self.0
            .iter()
            .filter(|(_, column)| !column.is_empty())
            .map(|(key, column)| (column.clone(), key.clone()))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Owns the field catalog and the mapping the user is building against it.
#[derive(Debug, Clone, Default)]
pub struct MappingEngine {
    fields: Vec<FieldDefinition>,
    date_formats: Vec<String>,
    mapping: FieldMapping,
    manual: BTreeSet<String>,
    last_auto_map: Option<String>,
}

impl MappingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fields(fields: Vec<FieldDefinition>) -> Self {
        Self {
            fields,
            ..Self::default()
        }
    }

    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    pub fn date_formats(&self) -> &[String] {
        &self.date_formats
    }

    pub fn mapping(&self) -> &FieldMapping {
        &self.mapping
    }

    /// Install a catalog response. An empty successful answer falls back to
    /// the built-in fields; an error leaves the current fields untouched.
    pub fn apply_catalog(
        &mut self,
        result: Result<FieldCatalog>,
        entity: EntityKind,
        mode: ColumnMode,
    ) -> Result<()> {
        let catalog = result?;
        if catalog.fields.is_empty() {
            debug!(%entity, "catalog returned no fields, using defaults");
            self.use_defaults(entity, mode);
        } else {
            self.fields = catalog.fields;
        }
        self.date_formats = catalog.date_formats.unwrap_or_default();
        Ok(())
    }

    /// Install the built-in field set with no date format suggestions.
    pub fn use_defaults(&mut self, entity: EntityKind, mode: ColumnMode) {
        self.fields = default_fields(entity, mode);
        self.date_formats.clear();
    }

    /// Assign headers to fields whose label or key matches case-insensitively.
    ///
    /// Runs once per distinct (headers, fields) pair; returns how many fields
    /// were assigned.
    pub fn auto_map(&mut self, headers: &[String]) -> usize {
        if headers.is_empty() || self.fields.is_empty() {
            return 0;
        }
        let fingerprint = fingerprint(headers, &self.fields);
        if self.last_auto_map.as_deref() == Some(fingerprint.as_str()) {
            return 0;
        }
        self.last_auto_map = Some(fingerprint);

        let mut assigned = 0;
        for field in &self.fields {
            if self.manual.contains(&field.key) || self.mapping.is_mapped(&field.key) {
                continue;
            }
            let label = field.label.trim().to_lowercase();
            let key = field.key.trim().to_lowercase();
            let found = headers.iter().find(|h| {
                let h = h.trim().to_lowercase();
                !h.is_empty() && (h == label || h == key)
            });
            if let Some(header) = found {
                self.mapping.insert(&field.key, header);
                assigned += 1;
            }
        }
        debug!(assigned, "auto-mapped columns");
        assigned
    }

    /// Manual override for one field; `""` unmaps it but keeps the key.
    pub fn set(&mut self, key: &str, column: &str) {
        self.manual.insert(key.to_string());
        self.mapping.insert(key, column);
    }

    /// True iff every required field has a non-empty mapping.
    pub fn is_valid(&self) -> bool {
        self.fields
            .iter()
            .filter(|f| f.required)
            .all(|f| self.mapping.is_mapped(&f.key))
    }

    pub fn missing_required(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.required && !self.mapping.is_mapped(&f.key))
            .map(|f| f.label.as_str())
            .collect()
    }

    /// A new file was loaded: drop every mapping that names a column the file
    /// no longer has, and let auto-map run again. Explicit unmaps are kept.
    pub fn retain_columns(&mut self, columns: &[String]) -> usize {
        let stale: Vec<String> = self
            .mapping
            .iter()
            .filter(|(_, column)| !column.is_empty() && !columns.iter().any(|c| c == column))
            .map(|(key, _)| key.to_string())
            .collect();
        for key in &stale {
            self.mapping.remove(key);
            self.manual.remove(key);
        }
        self.last_auto_map = None;
        if !stale.is_empty() {
            debug!(dropped = stale.len(), "dropped mappings to missing columns");
        }
        stale.len()
    }

    /// Forget fields and mapping, e.g. when the column mode changes.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

fn fingerprint(headers: &[String], fields: &[FieldDefinition]) -> String {
    let mut hasher = Sha256::new();
    for h in headers {
        hasher.update(h.as_bytes());
        hasher.update([0u8]);
    }
    hasher.update([1u8]);
    for f in fields {
        hasher.update(f.key.as_bytes());
        hasher.update([0u8]);
        hasher.update(f.label.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}
