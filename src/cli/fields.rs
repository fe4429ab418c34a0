use crate::error::Result;
use crate::mapping::MappingEngine;
use crate::models::{ColumnMode, EntityKind};
use crate::settings::effective_settings;

use super::{connect, render};

pub async fn run(entity: EntityKind, column_mode: Option<ColumnMode>) -> Result<()> {
    let backend = connect(&effective_settings())?;
    let mode = match entity {
        EntityKind::Contacts => None,
        EntityKind::Transactions => Some(column_mode.unwrap_or_default()),
    };

    let mut engine = MappingEngine::new();
    engine.apply_catalog(
        backend.field_catalog(entity, mode).await,
        entity,
        mode.unwrap_or_default(),
    )?;

    println!("{entity} fields\n{}", render::fields_table(engine.fields()));
    if !engine.date_formats().is_empty() {
        println!("Date formats: {}", engine.date_formats().join(", "));
    }
    Ok(())
}
