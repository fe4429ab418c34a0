use std::path::PathBuf;

use crate::error::Result;
use crate::fmt::plural;
use crate::models::EntityKind;
use crate::settings::effective_settings;

use super::connect;

pub async fn run(entity: EntityKind, output: Option<String>) -> Result<()> {
    let backend = connect(&effective_settings())?;
    let bytes = backend.download_template(entity).await?;

    let path = output
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(format!("{}-template.csv", entity.key())));
    tokio::fs::write(&path, &bytes).await?;

    println!("Saved {} to {}", plural(bytes.len(), "byte"), path.display());
    Ok(())
}
