use std::path::Path;

use crate::decoder::{self, DecodeOptions, UploadedFile};
use crate::error::{ImportError, Result};
use crate::fmt::plural;
use crate::mapping::{default_fields, MappingEngine};
use crate::models::EntityKind;
use crate::settings::load_settings;
use crate::transform::{ContactFormatOptions, TransactionFormatOptions, TransformInput};
use crate::wizard::{ContactsProfile, ImportProfile, TransactionsProfile};

use super::render::{self, ReviewRow};
use super::{check_columns, parse_map_overrides, AmountArgs, MappingArgs};

pub async fn run(
    entity: EntityKind,
    file: &str,
    args: &MappingArgs,
    amounts: &AmountArgs,
    json: bool,
) -> Result<()> {
    let settings = load_settings();
    let has_header_row = settings.has_header_row && !args.no_header;
    let date_format = args
        .date_format
        .clone()
        .unwrap_or_else(|| settings.date_format.clone());

    match entity {
        EntityKind::Contacts => {
            let options = ContactFormatOptions {
                date_format,
                contact_type: None,
            };
            preview::<ContactsProfile>(file, args, options, has_header_row, json).await
        }
        EntityKind::Transactions => {
            let options = TransactionFormatOptions {
                account_id: None,
                date_format,
                column_mode: amounts.column_mode,
                reverse: amounts.reverse,
            };
            preview::<TransactionsProfile>(file, args, options, has_header_row, json).await
        }
    }
}

/// Decode, auto-map and transform with the built-in fields. Nothing leaves
/// the machine.
async fn preview<P>(
    file: &str,
    args: &MappingArgs,
    options: P::Options,
    has_header_row: bool,
    json: bool,
) -> Result<()>
where
    P: ImportProfile,
    P::Record: ReviewRow,
{
    let upload = UploadedFile::read(Path::new(file)).await?;
    let workbook = decoder::decode(
        &upload,
        DecodeOptions {
            has_header_row,
            skip_blank_rows: P::SKIP_BLANK_ROWS,
        },
    )?;

    let mode = P::column_mode(&options).unwrap_or_default();
    let mut engine = MappingEngine::with_fields(default_fields(P::ENTITY, mode));
    engine.auto_map(&workbook.column_names());
    let overrides = parse_map_overrides(&args.map)?;
    check_columns(&workbook, &overrides)?;
    for (key, column) in &overrides {
        engine.set(key, column);
    }

    if !engine.is_valid() {
        eprintln!("{}", render::mapping_table(&engine));
        return Err(ImportError::Validation(format!(
            "required fields are not mapped: {}. Use --map key=Column.",
            engine.missing_required().join(", ")
        )));
    }

    let records = P::transform(&TransformInput {
        workbook: &workbook,
        mapping: engine.mapping(),
        fields: engine.fields(),
        options: &options,
    });

    if json {
        let out = serde_json::to_string_pretty(&records)
            .map_err(|e| ImportError::Other(e.to_string()))?;
        println!("{out}");
        return Ok(());
    }

    println!("Column mapping\n{}", render::mapping_table(&engine));
    println!(
        "{} from {}",
        plural(records.len(), "record"),
        upload.file_name
    );
    println!("{}", render::review_table(&records, engine.fields(), None));
    Ok(())
}
