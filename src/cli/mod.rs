pub mod fields;
pub mod import;
pub mod init;
pub mod job;
pub mod preview;
pub mod render;
pub mod status;
pub mod template;

use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use crate::backend::{HttpBackend, ImportBackend};
use crate::error::{ImportError, Result};
use crate::models::{ColumnMode, EntityKind, RawWorkbook};
use crate::settings::Settings;

/// Split repeated `--map key=Column` flags. An empty column unmaps the key.
pub(crate) fn parse_map_overrides(pairs: &[String]) -> Result<Vec<(String, String)>> {
    pairs
        .iter()
        .map(|pair| {
            let (key, column) = pair.split_once('=').ok_or_else(|| {
                ImportError::Validation(format!("expected key=Column, got '{pair}'"))
            })?;
            let key = key.trim();
            if key.is_empty() {
                return Err(ImportError::Validation(format!("missing field key in '{pair}'")));
            }
            Ok((key.to_string(), column.trim().to_string()))
        })
        .collect()
}

/// Every override must name a column that exists in the file.
pub(crate) fn check_columns(workbook: &RawWorkbook, overrides: &[(String, String)]) -> Result<()> {
    for (key, column) in overrides {
        if !column.is_empty() && workbook.column_index(column).is_none() {
            return Err(ImportError::Validation(format!(
                "no column named '{column}' for {key}. Columns: {}",
                workbook.column_names().join(", ")
            )));
        }
    }
    Ok(())
}

pub(crate) fn connect(settings: &Settings) -> Result<Arc<dyn ImportBackend>> {
    if !settings.is_configured() {
        return Err(ImportError::Settings(
            "no API URL configured. Run `ledgerport init --api-url URL` first.".into(),
        ));
    }
    let backend = HttpBackend::new(&settings.api_url, Some(settings.api_token.clone()))?;
    Ok(Arc::new(backend))
}

#[derive(Parser)]
#[command(
    name = "ledgerport",
    version,
    about = "Import contacts and bank transactions from CSV or Excel files into your books."
)]
pub struct Cli {
    /// Increase log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Save the API endpoint and token.
    Init {
        /// Base URL of the bookkeeping API
        #[arg(long = "api-url")]
        api_url: String,
        /// Bearer token
        #[arg(long)]
        token: Option<String>,
        /// Default date format for uploaded files
        #[arg(long = "date-format")]
        date_format: Option<String>,
    },
    /// Show the effective configuration.
    Status,
    /// List the importable fields for an entity.
    Fields {
        /// contacts or transactions
        entity: EntityKind,
        /// Amount layout for transactions: single or double
        #[arg(long = "column-mode")]
        column_mode: Option<ColumnMode>,
    },
    /// Download the sample import file for an entity.
    Template {
        /// contacts or transactions
        entity: EntityKind,
        /// Output path (default: ./<entity>-template.csv)
        #[arg(long)]
        output: Option<String>,
    },
    /// Decode and map a file locally without uploading it.
    Preview {
        /// contacts or transactions
        entity: EntityKind,
        /// Path to a CSV, XLSX or XLS file
        file: String,
        #[command(flatten)]
        mapping: MappingArgs,
        #[command(flatten)]
        amounts: AmountArgs,
        /// Print candidate records as JSON
        #[arg(long)]
        json: bool,
    },
    /// Upload a file and run an import job.
    Import {
        #[command(subcommand)]
        command: ImportCommands,
    },
    /// Follow an existing import job until it finishes.
    Job {
        /// contacts or transactions
        entity: EntityKind,
        /// Job id returned by the upload
        import_id: String,
    },
}

#[derive(Subcommand)]
pub enum ImportCommands {
    /// Import contacts.
    Contacts {
        /// Path to a CSV, XLSX or XLS file
        file: String,
        /// Contact type sent with the upload (e.g. customer, supplier)
        #[arg(long = "type")]
        contact_type: Option<String>,
        #[command(flatten)]
        mapping: MappingArgs,
        #[command(flatten)]
        submit: SubmitArgs,
    },
    /// Import bank transactions into an account.
    Transactions {
        /// Path to a CSV, XLSX or XLS file
        file: String,
        /// Bank account id to import into
        #[arg(long)]
        account: String,
        #[command(flatten)]
        mapping: MappingArgs,
        #[command(flatten)]
        amounts: AmountArgs,
        #[command(flatten)]
        submit: SubmitArgs,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct MappingArgs {
    /// Treat the first row as data
    #[arg(long = "no-header")]
    pub no_header: bool,
    /// Map a field to a column: --map email="E-mail address"
    #[arg(long = "map", value_name = "KEY=COLUMN")]
    pub map: Vec<String>,
    /// Date format of the file (e.g. MM/DD/YYYY)
    #[arg(long = "date-format")]
    pub date_format: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct AmountArgs {
    /// single (one amount column) or double (credit and debit columns)
    #[arg(long = "column-mode", default_value = "single")]
    pub column_mode: ColumnMode,
    /// Flip the sign of every amount
    #[arg(long)]
    pub reverse: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct SubmitArgs {
    /// Leave a record out of the upload (repeatable)
    #[arg(long = "exclude", value_name = "ID")]
    pub exclude: Vec<String>,
    /// Deselect every record; the whole file is sent
    #[arg(long)]
    pub none: bool,
    /// Return right after the upload instead of waiting for the job
    #[arg(long = "no-wait")]
    pub no_wait: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_map_overrides() {
        let pairs = vec!["email=E-mail".to_string(), " phone = ".to_string()];
        let parsed = parse_map_overrides(&pairs).unwrap();
        assert_eq!(parsed[0], ("email".to_string(), "E-mail".to_string()));
        assert_eq!(parsed[1], ("phone".to_string(), String::new()));
    }

    #[test]
    fn test_parse_map_rejects_bad_pairs() {
        assert!(parse_map_overrides(&["email".to_string()]).is_err());
        assert!(parse_map_overrides(&["=Name".to_string()]).is_err());
    }

    #[test]
    fn test_check_columns() {
        let workbook = RawWorkbook {
            headers: vec!["Name".into(), "Email".into()],
            rows: vec![],
        };
        let ok = vec![("email".to_string(), "Email".to_string())];
        assert!(check_columns(&workbook, &ok).is_ok());
        let unmap = vec![("email".to_string(), String::new())];
        assert!(check_columns(&workbook, &unmap).is_ok());
        let bad = vec![("email".to_string(), "E-mail".to_string())];
        assert!(matches!(check_columns(&workbook, &bad), Err(ImportError::Validation(_))));
    }

    #[test]
    fn test_cli_parses_transactions_import() {
        let cli = Cli::try_parse_from([
            "ledgerport",
            "-vv",
            "import",
            "transactions",
            "bank.csv",
            "--account",
            "acc_1",
            "--column-mode",
            "double",
            "--exclude",
            "transaction-3",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Import {
                command:
                    ImportCommands::Transactions {
                        account,
                        amounts,
                        submit,
                        ..
                    },
            } => {
                assert_eq!(account, "acc_1");
                assert_eq!(amounts.column_mode, ColumnMode::Double);
                assert_eq!(submit.exclude, vec!["transaction-3"]);
            }
            _ => panic!("expected transactions import"),
        }
    }
}
