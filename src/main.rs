mod backend;
mod cli;
mod decoder;
mod error;
mod fmt;
mod mapping;
mod models;
mod poller;
mod selection;
mod settings;
mod telemetry;
mod transform;
mod wizard;

use clap::Parser;

use cli::{Cli, Commands, ImportCommands};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    telemetry::init(cli.verbose);

    let result = match cli.command {
        Commands::Init {
            api_url,
            token,
            date_format,
        } => cli::init::run(&api_url, token.as_deref(), date_format.as_deref()),
        Commands::Status => cli::status::run(),
        Commands::Fields {
            entity,
            column_mode,
        } => cli::fields::run(entity, column_mode).await,
        Commands::Template { entity, output } => cli::template::run(entity, output).await,
        Commands::Preview {
            entity,
            file,
            mapping,
            amounts,
            json,
        } => cli::preview::run(entity, &file, &mapping, &amounts, json).await,
        Commands::Import { command } => match command {
            ImportCommands::Contacts {
                file,
                contact_type,
                mapping,
                submit,
            } => cli::import::contacts(&file, contact_type, &mapping, &submit).await,
            ImportCommands::Transactions {
                file,
                account,
                mapping,
                amounts,
                submit,
            } => cli::import::transactions(&file, &account, &mapping, &amounts, &submit).await,
        },
        Commands::Job { entity, import_id } => cli::job::run(entity, &import_id).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
