use crate::settings::{effective_settings, settings_file_exists, settings_path, API_URL_ENV};

pub fn run() -> crate::error::Result<()> {
    let settings = effective_settings();

    println!("Settings:     {}", settings_path().display());
    if !settings_file_exists() {
        println!("              (not created yet)");
    }
    println!(
        "API URL:      {}",
        if settings.api_url.is_empty() { "(not set)" } else { &settings.api_url }
    );
    println!(
        "API token:    {}",
        if settings.api_token.is_empty() { "(not set)" } else { "(set)" }
    );
    println!("Date format:  {}", settings.date_format);
    println!("Header row:   {}", if settings.has_header_row { "yes" } else { "no" });
    println!("Poll every:   {} ms", settings.poll_interval_ms);

    if !settings.is_configured() {
        println!();
        println!("Run `ledgerport init --api-url URL` or set {API_URL_ENV} to get started.");
    }
    Ok(())
}
