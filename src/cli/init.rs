use crate::error::{ImportError, Result};
use crate::settings::{load_settings, save_settings, settings_path};

pub fn run(api_url: &str, token: Option<&str>, date_format: Option<&str>) -> Result<()> {
    let api_url = api_url.trim().trim_end_matches('/');
    if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
        return Err(ImportError::Settings(format!(
            "API URL must start with http:// or https://, got '{api_url}'"
        )));
    }

    let mut settings = load_settings();
    settings.api_url = api_url.to_string();
    if let Some(token) = token {
        settings.api_token = token.to_string();
    }
    if let Some(format) = date_format.filter(|f| !f.trim().is_empty()) {
        settings.date_format = format.trim().to_string();
    }
    save_settings(&settings)?;

    println!("Saved settings to {}", settings_path().display());
    Ok(())
}
