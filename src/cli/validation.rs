use crate::cli::args::CliArgs;
use crate::state::preference::MAX_RETENTION_DAYS;

pub fn validate(args: &CliArgs) -> Result<(), String> {
    if let Some(raw) = args.length_menu.as_deref() {
        crate::utils::parse_length_menu_csv(raw)
            .map_err(|e| format!("invalid --length-menu '{raw}': {e}"))?;
    }
    if let Some(length) = args.page_length {
        if length == 0 || length < -1 {
            return Err("invalid page-length, expected positive integer or -1".to_string());
        }
    }
    if let Some(days) = args.help_cookie_days {
        if days == 0 || days > MAX_RETENTION_DAYS {
            return Err(format!(
                "invalid help-cookie-days, expected 1-{MAX_RETENTION_DAYS}"
            ));
        }
    }
    if let Some(raw) = args.output_format.as_deref() {
        if crate::output::OutputFormat::parse(raw).is_none() {
            return Err(format!("invalid --output-format '{raw}', expected html or json"));
        }
    }
    if let Some(raw) = args.base_url.as_deref() {
        reqwest::Url::parse(raw).map_err(|e| format!("invalid --base-url '{raw}': {e}"))?;
    }
    if let Some(timeout) = args.timeout {
        if timeout == 0 {
            return Err("invalid timeout, expected positive integer".to_string());
        }
    }
    Ok(())
}
