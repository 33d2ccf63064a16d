pub mod report;

use serde::Serialize;

use crate::runner::{BuildResult, DatasetReport};
use crate::state::HelpCookie;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Html,
    Json,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "html" | "htm" => Some(Self::Html),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Json => "json",
        }
    }
}

pub fn infer_format_from_path(path: &str) -> Option<OutputFormat> {
    let lower = path.trim().to_lowercase();
    if lower.ends_with(".json") {
        return Some(OutputFormat::Json);
    }
    if lower.ends_with(".html") || lower.ends_with(".htm") {
        return Some(OutputFormat::Html);
    }
    None
}

/// Everything about the generated page that is not a dataset.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PageSettings {
    pub title: String,
    pub page_length: i64,
    pub length_menu: Vec<i64>,
    pub details_rows: bool,
    pub admin_url: Option<String>,
    pub help_cookie: HelpCookie,
    pub default_tab: Option<String>,
}

impl Default for PageSettings {
    fn default() -> Self {
        Self {
            title: "Results".to_string(),
            page_length: 100,
            length_menu: vec![10, 25, 100, -1],
            details_rows: false,
            admin_url: None,
            help_cookie: HelpCookie::default(),
            default_tab: None,
        }
    }
}

#[derive(Serialize)]
struct JsonDump<'a> {
    title: &'a str,
    active_tab: Option<&'a str>,
    datasets: &'a [DatasetReport],
}

pub fn render_json(result: &BuildResult) -> Vec<u8> {
    let dump = JsonDump {
        title: &result.page.title,
        active_tab: result.active_tab.as_deref(),
        datasets: &result.datasets,
    };
    serde_json::to_vec_pretty(&dump).unwrap_or_else(|_| b"{}\n".to_vec())
}

pub fn render_html(result: &BuildResult) -> Vec<u8> {
    report::render_html(result)
}

pub fn render(result: &BuildResult, format: OutputFormat) -> Vec<u8> {
    match format {
        OutputFormat::Html => render_html(result),
        OutputFormat::Json => render_json(result),
    }
}
