use std::collections::HashSet;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;

use crate::dataset::{Dataset, DatasetError};
use crate::fetch::{Fetch, HttpFetcher};
use crate::output::PageSettings;
use crate::state::controller::LoadOutcome;
use crate::state::preference::MAX_RETENTION_DAYS;
use crate::state::{ControllerError, LoadedTable, TabController};

#[derive(Clone, Debug)]
pub struct Options {
    pub datasets: Vec<Dataset>,
    /// Prefix for relative sources; when unset they are read from `data_dir`.
    pub base_url: Option<String>,
    pub data_dir: String,
    pub timeout_seconds: usize,
    pub proxy: Option<String>,
    pub page: PageSettings,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            datasets: Vec::new(),
            base_url: None,
            data_dir: ".".to_string(),
            timeout_seconds: 10,
            proxy: None,
            page: PageSettings::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("no datasets configured")]
    NoDatasets,

    #[error("dataset id '{id}' is used more than once")]
    DuplicateDataset { id: String },

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error("invalid base URL '{url}': {message}")]
    InvalidBaseUrl { url: String, message: String },

    #[error("invalid help cookie retention {value} days, expected 1-{max}")]
    InvalidCookieDays { value: u32, max: u32 },

    #[error("page length {value} is not in the length menu {menu:?}")]
    InvalidPageLength { value: i64, menu: Vec<i64> },

    #[error("default tab '{id}' does not name a dataset")]
    UnknownDefaultTab { id: String },

    #[error("failed to build HTTP client: {source}")]
    HttpClientBuild {
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to setup proxy: {proxy}: {source}")]
    ProxySetup {
        proxy: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Why a dataset could not be loaded, as shown in logs and in the JSON dump.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FetchFailure {
    pub location: String,
    pub status: Option<u16>,
    pub message: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct DatasetReport {
    pub dataset: Dataset,
    pub table: Option<LoadedTable>,
    pub source_size: Option<u64>,
    pub failure: Option<FetchFailure>,
}

#[derive(Clone, Debug)]
pub struct BuildResult {
    pub started_at: Instant,
    pub elapsed: Duration,
    pub page: PageSettings,
    pub active_tab: Option<String>,
    pub datasets: Vec<DatasetReport>,
}

impl BuildResult {
    pub fn failures(&self) -> impl Iterator<Item = (&Dataset, &FetchFailure)> {
        self.datasets
            .iter()
            .filter_map(|r| r.failure.as_ref().map(|f| (&r.dataset, f)))
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    pub fn loaded_count(&self) -> usize {
        self.datasets.iter().filter(|r| r.table.is_some()).count()
    }
}

#[derive(Clone, Debug)]
pub struct Runner {
    options: Options,
}

impl Runner {
    pub fn new(options: Options) -> Result<Self, RunnerError> {
        if options.datasets.is_empty() {
            return Err(RunnerError::NoDatasets);
        }
        let mut seen: HashSet<&str> = HashSet::new();
        for dataset in options.datasets.iter() {
            dataset.validate()?;
            if !seen.insert(dataset.id.as_str()) {
                return Err(RunnerError::DuplicateDataset {
                    id: dataset.id.clone(),
                });
            }
        }
        if let Some(url) = options.base_url.as_deref() {
            parse_base_url(url)?;
        }
        let days = options.page.help_cookie.retention_days;
        if days == 0 || days > MAX_RETENTION_DAYS {
            return Err(RunnerError::InvalidCookieDays {
                value: days,
                max: MAX_RETENTION_DAYS,
            });
        }
        let page = &options.page;
        if !page.length_menu.is_empty() && !page.length_menu.contains(&page.page_length) {
            return Err(RunnerError::InvalidPageLength {
                value: page.page_length,
                menu: page.length_menu.clone(),
            });
        }
        if let Some(id) = page.default_tab.as_deref() {
            if !seen.contains(id) {
                return Err(RunnerError::UnknownDefaultTab { id: id.to_string() });
            }
        }
        Ok(Self { options })
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Fetches every dataset over HTTP (or from `data_dir`).
    pub async fn run(&self) -> Result<BuildResult, RunnerError> {
        self.run_with_progress(|_, _| {}).await
    }

    pub async fn run_with_progress<C>(&self, on_done: C) -> Result<BuildResult, RunnerError>
    where
        C: FnMut(&str, bool),
    {
        let client = build_client(self.options.proxy.as_deref(), self.options.timeout_seconds)?;
        let base_url = match self.options.base_url.as_deref() {
            Some(url) => Some(parse_base_url(url)?),
            None => None,
        };
        let data_dir = crate::config::expand_tilde(&self.options.data_dir);
        let fetcher = HttpFetcher::new(client, base_url, data_dir);
        Ok(self.run_with(fetcher, on_done).await)
    }

    /// Loads every dataset through `fetcher`. Fetch failures are recorded per
    /// dataset and never abort the build.
    pub async fn run_with<F, C>(&self, fetcher: F, on_done: C) -> BuildResult
    where
        F: Fetch,
        C: FnMut(&str, bool),
    {
        let started_at = Instant::now();
        let mut controller = TabController::new(self.options.datasets.clone(), fetcher);

        let outcomes = controller.load_all(on_done).await;

        if controller.state().none_loaded() {
            tracing::warn!("no dataset could be loaded");
        }

        let initial = self
            .options
            .page
            .default_tab
            .clone()
            .or_else(|| self.options.datasets.first().map(|d| d.id.clone()));
        if let Some(id) = initial.as_deref() {
            controller.state_mut().set_active(id);
        }

        let datasets = outcomes
            .into_iter()
            .filter_map(|outcome| report_for(&controller, outcome))
            .collect();

        BuildResult {
            started_at,
            elapsed: started_at.elapsed(),
            page: self.options.page.clone(),
            active_tab: controller.state().active_tab().map(str::to_string),
            datasets,
        }
    }
}

fn report_for<F: Fetch>(controller: &TabController<F>, outcome: LoadOutcome) -> Option<DatasetReport> {
    let dataset = controller.dataset(&outcome.dataset)?.clone();
    let failure = match outcome.result {
        Ok(_) => None,
        Err(ControllerError::Fetch { source, .. }) => Some(FetchFailure {
            location: source.location().to_string(),
            status: source.status(),
            message: source.to_string(),
        }),
        Err(err @ ControllerError::UnknownDataset(_)) => Some(FetchFailure {
            location: dataset.source.clone(),
            status: None,
            message: err.to_string(),
        }),
    };
    Some(DatasetReport {
        table: controller.table(&dataset.id).cloned(),
        source_size: controller.source_size(&dataset.id),
        failure,
        dataset,
    })
}

fn parse_base_url(url: &str) -> Result<reqwest::Url, RunnerError> {
    let mut parsed = reqwest::Url::parse(url).map_err(|e| RunnerError::InvalidBaseUrl {
        url: url.to_string(),
        message: e.to_string(),
    })?;
    // Url::join drops the last segment unless the base ends in '/'.
    if !parsed.path().ends_with('/') {
        let path = format!("{}/", parsed.path());
        parsed.set_path(&path);
    }
    Ok(parsed)
}

pub fn build_client(proxy: Option<&str>, timeout_seconds: usize) -> Result<reqwest::Client, RunnerError> {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::USER_AGENT,
        reqwest::header::HeaderValue::from_static(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        )),
    );

    let timeout = Duration::from_secs(timeout_seconds.try_into().unwrap_or(10));
    let mut builder = reqwest::Client::builder()
        .default_headers(headers)
        .redirect(reqwest::redirect::Policy::limited(10))
        .timeout(timeout);

    if let Some(proxy) = proxy.filter(|p| !p.trim().is_empty()) {
        let proxy = reqwest::Proxy::all(proxy).map_err(|e| RunnerError::ProxySetup {
            proxy: proxy.to_string(),
            source: e,
        })?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| RunnerError::HttpClientBuild { source: e })
}
