use std::collections::HashMap;

use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use thiserror::Error;

use crate::dataset::{Dataset, SourceFormat};
use crate::fetch::{Fetch, FetchError, USER_NOTICE};
use crate::parser::{parse_tsv, prepare_html_table, ParsedTable};
use crate::sort::sort_rows;

use super::{AppState, TabState};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum LoadedTable {
    /// Parsed TSV, rows normalized to the column count and pre-sorted by the
    /// dataset's default order.
    Rows(ParsedTable),
    /// HTML fragment ready to insert.
    Html(String),
}

impl LoadedTable {
    pub fn row_count(&self) -> Option<usize> {
        match self {
            Self::Rows(t) => Some(t.rows.len()),
            Self::Html(_) => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("unknown dataset '{0}'")]
    UnknownDataset(String),

    #[error("failed to load dataset '{dataset}': {source}")]
    Fetch {
        dataset: String,
        #[source]
        source: FetchError,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Selection {
    Fetched,
    AlreadyLoaded,
    InFlight,
}

/// One dataset's outcome from [`TabController::load_all`].
#[derive(Debug)]
pub struct LoadOutcome {
    pub dataset: String,
    pub result: Result<Selection, ControllerError>,
}

pub struct TabController<F> {
    state: AppState,
    fetcher: F,
    datasets: Vec<Dataset>,
    tables: HashMap<String, LoadedTable>,
    sizes: HashMap<String, u64>,
}

impl<F: Fetch> TabController<F> {
    pub fn new(datasets: Vec<Dataset>, fetcher: F) -> Self {
        let state = AppState::new(datasets.iter().map(|d| d.id.clone()));
        Self {
            state,
            fetcher,
            datasets,
            tables: HashMap::new(),
            sizes: HashMap::new(),
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut AppState {
        &mut self.state
    }

    pub fn datasets(&self) -> &[Dataset] {
        &self.datasets
    }

    pub fn dataset(&self, id: &str) -> Option<&Dataset> {
        self.datasets.iter().find(|d| d.id == id)
    }

    pub fn table(&self, id: &str) -> Option<&LoadedTable> {
        self.tables.get(id)
    }

    /// Size in bytes of the resource as fetched.
    pub fn source_size(&self, id: &str) -> Option<u64> {
        self.sizes.get(id).copied()
    }

    /// Makes `id` the active tab and fetches it unless it is already loaded or
    /// in flight.
    pub async fn select(&mut self, id: &str) -> Result<Selection, ControllerError> {
        let source = self
            .dataset(id)
            .map(|d| d.source.clone())
            .ok_or_else(|| ControllerError::UnknownDataset(id.to_string()))?;
        self.state.set_active(id);

        if !self.state.begin_load(id) {
            return Ok(match self.state.tab_state(id) {
                Some(TabState::Loaded) => Selection::AlreadyLoaded,
                _ => Selection::InFlight,
            });
        }
        tracing::debug!(dataset = id, source = %source, "fetching dataset");
        let fetched = self.fetcher.fetch(&source).await;
        self.complete(id, fetched)
    }

    /// Fetches every dataset that is not loaded yet, all at once. `on_done` is
    /// called as each fetch settles, in completion order; the returned
    /// outcomes follow dataset order.
    pub async fn load_all<C>(&mut self, mut on_done: C) -> Vec<LoadOutcome>
    where
        C: FnMut(&str, bool),
    {
        let mut pending: Vec<(String, String)> = Vec::new();
        for dataset in self.datasets.iter() {
            if self.state.begin_load(&dataset.id) {
                pending.push((dataset.id.clone(), dataset.source.clone()));
            }
        }

        let mut settled: Vec<(String, Result<String, FetchError>)> = Vec::with_capacity(pending.len());
        {
            let fetcher = &self.fetcher;
            let mut inflight = FuturesUnordered::new();
            for (id, source) in pending {
                inflight.push(async move {
                    let fetched = fetcher.fetch(&source).await;
                    (id, fetched)
                });
            }
            while let Some((id, fetched)) = inflight.next().await {
                on_done(&id, fetched.is_ok());
                settled.push((id, fetched));
            }
        }

        let mut by_id: HashMap<String, Result<String, FetchError>> = settled.into_iter().collect();
        let ids: Vec<String> = self.state.tab_ids().to_vec();
        let mut outcomes = Vec::with_capacity(ids.len());
        for id in ids {
            let result = match by_id.remove(&id) {
                Some(fetched) => self.complete(&id, fetched),
                None if self.state.is_loaded(&id) => Ok(Selection::AlreadyLoaded),
                None => Ok(Selection::InFlight),
            };
            outcomes.push(LoadOutcome {
                dataset: id,
                result,
            });
        }
        outcomes
    }

    fn complete(&mut self, id: &str, fetched: Result<String, FetchError>) -> Result<Selection, ControllerError> {
        let Some(dataset) = self.datasets.iter().find(|d| d.id == id) else {
            return Err(ControllerError::UnknownDataset(id.to_string()));
        };
        match fetched {
            Ok(body) => {
                let size = body.len() as u64;
                let table = build_table(dataset, &body);
                if let Some(rows) = table.row_count() {
                    tracing::info!(dataset = id, rows, "dataset loaded");
                } else {
                    tracing::info!(dataset = id, bytes = size, "dataset loaded");
                }
                self.tables.insert(id.to_string(), table);
                self.sizes.insert(id.to_string(), size);
                self.state.finish_load(id, true);
                Ok(Selection::Fetched)
            }
            Err(err) => {
                tracing::error!(
                    dataset = id,
                    url = err.location(),
                    status = ?err.status(),
                    "{}",
                    err
                );
                tracing::error!("{}", USER_NOTICE);
                self.state.finish_load(id, false);
                Err(ControllerError::Fetch {
                    dataset: id.to_string(),
                    source: err,
                })
            }
        }
    }
}

fn build_table(dataset: &Dataset, body: &str) -> LoadedTable {
    match dataset.format {
        SourceFormat::Tsv => {
            let parsed = parse_tsv(body);
            let mut rows: Vec<_> = parsed
                .rows
                .into_iter()
                .map(|row| dataset.normalize_row(row))
                .collect();
            sort_rows(&mut rows, &dataset.order, |c| dataset.renderer_for(c));
            LoadedTable::Rows(ParsedTable {
                header: parsed.header,
                rows,
            })
        }
        SourceFormat::Html => {
            LoadedTable::Html(prepare_html_table(body, &dataset.table_dom_id(), &dataset.columns))
        }
    }
}
