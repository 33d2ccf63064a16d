use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::config::parse_config;
use crate::dataset::{ColumnDescriptor, Dataset, SortColumn, SortDirection, SourceFormat};
use crate::fetch::{Fetch, FetchError, HttpFetcher};
use crate::output::{self, OutputFormat};
use crate::runner::{Options, Runner};
use crate::state::LoadedTable;

const ICD_TSV: &str = "\tRow\tFDR\tPMIDs\n\t1\t0.5\t111\n\t2\tn/a\t\n\t3\t1.0e-05\t222,333\n";
const PHE_HTML: &str = r#"<table class="stripe"><thead><tr><th></th><th>Name</th></tr></thead><tbody><tr><td></td><td>BMI</td></tr></tbody></table>"#;

struct StaticFetcher {
    bodies: HashMap<String, String>,
    requested: Arc<Mutex<Vec<String>>>,
}

impl StaticFetcher {
    fn new(entries: &[(&str, &str)]) -> Self {
        Self {
            bodies: entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            requested: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl Fetch for StaticFetcher {
    async fn fetch(&self, location: &str) -> Result<String, FetchError> {
        self.requested.lock().unwrap().push(location.to_string());
        self.bodies
            .get(location)
            .cloned()
            .ok_or_else(|| FetchError::Status {
                url: format!("https://example.org/{location}"),
                status: 404,
            })
    }
}

fn icd() -> Dataset {
    Dataset {
        id: "icd".to_string(),
        label: "ICD codes".to_string(),
        source: "icd.tsv".to_string(),
        format: SourceFormat::Tsv,
        columns: vec![
            ColumnDescriptor::new(0, ""),
            ColumnDescriptor::new(1, "Row").hidden(),
            ColumnDescriptor::new(2, "FDR").with_renderer("na_sorts_low"),
            ColumnDescriptor::new(3, "PMIDs")
                .with_description("Supporting literature")
                .hidden(),
        ],
        order: vec![SortColumn(2, SortDirection::Asc)],
    }
}

fn phe() -> Dataset {
    Dataset {
        id: "phe".to_string(),
        label: "Phenotypes".to_string(),
        source: "phe.html".to_string(),
        format: SourceFormat::Html,
        columns: vec![
            ColumnDescriptor::new(0, ""),
            ColumnDescriptor::new(1, "Name").with_description("Phenotype name"),
        ],
        order: Vec::new(),
    }
}

fn options(datasets: Vec<Dataset>) -> Options {
    Options {
        datasets,
        ..Options::default()
    }
}

#[tokio::test]
async fn builds_a_page_from_tsv_and_html_datasets() {
    let runner = Runner::new(options(vec![icd(), phe()])).unwrap();
    let fetcher = StaticFetcher::new(&[("icd.tsv", ICD_TSV), ("phe.html", PHE_HTML)]);
    let requested = fetcher.requested.clone();

    let mut done = Vec::new();
    let result = runner
        .run_with(fetcher, |id, ok| done.push((id.to_string(), ok)))
        .await;

    assert!(!result.has_failures());
    assert_eq!(result.loaded_count(), 2);
    assert_eq!(result.active_tab.as_deref(), Some("icd"));
    assert_eq!(requested.lock().unwrap().len(), 2);
    assert_eq!(done.len(), 2);
    assert!(done.iter().all(|(_, ok)| *ok));

    match result.datasets[0].table.as_ref() {
        Some(LoadedTable::Rows(table)) => {
            let fdr: Vec<&str> = table.rows.iter().map(|r| r[2].as_str()).collect();
            assert_eq!(fdr, vec!["n/a", "1.0e-05", "0.5"]);
        }
        other => panic!("expected parsed rows, got {other:?}"),
    }

    let html = String::from_utf8(output::render(&result, OutputFormat::Html)).unwrap();
    assert!(html.contains(r#"<table id="datatable-icd" class="display verycompact""#));
    assert!(html.contains(r#"id="datatable-phe""#));
    assert!(html.contains(r#"title="Phenotype name""#));
    assert!(html.contains(r#"data-tab="phe""#));
    assert!(!html.contains(r#"<p class="load-error">"#));
}

#[tokio::test]
async fn json_dump_lists_every_dataset() {
    let runner = Runner::new(options(vec![icd(), phe()])).unwrap();
    let fetcher = StaticFetcher::new(&[("icd.tsv", ICD_TSV), ("phe.html", PHE_HTML)]);
    let result = runner.run_with(fetcher, |_, _| {}).await;

    let json: serde_json::Value =
        serde_json::from_slice(&output::render(&result, OutputFormat::Json)).unwrap();
    assert_eq!(json["title"], "Results");
    assert_eq!(json["active_tab"], "icd");
    assert_eq!(json["datasets"][0]["table"]["kind"], "rows");
    assert_eq!(json["datasets"][1]["table"]["kind"], "html");
    assert_eq!(json["datasets"][0]["source_size"], ICD_TSV.len() as u64);
}

#[tokio::test]
async fn one_failed_dataset_does_not_stop_the_others() {
    let mut opts = options(vec![icd(), phe()]);
    opts.page.default_tab = Some("phe".to_string());
    let runner = Runner::new(opts).unwrap();
    let fetcher = StaticFetcher::new(&[("phe.html", PHE_HTML)]);

    let result = runner.run_with(fetcher, |_, _| {}).await;

    assert!(result.has_failures());
    assert_eq!(result.loaded_count(), 1);
    assert_eq!(result.active_tab.as_deref(), Some("phe"));
    let (dataset, failure) = result.failures().next().unwrap();
    assert_eq!(dataset.id, "icd");
    assert_eq!(failure.status, Some(404));
    assert_eq!(failure.location, "https://example.org/icd.tsv");

    let html = String::from_utf8(output::render(&result, OutputFormat::Html)).unwrap();
    assert!(html.contains(r#"<p class="load-error">"#));
    assert!(html.contains(r#"id="datatable-phe""#));
}

#[tokio::test]
async fn config_datasets_run_against_local_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("icd.tsv"), ICD_TSV).unwrap();

    let cfg = parse_config(
        r#"
title: Local results
datasets:
  - id: icd
    label: ICD codes
    source: icd.tsv
    order: [[2, desc]]
    columns:
      - { targets: 0, title: "" }
      - { targets: 1, title: Row, visible: false }
      - { targets: 2, title: FDR, renderer: naSortsLow }
      - { targets: 3, title: PMIDs, visible: false }
"#,
    )
    .unwrap();
    let datasets: Vec<Dataset> = cfg
        .datasets
        .unwrap()
        .into_iter()
        .map(|d| d.into_dataset().unwrap())
        .collect();
    assert_eq!(datasets[0].format, SourceFormat::Tsv);

    let runner = Runner::new(options(datasets)).unwrap();
    let fetcher = HttpFetcher::new(reqwest::Client::new(), None, dir.path().to_path_buf());
    let result = runner.run_with(fetcher, |_, _| {}).await;

    assert!(!result.has_failures());
    match result.datasets[0].table.as_ref() {
        Some(LoadedTable::Rows(table)) => {
            assert_eq!(table.header.len(), 4);
            assert_eq!(table.rows[0][2], "0.5");
            assert_eq!(table.rows[2][2], "n/a");
        }
        other => panic!("expected parsed rows, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_local_file_is_reported_with_its_path() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Runner::new(options(vec![icd()])).unwrap();
    let fetcher = HttpFetcher::new(reqwest::Client::new(), None, dir.path().to_path_buf());

    let result = runner.run_with(fetcher, |_, _| {}).await;

    let (_, failure) = result.failures().next().unwrap();
    assert_eq!(failure.status, None);
    assert!(failure.location.ends_with("icd.tsv"));
}
