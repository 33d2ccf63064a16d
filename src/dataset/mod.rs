use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sort::Renderer;
use crate::utils::slugify;

/// One record of a dataset; cell `i` belongs to the column whose `targets` is `i`.
pub type Row = Vec<String>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Tsv,
    Html,
}

impl SourceFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "tsv" | "txt" => Some(Self::Tsv),
            "html" | "htm" => Some(Self::Html),
            _ => None,
        }
    }

    pub fn infer_from_source(source: &str) -> Option<Self> {
        let path = source
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();
        if path.ends_with(".tsv") || path.ends_with(".txt") {
            return Some(Self::Tsv);
        }
        if path.ends_with(".html") || path.ends_with(".htm") {
            return Some(Self::Html);
        }
        None
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Tsv => "tsv",
            Self::Html => "html",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// `[column, "asc"|"desc"]`, the same shape the table widget takes for `order`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortColumn(pub usize, pub SortDirection);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub targets: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renderer: Option<String>,
}

fn default_visible() -> bool {
    true
}

impl ColumnDescriptor {
    pub fn new(targets: usize, title: &str) -> Self {
        Self {
            targets,
            title: Some(title.to_string()),
            name: None,
            description: String::new(),
            visible: true,
            renderer: None,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn with_renderer(mut self, renderer: &str) -> Self {
        self.renderer = Some(renderer.to_string());
        self
    }

    /// `title`, falling back to `name`.
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: String,
    pub label: String,
    pub source: String,
    pub format: SourceFormat,
    pub columns: Vec<ColumnDescriptor>,
    #[serde(default)]
    pub order: Vec<SortColumn>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DatasetError {
    #[error("dataset id is empty")]
    EmptyId,

    #[error("dataset '{dataset}' has no source")]
    EmptySource { dataset: String },

    #[error("dataset '{dataset}' has no columns")]
    NoColumns { dataset: String },

    #[error("dataset '{dataset}': column index {index} is declared more than once")]
    DuplicateColumn { dataset: String, index: usize },

    #[error("dataset '{dataset}': column at position {position} declares targets={targets}")]
    ColumnPosition {
        dataset: String,
        position: usize,
        targets: usize,
    },

    #[error(
        "dataset '{dataset}': column {column} uses unknown renderer '{name}' (known: {})",
        Renderer::known_names()
    )]
    UnknownRenderer {
        dataset: String,
        column: usize,
        name: String,
    },

    #[error("dataset '{dataset}': sort order refers to missing column {column}")]
    OrderOutOfRange { dataset: String, column: usize },
}

impl Dataset {
    pub fn validate(&self) -> Result<(), DatasetError> {
        if self.id.trim().is_empty() {
            return Err(DatasetError::EmptyId);
        }
        if self.source.trim().is_empty() {
            return Err(DatasetError::EmptySource {
                dataset: self.id.clone(),
            });
        }
        if self.columns.is_empty() {
            return Err(DatasetError::NoColumns {
                dataset: self.id.clone(),
            });
        }

        let mut seen: HashSet<usize> = HashSet::new();
        for (position, column) in self.columns.iter().enumerate() {
            if !seen.insert(column.targets) {
                return Err(DatasetError::DuplicateColumn {
                    dataset: self.id.clone(),
                    index: column.targets,
                });
            }
            if column.targets != position {
                return Err(DatasetError::ColumnPosition {
                    dataset: self.id.clone(),
                    position,
                    targets: column.targets,
                });
            }
            if let Some(name) = column.renderer.as_deref() {
                if Renderer::from_name(name).is_none() {
                    return Err(DatasetError::UnknownRenderer {
                        dataset: self.id.clone(),
                        column: column.targets,
                        name: name.to_string(),
                    });
                }
            }
        }

        for SortColumn(column, _) in self.order.iter() {
            if *column >= self.columns.len() {
                return Err(DatasetError::OrderOutOfRange {
                    dataset: self.id.clone(),
                    column: *column,
                });
            }
        }
        Ok(())
    }

    /// DOM id of the rendered table; unique per page.
    pub fn table_dom_id(&self) -> String {
        format!("datatable-{}", slugify(&self.id))
    }

    pub fn column(&self, index: usize) -> Option<&ColumnDescriptor> {
        self.columns.get(index)
    }

    pub fn renderer_for(&self, index: usize) -> Option<Renderer> {
        self.column(index)
            .and_then(|c| c.renderer.as_deref())
            .and_then(Renderer::from_name)
    }

    /// Pads short rows with empty cells and drops extra trailing cells.
    pub fn normalize_row(&self, mut row: Row) -> Row {
        let width = self.columns.len();
        if row.len() != width {
            tracing::warn!(
                dataset = %self.id,
                expected = width,
                found = row.len(),
                "row width does not match column count"
            );
            row.resize(width, String::new());
        }
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        Dataset {
            id: "icd".to_string(),
            label: "ICD-10".to_string(),
            source: "data/icd.tsv".to_string(),
            format: SourceFormat::Tsv,
            columns: vec![
                ColumnDescriptor::new(0, ""),
                ColumnDescriptor::new(1, "Row").hidden(),
                ColumnDescriptor::new(2, "Disease").with_description("Disease name"),
                ColumnDescriptor::new(3, "UKB FDR").with_renderer("na_sorts_low"),
            ],
            order: vec![SortColumn(3, SortDirection::Asc)],
        }
    }

    #[test]
    fn valid_dataset_passes() {
        assert_eq!(sample().validate(), Ok(()));
    }

    #[test]
    fn duplicate_column_index_is_rejected() {
        let mut ds = sample();
        ds.columns[3].targets = 2;
        assert_eq!(
            ds.validate(),
            Err(DatasetError::DuplicateColumn {
                dataset: "icd".to_string(),
                index: 2
            })
        );
    }

    #[test]
    fn column_index_must_match_position() {
        let mut ds = sample();
        ds.columns.swap(2, 3);
        assert!(matches!(
            ds.validate(),
            Err(DatasetError::ColumnPosition { position: 2, .. })
        ));
    }

    #[test]
    fn unknown_renderer_is_rejected() {
        let mut ds = sample();
        ds.columns[3].renderer = Some("bogus".to_string());
        let err = ds.validate().unwrap_err();
        assert!(matches!(err, DatasetError::UnknownRenderer { column: 3, .. }));
        assert!(err.to_string().ends_with("(known: na_sorts_low, numeric)"));
    }

    #[test]
    fn order_must_reference_existing_column() {
        let mut ds = sample();
        ds.order = vec![SortColumn(9, SortDirection::Desc)];
        assert!(matches!(
            ds.validate(),
            Err(DatasetError::OrderOutOfRange { column: 9, .. })
        ));
    }

    #[test]
    fn normalize_row_pads_and_truncates() {
        let ds = sample();
        let short = ds.normalize_row(vec!["".into(), "1".into()]);
        assert_eq!(short.len(), 4);
        assert_eq!(short[3], "");
        let long = ds.normalize_row(vec!["a".into(); 6]);
        assert_eq!(long.len(), 4);
    }

    #[test]
    fn table_dom_id_is_slugged() {
        let mut ds = sample();
        ds.id = "ICD 10".to_string();
        assert_eq!(ds.table_dom_id(), "datatable-icd-10");
    }

    #[test]
    fn display_title_falls_back_to_name() {
        let mut col = ColumnDescriptor::new(4, "x");
        col.title = None;
        col.name = Some("pmids".to_string());
        assert_eq!(col.display_title(), "pmids");
    }

    #[test]
    fn format_inferred_from_extension() {
        assert_eq!(
            SourceFormat::infer_from_source("data/PHE.tsv?v=2"),
            Some(SourceFormat::Tsv)
        );
        assert_eq!(
            SourceFormat::infer_from_source("https://x.org/table.HTML"),
            Some(SourceFormat::Html)
        );
        assert_eq!(SourceFormat::infer_from_source("data/file.xlsx"), None);
    }

    #[test]
    fn descriptor_defaults_to_visible_when_deserialized() {
        let col: ColumnDescriptor =
            serde_yaml::from_str("targets: 2\ntitle: Disease\n").unwrap();
        assert!(col.visible);
        assert!(col.description.is_empty());
    }
}
