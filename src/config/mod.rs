use std::env;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::Deserialize;
use serde::Serialize;

use crate::dataset::{ColumnDescriptor, Dataset, SortColumn, SourceFormat};

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct ConfigFile {
    pub title: Option<String>,
    pub output: Option<String>,
    pub output_format: Option<String>,
    pub base_url: Option<String>,
    pub data_dir: Option<String>,
    pub timeout: Option<usize>,
    pub proxy: Option<String>,
    pub page_length: Option<i64>,
    pub length_menu: Option<String>,
    pub details_rows: Option<bool>,
    pub admin_url: Option<String>,
    pub help_cookie_name: Option<String>,
    #[serde(alias = "cookie_days")]
    pub help_cookie_days: Option<u32>,
    pub default_tab: Option<String>,
    pub no_color: Option<bool>,
    pub datasets: Option<Vec<DatasetEntry>>,
}

/// A dataset as written in the config file; `format` may be left out and is
/// then inferred from the source's extension.
#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct DatasetEntry {
    pub id: String,
    pub label: Option<String>,
    pub source: String,
    pub format: Option<String>,
    #[serde(default)]
    pub order: Vec<SortColumn>,
    #[serde(default)]
    pub columns: Vec<ColumnDescriptor>,
}

impl DatasetEntry {
    pub fn into_dataset(self) -> Result<Dataset, String> {
        let format = match self.format.as_deref() {
            Some(raw) => SourceFormat::parse(raw).ok_or_else(|| {
                format!(
                    "dataset '{}': unknown format '{}' (expected tsv or html)",
                    self.id, raw
                )
            })?,
            None => SourceFormat::infer_from_source(&self.source).ok_or_else(|| {
                format!(
                    "dataset '{}': cannot infer format from '{}'; set format: tsv|html",
                    self.id, self.source
                )
            })?,
        };
        let label = self
            .label
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| self.id.clone());
        Ok(Dataset {
            id: self.id,
            label,
            source: self.source,
            format,
            columns: self.columns,
            order: self.order,
        })
    }
}

/// Overrides the directory holding `config.yml`.
pub const CONFIG_DIR_ENV: &str = "PUBTABLES_HOME";

fn env_lookup(name: &str) -> Option<String> {
    env::var(name).ok()
}

fn user_home_with<L>(lookup: &L) -> Option<PathBuf>
where
    L: Fn(&str) -> Option<String>,
{
    ["HOME", "USERPROFILE"]
        .iter()
        .find_map(|key| lookup(key).filter(|v| !v.is_empty()))
        .map(PathBuf::from)
}

fn config_dir_with<L>(lookup: L) -> Option<PathBuf>
where
    L: Fn(&str) -> Option<String>,
{
    match lookup(CONFIG_DIR_ENV).filter(|v| !v.trim().is_empty()) {
        Some(dir) => Some(expand_tilde_with(&dir, user_home_with(&lookup))),
        None => user_home_with(&lookup).map(|home| home.join(".pubtables")),
    }
}

/// `$PUBTABLES_HOME/config.yml`, else `~/.pubtables/config.yml`.
pub fn default_config_path() -> Option<PathBuf> {
    config_dir_with(env_lookup).map(|dir| dir.join("config.yml"))
}

fn expand_tilde_with(path: &str, home: Option<PathBuf>) -> PathBuf {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() => rest,
        Some(rest) if rest.starts_with(['/', '\\']) => &rest[1..],
        _ => return PathBuf::from(path),
    };
    match home {
        Some(home) if rest.is_empty() => home,
        Some(home) => home.join(rest),
        None => PathBuf::from(path),
    }
}

/// `~` and `~/...` resolve against the user's home; `~user` is left as is.
pub fn expand_tilde(path: &str) -> PathBuf {
    expand_tilde_with(path, user_home_with(&env_lookup))
}

pub fn expand_tilde_string(path: &str) -> String {
    expand_tilde(path).to_string_lossy().to_string()
}

fn env_var_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{(\w+)(?::-?([^}]*))?\}").expect("valid env var regex"))
}

/// Shell-style `${VAR}` / `${VAR:-default}` substitution. An unset variable
/// without a default becomes the empty string.
pub fn expand_env_vars(text: &str) -> String {
    expand_env_with(text, |name| env::var(name).ok())
}

fn expand_env_with<L>(text: &str, lookup: L) -> String
where
    L: Fn(&str) -> Option<String>,
{
    env_var_re()
        .replace_all(text, |c: &Captures| {
            let name = &c[1];
            let default = c.get(2).map(|m| m.as_str()).unwrap_or_default();
            let value = lookup(name).unwrap_or_else(|| default.to_string());
            tracing::info!("Substituted ${} in config with '{}'", name, value);
            value
        })
        .into_owned()
}

pub fn load_config(path: &PathBuf, allow_missing: bool) -> Result<ConfigFile, String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => parse_config(&contents)
            .map_err(|e| format!("failed to parse config '{}': {e}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && allow_missing => {
            Ok(ConfigFile::default())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(format!("config file not found '{}'", path.display()))
        }
        Err(e) => Err(format!("failed to read config '{}': {e}", path.display())),
    }
}

pub fn parse_config(contents: &str) -> Result<ConfigFile, serde_yaml::Error> {
    serde_yaml::from_str::<ConfigFile>(&expand_env_vars(contents))
}

pub fn default_config_yaml() -> String {
    r#"# pubtables config
#
# Location (default):
#   ~/.pubtables/config.yml
#
# Environment references (see data_dir below) are replaced before parsing.

title: Results

# Output (optional)
# output: ./index.html
# output_format: html

# Where relative dataset sources are fetched from: base_url when set,
# otherwise data_dir on the local filesystem.
# base_url: https://example.org/results/
data_dir: ${PUBTABLES_DATA_DIR:-./data}

# HTTP (optional)
timeout: 10
# proxy: http://127.0.0.1:8080

# Table
page_length: 100
length_menu: "10,25,100,-1"
details_rows: false
# default_tab: icd

# Help panel preference cookie
help_cookie_name: search-help-hidden
help_cookie_days: 30

# admin_url: mailto:admin@example.org

# Output styling
no_color: false

datasets: []
# datasets:
#   - id: icd
#     label: ICD-10
#     source: icd.tsv
#     order: [[3, "asc"]]
#     columns:
#       - { targets: 0, title: "" }
#       - { targets: 1, title: Row, visible: false }
#       - { targets: 2, title: Disease, description: Disease name }
#       - { targets: 3, title: FDR, description: False discovery rate, renderer: na_sorts_low }
#       - { targets: 4, title: PMIDs, description: Supporting literature, visible: false }
"#
    .to_string()
}

/// Writes the commented template to `path`, creating parent directories.
/// Returns `Ok(false)` without touching the file when it already exists.
pub fn write_default_config(path: &Path) -> Result<bool, String> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("cannot create directory '{}': {e}", parent.display()))?;
    }
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(format!("cannot create config '{}': {e}", path.display())),
    };
    file.write_all(default_config_yaml().as_bytes())
        .map_err(|e| format!("cannot write config '{}': {e}", path.display()))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::dataset::SortDirection;

    #[test]
    fn env_vars_use_value_then_default_then_empty() {
        let lookup = |name: &str| (name == "SET").then(|| "here".to_string());
        assert_eq!(expand_env_with("a: ${SET}", lookup), "a: here");
        assert_eq!(expand_env_with("a: ${SET:-x}", lookup), "a: here");
        assert_eq!(expand_env_with("a: ${UNSET:-./data}", lookup), "a: ./data");
        assert_eq!(expand_env_with("a: ${UNSET}", lookup), "a: ");
        assert_eq!(
            expand_env_with("${UNSET:-1}/${SET}", lookup),
            "1/here"
        );
    }

    #[test]
    fn default_config_parses() {
        let cfg = parse_config(&default_config_yaml()).unwrap();
        assert_eq!(cfg.page_length, Some(100));
        assert_eq!(cfg.help_cookie_days, Some(30));
        assert_eq!(cfg.details_rows, Some(false));
        assert!(cfg.datasets.unwrap().is_empty());
    }

    #[test]
    fn dataset_entries_convert_with_inferred_format() {
        let yaml = r#"
datasets:
  - id: icd
    source: data/icd.tsv
    order: [[3, "desc"]]
    columns:
      - { targets: 0, title: "" }
      - { targets: 1, name: rowid, visible: false }
  - id: phe
    label: Phecodes
    source: https://example.org/phe
    format: html
    columns: []
"#;
        let cfg = parse_config(yaml).unwrap();
        let mut entries = cfg.datasets.unwrap().into_iter();

        let icd = entries.next().unwrap().into_dataset().unwrap();
        assert_eq!(icd.label, "icd");
        assert_eq!(icd.format, SourceFormat::Tsv);
        assert_eq!(icd.order, vec![SortColumn(3, SortDirection::Desc)]);
        assert!(!icd.columns[1].visible);
        assert_eq!(icd.columns[1].display_title(), "rowid");

        let phe = entries.next().unwrap().into_dataset().unwrap();
        assert_eq!(phe.format, SourceFormat::Html);
        assert_eq!(phe.label, "Phecodes");
    }

    #[test]
    fn uninferable_format_is_an_error() {
        let entry = DatasetEntry {
            id: "x".to_string(),
            source: "https://example.org/data".to_string(),
            ..Default::default()
        };
        assert!(entry.into_dataset().unwrap_err().contains("cannot infer format"));
    }

    #[test]
    fn missing_file_is_allowed_only_when_asked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.yml");
        assert!(load_config(&path, true).is_ok());
        assert!(load_config(&path, false)
            .unwrap_err()
            .contains("config file not found"));
    }

    #[test]
    fn default_config_is_written_only_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yml");
        assert!(write_default_config(&path).unwrap());
        assert!(parse_config(&std::fs::read_to_string(&path).unwrap()).is_ok());

        std::fs::write(&path, "title: Mine\n").unwrap();
        assert!(!write_default_config(&path).unwrap());
        let cfg = load_config(&path, false).unwrap();
        assert_eq!(cfg.title.as_deref(), Some("Mine"));
    }

    #[test]
    fn tilde_forms_resolve_against_home() {
        let home = Some(PathBuf::from("/home/ada"));
        assert_eq!(expand_tilde_with("~", home.clone()), PathBuf::from("/home/ada"));
        assert_eq!(
            expand_tilde_with("~/x.tsv", home.clone()),
            PathBuf::from("/home/ada/x.tsv")
        );
        assert_eq!(expand_tilde_with("~bob/x", home.clone()), PathBuf::from("~bob/x"));
        assert_eq!(expand_tilde_with("data/x.tsv", home), PathBuf::from("data/x.tsv"));
        assert_eq!(expand_tilde_with("~/x", None), PathBuf::from("~/x"));
    }

    #[test]
    fn config_dir_prefers_the_override() {
        let vars = |pairs: &'static [(&'static str, &'static str)]| {
            move |name: &str| {
                pairs
                    .iter()
                    .find(|(k, _)| *k == name)
                    .map(|(_, v)| v.to_string())
            }
        };
        assert_eq!(
            config_dir_with(vars(&[("HOME", "/h"), ("PUBTABLES_HOME", "~/cfg")])),
            Some(PathBuf::from("/h/cfg"))
        );
        assert_eq!(
            config_dir_with(vars(&[("HOME", ""), ("USERPROFILE", "/u")])),
            Some(PathBuf::from("/u/.pubtables"))
        );
        assert_eq!(config_dir_with(vars(&[("PUBTABLES_HOME", " ")])), None);
    }
}
