use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::Serialize;

use crate::dataset::{ColumnDescriptor, Row};
use crate::utils::escape_html;

pub const TABLE_CLASSES: &str = "display verycompact";

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ParsedTable {
    pub header: Vec<String>,
    pub rows: Vec<Row>,
}

/// Splits a TSV resource into records. The first line is the header and is kept
/// apart from the rows; a final empty line left by a trailing newline is dropped.
/// There is no quoting, so a field can never contain a tab or a newline.
pub fn parse_tsv(text: &str) -> ParsedTable {
    let mut lines: Vec<&str> = text
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect();
    if lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    if lines.is_empty() {
        return ParsedTable::default();
    }
    let header = split_record(lines[0]);
    let rows = lines[1..].iter().map(|line| split_record(line)).collect();
    ParsedTable { header, rows }
}

fn split_record(line: &str) -> Row {
    line.split('\t').map(|cell| cell.to_string()).collect()
}

fn table_open_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<table\b([^>]*)>").expect("valid table regex"))
}

fn id_attr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)\s+id\s*=\s*("[^"]*"|'[^']*'|[^\s>]+)"#).expect("valid id regex")
    })
}

fn class_attr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)(\s)class\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
            .expect("valid class regex")
    })
}

fn thead_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<thead\b.*?</thead>").expect("valid thead regex"))
}

fn th_open_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<th\b([^>]*)>").expect("valid th regex"))
}

fn title_attr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)\s+title\s*=\s*("[^"]*"|'[^']*')"#).expect("valid title regex")
    })
}

/// Takes an HTML fragment as served and readies it for the page: the first
/// `<table>` gets `table_id` and the widget classes, and each header cell gets
/// the matching column description as its `title` tooltip. Markup without a
/// table passes through unchanged.
pub fn prepare_html_table(fragment: &str, table_id: &str, columns: &[ColumnDescriptor]) -> String {
    let Some(caps) = table_open_re().captures(fragment) else {
        tracing::warn!(table_id, "HTML resource contains no <table>; inserting as-is");
        return fragment.to_string();
    };
    let whole = caps.get(0).map(|m| m.range()).unwrap_or_default();
    let attrs = caps.get(1).map(|m| m.as_str()).unwrap_or_default();

    let attrs = id_attr_re().replace_all(attrs, "").to_string();
    let attrs = if class_attr_re().is_match(&attrs) {
        class_attr_re()
            .replace(&attrs, |c: &Captures| {
                let existing = (2..=4)
                    .find_map(|i| c.get(i))
                    .map(|m| m.as_str().trim())
                    .unwrap_or_default();
                let classes = if existing.is_empty() {
                    TABLE_CLASSES.to_string()
                } else {
                    format!("{} {}", existing.replace('"', "&quot;"), TABLE_CLASSES)
                };
                format!(r#"{}class="{}""#, &c[1], classes)
            })
            .to_string()
    } else {
        format!(r#"{attrs} class="{TABLE_CLASSES}""#)
    };
    let open_tag = format!(r#"<table id="{}"{}>"#, escape_html(table_id), attrs);

    let mut out = String::with_capacity(fragment.len() + 64);
    out.push_str(&fragment[..whole.start]);
    out.push_str(&open_tag);
    out.push_str(&fragment[whole.end..]);

    add_header_titles(&out, columns)
}

fn add_header_titles(markup: &str, columns: &[ColumnDescriptor]) -> String {
    let Some(thead) = thead_re().find(markup) else {
        return markup.to_string();
    };
    let mut index = 0usize;
    let titled = th_open_re().replace_all(thead.as_str(), |c: &Captures| {
        let attrs = title_attr_re().replace_all(&c[1], "").to_string();
        let out = match columns.get(index) {
            Some(col) if !col.description.is_empty() => format!(
                r#"<th{} title="{}">"#,
                attrs,
                escape_html(&col.description)
            ),
            _ => format!("<th{}>", attrs),
        };
        index += 1;
        out
    });

    let mut out = String::with_capacity(markup.len() + 256);
    out.push_str(&markup[..thead.start()]);
    out.push_str(&titled);
    out.push_str(&markup[thead.end()..]);
    out
}
