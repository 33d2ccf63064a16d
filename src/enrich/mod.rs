//! Display enrichment for detail-row cells.
//!
//! A cell value goes through an ordered chain of pure string stages:
//! comma spacing, PubMed links, UniProtKB links, then evidence-code
//! annotation. The value is HTML-escaped before the first stage, so the
//! result is safe to insert as markup.
//!
//! The chain is not idempotent: feeding already-enriched markup back in
//! escapes the generated tags instead of leaving them alone.

use std::sync::OnceLock;

use regex::Regex;

use crate::dataset::{ColumnDescriptor, Row};
use crate::utils::escape_html;

pub const EMPTY_PLACEHOLDER: &str = r#"<span class="muted">empty</span>"#;

pub const PUBMED_SEARCH_URL: &str = "https://pubmed.ncbi.nlm.nih.gov/?term=";
pub const UNIPROTKB_URL: &str = "https://www.uniprot.org/uniprotkb/";

pub const DIRECT_EVIDENCE: &str = "Direct evidence";
pub const INFERRED_EVIDENCE: &str = "Inferred evidence (e.g., assayed orthologous protein)";
pub const NO_EVIDENCE: &str = "No available evidence";

/// Columns below this index hold the details toggle and the row id.
pub const FIRST_DETAIL_COLUMN: usize = 2;

fn comma_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r",([A-Za-z0-9_])").expect("valid comma regex"))
}

fn pmid_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([0-9]{6,})(?:\.0)?").expect("valid pmid regex"))
}

fn uniprot_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Z][A-Z0-9_]{5,}").expect("valid uniprot regex"))
}

/// Letters, digits and `_`; the word characters of the page script's regexes.
fn is_ascii_word(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Wraps every `letter(` not preceded by an ASCII word character.
fn wrap_evidence_letter(value: &str, letter: char, title: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut prev: Option<char> = None;
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        let standalone = !prev.is_some_and(is_ascii_word);
        if c == letter && standalone && chars.peek() == Some(&'(') {
            out.push_str(&format!(r#"<abbr title="{title}">{letter}</abbr>"#));
        } else {
            out.push(c);
        }
        prev = Some(c);
    }
    out
}

/// `"A,B"` becomes `"A, B"` so long lists can wrap.
pub fn space_after_commas(value: &str) -> String {
    comma_re().replace_all(value, ", ${1}").into_owned()
}

/// Runs of six or more digits become PubMed search links. A `.0` left over
/// from a float conversion upstream is swallowed.
pub fn link_pmids(value: &str) -> String {
    pmid_re()
        .replace_all(
            value,
            format!(r#"<a href="{PUBMED_SEARCH_URL}${{1}}" target="_self">${{1}}</a>"#).as_str(),
        )
        .into_owned()
}

pub fn link_uniprot(value: &str) -> String {
    uniprot_re()
        .replace_all(
            value,
            format!(r#"<a href="{UNIPROTKB_URL}${{0}}/entry">${{0}}</a>"#).as_str(),
        )
        .into_owned()
}

pub fn annotate_evidence(value: &str) -> String {
    if value == "N" {
        return format!(r#"<abbr title="{NO_EVIDENCE}">N</abbr>"#);
    }
    let value = wrap_evidence_letter(value, 'D', DIRECT_EVIDENCE);
    wrap_evidence_letter(&value, 'I', INFERRED_EVIDENCE)
}

pub fn enrich_value(raw: &str) -> String {
    let value = escape_html(raw);
    let value = space_after_commas(&value);
    let value = link_pmids(&value);
    let value = link_uniprot(&value);
    annotate_evidence(&value)
}

/// Renders one detail-row list item, or `None` when the column is already in
/// the main grid or is one of the reserved leading columns.
pub fn enrich_cell(raw: Option<&str>, column: &ColumnDescriptor) -> Option<String> {
    if column.visible || column.targets < FIRST_DETAIL_COLUMN {
        return None;
    }
    let value = match raw {
        Some(v) if !v.is_empty() => enrich_value(v),
        _ => EMPTY_PLACEHOLDER.to_string(),
    };
    Some(format!(
        r#"<li><span class="childrow-title" title="{}">{}</span>: {}</li>"#,
        escape_html(&column.description),
        escape_html(column.display_title()),
        value
    ))
}

/// Markup for the expandable details of one row: every hidden column, in
/// column order.
pub fn format_child(row: &Row, columns: &[ColumnDescriptor]) -> String {
    let mut out = String::from(r#"<div class="childrow"><ul>"#);
    for column in columns {
        let raw = row.get(column.targets).map(String::as_str);
        if let Some(item) = enrich_cell(raw, column) {
            out.push_str(&item);
        }
    }
    out.push_str("</ul></div>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hidden(targets: usize) -> ColumnDescriptor {
        ColumnDescriptor::new(targets, "PMIDs")
            .with_description("Supporting literature")
            .hidden()
    }

    #[test]
    fn visible_columns_are_skipped() {
        let col = ColumnDescriptor::new(4, "Disease");
        assert_eq!(enrich_cell(Some("x"), &col), None);
    }

    #[test]
    fn reserved_leading_columns_are_skipped_even_when_hidden() {
        assert_eq!(enrich_cell(Some("x"), &hidden(0)), None);
        assert_eq!(enrich_cell(Some("x"), &hidden(1)), None);
        assert!(enrich_cell(Some("x"), &hidden(2)).is_some());
    }

    #[test]
    fn empty_or_absent_value_gets_placeholder() {
        let out = enrich_cell(Some(""), &hidden(3)).unwrap();
        assert!(out.contains(EMPTY_PLACEHOLDER));
        let out = enrich_cell(None, &hidden(3)).unwrap();
        assert!(out.contains(EMPTY_PLACEHOLDER));
    }

    #[test]
    fn list_item_has_tooltip_title_then_value() {
        let out = enrich_cell(Some("abc"), &hidden(3)).unwrap();
        assert_eq!(
            out,
            r#"<li><span class="childrow-title" title="Supporting literature">PMIDs</span>: abc</li>"#
        );
    }

    #[test]
    fn comma_followed_by_word_char_gets_a_space() {
        assert_eq!(space_after_commas("A,B"), "A, B");
        assert_eq!(space_after_commas("A, B"), "A, B");
        assert_eq!(space_after_commas("A,,B"), "A,, B");
    }

    #[test]
    fn six_digit_pmid_is_linked() {
        let out = enrich_value("123456");
        assert!(out.contains(r#"href="https://pubmed.ncbi.nlm.nih.gov/?term=123456""#));
        assert!(out.contains(r#"target="_self">123456</a>"#));
    }

    #[test]
    fn five_digits_are_left_alone() {
        assert_eq!(enrich_value("12345"), "12345");
    }

    #[test]
    fn float_artifact_suffix_is_stripped() {
        let out = enrich_value("123456.0");
        assert!(out.contains("term=123456\""));
        assert!(out.contains(">123456</a>"));
        assert!(!out.contains(".0"));
    }

    #[test]
    fn pmid_lists_are_spaced_and_each_linked() {
        let out = enrich_value("1234567,7654321");
        assert_eq!(out.matches("<a href=").count(), 2);
        assert!(out.contains("</a>, <a"));
    }

    #[test]
    fn uniprot_tokens_are_linked() {
        assert_eq!(
            enrich_value("ABCDEF"),
            r#"<a href="https://www.uniprot.org/uniprotkb/ABCDEF/entry">ABCDEF</a>"#
        );
        assert_eq!(enrich_value("ABCDE"), "ABCDE");
        assert!(enrich_value("LMP1_EBVB9").contains("uniprotkb/LMP1_EBVB9/entry"));
    }

    #[test]
    fn no_evidence_wraps_whole_value_only() {
        assert_eq!(
            enrich_value("N"),
            r#"<abbr title="No available evidence">N</abbr>"#
        );
        assert_eq!(enrich_value("No"), "No");
    }

    #[test]
    fn direct_evidence_wraps_the_letter_only() {
        assert_eq!(
            enrich_value("D(assay)"),
            r#"<abbr title="Direct evidence">D</abbr>(assay)"#
        );
    }

    #[test]
    fn inferred_evidence_wraps_the_letter_only() {
        assert_eq!(
            enrich_value("I(ortholog)"),
            r#"<abbr title="Inferred evidence (e.g., assayed orthologous protein)">I</abbr>(ortholog)"#
        );
    }

    #[test]
    fn evidence_letter_must_stand_alone() {
        assert_eq!(enrich_value("AD(x)"), "AD(x)");
    }

    #[test]
    fn word_and_digit_classes_are_ascii_only() {
        let arabic_digits = "\u{661}\u{662}\u{663}\u{664}\u{665}\u{666}";
        assert_eq!(enrich_value(arabic_digits), arabic_digits);
        assert_eq!(enrich_value("café,été"), "café,été");
        assert_eq!(
            enrich_value("éD(x)"),
            format!(r#"é<abbr title="{DIRECT_EVIDENCE}">D</abbr>(x)"#)
        );
        assert_eq!(enrich_value("D(a)D(b)").matches("<abbr").count(), 2);
        assert_eq!(
            enrich_value("1234567,AB"),
            format!(r#"<a href="{PUBMED_SEARCH_URL}1234567" target="_self">1234567</a>, AB"#)
        );
    }

    #[test]
    fn markup_in_raw_values_is_escaped() {
        assert_eq!(enrich_value("<b>x</b>"), "&lt;b&gt;x&lt;/b&gt;");
    }

    #[test]
    fn format_child_lists_hidden_columns_in_order() {
        let columns = vec![
            ColumnDescriptor::new(0, "").hidden(),
            ColumnDescriptor::new(1, "Row").hidden(),
            ColumnDescriptor::new(2, "Disease"),
            ColumnDescriptor::new(3, "Evidence").hidden(),
            ColumnDescriptor::new(4, "PMIDs").hidden(),
        ];
        let row: Row = vec![
            "".into(),
            "7".into(),
            "Lupus".into(),
            "D(assay)".into(),
        ];
        let out = format_child(&row, &columns);
        assert!(out.starts_with(r#"<div class="childrow"><ul><li>"#));
        assert!(out.ends_with("</li></ul></div>"));
        assert!(!out.contains("Lupus"));
        let evidence = out.find("Evidence").unwrap();
        let pmids = out.find("PMIDs").unwrap();
        assert!(evidence < pmids);
        assert!(out.contains(EMPTY_PLACEHOLDER));
    }
}
