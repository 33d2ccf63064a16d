use serde::Serialize;

use crate::dataset::{ColumnDescriptor, SortColumn};
use crate::enrich::{
    format_child, DIRECT_EVIDENCE, EMPTY_PLACEHOLDER, FIRST_DETAIL_COLUMN, INFERRED_EVIDENCE,
    NO_EVIDENCE, PUBMED_SEARCH_URL, UNIPROTKB_URL,
};
use crate::fetch::USER_NOTICE;
use crate::runner::{BuildResult, DatasetReport};
use crate::sort::NOT_APPLICABLE;
use crate::state::{CookieAction, HelpCookie, HelpPanel, LoadedTable};
use crate::utils::{escape_html, humansize, length_menu_label, slugify};

const JQUERY_JS: &str = "https://code.jquery.com/jquery-3.7.1.min.js";
const DATATABLES_JS: &str = "https://cdn.datatables.net/1.13.8/js/jquery.dataTables.min.js";
const DATATABLES_CSS: &str = "https://cdn.datatables.net/1.13.8/css/jquery.dataTables.min.css";
const JS_COOKIE_JS: &str = "https://cdn.jsdelivr.net/npm/js-cookie@3.0.5/dist/js.cookie.min.js";

/// JSON never needs a literal `<`, so escaping all of them keeps the
/// `<script>` element from being closed or reparsed by its content.
fn json_for_script_tag(value: &str) -> String {
    value.replace('<', "\\u003c")
}

/// Column definition as handed to the table widget's `columnDefs`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ColumnDef<'a> {
    targets: usize,
    title: &'a str,
    description: &'a str,
    visible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    renderer: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    class_name: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    orderable: Option<bool>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TabData<'a> {
    id: &'a str,
    panel_id: String,
    table_id: String,
    source: &'a str,
    columns: Vec<ColumnDef<'a>>,
    order: &'a [SortColumn],
    #[serde(skip_serializing_if = "Option::is_none")]
    rows: Option<&'a [Vec<String>]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    children: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<TabError<'a>>,
}

#[derive(Serialize)]
struct TabError<'a> {
    location: &'a str,
    status: Option<u16>,
}

/// One help-panel state as the page script runs it.
#[derive(Serialize)]
struct HelpState {
    label: &'static str,
    next: HelpPanel,
    cookie: CookieAction,
}

impl HelpState {
    fn of(panel: HelpPanel, cookie: &HelpCookie) -> Self {
        Self {
            label: panel.toggle_label(),
            next: panel.toggled(),
            cookie: panel.cookie_action(cookie),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HelpData<'a> {
    cookie_name: &'a str,
    shown: HelpState,
    hidden: HelpState,
}

/// Strings the in-page detail formatter shares with [`crate::enrich`].
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EnrichData {
    pubmed_url: &'static str,
    uniprot_url: &'static str,
    direct_evidence: &'static str,
    inferred_evidence: &'static str,
    no_evidence: &'static str,
    placeholder: &'static str,
    first_detail_column: usize,
}

const ENRICH_DATA: EnrichData = EnrichData {
    pubmed_url: PUBMED_SEARCH_URL,
    uniprot_url: UNIPROTKB_URL,
    direct_evidence: DIRECT_EVIDENCE,
    inferred_evidence: INFERRED_EVIDENCE,
    no_evidence: NO_EVIDENCE,
    placeholder: EMPTY_PLACEHOLDER,
    first_detail_column: FIRST_DETAIL_COLUMN,
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PageData<'a> {
    active_tab: Option<&'a str>,
    page_length: i64,
    length_menu: [Vec<serde_json::Value>; 2],
    details_rows: bool,
    help: HelpData<'a>,
    not_applicable: &'static str,
    enrich: EnrichData,
    notice: &'static str,
    tabs: Vec<TabData<'a>>,
}

fn panel_id(report: &DatasetReport) -> String {
    format!("tab-{}", slugify(&report.dataset.id))
}

fn column_defs(columns: &[ColumnDescriptor], details_rows: bool) -> Vec<ColumnDef<'_>> {
    columns
        .iter()
        .map(|c| {
            let details = details_rows && c.targets == 0;
            ColumnDef {
                targets: c.targets,
                title: c.display_title(),
                description: &c.description,
                visible: c.visible,
                renderer: c
                    .renderer
                    .as_deref()
                    .and_then(crate::sort::Renderer::from_name)
                    .map(|r| r.js_function()),
                class_name: details.then_some("details-control"),
                orderable: details.then_some(false),
            }
        })
        .collect()
}

fn tab_data<'a>(report: &'a DatasetReport, details_rows: bool) -> TabData<'a> {
    let dataset = &report.dataset;
    let rows = match report.table.as_ref() {
        Some(LoadedTable::Rows(table)) => Some(table.rows.as_slice()),
        _ => None,
    };
    let children = match rows {
        Some(rows) if details_rows => Some(
            rows.iter()
                .map(|row| format_child(row, &dataset.columns))
                .collect(),
        ),
        _ => None,
    };
    TabData {
        id: &dataset.id,
        panel_id: panel_id(report),
        table_id: dataset.table_dom_id(),
        source: &dataset.source,
        columns: column_defs(&dataset.columns, details_rows),
        order: &dataset.order,
        rows,
        children,
        error: report.failure.as_ref().map(|f| TabError {
            location: &f.location,
            status: f.status,
        }),
    }
}

fn render_tab_button(report: &DatasetReport, active: bool) -> String {
    format!(
        r#"<button type="button" class="tab-button{}" data-tab="{}">{}</button>"#,
        if active { " active" } else { "" },
        escape_html(&report.dataset.id),
        escape_html(&report.dataset.label)
    )
}

fn render_panel(report: &DatasetReport, active: bool) -> String {
    let dataset = &report.dataset;
    let body = match report.table.as_ref() {
        Some(LoadedTable::Html(markup)) => markup.clone(),
        Some(LoadedTable::Rows(_)) => format!(
            r#"<table id="{}" class="{}" style="width:100%"></table>"#,
            escape_html(&dataset.table_dom_id()),
            crate::parser::TABLE_CLASSES
        ),
        None => format!(r#"<p class="load-error">{}</p>"#, escape_html(USER_NOTICE)),
    };
    let size = report
        .source_size
        .map(|bytes| format!(r#" <span class="muted">({})</span>"#, humansize(bytes)))
        .unwrap_or_default();
    format!(
        r#"<section class="tab-panel" id="{panel}" data-tab="{id}"{hidden}>
  {body}
  <p class="download"><a href="{source}">Download {label}</a>{size}</p>
</section>"#,
        panel = escape_html(&panel_id(report)),
        id = escape_html(&dataset.id),
        hidden = if active { "" } else { " hidden" },
        body = body,
        source = escape_html(&dataset.source),
        label = escape_html(&dataset.label),
        size = size,
    )
}

pub fn render_html(result: &BuildResult) -> Vec<u8> {
    let page = &result.page;
    let active = result.active_tab.as_deref();

    let data = PageData {
        active_tab: active,
        page_length: page.page_length,
        length_menu: [
            page.length_menu.iter().map(|n| serde_json::Value::from(*n)).collect(),
            page.length_menu
                .iter()
                .map(|n| match *n {
                    -1 => serde_json::Value::from(length_menu_label(*n)),
                    n => serde_json::Value::from(n),
                })
                .collect(),
        ],
        details_rows: page.details_rows,
        help: HelpData {
            cookie_name: &page.help_cookie.name,
            shown: HelpState::of(HelpPanel::Shown, &page.help_cookie),
            hidden: HelpState::of(HelpPanel::Hidden, &page.help_cookie),
        },
        not_applicable: NOT_APPLICABLE,
        enrich: ENRICH_DATA,
        notice: USER_NOTICE,
        tabs: result
            .datasets
            .iter()
            .map(|r| tab_data(r, page.details_rows))
            .collect(),
    };
    let json = serde_json::to_string(&data).unwrap_or_else(|_| "{}".to_string());
    let json = json_for_script_tag(&json);

    let buttons: Vec<String> = result
        .datasets
        .iter()
        .map(|r| render_tab_button(r, Some(r.dataset.id.as_str()) == active))
        .collect();
    let panels: Vec<String> = result
        .datasets
        .iter()
        .map(|r| render_panel(r, Some(r.dataset.id.as_str()) == active))
        .collect();
    let footer = match page.admin_url.as_deref() {
        Some(url) => format!(
            r#"<footer>Questions or problems? <a href="{}">Contact the administrator</a>.</footer>"#,
            escape_html(url)
        ),
        None => String::new(),
    };
    let tabs_nav = if result.datasets.len() > 1 {
        format!(r#"<nav id="tabs">{}</nav>"#, buttons.join(""))
    } else {
        String::new()
    };

    let html = format!(
        r####"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8"/>
  <meta content="width=device-width, initial-scale=1.0" name="viewport"/>
  <title>{title}</title>
  <link rel="stylesheet" href="{datatables_css}"/>
  <style>{style}</style>
</head>
<body>
  <header><h1>{title}</h1></header>
  {tabs_nav}
  <h2 id="search">Search <a id="search-btn" href="#search">&#128269;</a></h2>
  <p id="search-help-toggle-cont" style="display:none"><a href="#" id="search-help-toggle"></a></p>
  <div id="search-help" style="display:none">
    <p>Type in the search box to filter every column at once. Click a column header to sort by it; shift-click to add a secondary sort.</p>
  </div>
  <main id="table-viewer">
{panels}
  </main>
  {footer}
  <script type="application/json" id="page-data">{json}</script>
  <script src="{jquery}"></script>
  <script src="{datatables_js}"></script>
  <script src="{js_cookie}"></script>
  <script>{script}</script>
</body>
</html>
"####,
        title = escape_html(&page.title),
        datatables_css = DATATABLES_CSS,
        style = STYLE,
        tabs_nav = tabs_nav,
        panels = panels.join("\n"),
        footer = footer,
        json = json,
        jquery = JQUERY_JS,
        datatables_js = DATATABLES_JS,
        js_cookie = JS_COOKIE_JS,
        script = SCRIPT,
    );

    html.into_bytes()
}

const STYLE: &str = r#"
    body { font-family: sans-serif; margin: 0 2em 2em; }
    .muted { color: #888; font-style: italic; }
    .highlight { background: #ffa; }
    .load-error { color: #a00; font-weight: bold; }
    #tabs { display: flex; gap: .5em; margin-bottom: 1em; }
    .tab-button { border: 1px solid #ccc; background: #f4f4f4; padding: .4em 1em; cursor: pointer; }
    .tab-button.active { background: #fff; border-bottom-color: #fff; font-weight: bold; }
    table.verycompact td, table.verycompact th { padding: 2px 4px; }
    td.details-control { cursor: pointer; }
    td.details-control::before { content: "\25B6"; }
    tr.shown td.details-control::before { content: "\25BC"; }
    .childrow ul { margin: .25em 0; }
    .childrow-title { font-weight: bold; border-bottom: 1px dotted #888; cursor: help; }
    .download { font-size: smaller; }
"#;

const SCRIPT: &str = r#"
(function () {
  var page = JSON.parse(document.getElementById('page-data').textContent);

  var renderers = {
    naSortsLow: function (data, type) {
      if (type === 'display') return data;
      if (data === page.notApplicable) return Number.NEGATIVE_INFINITY;
      return parseFloat(data);
    },
    numericSort: function (data, type) {
      if (type === 'display') return data;
      return parseFloat(data);
    }
  };

  // affiliation footnotes
  var affil;
  $('#authors sup a')
    .click(function (e) { e.preventDefault(); })
    .mouseover(function () {
      affil = $($(this).attr('href'));
      affil.addClass('highlight');
    })
    .mouseout(function () {
      affil = $($(this).attr('href'));
      affil.removeClass('highlight');
    });

  // "Hide this help"
  var help = page.help;
  var toggleHelpContainer = $('#search-help-toggle-cont');
  var toggleHelpLink = $('#search-help-toggle');
  var searchHelp = $('#search-help');
  var helpState = Cookies.get(help.cookieName) ? 'hidden' : 'shown';

  toggleHelpLink.text(help[helpState].label);
  if (helpState === 'shown') searchHelp.show();
  toggleHelpContainer.show();

  toggleHelpLink.on('click', function (e) {
    e.preventDefault();
    helpState = help[helpState].next;
    var action = help[helpState].cookie;
    if (action.op === 'set') {
      Cookies.set(help.cookieName, action.value, { expires: action.days, path: '' });
    } else {
      Cookies.remove(help.cookieName, { path: '' });
    }
    toggleHelpLink.text(help[helpState].label);
    searchHelp.animate({ opacity: 'toggle', height: 'toggle' });
  });

  var enrich = page.enrich;

  function abbr(title, letter) {
    return '<abbr title="' + title + '">' + letter + '</abbr>';
  }

  function enrichValue(value) {
    value = value.replace(/,([A-Za-z0-9_])/g, ', $1');
    value = value.replace(/([0-9]{6,})(?:\.0)?/g, function (_, id) {
      return '<a href="' + enrich.pubmedUrl + id + '" target="_self">' + id + '</a>';
    });
    value = value.replace(/[A-Z][A-Z0-9_]{5,}/g, function (acc) {
      return '<a href="' + enrich.uniprotUrl + acc + '/entry">' + acc + '</a>';
    });
    if (value === 'N') return abbr(enrich.noEvidence, 'N');
    value = value.replace(/\bD\(/g, function () { return abbr(enrich.directEvidence, 'D') + '('; });
    return value.replace(/\bI\(/g, function () { return abbr(enrich.inferredEvidence, 'I') + '('; });
  }

  function formatChild(tab, row) {
    if (tab.children) return tab.children[row.index()];
    var data = row.data();
    var div = '<div class="childrow"><ul>';
    tab.columns.forEach(function (cdef) {
      if (cdef.visible !== false) return;
      if (cdef.targets < enrich.firstDetailColumn) return;
      var raw = data[cdef.targets];
      var value = raw ? enrichValue(raw) : enrich.placeholder;
      div += '<li><span class="childrow-title" title="' + cdef.description + '">' +
             cdef.title + '</span>: ' + value + '</li>';
    });
    return div + '</ul></div>';
  }

  var tables = {};

  function initTable(tab) {
    if (tab.error) {
      console.error("Error loading '" + tab.error.location + "'; HTTP status " + tab.error.status);
      alert(page.notice);
      return null;
    }
    var columnDefs = tab.columns.map(function (c) {
      var def = { targets: c.targets, title: c.title, visible: c.visible };
      if (c.renderer) def.render = renderers[c.renderer];
      if (c.className) { def.className = c.className; def.defaultContent = ''; }
      if (c.orderable === false) def.orderable = false;
      return def;
    });
    var selector = '#' + tab.tableId;
    var options = {
      order: tab.order,
      fixedHeader: true,
      lengthMenu: page.lengthMenu,
      pageLength: page.pageLength,
      columnDefs: columnDefs
    };
    if (tab.rows) options.data = tab.rows;

    $(selector + ' thead th').each(function (i) {
      if (tab.columns[i]) $(this).attr('title', tab.columns[i].description);
    });

    var dt = $(selector).DataTable(options);

    if (tab.rows) {
      $(selector + ' thead th').each(function (i) {
        var idx = dt.column.index('fromVisible', i);
        if (tab.columns[idx]) $(this).attr('title', tab.columns[idx].description);
      });
    }

    if (page.detailsRows) {
      $(selector + ' tbody').on('click', 'td.details-control', function () {
        var tr = $(this).closest('tr');
        var row = dt.row(tr);
        if (row.child.isShown()) {
          row.child.hide();
          tr.removeClass('shown');
        } else {
          row.child(formatChild(tab, row)).show();
          tr.addClass('shown');
        }
      });
    }

    // "All" needs no pagination
    var pageLengthSelect = $('select[name="' + tab.tableId + '_length"]');
    var paginateControls = $('#' + tab.tableId + '_paginate');
    if (pageLengthSelect.val() === '-1') paginateControls.hide();
    pageLengthSelect.change(function () {
      if ($(this).val() === '-1') {
        paginateControls.hide();
      } else {
        paginateControls.show();
      }
    });
    return dt;
  }

  var active = null;

  function showTab(id) {
    var tab = page.tabs.find(function (t) { return t.id === id; });
    if (!tab) return;
    active = tab;
    $('.tab-panel').attr('hidden', true);
    $('#' + tab.panelId).removeAttr('hidden');
    $('.tab-button').removeClass('active');
    $('.tab-button[data-tab="' + id + '"]').addClass('active');
    if (!(id in tables)) {
      tables[id] = initTable(tab);
    } else if (tables[id]) {
      tables[id].columns.adjust();
    }
  }

  $('.tab-button').click(function () {
    showTab($(this).attr('data-tab'));
  });

  $('#search-btn').click(function (e) {
    e.preventDefault();
    $('#search')[0].scrollIntoView();
    if (active) $('#' + active.tableId + '_wrapper input[type="search"]').focus();
  });

  var first = page.activeTab || (page.tabs[0] && page.tabs[0].id);
  if (first) showTab(first);
})();
"#;
