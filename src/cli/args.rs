use clap::{ArgAction, Parser};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "pubtables",
    version,
    about = "static, data-backed HTML table pages",
    long_about = "pubtables fetches tabular datasets (HTML table fragments or TSV files) and renders them into one self-contained page with sortable, searchable, paginated tables, tabs and expandable detail rows.\n\nExamples:\n  pubtables --config ./site.yml -o public/index.html\n  pubtables --config ./site.yml --base-url https://example.org/results/ --details-rows\n  pubtables --init-config\n\nTip: datasets and their columns live in the config file; CLI flags override the page settings."
)]
pub struct CliArgs {
    #[arg(
        short = 'v',
        long = "vb",
        visible_alias = "verbose",
        action = ArgAction::Count,
        help_heading = "Output",
        help = "Increase verbosity (-v, -vv)."
    )]
    pub verbose: u8,

    #[arg(
        short = 'c',
        long = "clr",
        visible_alias = "color",
        help_heading = "Output",
        help = "Enable colored output (overrides --no-color)."
    )]
    pub color: bool,

    #[arg(
        short = 'n',
        long = "nc",
        visible_alias = "no-color",
        help_heading = "Output",
        help = "Disable colored output."
    )]
    pub no_color: bool,

    #[arg(
        short = 'C',
        long = "cfg",
        visible_alias = "config",
        value_name = "FILE",
        help_heading = "Input",
        help = "Path to config file (defaults to ~/.pubtables/config.yml)."
    )]
    pub config: Option<String>,

    #[arg(
        long = "ic",
        visible_alias = "init-config",
        help_heading = "Input",
        help = "Write a commented default config file (to --config or the default location) and exit."
    )]
    pub init_config: bool,

    #[arg(
        short = 'b',
        long = "bu",
        visible_alias = "base-url",
        value_name = "URL",
        help_heading = "Input",
        help = "Base URL that relative dataset sources are fetched from."
    )]
    pub base_url: Option<String>,

    #[arg(
        short = 'D',
        long = "dd",
        visible_alias = "data-dir",
        value_name = "DIR",
        help_heading = "Input",
        help = "Directory that relative dataset sources are read from when no base URL is set."
    )]
    pub data_dir: Option<String>,

    #[arg(
        short = 'T',
        long = "to",
        visible_alias = "timeout",
        value_name = "SECONDS",
        help_heading = "HTTP",
        help = "Per-request timeout in seconds."
    )]
    pub timeout: Option<usize>,

    #[arg(
        short = 'p',
        long = "px",
        visible_alias = "proxy",
        value_name = "URL",
        help_heading = "HTTP",
        help = "HTTP proxy URL (e.g. http://127.0.0.1:8080)."
    )]
    pub proxy: Option<String>,

    #[arg(
        short = 't',
        long = "ttl",
        visible_alias = "title",
        value_name = "TEXT",
        help_heading = "Page",
        help = "Page title."
    )]
    pub title: Option<String>,

    #[arg(
        short = 'l',
        long = "pl",
        visible_alias = "page-length",
        value_name = "N",
        allow_hyphen_values = true,
        help_heading = "Page",
        help = "Initial rows per page (-1 = All)."
    )]
    pub page_length: Option<i64>,

    #[arg(
        short = 'L',
        long = "lm",
        visible_alias = "length-menu",
        value_name = "LIST",
        allow_hyphen_values = true,
        help_heading = "Page",
        help = "Page-length choices, comma-separated (e.g. 10,25,100,-1)."
    )]
    pub length_menu: Option<String>,

    #[arg(
        short = 'd',
        long = "dr",
        visible_alias = "details-rows",
        num_args = 0..=1,
        default_missing_value = "true",
        help_heading = "Page",
        help = "Add an expandable details row listing every hidden column."
    )]
    pub details_rows: Option<bool>,

    #[arg(
        long = "dt",
        visible_alias = "default-tab",
        value_name = "ID",
        help_heading = "Page",
        help = "Dataset shown first (defaults to the first configured dataset)."
    )]
    pub default_tab: Option<String>,

    #[arg(
        short = 'a',
        long = "au",
        visible_alias = "admin-url",
        value_name = "URL",
        help_heading = "Page",
        help = "Administrator contact link shown in the page footer."
    )]
    pub admin_url: Option<String>,

    #[arg(
        long = "hcd",
        visible_alias = "help-cookie-days",
        value_name = "DAYS",
        help_heading = "Page",
        help = "How long a hidden search help stays hidden (1-400 days)."
    )]
    pub help_cookie_days: Option<u32>,

    #[arg(
        short = 'o',
        long = "out",
        visible_alias = "output",
        value_name = "FILE",
        help_heading = "Output",
        help = "Write the page to a file (stdout when omitted)."
    )]
    pub output: Option<String>,

    #[arg(
        short = 'A',
        long = "of",
        visible_alias = "output-format",
        value_name = "FORMAT",
        help_heading = "Output",
        help = "Output format (html, json)."
    )]
    pub output_format: Option<String>,
}
