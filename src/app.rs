use std::io::Write;
use std::time::Duration;

use clap::{error::ErrorKind, CommandFactory, Parser};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing_subscriber::EnvFilter;

use crate::cli::args::CliArgs;
use crate::cli::validation;
use crate::config::{self, ConfigFile};
use crate::dataset::Dataset;
use crate::fetch::USER_NOTICE;
use crate::output::{self, OutputFormat, PageSettings};
use crate::runner::{Options, Runner};
use crate::state::preference::{DEFAULT_HELP_COOKIE, DEFAULT_RETENTION_DAYS};
use crate::state::HelpCookie;
use crate::utils::{format_bool, humansize, length_menu_label};

const DEFAULT_LENGTH_MENU: [i64; 4] = [10, 25, 100, -1];
const DEFAULT_PAGE_LENGTH: i64 = 100;

// Status output goes to stderr; stdout may be carrying the page itself.
fn print_banner(no_color: bool) {
    const BANNER: &str = r#"
                 __    __        __    __
    ____  __  __/ /_  / /_____ _/ /_  / /__  _____
   / __ \/ / / / __ \/ __/ __ `/ __ \/ / _ \/ ___/
  / /_/ / /_/ / /_/ / /_/ /_/ / /_/ / /  __(__  )
 / .___/\__,_/_.___/\__/\__,_/_.___/_/\___/____/
/_/
"#;
    eprint!("{}", BANNER);
    let tagline = format!(
        "       v{} - data-backed HTML table pages",
        env!("CARGO_PKG_VERSION")
    );
    if no_color {
        eprintln!("{}", tagline);
    } else {
        eprintln!("{}", tagline.bold());
    }
    eprintln!();
}

fn format_kv_line(label: &str, value: &str) {
    eprintln!(":: {:<10}: {}", label, value);
}

/// `-o, --output, --out <PATH>` plus the default value when clap knows one.
fn flag_signature(arg: &clap::Arg) -> String {
    let mut names: Vec<String> = arg.get_short().map(|c| format!("-{c}")).into_iter().collect();
    let longs = arg
        .get_long()
        .into_iter()
        .chain(arg.get_visible_aliases().unwrap_or_default());
    for long in longs {
        let long = format!("--{long}");
        if !names.contains(&long) {
            names.push(long);
        }
    }
    let mut line = names.join(", ");
    if arg.get_action().takes_values() {
        let value = arg
            .get_value_names()
            .and_then(|v| v.first())
            .map_or("VALUE", |v| v.as_str());
        let optional = arg.get_num_args().is_some_and(|r| r.min_values() == 0);
        line.push_str(&if optional {
            format!(" [<{value}>]")
        } else {
            format!(" <{value}>")
        });
    }
    let defaults: Vec<String> = arg
        .get_default_values()
        .iter()
        .map(|v| v.to_string_lossy().into_owned())
        .collect();
    if !defaults.is_empty() && arg.get_action().takes_values() {
        line.push_str(&format!(" [default: {}]", defaults.join(",")));
    }
    line
}

/// Help grouped by heading, in the order headings first appear.
fn render_custom_help() -> String {
    let cmd = CliArgs::command();
    let mut sections: Vec<(&str, Vec<&clap::Arg>)> = Vec::new();
    for arg in cmd.get_arguments().filter(|a| !a.is_hide_set()) {
        let heading = arg.get_help_heading().unwrap_or("Options");
        match sections.iter_mut().find(|(h, _)| *h == heading) {
            Some((_, args)) => args.push(arg),
            None => sections.push((heading, vec![arg])),
        }
    }

    let mut out = match cmd.get_version() {
        Some(version) => format!("{} {version}\n", cmd.get_name()),
        None => format!("{}\n", cmd.get_name()),
    };
    for text in [cmd.get_about(), cmd.get_long_about()].into_iter().flatten() {
        out.push_str(&format!("{text}\n"));
    }
    out.push_str(&format!("\nUsage: {} [OPTIONS]\n", cmd.get_name()));

    for (heading, args) in sections {
        out.push_str(&format!("\n{heading}:\n"));
        for arg in args {
            out.push_str(&format!("  {}\n", flag_signature(arg)));
            let help = arg.get_help().map(|h| h.to_string()).unwrap_or_default();
            if !help.trim().is_empty() {
                out.push_str(&format!("          {}\n", help.trim()));
            }
        }
    }
    out
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // A second init (tests, embedding) is not an error worth reporting.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

struct RunConfig {
    no_color: bool,
    config_path: Option<String>,
    output: Option<String>,
    output_format: OutputFormat,
    options: Options,
}

fn build_run_config(args: CliArgs, cfg: ConfigFile) -> Result<RunConfig, String> {
    validation::validate(&args)?;

    let no_color = if args.color {
        false
    } else {
        args.no_color || cfg.no_color.unwrap_or(false)
    };

    let datasets: Vec<Dataset> = cfg
        .datasets
        .unwrap_or_default()
        .into_iter()
        .map(|entry| entry.into_dataset())
        .collect::<Result<_, _>>()?;

    let length_menu = match args.length_menu.or(cfg.length_menu) {
        Some(raw) => crate::utils::parse_length_menu_csv(&raw)
            .map_err(|e| format!("invalid length menu '{raw}': {e}"))?,
        None => DEFAULT_LENGTH_MENU.to_vec(),
    };
    let page_length = args.page_length.or(cfg.page_length).unwrap_or_else(|| {
        if length_menu.contains(&DEFAULT_PAGE_LENGTH) {
            DEFAULT_PAGE_LENGTH
        } else {
            length_menu.first().copied().unwrap_or(DEFAULT_PAGE_LENGTH)
        }
    });

    let help_cookie = HelpCookie::new(
        cfg.help_cookie_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(DEFAULT_HELP_COOKIE),
        args.help_cookie_days
            .or(cfg.help_cookie_days)
            .unwrap_or(DEFAULT_RETENTION_DAYS),
    );

    let page = PageSettings {
        title: args
            .title
            .or(cfg.title)
            .unwrap_or_else(|| PageSettings::default().title),
        page_length,
        length_menu,
        details_rows: args.details_rows.or(cfg.details_rows).unwrap_or(false),
        admin_url: args.admin_url.or(cfg.admin_url),
        help_cookie,
        default_tab: args.default_tab.or(cfg.default_tab),
    };

    let output = args.output.or(cfg.output).map(|p| config::expand_tilde_string(&p));
    let output_format = match args.output_format.or(cfg.output_format) {
        Some(raw) => OutputFormat::parse(&raw)
            .ok_or_else(|| format!("invalid output format '{raw}', expected html or json"))?,
        None => output
            .as_deref()
            .and_then(output::infer_format_from_path)
            .unwrap_or(OutputFormat::Html),
    };

    let options = Options {
        datasets,
        base_url: args.base_url.or(cfg.base_url).filter(|u| !u.trim().is_empty()),
        data_dir: args
            .data_dir
            .or(cfg.data_dir)
            .map(|d| config::expand_tilde_string(&d))
            .unwrap_or_else(|| ".".to_string()),
        timeout_seconds: args.timeout.or(cfg.timeout).unwrap_or(10),
        proxy: args.proxy.or(cfg.proxy).filter(|p| !p.trim().is_empty()),
        page,
    };

    Ok(RunConfig {
        no_color,
        config_path: args.config,
        output,
        output_format,
        options,
    })
}

fn length_menu_summary(menu: &[i64]) -> String {
    menu.iter()
        .map(|n| length_menu_label(*n))
        .collect::<Vec<_>>()
        .join(",")
}

async fn run_async(run: RunConfig) -> Result<(), String> {
    if run.no_color {
        colored::control::set_override(false);
    }
    print_banner(run.no_color);

    let runner = Runner::new(run.options).map_err(|e| e.to_string())?;
    let options = runner.options();

    format_kv_line(
        "Config",
        run.config_path.as_deref().unwrap_or("(default)"),
    );
    format_kv_line(
        "Datasets",
        &options
            .datasets
            .iter()
            .map(|d| format!("{} ({})", d.id, d.format.label()))
            .collect::<Vec<_>>()
            .join(", "),
    );
    format_kv_line(
        "Source",
        &match options.base_url.as_deref() {
            Some(url) => format!("base-url={url}"),
            None => format!("data-dir={}", options.data_dir),
        },
    );
    format_kv_line(
        "Page",
        &format!(
            "title=\"{}\" length={} menu={} details={} cookie={}d",
            options.page.title,
            length_menu_label(options.page.page_length),
            length_menu_summary(&options.page.length_menu),
            format_bool(options.page.details_rows),
            options.page.help_cookie.retention_days,
        ),
    );
    format_kv_line(
        "Output",
        &format!(
            "{} ({})",
            run.output.as_deref().unwrap_or("stdout"),
            run.output_format.label()
        ),
    );
    eprintln!();

    let pb = ProgressBar::new(options.datasets.len() as u64);
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_style(
        ProgressStyle::with_template(":: Loading : {spinner} [{pos}/{len}] :: {msg}")
            .map_err(|e| format!("failed to build progress bar style: {e}"))?,
    );

    let result = runner
        .run_with_progress(|id, ok| {
            pb.inc(1);
            if ok {
                pb.set_message(id.to_string());
            } else {
                pb.set_message(format!("{id} failed"));
            }
        })
        .await
        .map_err(|e| e.to_string())?;
    pb.finish_and_clear();

    for report in result.datasets.iter() {
        let id = &report.dataset.id;
        match (report.failure.as_ref(), report.table.as_ref()) {
            (Some(failure), _) => {
                let status = failure
                    .status
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "none".to_string());
                format_kv_line(
                    id,
                    &format!(
                        "{} {} (status {})",
                        "FAILED".red().bold(),
                        failure.location,
                        status
                    ),
                );
            }
            (None, Some(table)) => {
                let size = report.source_size.map(humansize).unwrap_or_default();
                let detail = match table.row_count() {
                    Some(rows) => format!("{rows} rows"),
                    None => "html table".to_string(),
                };
                format_kv_line(id, &format!("{} {} {}", "ok".green(), detail, size));
            }
            (None, None) => format_kv_line(id, "not loaded"),
        }
    }

    let rendered = output::render(&result, run.output_format);
    match run.output.as_ref() {
        Some(path) => {
            let mut outfile = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(path)
                .await
                .map_err(|e| format!("failed to open output file: {e}"))?;
            outfile
                .write_all(&rendered)
                .await
                .map_err(|e| format!("failed to write output file: {e}"))?;
        }
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(&rendered)
                .and_then(|_| handle.flush())
                .map_err(|e| format!("failed to write page to stdout: {e}"))?;
        }
    }

    eprintln!();
    eprintln!(
        ":: Completed :: {}/{} datasets loaded in {}ms ::",
        result.loaded_count(),
        result.datasets.len(),
        result.elapsed.as_millis()
    );

    if result.has_failures() {
        eprintln!("{} {}", "[!]".red().bold(), USER_NOTICE);
        let failed: Vec<&str> = result.failures().map(|(d, _)| d.id.as_str()).collect();
        return Err(format!(
            "{} dataset(s) failed to load: {}",
            failed.len(),
            failed.join(", ")
        ));
    }
    Ok(())
}

fn init_config(path: Option<&str>) -> Result<(), String> {
    let path = match path {
        Some(p) => config::expand_tilde(p),
        None => config::default_config_path()
            .ok_or_else(|| "cannot determine home directory for the default config".to_string())?,
    };
    if config::write_default_config(&path)? {
        eprintln!(":: Wrote default config: {}", path.display());
    } else {
        eprintln!(":: Config exists, left untouched: {}", path.display());
    }
    Ok(())
}

pub fn run_cli() -> Result<(), String> {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp => {
                print!("{}", render_custom_help());
                return Ok(());
            }
            ErrorKind::DisplayVersion => {
                let cmd = CliArgs::command();
                print!("{}", cmd.render_version());
                return Ok(());
            }
            _ => return Err(e.to_string()),
        },
    };

    init_tracing(args.verbose);

    if args.init_config {
        return init_config(args.config.as_deref());
    }

    let cfg = match args.config.as_deref() {
        Some(path) => config::load_config(&config::expand_tilde(path), false)?,
        None => match config::default_config_path() {
            Some(path) => config::load_config(&path, true)?,
            None => ConfigFile::default(),
        },
    };

    let run = build_run_config(args, cfg)?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to build runtime: {e}"))?;

    rt.block_on(run_async(run))?;
    Ok(())
}

#[cfg(test)]
mod cli_tests {
    use super::*;

    use crate::config::parse_config;

    fn config_with_dataset() -> ConfigFile {
        parse_config(
            r#"
title: Phenome-wide results
length_menu: "10,25,100,-1"
datasets:
  - id: icd
    source: icd.tsv
    columns:
      - { targets: 0, title: "" }
      - { targets: 1, title: Row, visible: false }
"#,
        )
        .unwrap()
    }

    #[test]
    fn details_rows_defaults_to_false() {
        let args = CliArgs::parse_from(["pubtables"]);
        let run = build_run_config(args, config_with_dataset()).unwrap();
        assert!(!run.options.page.details_rows);
        assert_eq!(run.options.page.page_length, 100);
        assert_eq!(run.options.datasets.len(), 1);
        assert_eq!(run.options.page.title, "Phenome-wide results");
    }

    #[test]
    fn details_rows_can_be_set_true() {
        let args = CliArgs::parse_from(["pubtables", "--details-rows"]);
        let run = build_run_config(args, config_with_dataset()).unwrap();
        assert!(run.options.page.details_rows);
    }

    #[test]
    fn cli_overrides_config() {
        let args = CliArgs::parse_from([
            "pubtables",
            "--title",
            "Other",
            "--page-length",
            "-1",
            "--length-menu",
            "10,-1",
            "--help-cookie-days",
            "400",
        ]);
        let run = build_run_config(args, config_with_dataset()).unwrap();
        assert_eq!(run.options.page.title, "Other");
        assert_eq!(run.options.page.page_length, -1);
        assert_eq!(run.options.page.length_menu, vec![10, -1]);
        assert_eq!(run.options.page.help_cookie.retention_days, 400);
        assert_eq!(run.options.page.help_cookie.name, "search-help-hidden");
    }

    #[test]
    fn page_length_falls_back_to_first_menu_entry() {
        let args = CliArgs::parse_from(["pubtables", "--length-menu", "5,50"]);
        let run = build_run_config(args, config_with_dataset()).unwrap();
        assert_eq!(run.options.page.page_length, 5);
    }

    #[test]
    fn output_format_is_inferred_from_path() {
        let args = CliArgs::parse_from(["pubtables", "-o", "dump.json"]);
        let run = build_run_config(args, config_with_dataset()).unwrap();
        assert_eq!(run.output_format, OutputFormat::Json);

        let args = CliArgs::parse_from(["pubtables"]);
        let run = build_run_config(args, config_with_dataset()).unwrap();
        assert_eq!(run.output_format, OutputFormat::Html);
    }

    #[test]
    fn out_of_range_cookie_days_are_rejected() {
        let args = CliArgs::parse_from(["pubtables", "--help-cookie-days", "401"]);
        assert!(build_run_config(args, config_with_dataset()).is_err());
    }

    #[test]
    fn color_flag_wins_over_no_color() {
        let args = CliArgs::parse_from(["pubtables", "--no-color", "--color"]);
        let run = build_run_config(args, config_with_dataset()).unwrap();
        assert!(!run.no_color);
    }

    #[test]
    fn help_lists_sections() {
        let help = render_custom_help();
        assert!(help.starts_with("pubtables"));
        assert!(help.contains("Page:\n"));
        assert!(help.contains("--details-rows"));
        assert!(help.contains("  -v, --vb, --verbose\n"));
        assert!(help.find("Output:\n").unwrap() < help.find("Input:\n").unwrap());
    }
}
