//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use nbdocs_core::{
    BuildPlan, JupyterExecutor, ProgressReporter, build_site, cleanup_report, convert_notebooks,
    read_ledger, remove_ledger, write_ledger,
};
use nbdocs_discovery::{Layout, resolve_dir};
use nbdocs_shared::{AppConfig, CONFIG_FILE_NAME, ConversionReport, init_config, load_config};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// nbdocs: publish Jupyter notebooks as documentation pages.
#[derive(Parser)]
#[command(
    name = "nbdocs",
    version,
    about = "Convert Jupyter notebooks into Markdown pages for a static documentation site.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ./nbdocs.toml).
    #[arg(long, global = true, env = "NBDOCS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Convert notebooks into Markdown under the docs dir.
    Convert {
        /// Ledger file (defaults to .nbdocs-ledger.json beside the config).
        #[arg(long)]
        ledger: Option<PathBuf>,

        /// Execute notebooks before converting, regardless of the config.
        #[arg(long)]
        execute: bool,
    },

    /// Remove the files recorded by a previous `convert`.
    Clean {
        /// Ledger file (defaults to .nbdocs-ledger.json beside the config).
        #[arg(long)]
        ledger: Option<PathBuf>,
    },

    /// Convert, run the site builder, post-process the site, and clean up.
    Build {
        /// Ledger file (defaults to .nbdocs-ledger.json beside the config).
        #[arg(long)]
        ledger: Option<PathBuf>,

        /// Execute notebooks before converting, regardless of the config.
        #[arg(long)]
        execute: bool,
    },

    /// Strip plotly bootstrap scripts from HTML files or directories.
    StripHtml {
        /// HTML files, or directories searched for `*.html`.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Strip plotly scripts from a search index.
    StripSearchIndex {
        /// Index file (defaults to the configured index in the site dir).
        path: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "nbdocs=info",
        1 => "nbdocs=debug",
        _ => "nbdocs=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Convert { ledger, execute } => {
            cmd_convert(config_path, ledger.as_deref(), execute).await
        }
        Command::Clean { ledger } => cmd_clean(config_path, ledger.as_deref()),
        Command::Build { ledger, execute } => {
            cmd_build(config_path, ledger.as_deref(), execute).await
        }
        Command::StripHtml { files } => cmd_strip_html(&files),
        Command::StripSearchIndex { path } => cmd_strip_search_index(config_path, path.as_deref()),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(config_path),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn load(config_path: Option<&Path>, execute: bool) -> Result<AppConfig> {
    let mut config = load_config(config_path)?;
    if execute {
        config.execute.enabled = true;
    }
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_convert(config_path: Option<&Path>, ledger: Option<&Path>, execute: bool) -> Result<()> {
    let config = load(config_path, execute)?;
    let layout = Layout::resolve(&config)?;
    let ledger_path = ledger.map(Path::to_path_buf).unwrap_or_else(|| config.ledger_path());
    let exec_opts = config.execute_options();

    info!(
        input = %layout.input_dir.display(),
        output = %layout.output_dir.display(),
        execute = exec_opts.is_some(),
        "converting notebooks"
    );

    let reporter = CliProgress::new();
    let report =
        convert_notebooks(&layout, &JupyterExecutor, exec_opts.as_ref(), &reporter).await?;
    write_ledger(&ledger_path, &report)?;

    print_report(&report);
    println!("  Ledger:    {}", ledger_path.display());
    println!();

    Ok(())
}

fn cmd_clean(config_path: Option<&Path>, ledger: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let ledger_path = ledger.map(Path::to_path_buf).unwrap_or_else(|| config.ledger_path());

    if !ledger_path.exists() {
        return Err(eyre!(
            "no ledger at {}: nothing to clean (run `nbdocs convert` first)",
            ledger_path.display()
        ));
    }

    let report = read_ledger(&ledger_path)?;
    let summary = cleanup_report(&report)?;
    remove_ledger(&ledger_path)?;

    println!();
    println!("  Generated files removed.");
    println!("  Removed:   {}", summary.files_removed);
    println!("  Missing:   {}", summary.files_missing);
    println!("  Dirs:      {}", summary.dirs_removed.len());
    println!();

    Ok(())
}

async fn cmd_build(config_path: Option<&Path>, ledger: Option<&Path>, execute: bool) -> Result<()> {
    let config = load(config_path, execute)?;
    let layout = Layout::resolve(&config)?;
    let ledger_path = ledger.map(Path::to_path_buf).unwrap_or_else(|| config.ledger_path());
    let exec_opts = config.execute_options();

    let plan = BuildPlan {
        layout: &layout,
        build: &config.build,
        ledger_path: &ledger_path,
        execute: exec_opts.as_ref(),
    };

    let reporter = CliProgress::new();
    let outcome = build_site(plan, &JupyterExecutor, &reporter).await?;

    print_report(&outcome.report);
    println!("  Built:     {}", if outcome.built { "yes" } else { "skipped" });
    println!("  HTML:      {} page(s) stripped", outcome.html_rewritten);
    match outcome.search_records_stripped {
        Some(n) => println!("  Search:    {n} record(s) stripped"),
        None => println!("  Search:    no index"),
    }
    println!("  Removed:   {} generated file(s)", outcome.cleanup.files_removed);
    println!();

    Ok(())
}

fn cmd_strip_html(files: &[PathBuf]) -> Result<()> {
    let mut rewritten = 0;
    for path in files {
        if path.is_dir() {
            rewritten += nbdocs_postprocess::strip_site_html(path)?;
        } else if nbdocs_postprocess::strip_html_file(path)? {
            rewritten += 1;
        }
    }

    println!("Stripped {rewritten} HTML file(s)");
    Ok(())
}

fn cmd_strip_search_index(config_path: Option<&Path>, path: Option<&Path>) -> Result<()> {
    let index_path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let config = load_config(config_path)?;
            let site_dir = resolve_dir(&config.config_dir(), &config.site.site_dir)?;
            site_dir.join(&config.build.search_index)
        }
    };

    let changed = nbdocs_postprocess::strip_search_index_file(&index_path)?;
    println!("Stripped {changed} record(s) in {}", index_path.display());
    Ok(())
}

fn cmd_config_init(config_path: Option<&Path>) -> Result<()> {
    let path = init_config(config_path.unwrap_or(Path::new(CONFIG_FILE_NAME)))?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config: AppConfig = load_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

fn print_report(report: &ConversionReport) {
    println!();
    println!("  Notebooks converted!");
    println!("  Run:       {}", report.run_id);
    println!("  Pages:     {}", report.files.len());
    println!("  Resources: {}", report.resources.len());
    if !report.execution_errors.is_empty() {
        println!("  Errors:    {}", report.execution_errors.len());
        for err in &report.execution_errors {
            println!(
                "    {} cell {}: {}: {}",
                err.notebook.display(),
                err.cell_index,
                err.ename,
                err.evalue
            );
        }
    }
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn notebook_converted(&self, src_uri: &str, current: usize) {
        self.spinner
            .set_message(format!("Converted [{current}] {src_uri}"));
    }

    fn done(&self, _report: &ConversionReport) {
        self.spinner.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "nbdocs",
            "convert",
            "--execute",
            "--config",
            "site/nbdocs.toml",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("site/nbdocs.toml")));
        assert!(matches!(
            cli.command,
            Command::Convert {
                execute: true,
                ledger: None
            }
        ));
    }

    #[test]
    fn strip_html_requires_files() {
        assert!(Cli::try_parse_from(["nbdocs", "strip-html"]).is_err());
    }
}
