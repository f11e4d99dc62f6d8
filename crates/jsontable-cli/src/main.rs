use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use jsontable_client::ReqwestFetcher;
use jsontable_core::config::DEFAULT_NO_DATA_TEXT;
use jsontable_core::models::{DEFAULT_MAX_REDIRECTS, DEFAULT_TIMEOUT_MS, FetchRequest};
use jsontable_core::present::{Table, render_panel, table_for_document};
use jsontable_core::resolve::{ArrayPath, resolve_items_from_config};
use jsontable_core::traits::Fetcher;
use jsontable_core::{
    AppError, PanelConfig, PanelPoller, PanelState, PollerEvent, PollerReporter,
    TracingPollerReporter,
};

#[derive(Parser)]
#[command(
    name = "jsontable",
    version,
    about = "Fetch JSON endpoints and show their records as tables"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a JSON document once and print its records
    Fetch {
        /// URL of the JSON document
        #[arg(short, long, env = "JSONTABLE_URL")]
        url: String,

        /// Path to the record array (e.g. "data.items[0].rows"); repeat for fallbacks
        #[arg(short, long)]
        array_name: Vec<String>,

        /// Extra request header as "Name: value"; may be repeated
        #[arg(short = 'H', long = "header", value_parser = parse_header)]
        headers: Vec<(String, String)>,

        /// Per-hop timeout in milliseconds
        #[arg(long, default_value_t = DEFAULT_TIMEOUT_MS)]
        timeout_ms: u64,

        /// Redirects to follow before giving up
        #[arg(long, default_value_t = DEFAULT_MAX_REDIRECTS)]
        max_redirects: u32,

        /// Skip TLS certificate verification (self-signed endpoints only)
        #[arg(long, default_value_t = false)]
        tls_insecure: bool,

        /// Print the whole document instead of the resolved records
        #[arg(long, default_value_t = false)]
        raw: bool,
    },

    /// Fetch once and print the rendered table
    Render {
        #[command(flatten)]
        panel: PanelArgs,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Html)]
        format: OutputFormat,
    },

    /// Poll the panel URL and print the table each time the data changes
    Watch {
        #[command(flatten)]
        panel: PanelArgs,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Html)]
        format: OutputFormat,
    },
}

#[derive(Args)]
struct PanelArgs {
    /// Panel config file (JSON, same keys as the server)
    #[arg(short, long, env = "JSONTABLE_CONFIG")]
    config: Option<PathBuf>,

    /// URL override, applied after the config file and environment
    #[arg(short, long)]
    url: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Html,
    Csv,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("jsontable=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Fetch {
            url,
            array_name,
            headers,
            timeout_ms,
            max_redirects,
            tls_insecure,
            raw,
        } => {
            let request = FetchRequest::new(url)
                .with_timeout(Duration::from_millis(timeout_ms))
                .with_headers(headers.into_iter().collect::<BTreeMap<_, _>>())
                .with_tls_insecure(tls_insecure)
                .with_max_redirects(max_redirects);
            let array_name = (!array_name.is_empty()).then(|| ArrayPath::from(array_name));
            cmd_fetch(&request, array_name.as_ref(), raw).await?;
        }
        Commands::Render { panel, format } => {
            let config = load_panel(&panel)?;
            cmd_render(&config, format).await?;
        }
        Commands::Watch { panel, format } => {
            let config = load_panel(&panel)?;
            cmd_watch(config, format).await?;
        }
    }

    Ok(())
}

/// Parse a `Name: value` header argument.
fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected \"Name: value\", got \"{raw}\""))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty header name in \"{raw}\""));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

/// Config file (or defaults), then environment, then the `--url` flag.
fn load_panel(args: &PanelArgs) -> Result<PanelConfig> {
    let config = match &args.config {
        Some(path) => PanelConfig::from_file(path)?,
        None => PanelConfig::default(),
    };
    let mut config = config.apply_env()?;
    if let Some(url) = &args.url {
        config.url = url.clone();
    }
    config.validate()?;
    Ok(config)
}

async fn cmd_fetch(request: &FetchRequest, array_name: Option<&ArrayPath>, raw: bool) -> Result<()> {
    let fetcher = ReqwestFetcher::new().context("Failed to create HTTP client")?;

    tracing::info!("Fetching {}", request.url);
    let document = fetcher.fetch(request).await?;
    tracing::info!(
        final_url = %document.final_url,
        redirects = document.redirects.len(),
        "Fetched"
    );

    if raw {
        println!("{}", serde_json::to_string_pretty(&document.data)?);
        return Ok(());
    }

    let items = resolve_items_from_config(&document.data, array_name)
        .ok_or_else(|| AppError::NoData(DEFAULT_NO_DATA_TEXT.to_string()))?;
    println!("{}", serde_json::to_string_pretty(items)?);

    Ok(())
}

async fn cmd_render(config: &PanelConfig, format: OutputFormat) -> Result<()> {
    let fetcher = ReqwestFetcher::new().context("Failed to create HTTP client")?;

    tracing::info!("Fetching {}", config.url);
    let document = fetcher.fetch(&config.fetch_request()?).await?;

    let mut stdout = std::io::stdout().lock();
    print_table(&mut stdout, Some(&document.data), config, format)
}

async fn cmd_watch(config: PanelConfig, format: OutputFormat) -> Result<()> {
    let fetcher = ReqwestFetcher::new().context("Failed to create HTTP client")?;
    let state = PanelState::new();
    let reporter = PrintingReporter {
        state: state.clone(),
        config: config.clone(),
        format,
    };
    let poller = PanelPoller::new(fetcher, config, state);

    let cancel_token = CancellationToken::new();
    {
        let token = cancel_token.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Interrupted, stopping");
                    token.cancel();
                }
                Err(e) => tracing::warn!(error = %e, "Failed to install CTRL+C handler"),
            }
        });
    }

    poller.run(cancel_token, &reporter).await?;
    Ok(())
}

/// Write the table for `document` to `out` in the requested format.
fn print_table<W: Write>(
    out: &mut W,
    document: Option<&serde_json::Value>,
    config: &PanelConfig,
    format: OutputFormat,
) -> Result<()> {
    let today = Local::now().date_naive();
    match format {
        OutputFormat::Html => {
            writeln!(out, "{}", render_panel(document, config, today))?;
        }
        OutputFormat::Csv => {
            let table = table_for_document(document, config, today)?;
            write_csv(&mut *out, &table)?;
        }
    }
    out.flush()?;
    Ok(())
}

/// One header record with the column keys, then one record per row.
///
/// Cells a row lacks are left empty. Icon cells carry their classes.
fn write_csv<W: Write>(out: W, table: &Table) -> Result<()> {
    let columns = table.columns();
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(&columns)?;

    for row in &table.rows {
        let record = columns.iter().map(|column| {
            row.iter()
                .find(|cell| cell.key == *column)
                .map(|cell| {
                    if cell.text.is_empty() {
                        cell.classes.join(" ")
                    } else {
                        cell.text.clone()
                    }
                })
                .unwrap_or_default()
        });
        writer.write_record(record)?;
    }

    writer.flush()?;
    Ok(())
}

/// Logs every poller event and prints the table whenever the data changes.
struct PrintingReporter {
    state: PanelState,
    config: PanelConfig,
    format: OutputFormat,
}

impl PollerReporter for PrintingReporter {
    fn report(&self, event: PollerEvent<'_>) {
        let changed = matches!(event, PollerEvent::FetchSucceeded { changed: true, .. });
        TracingPollerReporter.report(event);
        if !changed {
            return;
        }

        let snapshot = self.state.snapshot();
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = print_table(
            &mut stdout,
            snapshot.document.as_deref(),
            &self.config,
            self.format,
        ) {
            tracing::warn!(error = %e, "Failed to print table");
        }
    }
}
