use anyhow::Result;
use catalog_sqlite::{Db, VendorTally, VulnerabilityRef};
use clap::{Args, Parser, Subcommand, ValueEnum};
use crawler::{CrawlOptions, Crawler, HttpOptions, HttpSource, PhaseReport, PipelineReport, Stages};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;

const DEFAULT_DB: &str = "database.db";

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_else(|_| String::new())
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat { Text, Json, Jsonl }

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum LogFormat { Text, Json }

#[derive(Debug, Parser)]
#[command(name = "threatdb", version, about = "Crawl a vendor/product/vulnerability catalog into SQLite and query it")]
struct Cli {
    /// Optional config file (YAML). If omitted, loads ./threatdb.yaml if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Catalog database file (default: database.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Debug-level logging unless RUST_LOG is set
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,
    /// Log line format on stderr
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Default, Args)]
struct CrawlArgs {
    /// Vendor listing URL (page 1)
    #[arg(long)]
    vendor_url: Option<String>,
    /// Product listing URL (page 1)
    #[arg(long)]
    product_url: Option<String>,
    /// Vulnerability listing URL (page 1); detail links resolve against it
    #[arg(long)]
    vulnerability_url: Option<String>,
    /// Pause after each listing page in milliseconds (default 1000)
    #[arg(long)]
    delay_ms: Option<u64>,
    /// Concurrent detail-page fetches while collecting tags (default 10)
    #[arg(long)]
    tag_concurrency: Option<usize>,
    /// HTTP request timeout in milliseconds (default 30000)
    #[arg(long)]
    timeout_ms: Option<u64>,
    /// User-Agent header
    #[arg(long)]
    user_agent: Option<String>,
    /// Stop each listing after N pages
    #[arg(long)]
    max_pages: Option<u32>,
    /// Crawl listings only; do not collect tags
    #[arg(long, default_value_t = false, conflicts_with = "tags_only")]
    skip_tags: bool,
    /// Collect tags for already stored vulnerabilities only
    #[arg(long, default_value_t = false)]
    tags_only: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print version information
    Version,
    /// Crawl vendors, products and vulnerabilities, then collect tags
    Crawl {
        #[command(flatten)]
        args: CrawlArgs,
        /// Run summary format: text or json
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// List vulnerabilities of a product (exact name)
    Vulns {
        /// Product name as shown in the catalog
        product: String,
        /// Output format: text, json, or jsonl
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        /// Output file (overwrites)
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
        /// Write CSV instead of text/json when --out is provided
        #[arg(long, default_value_t = false, requires = "out")]
        csv: bool,
    },
    /// Vendors with the most vulnerabilities carrying a tag
    TopVendors {
        /// Tag to filter on
        #[arg(long, default_value = "SUI")]
        tag: String,
        /// Number of vendors to list
        #[arg(long, default_value_t = 10)]
        count: usize,
        /// Output format: text, json, or jsonl
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        /// Output file (overwrites)
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
        /// Write CSV instead of text/json when --out is provided
        #[arg(long, default_value_t = false, requires = "out")]
        csv: bool,
    },
}

fn init_logging(verbose: bool, format: LogFormat) {
    let level = if verbose { "debug" } else { "info" };
    let default = format!("threatdb={level},crawler={level},catalog_sqlite={level}");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Flag, then config file, then built-in default.
fn resolve_crawl(args: &CrawlArgs, cfg: &config::CrawlConfig) -> (CrawlOptions, HttpOptions) {
    let base = CrawlOptions::default();
    let http_base = HttpOptions::default();
    let pick = |flag: &Option<String>, file: &Option<String>, default: String| {
        flag.clone().or_else(|| file.clone()).unwrap_or(default)
    };
    let opts = CrawlOptions {
        vendor_url: pick(&args.vendor_url, &cfg.vendor_url, base.vendor_url),
        product_url: pick(&args.product_url, &cfg.product_url, base.product_url),
        vulnerability_url: pick(&args.vulnerability_url, &cfg.vulnerability_url, base.vulnerability_url),
        delay: args.delay_ms.or(cfg.delay_ms).map(Duration::from_millis).unwrap_or(base.delay),
        tag_concurrency: args.tag_concurrency.or(cfg.tag_concurrency).unwrap_or(base.tag_concurrency),
        max_pages: args.max_pages.or(cfg.max_pages),
    };
    let http = HttpOptions {
        timeout_ms: args.timeout_ms.or(cfg.timeout_ms).unwrap_or(http_base.timeout_ms),
        user_agent: pick(&args.user_agent, &cfg.user_agent, http_base.user_agent),
    };
    (opts, http)
}

fn resolve_db(flag: Option<&Path>, cfg: &config::CrawlConfig) -> PathBuf {
    flag.map(Path::to_path_buf)
        .or_else(|| cfg.db.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB))
}

fn phase_line(p: &PhaseReport) -> String {
    let mut line = format!(
        "{:<14} pages={} inserted={} updated={} duplicates={} skipped={} unresolved={} issues={} decoration={} end={:?}",
        p.kind.as_str(), p.pages, p.inserted, p.updated, p.duplicates, p.skipped, p.unresolved, p.issues, p.decoration, p.end
    );
    if p.end.is_alert() {
        line.push_str(" [ALERT: listing may be incomplete]");
    }
    line
}

fn print_summary(report: &PipelineReport, elapsed: Duration, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json | OutputFormat::Jsonl => {
            let obj = serde_json::json!({
                "generated_at": now_rfc3339(),
                "elapsed_ms": elapsed.as_millis() as u64,
                "report": report,
            });
            if format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&obj)?);
            } else {
                println!("{}", serde_json::to_string(&obj)?);
            }
        }
        OutputFormat::Text => {
            for p in &report.phases {
                println!("{}", phase_line(p));
            }
            if let Some(t) = &report.tags {
                println!(
                    "{:<14} vulnerabilities={} fetched={} failed={} unreachable={} skipped={} tags={} duplicates={}",
                    "tags", t.vulnerabilities, t.fetched, t.failed, t.unreachable, t.skipped, t.tags_inserted, t.duplicates
                );
            }
            println!("done in {:.1}s", elapsed.as_secs_f64());
        }
    }
    Ok(())
}

/// Emit report rows as text lines, JSON, JSONL, or CSV into `--out`.
fn emit_rows<T: Serialize>(
    rows: &[T],
    format: OutputFormat,
    out: Option<&Path>,
    csv: bool,
    text_line: impl Fn(&T) -> String,
) -> Result<()> {
    let mut w: Box<dyn Write> = match out {
        Some(p) => Box::new(BufWriter::new(File::create(p)?)),
        None => Box::new(std::io::stdout().lock()),
    };
    if csv {
        let mut cw = ::csv::Writer::from_writer(w);
        for r in rows { cw.serialize(r)?; }
        cw.flush()?;
        return Ok(());
    }
    match format {
        OutputFormat::Text => { for r in rows { writeln!(w, "{}", text_line(r))?; } }
        OutputFormat::Json => { writeln!(w, "{}", serde_json::to_string_pretty(rows)?)?; }
        OutputFormat::Jsonl => { for r in rows { writeln!(w, "{}", serde_json::to_string(r)?)?; } }
    }
    w.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_format);
    let loaded_cfg = config::load_config(cli.config.as_deref())?;
    let crawl_cfg = loaded_cfg.crawl.unwrap_or_default();
    let db_path = resolve_db(cli.db.as_deref(), &crawl_cfg);
    match cli.command {
        Commands::Version => {
            println!("threatdb {} (core {})", env!("CARGO_PKG_VERSION"), threatdb_core::version());
        }
        Commands::Crawl { args, format } => {
            let (opts, http) = resolve_crawl(&args, &crawl_cfg);
            let stages = Stages { listings: !args.tags_only, tags: !args.skip_tags };
            info!(db = %db_path.display(), vendors = %opts.vendor_url, ?stages, "starting crawl");
            let source = Arc::new(HttpSource::new(&http)?);
            let db = Db::open_or_create(&db_path)?.into_shared();
            let started = Instant::now();
            let rt = tokio::runtime::Runtime::new()?;
            let report = rt.block_on(async move { Crawler::new(source, db, opts).run(stages).await })?;
            print_summary(&report, started.elapsed(), format)?;
        }
        Commands::Vulns { product, format, out, csv } => {
            let rows = catalog_sqlite::reports::vulnerabilities_for_product(&db_path, &product)?;
            if rows.is_empty() {
                info!(%product, "no vulnerabilities stored for product");
            }
            emit_rows(&rows, format, out.as_deref(), csv, |v: &VulnerabilityRef| {
                format!("Vulnerability: {}, Link: {}", v.name, v.link)
            })?;
        }
        Commands::TopVendors { tag, count, format, out, csv } => {
            let rows = catalog_sqlite::reports::top_vendors_for_tag(&db_path, &tag, count)?;
            if format == OutputFormat::Text && out.is_none() {
                println!("Top {} vendors with {} tag:", count, tag);
            }
            emit_rows(&rows, format, out.as_deref(), csv, |v: &VendorTally| {
                format!("{} = {}", v.vendor, v.vulnerability_count)
            })?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_query_commands() {
        let cli = Cli::try_parse_from(["threatdb", "--db", "x.db", "top-vendors", "--tag", "RCE", "--count", "3"]).unwrap();
        assert_eq!(cli.db.as_deref(), Some(Path::new("x.db")));
        match cli.command {
            Commands::TopVendors { tag, count, .. } => {
                assert_eq!(tag, "RCE");
                assert_eq!(count, 3);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn skip_tags_and_tags_only_conflict() {
        assert!(Cli::try_parse_from(["threatdb", "crawl", "--skip-tags", "--tags-only"]).is_err());
    }

    #[test]
    fn flags_beat_config_beats_defaults() {
        let cfg = config::CrawlConfig {
            delay_ms: Some(250),
            tag_concurrency: Some(4),
            vendor_url: Some("https://cfg.test/vendor/".into()),
            ..Default::default()
        };
        let args = CrawlArgs { tag_concurrency: Some(2), ..Default::default() };
        let (opts, http) = resolve_crawl(&args, &cfg);
        assert_eq!(opts.tag_concurrency, 2);
        assert_eq!(opts.delay, Duration::from_millis(250));
        assert_eq!(opts.vendor_url, "https://cfg.test/vendor/");
        assert_eq!(opts.product_url, crawler::DEFAULT_PRODUCT_URL);
        assert_eq!(http.timeout_ms, 30_000);
    }

    #[test]
    fn db_path_precedence() {
        let cfg = config::CrawlConfig { db: Some(PathBuf::from("cfg.db")), ..Default::default() };
        assert_eq!(resolve_db(Some(Path::new("flag.db")), &cfg), PathBuf::from("flag.db"));
        assert_eq!(resolve_db(None, &cfg), PathBuf::from("cfg.db"));
        assert_eq!(resolve_db(None, &config::CrawlConfig::default()), PathBuf::from(DEFAULT_DB));
    }

    #[test]
    fn summary_flags_phases_that_ended_on_failure() {
        let mut p = PhaseReport::new(threatdb_core::CatalogKind::Product);
        p.end = crawler::PhaseEnd::Status { status: 502 };
        assert!(phase_line(&p).ends_with("[ALERT: listing may be incomplete]"));
        p.end = crawler::PhaseEnd::Exhausted;
        assert!(!phase_line(&p).contains("ALERT"));
    }

    #[test]
    fn csv_rows_are_written_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("top.csv");
        let rows = vec![VendorTally { vendor: "Acme".into(), vulnerability_count: 2 }];
        emit_rows(&rows, OutputFormat::Text, Some(&out), true, |v| v.vendor.clone()).unwrap();
        let s = std::fs::read_to_string(&out).unwrap();
        assert_eq!(s, "vendor,vulnerability_count\nAcme,2\n");
    }
}
