use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use sms_archive::config::AppConfig;
use sms_archive::db::SearchIndexMode;
use sms_archive::export::{write_static_archive, ExportOptions, ExportSummary};
use sms_archive::importer::{import_file, BatchPolicy, ImportOptions, ImportSummary};
use sms_archive::logging::init_logging;
use sms_archive::repository::SqliteRepository;
use sms_archive::server::{serve, ServerOptions};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log filter (trace, debug, info, warn, error); RUST_LOG wins
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Extra configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import an SMS Backup & Restore XML file into a fresh archive
    Import {
        /// Backup file
        #[arg(long)]
        xml: PathBuf,

        /// Output directory
        #[arg(long, default_value = "./export")]
        out: PathBuf,

        /// Stop after this many messages
        #[arg(long)]
        limit: Option<usize>,

        /// Messages per write transaction
        #[arg(long)]
        batch_size: Option<usize>,

        /// Do not build the full-text index
        #[arg(long)]
        no_index: bool,

        /// Also write the static HTML archive
        #[arg(long)]
        html: bool,

        /// One HTML page per contact per year
        #[arg(long)]
        split_by_year: bool,
    },
    /// Serve search and conversation pages over HTTP
    Serve {
        /// Archive database (default: OUT/messages.db)
        #[arg(long)]
        db: Option<PathBuf>,

        /// Media directory (default: OUT/media)
        #[arg(long)]
        media: Option<PathBuf>,

        /// Output directory of a previous import
        #[arg(long, default_value = "./export")]
        out: PathBuf,

        /// Bind address
        #[arg(long)]
        host: Option<String>,

        /// Bind port
        #[arg(long)]
        port: Option<u16>,
    },
}

/// What `import` reports on stdout
#[derive(Serialize)]
struct ImportReport {
    import: ImportSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    export: Option<ExportSummary>,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path)?,
        None => AppConfig::load()?,
    };

    // Initialize logging
    let level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    let log_file = config.logging.file_path.as_deref().map(Path::new);
    let _log_guard = init_logging(Some(level), log_file, config.log_format()?)?;

    info!("Starting sms-archive");

    // Process command
    match cli.command {
        Commands::Import {
            xml,
            out,
            limit,
            batch_size,
            no_index,
            html,
            split_by_year,
        } => run_import(&config, &xml, &out, limit, batch_size, no_index, html, split_by_year),
        Commands::Serve {
            db,
            media,
            out,
            host,
            port,
        } => run_serve(&config, db, media, &out, host, port),
    }
}

#[allow(clippy::too_many_arguments, clippy::fn_params_excessive_bools)]
fn run_import(
    config: &AppConfig,
    xml: &Path,
    out: &Path,
    limit: Option<usize>,
    batch_size: Option<usize>,
    no_index: bool,
    html: bool,
    split_by_year: bool,
) -> Result<()> {
    let index_mode = if no_index {
        SearchIndexMode::Disabled
    } else {
        config.search_index_mode()?
    };
    let options = ImportOptions {
        limit,
        batch: BatchPolicy::new(batch_size.unwrap_or(config.import.batch_size))?,
        index_mode,
        db_file_name: config.database.file_name.clone(),
        media_dir_name: config.import.media_dir_name.clone(),
    };

    let summary = import_file(xml, out, &options)
        .with_context(|| format!("Failed to import {}", xml.display()))?;

    let export = if html {
        let repo = SqliteRepository::open(&summary.db_path, 1)?;
        let export_options = ExportOptions {
            split_by_year,
            media_dir_name: config.import.media_dir_name.clone(),
        };
        Some(write_static_archive(&repo, out, &export_options).context("Failed to write HTML archive")?)
    } else {
        if split_by_year {
            info!("--split-by-year only applies together with --html");
        }
        None
    };

    let report = ImportReport {
        import: summary,
        export,
    };
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &report)?;
    writeln!(stdout)?;
    Ok(())
}

fn run_serve(
    config: &AppConfig,
    db: Option<PathBuf>,
    media: Option<PathBuf>,
    out: &Path,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    let db = db.unwrap_or_else(|| out.join(&config.database.file_name));
    let media = media.unwrap_or_else(|| out.join(&config.import.media_dir_name));
    let options = ServerOptions {
        host: host.unwrap_or_else(|| config.server.host.clone()),
        port: port.unwrap_or(config.server.port),
        search_limit: config.server.search_limit,
        max_connections: config.database.max_connections,
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime
        .block_on(serve(&db, &media, &options))
        .context("Search server stopped")?;
    Ok(())
}
