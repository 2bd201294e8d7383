use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scholaretl::config::{load_settings, Settings};
use scholaretl::parsers::{Extractor, SourceFormat};
use scholaretl::utils::{compute_uid, find_files};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// scholaretl - Normalize scientific articles into one JSON record format
#[derive(Parser, Debug)]
#[command(name = "scholaretl")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Normalize scientific articles from JATS, PubMed, TEI, XOCS and PDF sources", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse documents and print one JSON record per line
    #[command(alias = "p")]
    Parse {
        /// Declared input format (jats-xml, jats-meca, pubmed-xml, pubmed-xml-set,
        /// tei-xml, xocs-xml, pypdf, grobidpdf)
        format: SourceFormat,

        /// Files or directories to parse
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Descend into subdirectories
        #[arg(long, short)]
        recursive: bool,

        /// Only parse files whose name fully matches this regex
        #[arg(long, short, value_name = "REGEX")]
        match_filename: Option<String>,

        /// Characters per chunk for pypdf (overrides settings)
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Grobid base URL (overrides settings)
        #[arg(long)]
        grobid_url: Option<String>,

        /// Extra Grobid form parameter, repeatable
        #[arg(long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
        params: Vec<(String, String)>,

        /// Pretty-print records instead of one per line
        #[arg(long)]
        pretty: bool,

        /// Log failing inputs and continue with the rest
        #[arg(long, short)]
        keep_going: bool,
    },

    /// Print the content uid of files
    Uid {
        /// Files to hash
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Print the effective settings as TOML
    Settings,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let settings = load_settings(cli.config.as_deref()).context("Failed to load settings")?;

    let level_override = if cli.quiet {
        Some("error")
    } else {
        match cli.verbose {
            0 => None,
            1 => Some("debug"),
            _ => Some("trace"),
        }
    };
    let filter = match std::env::var("RUST_LOG") {
        Ok(directive) => EnvFilter::new(directive),
        Err(_) => EnvFilter::new(settings.logging.filter_directive(level_override)),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Parse {
            format,
            inputs,
            recursive,
            match_filename,
            chunk_size,
            grobid_url,
            params,
            pretty,
            keep_going,
        } => {
            let mut settings = settings;
            if let Some(size) = chunk_size {
                settings.pdf.chunk_size = size;
            }
            if let Some(url) = grobid_url {
                settings.grobid.url = Some(url);
            }
            settings.validate()?;

            let extractor = Extractor::from_settings(format, &settings)?.with_params(params);

            let mut files = Vec::new();
            for input in &inputs {
                files.extend(find_files(input, recursive, match_filename.as_deref())?);
            }
            tracing::info!("Parsing {} file(s) as {}", files.len(), format);

            let mut failures = 0usize;
            let mut stdout = std::io::stdout().lock();
            for file in &files {
                match parse_file(&extractor, file, pretty).await {
                    Ok(lines) => {
                        for line in lines {
                            writeln!(stdout, "{line}")?;
                        }
                    }
                    Err(e) if keep_going => {
                        tracing::error!("{}: {:#}", file.display(), e);
                        failures += 1;
                    }
                    Err(e) => return Err(e),
                }
            }

            if failures > 0 {
                anyhow::bail!("{} of {} input(s) failed", failures, files.len());
            }
        }

        Commands::Uid { files } => {
            for file in files {
                let raw = tokio::fs::read(&file)
                    .await
                    .with_context(|| format!("Failed to read {}", file.display()))?;
                println!("{}  {}", compute_uid(&raw), file.display());
            }
        }

        Commands::Settings => {
            print!("{}", render_settings(&settings)?);
        }
    }

    Ok(())
}

/// Parse one file into serialized records
async fn parse_file(extractor: &Extractor, file: &Path, pretty: bool) -> Result<Vec<String>> {
    let raw = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let extractions = extractor
        .extract_all(&raw)
        .await
        .with_context(|| format!("Failed to parse {}", file.display()))?;

    let mut lines = Vec::with_capacity(extractions.len());
    for extraction in extractions {
        if !extraction.warnings.is_empty() {
            tracing::debug!(
                "{}: {} field warning(s)",
                file.display(),
                extraction.warnings.len()
            );
        }
        let line = if pretty {
            serde_json::to_string_pretty(&extraction.article)?
        } else {
            serde_json::to_string(&extraction.article)?
        };
        lines.push(line);
    }
    Ok(lines)
}

fn render_settings(settings: &Settings) -> Result<String> {
    Ok(settings.to_toml()?)
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}
