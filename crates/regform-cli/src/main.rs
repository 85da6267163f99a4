use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use regform_core::prelude::*;
use regform_core::{Serialized, UnserializeReport};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Settings shared by every subcommand
struct Options {
    config: EngineConfig,
    context: Value,
}

impl Options {
    fn from_matches(matches: &ArgMatches) -> Result<Self> {
        let config = match matches.get_one::<PathBuf>("config") {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                EngineConfig::from_toml_str(&text)
                    .with_context(|| format!("parsing config {}", path.display()))?
            }
            None => EngineConfig::default(),
        };
        let context = match matches.get_one::<PathBuf>("context") {
            Some(path) => read_json(path)?,
            None => Value::Null,
        };
        Ok(Self { config, context })
    }
}

fn read_json(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn build_document(schema_path: &Path, options: &Options) -> Result<Document> {
    let text = std::fs::read_to_string(schema_path)
        .with_context(|| format!("reading schema {}", schema_path.display()))?;
    let schema = Schema::from_text(schema_path, &text)
        .with_context(|| format!("parsing schema {}", schema_path.display()))?;
    Document::builder(schema)
        .config(options.config.clone())
        .context(options.context.clone())
        .build()
        .with_context(|| format!("building document from {}", schema_path.display()))
}

/// One line per page: id, title and answer keys
fn check_summary(doc: &Document) -> Vec<String> {
    let mut lines = vec![format!(
        "{} pages, {} nodes, {} keys",
        doc.pages().len(),
        doc.node_count(),
        doc.index().len()
    )];
    for page in doc.pages() {
        let keys: Vec<&str> = page
            .index()
            .iter()
            .filter(|(_, id)| doc.node(*id).is_some_and(|n| n.holds_value()))
            .map(|(key, _)| key)
            .collect();
        lines.push(format!(
            "  {} ({}): {}",
            page.id(),
            page.title().unwrap_or("untitled"),
            keys.join(", ")
        ));
    }
    lines
}

struct Replay {
    report: UnserializeReport,
    serialized: Serialized,
    missing: Vec<String>,
    messages: Vec<(String, String)>,
}

async fn replay(
    doc: &mut Document,
    answers: &Map<String, Value>,
    today: Option<NaiveDate>,
    listing: Option<&StaticListing>,
) -> Result<Replay> {
    let report = doc.unserialize(answers).context("restoring answers")?;

    if let Some(listing) = listing {
        let loaded = doc.load_pending_files(listing).await;
        tracing::info!(loaded, "file listings loaded");
    }

    let serialized = match today {
        Some(today) => doc.submit(today).context("submit gate")?,
        None => doc.serialize(),
    };

    Ok(Replay {
        report,
        serialized,
        missing: doc.missing(),
        messages: doc.validation_messages().into_iter().collect(),
    })
}

fn read_listing(path: &Path) -> Result<StaticListing> {
    let Value::Object(containers) = read_json(path)? else {
        bail!("{} must map container ids to file lists", path.display());
    };
    let mut listing = StaticListing::new();
    for (container, files) in containers {
        let files: Vec<String> = serde_json::from_value(files)
            .with_context(|| format!("files of container {container}"))?;
        listing = listing.with_container(container, files);
    }
    Ok(listing)
}

fn cli() -> Command {
    Command::new("regform")
        .version(regform_core::VERSION)
        .about("Lint registration schemas and replay saved answers")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Engine configuration (TOML)"),
        )
        .arg(
            Arg::new("context")
                .long("context")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Page context read by $ctx references (JSON)"),
        )
        .subcommand(
            Command::new("check")
                .about("Build a document from a schema and list its answer keys")
                .arg(
                    Arg::new("schema")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Schema file (.json, .yaml)"),
                ),
        )
        .subcommand(
            Command::new("replay")
                .about("Restore an answer map, then report completeness and validation")
                .arg(
                    Arg::new("schema")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Schema file (.json, .yaml)"),
                )
                .arg(
                    Arg::new("answers")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Flat answer map (JSON)"),
                )
                .arg(
                    Arg::new("today")
                        .long("today")
                        .value_parser(value_parser!(NaiveDate))
                        .help("Run the embargo submit gate as of this date (YYYY-MM-DD)"),
                )
                .arg(
                    Arg::new("files")
                        .long("files")
                        .value_parser(value_parser!(PathBuf))
                        .help("Container listings (JSON object of container id to paths)"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the serialized answers as JSON"),
                ),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let matches = cli().get_matches();
    let options = Options::from_matches(&matches)?;

    match matches.subcommand() {
        Some(("check", args)) => {
            let schema = args.get_one::<PathBuf>("schema").context("schema path")?;
            let doc = build_document(schema, &options)?;
            for line in check_summary(&doc) {
                println!("{line}");
            }
        }
        Some(("replay", args)) => {
            let schema = args.get_one::<PathBuf>("schema").context("schema path")?;
            let answers_path = args.get_one::<PathBuf>("answers").context("answers path")?;
            let Value::Object(answers) = read_json(answers_path)? else {
                bail!("{} must hold a JSON object", answers_path.display());
            };
            let listing = args
                .get_one::<PathBuf>("files")
                .map(|path| read_listing(path))
                .transpose()?;
            let today = args.get_one::<NaiveDate>("today").copied();

            let mut doc = build_document(schema, &options)?;
            let outcome = replay(&mut doc, &answers, today, listing.as_ref()).await?;

            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&outcome.serialized)?);
            } else {
                println!(
                    "applied {}, rejected {}, passes {}",
                    outcome.report.applied.len(),
                    outcome.report.rejected.len(),
                    outcome.report.passes
                );
                for key in &outcome.report.rejected {
                    println!("  rejected: {key}");
                }
                println!("complete: {}", outcome.serialized.complete);
                for key in &outcome.missing {
                    println!("  missing: {key}");
                }
                for (key, message) in &outcome.messages {
                    println!("  invalid: {key}: {message}");
                }
            }

            if !outcome.serialized.complete {
                std::process::exit(2);
            }
        }
        _ => unreachable!("subcommand_required"),
    }

    Ok(())
}
