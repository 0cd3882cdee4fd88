//! GeoDrop CLI
//!
//! Thin wrapper around geodrop-core for command-line usage. Source commands
//! take the codename on every call; nothing about the source is remembered
//! between invocations.
//!
//! ## Usage
//!
//! ```bash
//! # One-time setup: create the journalist's keypair
//! geodrop journalist keygen
//!
//! # Register as a source (prints a fresh codename)
//! geodrop source create
//!
//! # Submit a message with a location
//! geodrop source submit --codename "..." --msg "trucks at the gate" --lat 40.7N --lng 74.0W
//!
//! # Upload a document or a GeoJSON FeatureCollection
//! geodrop source submit --codename "..." --file depots.geojson
//!
//! # Check replies and your map
//! geodrop source lookup --codename "..."
//!
//! # Journalist side
//! geodrop journalist sources
//! geodrop journalist submissions <source_id>
//! geodrop journalist open <source_id> <name> --secret-key journalist.sec.asc
//! geodrop journalist flag <source_id>
//! geodrop journalist reply <source_id> "Can you share the permit numbers?"
//!
//! # Published stories
//! geodrop story list
//! geodrop story map <story_id>
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use geodrop_core::identity::generate_codename;
use geodrop_core::{
    load_public_key, AnonymousId, BlobKind, Codename, GeoDropConfig, GeoDropError,
    JournalistDesk, KeyPairService, MapView, RecipientKeyPair, SourceService, SourceSession, Store,
    SubmissionForm, UploadedFile,
};

/// GeoDrop - anonymous geotagged drop box
#[derive(Parser)]
#[command(name = "geodrop")]
#[command(version = "0.1.0")]
#[command(about = "GeoDrop - anonymous geotagged drop box")]
#[command(
    long_about = "Submit messages, map points and documents sealed for a single journalist, under a codename that never touches storage."
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Data directory (default: ~/.geodrop/data)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// JSON config file; its keys override the data directory defaults
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Codename helpers
    Codename {
        #[command(subcommand)]
        action: CodenameAction,
    },

    /// Source-side operations
    Source {
        #[command(subcommand)]
        action: SourceAction,
    },

    /// Journalist-side operations
    Journalist {
        #[command(subcommand)]
        action: JournalistAction,
    },

    /// Published stories
    Story {
        #[command(subcommand)]
        action: StoryAction,
    },
}

#[derive(Subcommand)]
enum CodenameAction {
    /// Propose a fresh codename
    Generate {
        /// Number of words (default from config)
        #[arg(short, long)]
        words: Option<usize>,
    },
}

#[derive(Subcommand)]
enum SourceAction {
    /// Register a codename (a fresh one is generated if omitted)
    Create {
        #[arg(long)]
        codename: Option<String>,
    },
    /// Check that a codename is registered
    Login {
        #[arg(long)]
        codename: String,
    },
    /// Show replies, reply status and your map
    Lookup {
        #[arg(long)]
        codename: String,
    },
    /// Submit a message, a location and/or a file
    Submit {
        #[arg(long)]
        codename: String,
        /// Message text
        #[arg(short, long)]
        msg: Option<String>,
        /// Latitude, e.g. 40.7N or -40.7
        #[arg(long, allow_hyphen_values = true)]
        lat: Option<String>,
        /// Longitude, e.g. 74.0W or -74.0
        #[arg(long, allow_hyphen_values = true)]
        lng: Option<String>,
        /// Document or GeoJSON FeatureCollection to upload
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Securely erase a reply you have read
    DeleteReply {
        #[arg(long)]
        codename: String,
        /// Reply ID as shown by lookup
        reply_id: String,
    },
}

#[derive(Subcommand)]
enum JournalistAction {
    /// Generate the journalist keypair
    Keygen {
        /// Where to write the secret key (default: <data-dir>/journalist.sec.asc)
        #[arg(long)]
        secret_out: Option<PathBuf>,
        /// Replace an existing keypair (WARNING: old submissions become unreadable)
        #[arg(long)]
        force: bool,
    },
    /// Export the public key for sources to download
    ExportKey {
        /// Directory to write the key file into (default: print it)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// List known sources
    Sources,
    /// List the sealed submissions of a source
    Submissions {
        /// Source ID (hex)
        source_id: String,
    },
    /// Flag a source for reply
    Flag {
        /// Source ID (hex)
        source_id: String,
    },
    /// Seal a reply to a flagged source
    Reply {
        /// Source ID (hex)
        source_id: String,
        /// Reply text
        text: String,
    },
    /// Decrypt one submission
    Open {
        /// Source ID (hex)
        source_id: String,
        /// Submission name as shown by `submissions`
        name: String,
        /// Armored secret key file
        #[arg(long)]
        secret_key: PathBuf,
        /// Write the plaintext here instead of printing it
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum StoryAction {
    /// List published stories, newest first
    List,
    /// Show the map of a story
    Map {
        /// Story ID (directory name)
        story_id: String,
    },
}

fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();
}

/// Get the default data directory (~/.geodrop/data)
fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".geodrop")
        .join("data")
}

/// Data directory defaults, overridden by the config file if given
fn load_config(data_dir: &Path, path: Option<&Path>) -> Result<GeoDropConfig> {
    let base = GeoDropConfig::for_data_dir(data_dir);
    match path {
        Some(path) => GeoDropConfig::load_over(path, base)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(base),
    }
}

/// Only a missing or unreadable journalist key earns the keygen hint; any
/// other failure is reported as is.
fn open_service(config: GeoDropConfig) -> Result<SourceService> {
    let key = load_public_key(&config.journalist_key).map_err(|e| {
        anyhow::anyhow!(
            "{}\nNo usable journalist key. Run `geodrop journalist keygen` first.",
            e
        )
    })?;
    let runtime = tokio::runtime::Handle::try_current().context("No tokio runtime")?;
    Ok(SourceService::new(config, key, runtime)?)
}

/// Journalist desk over the store; needs no public key.
fn open_desk(config: &GeoDropConfig) -> Result<JournalistDesk> {
    let store = Store::new(&config.store_dir)?;
    let keys = KeyPairService::new(store.clone(), config.kdf);
    Ok(JournalistDesk::new(store, keys))
}

fn login(service: &SourceService, codename: String) -> Result<SourceSession> {
    match service.login(Codename::new(codename)) {
        Err(GeoDropError::IdentityNotFound) => {
            anyhow::bail!("No submissions found for that codename.")
        }
        other => Ok(other?),
    }
}

/// Parse a source ID from hex string
fn parse_source_id(s: &str) -> Result<AnonymousId> {
    AnonymousId::parse(s).map_err(|e| anyhow::anyhow!("Invalid source ID '{}': {}", s, e))
}

fn desk_error(err: GeoDropError, source_id: &str) -> anyhow::Error {
    match err {
        GeoDropError::IdentityNotFound => anyhow::anyhow!("Source not found: {}", source_id),
        GeoDropError::KeypairMissing(_) => anyhow::anyhow!(
            "Source has no reply key yet. Flag it and wait for its next lookup."
        ),
        other => other.into(),
    }
}

fn kind_label(kind: BlobKind) -> &'static str {
    match kind {
        BlobKind::Message => "message",
        BlobKind::Location => "location",
        BlobKind::Document => "document",
        BlobKind::Reply => "reply",
    }
}

fn print_map(map: &MapView) {
    match map.extent {
        Some([min_lng, min_lat, max_lng, max_lat]) => println!(
            "Map extent: {:.4},{:.4} .. {:.4},{:.4}",
            min_lng, min_lat, max_lng, max_lat
        ),
        None => println!("Map extent: (no points)"),
    }
    for label in &map.labels {
        println!("  [{}] {}", label.sort_id, label.msg);
    }
    if map.image.is_some() {
        println!("Map image: rendered");
    }
}

fn write_new_file(path: &Path, contents: &[u8], force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to replace it)", path.display());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let data_dir = cli.data_dir.unwrap_or_else(default_data_dir);
    let config = load_config(&data_dir, cli.config.as_deref())?;
    tracing::debug!(data_dir = %data_dir.display(), "Using data directory");

    match cli.command {
        Commands::Codename { action } => match action {
            CodenameAction::Generate { words } => {
                let range = &config.codename_words;
                let codename = generate_codename(words.unwrap_or(range.default), range)?;
                println!("{}", codename.expose());
            }
        },

        Commands::Source { action } => {
            let service = open_service(config)?;

            match action {
                SourceAction::Create { codename } => {
                    let (codename, generated) = match codename {
                        Some(codename) => (Codename::new(codename), false),
                        None => (service.generate_codename(None)?, true),
                    };
                    if generated {
                        println!("Your codename:");
                        println!();
                        println!("  {}", codename.expose());
                        println!();
                        println!("Write it down. It cannot be recovered.");
                    }
                    service.create(codename)?;
                    println!("Codename registered.");
                }
                SourceAction::Login { codename } => {
                    login(&service, codename)?;
                    println!("Welcome back.");
                }
                SourceAction::Lookup { codename } => {
                    let session = login(&service, codename)?;
                    let lookup = service.lookup(&session)?;

                    if lookup.replies.is_empty() {
                        println!("No replies.");
                    } else {
                        println!("Replies ({}):", lookup.replies.len());
                        for reply in &lookup.replies {
                            println!(
                                "  {} ({})",
                                reply.id,
                                reply.received.format("%Y-%m-%d %H:%M UTC")
                            );
                            println!("    {}", reply.text);
                        }
                    }
                    if lookup.flagged && !lookup.has_key {
                        println!("A reply is being prepared. Check back later.");
                    }
                    if let Some(map) = &lookup.map {
                        print_map(map);
                    }
                }
                SourceAction::Submit {
                    codename,
                    msg,
                    lat,
                    lng,
                    file,
                } => {
                    let session = login(&service, codename)?;
                    let file = match file {
                        Some(path) => Some(UploadedFile {
                            filename: path
                                .file_name()
                                .map(|n| n.to_string_lossy().into_owned())
                                .unwrap_or_default(),
                            bytes: fs::read(&path)
                                .with_context(|| format!("Failed to read {}", path.display()))?,
                        }),
                        None => None,
                    };
                    let form = SubmissionForm { msg, lat, lng, file };

                    let receipt = match service.submit(&session, &form) {
                        Err(GeoDropError::InvalidCoordinate(_)) => {
                            anyhow::bail!("That location could not be read. Nothing was stored.")
                        }
                        other => other?,
                    };
                    if receipt.is_empty() {
                        println!("Nothing to submit.");
                    }
                    for notice in receipt.notices() {
                        println!("{}", notice);
                    }
                }
                SourceAction::DeleteReply { codename, reply_id } => {
                    let session = login(&service, codename)?;
                    match service.delete_reply(&session, &reply_id) {
                        Err(GeoDropError::ReplyNotFound(_)) => {
                            anyhow::bail!("Reply not found: {}", reply_id)
                        }
                        other => other?,
                    }
                    println!("Reply deleted.");
                }
            }

            service.drain().await;
        }

        Commands::Journalist { action } => match action {
            JournalistAction::Keygen { secret_out, force } => {
                let secret_path = secret_out.unwrap_or_else(|| data_dir.join("journalist.sec.asc"));
                if config.journalist_key.exists() && !force {
                    println!("A journalist key already exists.");
                    println!();
                    println!("Replacing it makes every existing submission unreadable.");
                    println!("To confirm, run: geodrop journalist keygen --force");
                    return Ok(());
                }

                let pair = RecipientKeyPair::generate()?;
                write_new_file(&secret_path, pair.secret_to_armored().as_bytes(), force)?;
                write_new_file(
                    &config.journalist_key,
                    pair.public_key().to_armored().as_bytes(),
                    true,
                )?;

                println!("Journalist keypair generated.");
                println!("  Fingerprint: {}", pair.public_key().fingerprint());
                println!("  Public key: {}", config.journalist_key.display());
                println!("  Secret key: {}", secret_path.display());
                println!();
                println!("Move the secret key off this machine.");
            }
            JournalistAction::ExportKey { out } => {
                let service = open_service(config)?;
                let attachment = service.journalist_key_attachment();
                match out {
                    Some(dir) => {
                        let path = dir.join(&attachment.filename);
                        write_new_file(&path, attachment.body.as_bytes(), true)?;
                        println!("Exported {} ({})", path.display(), attachment.mime_type);
                    }
                    None => print!("{}", attachment.body),
                }
            }
            JournalistAction::Sources => {
                let sources = open_desk(&config)?.sources()?;
                if sources.is_empty() {
                    println!("No sources yet.");
                } else {
                    println!("Sources ({}):", sources.len());
                    for id in sources {
                        println!("  {}", id);
                    }
                }
            }
            JournalistAction::Submissions { source_id } => {
                let id = parse_source_id(&source_id)?;
                let submissions = open_desk(&config)?
                    .submissions(&id)
                    .map_err(|e| desk_error(e, &source_id))?;
                if submissions.is_empty() {
                    println!("No submissions.");
                } else {
                    println!("Submissions ({}):", submissions.len());
                    for object in submissions {
                        let kind = BlobKind::of_name(&object.name).map_or("?", kind_label);
                        let modified = DateTime::<Utc>::from(object.modified);
                        println!(
                            "  {} {:<8} {}",
                            modified.format("%Y-%m-%d %H:%M"),
                            kind,
                            object.name
                        );
                    }
                }
            }
            JournalistAction::Flag { source_id } => {
                let id = parse_source_id(&source_id)?;
                let desk = open_desk(&config)?;
                desk.submissions(&id).map_err(|e| desk_error(e, &source_id))?;
                desk.flag(&id)?;
                println!("Source flagged for reply.");
            }
            JournalistAction::Reply { source_id, text } => {
                let id = parse_source_id(&source_id)?;
                let name = open_desk(&config)?
                    .reply(&id, &text)
                    .map_err(|e| desk_error(e, &source_id))?;
                println!("Reply sealed.");
                println!("  ID: {}", name);
            }
            JournalistAction::Open {
                source_id,
                name,
                secret_key,
                out,
            } => {
                let id = parse_source_id(&source_id)?;
                let armored = fs::read_to_string(&secret_key)
                    .with_context(|| format!("Failed to read {}", secret_key.display()))?;
                let recipient = RecipientKeyPair::from_armored_secret(&armored)?;
                let opened = open_desk(&config)?.open(&id, &name, &recipient)?;

                match (out, opened.kind) {
                    (Some(path), _) => {
                        write_new_file(&path, &opened.bytes, true)?;
                        println!("Wrote {} {}", kind_label(opened.kind), path.display());
                    }
                    (None, BlobKind::Document) => {
                        anyhow::bail!("Documents are zip archives; use --out to save it")
                    }
                    (None, _) => println!("{}", String::from_utf8_lossy(&opened.bytes)),
                }
            }
        },

        Commands::Story { action } => {
            let service = open_service(config)?;
            match action {
                StoryAction::List => {
                    let stories = service.list_stories()?;
                    if stories.is_empty() {
                        println!("No stories published.");
                    } else {
                        println!("Stories ({}):", stories.len());
                        for story in stories {
                            println!("  {} {}", story.published.format("%Y-%m-%d"), story.id);
                        }
                    }
                }
                StoryAction::Map { story_id } => match service.story_map(&story_id)? {
                    Some(map) => print_map(&map),
                    None => println!("This story has no map."),
                },
            }
        }
    }

    Ok(())
}
