mod transport;

use std::path::PathBuf;
use std::sync::Arc;

use anchor_event_bus::EventBus;
use anchor_logger::Logger;
use anchor_storage::Storage;
use anchor_sync::{Bookmark, PERSONAL_SPACE_ID, RecordKind, RecordStore, SyncConfig, SyncMode, pull, push};
use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};

use transport::HttpTransport;

/// A thin CLI client driving the bookmark sync core end to end: local
/// storage, the outbox, and a push/pull cycle against a running
/// `anchor-sync-server`.
#[derive(Parser)]
#[command(name = "muster", version, about)]
struct Cli {
    /// Directory the local record store is persisted under.
    #[arg(long, env = "ANCHOR_DATA_DIR", default_value = "anchor-shell-data", global = true)]
    data_dir: PathBuf,

    /// Local user id, used to namespace storage and to tag pushed records.
    #[arg(long, env = "ANCHOR_USER_ID", default_value = "local", global = true)]
    user_id: String,

    /// Base URL of the `anchor-sync-server` deployment.
    #[arg(long, env = "ANCHOR_SERVER_URL", default_value = "http://127.0.0.1:8080", global = true)]
    server_url: String,

    /// Bearer JWT identifying the caller to the server. Required for `sync`.
    #[arg(long, env = "ANCHOR_TOKEN", global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Add a bookmark to the local store and queue it for push.
    Add {
        title: String,
        url: String,
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long)]
        space: Option<String>,
    },
    /// List locally known bookmarks.
    List,
    /// Remove a bookmark by id.
    Remove { id: String },
    /// Turn on plaintext sync for this local store.
    EnableSync,
    /// Turn off sync for this local store (records already pushed stay server-side).
    DisableSync,
    /// Push the outbox, then pull new records from the server.
    Sync,
    /// Print outbox depth and last-sync time.
    Status,
}

#[anchor_runtime::main(high_performance)]
async fn main() -> Result<()> {
    let _logger = Logger::builder().name(env!("CARGO_PKG_NAME")).console(true).init()?;

    let cli = Cli::parse();
    let store = open_store(&cli).await?;

    match cli.command {
        Command::Add { title, url, tags, space } => add_bookmark(&store, title, url, tags, space).await,
        Command::List => list_bookmarks(&store),
        Command::Remove { id } => remove_bookmark(&store, &id).await,
        Command::EnableSync => set_sync_enabled(&store, true).await,
        Command::DisableSync => set_sync_enabled(&store, false).await,
        Command::Sync => run_sync(&store, &cli).await,
        Command::Status => print_status(&store),
    }
}

async fn open_store(cli: &Cli) -> Result<RecordStore> {
    let storage = Storage::builder()
        .root(&cli.data_dir)
        .connect()
        .await
        .with_context(|| format!("opening local storage under {}", cli.data_dir.display()))?;
    let namespace =
        storage.namespace(cli.user_id.as_str()).context("deriving a storage namespace from the user id")?;
    let events = Arc::new(EventBus::new());
    RecordStore::load(namespace, events, cli.user_id.clone(), SyncConfig::default())
        .await
        .context("loading the local record store")
}

async fn add_bookmark(
    store: &RecordStore,
    title: String,
    url: String,
    tags: Vec<String>,
    space: Option<String>,
) -> Result<()> {
    let bookmark = Bookmark {
        id: nanoid::nanoid!(),
        title,
        url,
        tags,
        description: None,
        color: None,
        space_id: Some(space.unwrap_or_else(|| PERSONAL_SPACE_ID.to_owned())),
        created_at: Utc::now(),
    };
    bookmark.validate().map_err(|err| anyhow::anyhow!(err.to_string()))?;

    let data = serde_json::to_value(&bookmark).context("serializing the new bookmark")?;
    store.upsert(RecordKind::Bookmark, bookmark.id.clone(), data).await.context("saving the new bookmark")?;

    println!("added bookmark {} ({})", bookmark.id, bookmark.normalized_url());
    Ok(())
}

fn list_bookmarks(store: &RecordStore) -> Result<()> {
    let records = store.list(RecordKind::Bookmark);
    if records.is_empty() {
        println!("no bookmarks yet");
        return Ok(());
    }
    for record in records {
        let bookmark: Bookmark = serde_json::from_value(record.data).context("decoding a stored bookmark")?;
        println!(
            "{}  v{:<4} {}  {}{}",
            bookmark.id,
            record.meta.sync_version,
            bookmark.title,
            bookmark.url,
            if bookmark.tags.is_empty() { String::new() } else { format!("  [{}]", bookmark.tags.join(", ")) }
        );
    }
    Ok(())
}

async fn remove_bookmark(store: &RecordStore, id: &str) -> Result<()> {
    if store.get(RecordKind::Bookmark, id).is_none() {
        bail!("no such bookmark: {id}");
    }
    store.delete(RecordKind::Bookmark, id).await.context("removing the bookmark")?;
    println!("removed {id}");
    Ok(())
}

async fn set_sync_enabled(store: &RecordStore, enabled: bool) -> Result<()> {
    let mut settings = store.settings();
    settings.sync_enabled = enabled;
    if enabled && settings.sync_mode == SyncMode::Off {
        settings.sync_mode = SyncMode::Plaintext;
    }
    if !enabled {
        settings.sync_mode = SyncMode::Off;
    }
    store.set_settings(settings).await.context("saving sync settings")?;
    println!("sync {}", if enabled { "enabled (plaintext)" } else { "disabled" });
    Ok(())
}

async fn run_sync(store: &RecordStore, cli: &Cli) -> Result<()> {
    let settings = store.settings();
    if !settings.sync_enabled || settings.sync_mode == SyncMode::Off {
        bail!("sync is not enabled locally; run `muster enable-sync` first");
    }
    if settings.sync_mode == SyncMode::E2e {
        bail!("this client only drives plaintext sync; vault/e2e mode needs a data key");
    }
    let Some(token) = cli.token.clone() else {
        bail!("--token (or ANCHOR_TOKEN) is required to reach the server");
    };

    let config = SyncConfig::default();
    let transport = HttpTransport::new(cli.server_url.clone(), token);

    let push_outcome = push(
        store,
        &transport,
        settings.sync_mode,
        config.push_batch_size,
        config.push_batch_max,
        None,
    )
    .await
    .context("pushing local changes")?;
    println!("pushed {} record(s), {} conflict(s)", push_outcome.synced, push_outcome.conflicts.len());

    let pulled = pull(
        store,
        &transport,
        settings.sync_mode,
        config.pull_page_limit,
        config.pull_loop_max_iterations,
        None,
    )
    .await
    .context("pulling remote changes")?;
    println!("pulled {pulled} record(s)");

    let mut settings = store.settings();
    settings.last_sync_at = Some(Utc::now());
    store.set_settings(settings).await.context("recording last sync time")?;

    Ok(())
}

fn print_status(store: &RecordStore) -> Result<()> {
    let settings = store.settings();
    println!("user:       {}", store.user_id());
    println!("sync mode:  {:?}", settings.sync_mode);
    println!("enabled:    {}", settings.sync_enabled);
    println!(
        "pending:    {} outbox entr{}",
        store.pending_count(),
        if store.pending_count() == 1 { "y" } else { "ies" }
    );
    match settings.last_sync_at {
        Some(at) => println!("last sync:  {at}"),
        None => println!("last sync:  never"),
    }
    Ok(())
}
