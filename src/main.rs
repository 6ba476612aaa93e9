use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::sync::mpsc;

use voyager::app::{build_loader, user_handle, App, AppEvent};
use voyager::config::Config;
use voyager::feed::{FetchOutcome, FeedLoader};
use voyager::filters::HiddenPosts;
use voyager::lemmy::{FeedItem, FeedKind, LemmyClient, ListingType, SortType};
use voyager::storage::{Database, DatabaseError, HIDDEN_PAGE_SIZE};
use voyager::util::{normalize_instance_url, relative_time, strip_control_chars};

/// Get the config directory path (~/.config/voyager/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("voyager"))
}

#[derive(Parser, Debug)]
#[command(name = "voyager", about = "Terminal reader for Lemmy")]
struct Args {
    /// Instance to browse, e.g. lemmy.world (overrides the config file)
    #[arg(long)]
    instance: Option<String>,

    /// Listing to open: all, local or home
    #[arg(long)]
    listing: Option<ListingType>,

    /// Sort to use, e.g. Hot, New, TopDay
    #[arg(long)]
    sort: Option<SortType>,

    /// Config file (default: ~/.config/voyager/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Reset database (forget stored sorts and hidden posts)
    #[arg(long)]
    reset_db: bool,

    /// Print this page of hidden posts, most recently hidden first, and exit
    #[arg(long, value_name = "PAGE")]
    hidden: Option<u32>,

    /// Print this many pages of the listing to stdout and exit
    #[arg(long, value_name = "PAGES")]
    dump: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
    }

    // User-only access: the directory holds the database and possibly a JWT
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o700);
        if let Err(e) = std::fs::set_permissions(&config_dir, perms) {
            tracing::warn!(
                path = %config_dir.display(),
                error = %e,
                "Failed to set config directory permissions to 0700"
            );
        }
    }

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    // CLI flags win over the config file
    if let Some(instance) = &args.instance {
        config.instance = instance.clone();
    }
    if let Some(listing) = args.listing {
        config.default_listing = listing;
    }
    if let Some(sort) = args.sort {
        config.default_sort = sort;
    }

    let instance = normalize_instance_url(&config.instance)
        .with_context(|| format!("Invalid instance '{}'", config.instance))?;
    let client = LemmyClient::new(instance, config.jwt_secret())
        .context("Failed to create HTTP client")?;
    tracing::info!(instance = %client.api_base(), authenticated = client.is_authenticated(), "Using instance");

    if let Some(pages) = args.dump {
        return dump(&client, &config, pages).await;
    }

    let db_path = config_dir.join("voyager.db");
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!(
                "Error: Another instance of voyager appears to be running. Please close it and try again."
            );
            std::process::exit(1);
        }
        Err(e) => {
            return Err(anyhow::anyhow!("Failed to open database: {}", e));
        }
    };

    if args.reset_db {
        db.reset().await.context("Failed to reset database")?;
        println!("Database reset.");
    }

    if let Some(page) = args.hidden {
        return list_hidden(&db, &user_handle(&client), page).await;
    }

    let mut app = App::new(db, client, config);
    app.load_persisted()
        .await
        .context("Failed to load saved state")?;

    let (event_tx, event_rx) = mpsc::channel::<AppEvent>(32);

    voyager::ui::run(&mut app, event_tx, event_rx).await?;

    Ok(())
}

/// Non-interactive mode: load `pages` pages and print one line per item.
async fn dump(client: &LemmyClient, config: &Config, pages: u32) -> Result<()> {
    let kind = FeedKind::Posts(config.default_listing);
    let loader: FeedLoader<FeedItem> =
        build_loader(client, config, &HiddenPosts::default(), kind, config.default_sort);

    let mut refresh = true;
    for _ in 0..pages {
        match loader.fetch_more(refresh).await? {
            FetchOutcome::Loaded { received, added } => {
                tracing::debug!(received, added, "Page loaded");
            }
            FetchOutcome::Skipped(reason) => {
                tracing::debug!(?reason, "Stopping");
                break;
            }
            FetchOutcome::Cancelled => break,
        }
        refresh = false;
    }

    for item in loader.visible_items() {
        let line = match &item {
            FeedItem::Post(view) => format!(
                "{}\t{}\t{}\t{}",
                view.post.id,
                view.counts.score,
                view.community.handle(),
                strip_control_chars(&view.post.name)
            ),
            FeedItem::Reply(view) => format!(
                "{}\t{}\t{}",
                view.comment_reply.id,
                view.creator.handle(),
                strip_control_chars(&view.comment.content)
            ),
            FeedItem::Modlog(entry) => format!("{}\t{}", entry.key(), entry.label()),
        };
        println!("{}", line);
    }

    let (page, at_end) = (loader.numbered_page(), loader.is_at_end());
    eprintln!(
        "{} items from {} page(s) of {} sorted by {}{}",
        loader.visible_len(),
        page,
        kind.title(),
        config.default_sort,
        if at_end { " (end of feed)" } else { "" }
    );
    Ok(())
}

/// Print one page of hidden post ids with when they were hidden.
async fn list_hidden(db: &Database, user_handle: &str, page: u32) -> Result<()> {
    let rows = db
        .get_hidden_post_metadatas(user_handle, page)
        .await
        .context("Failed to read hidden posts")?;

    let now = chrono::Utc::now();
    for row in &rows {
        let when = chrono::DateTime::from_timestamp(row.updated_at, 0)
            .map(|t| relative_time(t, now))
            .unwrap_or_else(|| "unknown".to_string());
        println!("{}\t{}", row.post_id, when);
    }

    if rows.is_empty() {
        eprintln!("No hidden posts on page {} for {}", page.max(1), user_handle);
    } else if rows.len() as i64 == HIDDEN_PAGE_SIZE {
        eprintln!("More on page {}", page.max(1) + 1);
    }
    Ok(())
}
