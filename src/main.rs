use charpage::cache::{
  DataOrchestrator, FetchResult, LocalStore, MemoryStore, Page, PageSource, SqliteStore,
};
use charpage::catalog::{namespace_for, Character, HttpCharacterSource};
use charpage::config::Config;
use charpage::logging;
use charpage::paging::PagingTracker;
use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "charpage")]
#[command(about = "Browse a remote character catalogue through a local cache")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/charpage/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Print pages of characters, cached snapshot first
  Page {
    /// Offset of the first page
    #[arg(short, long, default_value_t = 0)]
    offset: u32,

    /// Fetch from the first page and replace the whole cache
    #[arg(short, long, conflicts_with = "offset")]
    refresh: bool,

    /// Number of consecutive pages to load
    #[arg(short = 'n', long, default_value_t = 1)]
    pages: u32,
  },
  /// Inspect or reset the local cache
  Cache {
    #[command(subcommand)]
    action: CacheAction,
  },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
  /// Show how many characters are cached
  Stats,
  /// Remove every cached character
  Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let config = Config::load(args.config.as_deref())?;
  let _log_guard = logging::init(&config.log)?;

  match args.command {
    Command::Page {
      offset,
      refresh,
      pages,
    } => {
      let mut tracker = PagingTracker::starting_at(offset, false);
      if refresh {
        tracker.refresh();
      }

      let remote = HttpCharacterSource::new(&config.remote, Config::get_api_token())?;
      if config.cache.enabled {
        let store = open_store(&config)?;
        load_pages(DataOrchestrator::new(store, remote), tracker, pages).await
      } else {
        let store = MemoryStore::new(config.remote.page_size);
        load_pages(DataOrchestrator::new(store, remote), tracker, pages).await
      }
    }
    Command::Cache { action } => {
      if !config.cache.enabled {
        println!("Cache is disabled in the configuration");
        return Ok(());
      }
      let store = open_store(&config)?;
      match action {
        CacheAction::Stats => {
          let stats = store.stats::<Character>()?;
          println!("Cached characters: {}", stats.items);
          match stats.last_cached_at {
            Some(at) => println!("Last updated:      {}", at.to_rfc3339()),
            None => println!("Last updated:      never"),
          }
        }
        CacheAction::Clear => {
          LocalStore::<Character>::replace_all(&store, 0, &[]).await?;
          println!("Cache cleared");
        }
      }
      Ok(())
    }
  }
}

fn open_store(config: &Config) -> Result<SqliteStore> {
  SqliteStore::open(
    config.cache.path.as_deref(),
    &namespace_for(&config.remote.base_url),
    config.remote.page_size,
  )
}

/// Load `pages` consecutive pages, printing every result as it arrives.
async fn load_pages<L>(
  orchestrator: DataOrchestrator<Character, L, HttpCharacterSource>,
  mut tracker: PagingTracker,
  pages: u32,
) -> Result<()>
where
  L: LocalStore<Character>,
{
  for _ in 0..pages {
    let request = tracker.request();
    let mut stream = orchestrator.fetch(request);
    let mut latest: Option<Page<Character>> = None;

    while let Some(result) = stream.next_result().await {
      match result {
        FetchResult::Success(page) => {
          print_page(&page);
          latest = Some(page);
        }
        FetchResult::Failure(e) => {
          return Err(eyre!("Page at offset {} failed: {}", request.offset, e));
        }
      }
    }

    match latest {
      Some(page) if !page.is_empty() => tracker.advance(page.items.len()),
      _ => {
        info!(offset = request.offset, "Reached the end of the catalogue");
        break;
      }
    }
  }

  Ok(())
}

fn print_page(page: &Page<Character>) {
  let source = match page.source {
    PageSource::Cache => "cache",
    PageSource::Remote => "remote",
  };
  println!(
    "-- offset {} ({}, {} items)",
    page.offset,
    source,
    page.items.len()
  );
  for character in &page.items {
    println!("{:>10}  {}", character.id, character.name);
  }
}
