mod app;
mod config;
mod constants;
mod detail;
mod error;
mod input;
mod keys;
mod logging;
mod movie;
mod omdb;
mod poster;
mod rating;
mod search;
mod store;
mod theme;
mod ui;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use ratatui::{
  DefaultTerminal,
  crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::SetTitle,
  },
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use app::App;
use config::Config;
use omdb::OmdbClient;
use store::{FileStorage, MemoryStorage, PersistedValue, StorageBackend};

// --- CLI ---

#[derive(Parser, Debug)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about, long_about = None)]
struct Args {
  /// OMDb API key (overrides OMDB_API_KEY and config.toml)
  #[arg(long)]
  api_key: Option<String>,

  /// Base URL of the movie database
  #[arg(long)]
  base_url: Option<String>,

  /// Name of the slot the watched list is stored under
  #[arg(long)]
  storage_key: Option<String>,

  /// Request timeout in seconds
  #[arg(long)]
  timeout: Option<u64>,

  /// Log filter, e.g. 'info' or 'popcorn=debug'
  #[arg(long)]
  log_level: Option<String>,

  /// Directory for the watched list and the log file
  #[arg(long)]
  data_dir: Option<PathBuf>,

  /// Print shell completions and exit
  #[arg(long, value_name = "SHELL")]
  completions: Option<clap_complete::Shell>,
}

impl Args {
  fn config_layer(&self) -> Config {
    Config {
      api_key: self.api_key.clone(),
      base_url: self.base_url.clone(),
      storage_key: self.storage_key.clone(),
      request_timeout_secs: self.timeout,
      log_level: self.log_level.clone(),
      ..Config::default()
    }
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  if let Some(shell) = args.completions {
    clap_complete::generate(shell, &mut Args::command(), env!("CARGO_PKG_NAME"), &mut std::io::stdout());
    return Ok(());
  }

  // Read before logging exists; a broken file is reported once the log is up.
  let loaded = Config::load();
  let file_config = loaded.as_ref().map(Config::clone).unwrap_or_default();
  let settings =
    file_config.clone().merge(Config::from_env(|name| std::env::var(name).ok())).merge(args.config_layer()).settings()?;

  let data_dir = args
    .data_dir
    .clone()
    .or_else(config::default_data_dir)
    .context("Could not determine a data directory; pass --data-dir")?;
  let _log_guard = logging::init(&data_dir, &settings.log_level)?;
  info!(base_url = %settings.base_url, storage_key = %settings.storage_key, "starting");
  if let Err(e) = &loaded {
    warn!(err = %format!("{:#}", e), "ignoring unreadable config file");
  }

  let backend: Box<dyn StorageBackend> = match FileStorage::new(data_dir.clone()) {
    Ok(storage) => Box::new(storage),
    Err(e) => {
      warn!(dir = %data_dir.display(), err = %e, "falling back to in-memory storage");
      Box::new(MemoryStorage::default())
    }
  };
  let watched = PersistedValue::load(backend, &settings.storage_key, Vec::new());
  let api = Arc::new(OmdbClient::new(&settings.base_url, &settings.api_key, settings.timeout)?);
  let mut app = App::new(api, watched, &settings, file_config);

  let default_hook = std::panic::take_hook();
  std::panic::set_hook(Box::new(move |info| {
    ratatui::restore();
    default_hook(info);
  }));

  let mut terminal = ratatui::init();
  let result = run(&mut terminal, &mut app);
  app.shutdown();
  let _ = execute!(std::io::stdout(), SetTitle(""));
  ratatui::restore();
  info!("exiting");
  result
}

fn run(terminal: &mut DefaultTerminal, app: &mut App) -> Result<()> {
  let mut title = String::new();

  loop {
    app.check_pending();

    let wanted = app.window_title();
    if wanted != title {
      execute!(std::io::stdout(), SetTitle(&wanted))?;
      title = wanted;
    }

    terminal.draw(|frame| ui::ui(frame, app))?;

    if event::poll(Duration::from_millis(100))? {
      match event::read()? {
        Event::Key(key) if key.kind == KeyEventKind::Press => input::handle_key_event(app, key),
        _ => {}
      }
    }

    if app.should_quit {
      break;
    }
  }
  Ok(())
}
