//! `sift` — terminal chat front-end for the Cortex analyst API.
//!
//! # Usage
//!
//! ```
//! sift --url https://myorg-myaccount.snowflakecomputing.com --token $PAT
//! sift --config ~/.config/sift/sift.toml
//! ```

mod app;
mod settings;
mod ui;

use std::{
  fs::OpenOptions,
  io,
  path::{Path, PathBuf},
  sync::Mutex,
  time::Duration,
};

use anyhow::{Context, Result};
use app::{App, Prompts};
use clap::Parser;
use crossterm::{
  event::{self, Event},
  execute,
  terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use settings::Settings;
use sift_core::{
  orchestrator::Planner,
  session::{SemanticModels, Session},
};
use sift_http::{ClientConfig, CortexClient};
use sift_warehouse_sqlite::{DEMO_SCRIPT, SqliteWarehouse};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "sift", version, about = "Ask your data questions from the terminal")]
struct Args {
  /// Path to a TOML config file.
  #[arg(short, long, value_name = "FILE", default_value = "sift.toml")]
  config: PathBuf,

  /// Account base URL of the analyst API.
  #[arg(long, env = "SIFT_URL")]
  url: Option<String>,

  /// Bearer token for the analyst API.
  #[arg(long, env = "SIFT_TOKEN", hide_env_values = true)]
  token: Option<String>,

  /// Which endpoint answers questions: `graph_plan` or `analyst_message`.
  #[arg(long)]
  planner: Option<Planner>,

  /// SQLite database to run generated SQL against (`:memory:` for a demo).
  #[arg(long, value_name = "PATH")]
  warehouse: Option<String>,

  /// Write logs to this file (the terminal belongs to the UI).
  #[arg(long, value_name = "FILE")]
  log_file: Option<PathBuf>,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  // CLI flags override environment, which overrides the config file.
  let mut settings = Settings::load(Some(args.config.as_path()))?;
  if let Some(url) = args.url {
    settings.base_url = url;
  }
  if let Some(token) = args.token {
    settings.token = Some(token);
  }
  if let Some(planner) = args.planner {
    settings.planner = planner;
  }
  if let Some(warehouse) = args.warehouse {
    settings.warehouse = warehouse;
  }
  if let Some(log_file) = args.log_file {
    settings.log_file = Some(log_file);
  }

  if let Some(path) = &settings.log_file {
    init_tracing(path)?;
  }
  tracing::info!(base_url = %settings.base_url, planner = %settings.planner, "starting sift");

  let client = CortexClient::new(ClientConfig {
    base_url:   settings.base_url.clone(),
    token:      settings.token.clone(),
    token_type: settings.token_type.clone(),
    model:      settings.model.clone(),
    timeout:    settings.timeout(),
  })
  .context("configuring analyst client")?;

  let warehouse = open_warehouse(&settings).await?;

  let session = Session::new(SemanticModels::new(settings.semantic_models.clone()));
  let prompts = Prompts {
    system_prompt:    settings.system_prompt.clone(),
    opening_question: settings.opening_question.clone(),
  };
  let mut app = App::new(session, client, warehouse, settings.planner, prompts);

  // Set up the terminal.
  enable_raw_mode().context("enabling raw mode")?;
  let mut stdout = io::stdout();
  execute!(stdout, EnterAlternateScreen).context("entering alternate screen")?;
  let backend = CrosstermBackend::new(stdout);
  let mut terminal = Terminal::new(backend).context("creating terminal")?;

  // Run the event loop; restore terminal even on error.
  let run_result = run_event_loop(&mut terminal, &mut app).await;

  disable_raw_mode().ok();
  execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
  terminal.show_cursor().ok();

  run_result
}

fn init_tracing(path: &Path) -> Result<()> {
  let file = OpenOptions::new()
    .create(true)
    .append(true)
    .open(path)
    .with_context(|| format!("opening log file {}", path.display()))?;
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(Mutex::new(file))
    .with_ansi(false)
    .init();
  Ok(())
}

async fn open_warehouse(settings: &Settings) -> Result<SqliteWarehouse> {
  let warehouse = if settings.in_memory_warehouse() {
    SqliteWarehouse::open_in_memory().await
  } else {
    SqliteWarehouse::open(&settings.warehouse).await
  }
  .with_context(|| format!("opening warehouse {}", settings.warehouse))?;

  if let Some(script) = &settings.warehouse_init {
    warehouse
      .run_script_file(script)
      .await
      .context("running warehouse init script")?;
  } else if settings.in_memory_warehouse() {
    warehouse
      .run_script(DEMO_SCRIPT)
      .await
      .context("loading demo dataset")?;
  }
  let tables = warehouse.table_count().await.context("inspecting warehouse")?;
  tracing::info!(warehouse = %settings.warehouse, tables, "warehouse ready");
  Ok(warehouse)
}

// ─── Event loop ───────────────────────────────────────────────────────────────

async fn run_event_loop(
  terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
  app: &mut App,
) -> Result<()> {
  loop {
    terminal.draw(|f| ui::draw(f, app)).context("drawing frame")?;

    // Show the user turn before waiting on the analyst.
    if app.start_pending_turn().await {
      terminal.draw(|f| ui::draw(f, app)).context("drawing frame")?;
      app.finish_turn().await;
      continue;
    }

    // Poll for an event, yielding control to tokio while waiting.
    let maybe_event = tokio::task::block_in_place(|| {
      if event::poll(Duration::from_millis(50))? {
        Ok::<_, io::Error>(Some(event::read()?))
      } else {
        Ok(None)
      }
    })?;

    if let Some(Event::Key(key)) = maybe_event {
      if !app.handle_key(key).await {
        break;
      }
      app.refresh().await;
    }
  }

  Ok(())
}
