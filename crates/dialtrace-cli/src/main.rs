//! `dialtrace`: investigate phone numbers from the command line, or serve
//! the JSON API.
//!
//! # Usage
//!
//! ```text
//! dialtrace --fixtures sources.json investigate "+91 98765 43210" --with-history
//! dialtrace history 9876543210 --summary
//! dialtrace patterns 9000000000 --related-to 9000000005
//! dialtrace serve
//! ```
//!
//! Network adapters are not built in. `--fixtures` loads a JSON file of
//! canned per-source responses (see [`dialtrace_engine::adapters::FixtureSet`])
//! so the whole pipeline can run offline. Without it only the local pattern
//! analysis source runs.

mod settings;

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::{Duration, Instant},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use dialtrace_core::source::SourceId;
use dialtrace_engine::{
  Investigator, Progress, RunOptions, adapters::FixtureSet,
};
use dialtrace_store_sqlite::SqliteHistoryStore;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::settings::AppConfig;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "dialtrace", version, about = "Phone number intelligence")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "dialtrace.toml")]
  config: PathBuf,

  /// JSON file of canned per-source responses.
  #[arg(long, value_name = "FILE", global = true)]
  fixtures: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Serve the JSON API.
  Serve,

  /// Investigate a number and record the result.
  Investigate {
    identifier: String,
    /// Country context, e.g. IN or US.
    #[arg(long, default_value = "IN")]
    context:      String,
    /// Query sources one at a time in registry order.
    #[arg(long, conflicts_with = "with_history")]
    sequential:   bool,
    /// Also analyse the result against prior history.
    #[arg(long)]
    with_history: bool,
    /// Only query these sources (comma-separated).
    #[arg(long, value_delimiter = ',', conflicts_with = "sequential")]
    sources:      Vec<String>,
    /// Skip priority groups not started within this many milliseconds.
    #[arg(long, value_name = "MS")]
    deadline:     Option<u64>,
  },

  /// Show recorded history for a number.
  History {
    identifier: String,
    #[arg(long)]
    limit:      Option<usize>,
    /// Print the full summary (timeline, porting, ownership, stability).
    #[arg(long)]
    summary:    bool,
  },

  /// Carrier transitions and porting verdict.
  Porting { identifier: String },

  /// Ownership-change indicators.
  Ownership { identifier: String },

  /// Pattern analysis for a number.
  Patterns {
    identifier: String,
    #[arg(long, default_value = "IN")]
    context:    String,
    /// Also score the relationship to this number.
    #[arg(long, value_name = "NUMBER")]
    related_to: Option<String>,
  },

  /// Delete history older than the retention period.
  Cleanup {
    #[arg(long, default_value_t = 365)]
    retention_days: u32,
  },
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  let cfg = AppConfig::load(&cli.config)?;

  if let Some(parent) = cfg.store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }
  let store = SqliteHistoryStore::open(&cfg.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", cfg.store_path))?;

  let mut investigator = Investigator::new(cfg.engine.clone(), store);
  if let Some(path) = &cli.fixtures {
    investigator = investigator.with_adapters(load_fixtures(path)?.into_adapters());
  }
  tracing::debug!(sources = ?investigator.sources(), "adapters registered");

  match cli.command {
    Command::Serve => serve(&cfg, investigator).await,
    Command::Investigate {
      identifier,
      context,
      sequential,
      with_history,
      sources,
      deadline,
    } => {
      let options = RunOptions {
        deadline: deadline.map(|ms| Instant::now() + Duration::from_millis(ms)),
        progress: Some(Arc::new(|p: &Progress| {
          tracing::info!(source = %p.source, success = p.success, "{p}");
        })),
      };
      let sources: Vec<SourceId> = sources.iter().map(SourceId::new).collect();
      let filter = (!sources.is_empty()).then_some(sources.as_slice());
      if with_history {
        let report = investigator
          .investigate_with_history(&identifier, &context, filter, options)
          .await?;
        print_json(&report)
      } else if sequential {
        print_json(&investigator.investigate(&identifier, &context).await?)
      } else {
        let snapshot = investigator
          .investigate_async(&identifier, &context, filter, options)
          .await?;
        print_json(&snapshot)
      }
    }
    Command::History { identifier, limit, summary } => {
      if summary {
        print_json(&investigator.history_summary(&identifier).await?)
      } else {
        print_json(&investigator.history(&identifier, limit).await?)
      }
    }
    Command::Porting { identifier } => {
      print_json(&investigator.detect_porting(&identifier).await?)
    }
    Command::Ownership { identifier } => {
      print_json(&investigator.detect_ownership_change(&identifier).await?)
    }
    Command::Patterns { identifier, context, related_to } => {
      print_json(&investigator.analyze_patterns(&identifier, &context)?)?;
      if let Some(other) = related_to {
        let confidence =
          investigator.relationship_confidence(&identifier, &other, &context)?;
        print_json(&serde_json::json!({ "relationship_confidence": confidence }))?;
      }
      Ok(())
    }
    Command::Cleanup { retention_days } => {
      let report = investigator
        .cleanup(retention_days)
        .await
        .context("history cleanup failed")?;
      print_json(&report)
    }
  }
}

async fn serve(
  cfg: &AppConfig,
  investigator: Investigator<SqliteHistoryStore>,
) -> anyhow::Result<()> {
  let app = axum::Router::new()
    .merge(dialtrace_api::api_router(Arc::new(investigator)))
    .layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", cfg.host, cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

fn load_fixtures(path: &Path) -> anyhow::Result<FixtureSet> {
  let raw = std::fs::read_to_string(path)
    .with_context(|| format!("reading fixture file {}", path.display()))?;
  FixtureSet::from_json(&raw).context("parsing fixture file")
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}
