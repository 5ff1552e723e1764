//! `ebisu`: command-line client for the Ebisu vessel registry.
//!
//! # Usage
//!
//! ```
//! ebisu --url http://localhost:8080 ingest iccat-2024-03.json
//! ebisu search "nuestra senora"
//! ebisu queue --unresolved
//! ebisu triage resolve mmsi 987654321 --reviewer ops --resolution DATA_ERROR
//! ```

mod client;
mod render;

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use client::{ApiClient, ApiConfig};
use ebisu_core::{
  batch::{NewBatch, RawRow},
  collision::CollisionType,
  review::{Resolution, ReviewAction, TriageRequest},
};
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "ebisu", about = "Command-line client for the Ebisu vessel registry")]
struct Args {
  /// Path to a TOML config file (url).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the ebisu server (default: http://localhost:8080).
  #[arg(long, env = "EBISU_URL")]
  url: Option<String>,

  /// Print raw JSON instead of text.
  #[arg(long, global = true)]
  json: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Submit a batch from a JSON file (an array of rows, or a batch object).
  Ingest {
    file:     PathBuf,
    /// Re-use a batch id to make the submission idempotent.
    #[arg(long)]
    batch_id: Option<Uuid>,
    #[arg(long)]
    notes:    Option<String>,
  },
  /// List batches, most recent first.
  Batches,
  /// Show one batch with the audit of every run.
  Batch {
    id:         Uuid,
    /// Also list quarantined rows.
    #[arg(long)]
    quarantine: bool,
  },
  /// Show an entity's current state.
  Entity { id: Uuid },
  /// Show an entity's report: historical values, sources, and conflicts.
  Report {
    id:      Uuid,
    /// Also list the change history.
    #[arg(long)]
    history: bool,
  },
  /// Fuzzy search entities by vessel name.
  Search {
    name:  String,
    #[arg(long)]
    limit: Option<usize>,
  },
  /// List known sources.
  Sources,
  /// List the collision review queue.
  Queue {
    /// Only NEW and ACKNOWLEDGED entries.
    #[arg(long)]
    unresolved: bool,
    /// Only groups involving this entity.
    #[arg(long)]
    entity:     Option<Uuid>,
    /// Only groups detected at or after this RFC 3339 instant.
    #[arg(long)]
    since:      Option<DateTime<Utc>>,
  },
  /// Record a review decision: acknowledge, resolve, dismiss, or reopen.
  Triage {
    action:     ReviewAction,
    /// `mmsi` or `imo`.
    kind:       CollisionType,
    value:      String,
    #[arg(long)]
    reviewer:   Option<String>,
    #[arg(long)]
    notes:      Option<String>,
    /// CHOOSE_EXISTING, REASSIGN_ID, MERGE_ENTITIES, or DATA_ERROR.
    #[arg(long)]
    resolution: Option<Resolution>,
  },
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url: String,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();

  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags override config file, which overrides defaults.
  let api_config = ApiConfig {
    base_url: args
      .url
      .or_else(|| (!file_cfg.url.is_empty()).then(|| file_cfg.url.clone()))
      .unwrap_or_else(|| "http://localhost:8080".to_string()),
  };
  tracing::debug!(url = %api_config.base_url, "using server");

  let client = ApiClient::new(api_config)?;
  run(&client, args.command, args.json).await
}

async fn run(client: &ApiClient, command: Command, json: bool) -> Result<()> {
  match command {
    Command::Ingest { file, batch_id, notes } => {
      let raw = std::fs::read_to_string(&file)
        .with_context(|| format!("reading batch file {}", file.display()))?;
      let mut batch = load_batch(&raw)
        .with_context(|| format!("parsing batch file {}", file.display()))?;
      batch.batch_id = batch_id.or(batch.batch_id);
      batch.notes = notes.or(batch.notes);
      let audit = client.ingest(&batch).await?;
      emit(json, &audit, render::audit)
    }
    Command::Batches => emit(json, &client.list_batches().await?, |b| render::batches(b)),
    Command::Batch { id, quarantine } => {
      let batch = client.get_batch(id).await?;
      let audits = client.batch_audits(id).await?;
      if json {
        let rows = if quarantine { client.quarantined_rows(id).await? } else { Vec::new() };
        return print_json(&serde_json::json!({
          "batch": batch,
          "audits": audits,
          "quarantine": rows,
        }));
      }
      print!("{}", render::batches(std::slice::from_ref(&batch)));
      for audit in &audits {
        println!();
        print!("{}", render::audit(audit));
      }
      if quarantine {
        println!();
        print!("{}", render::quarantine(&client.quarantined_rows(id).await?));
      }
      Ok(())
    }
    Command::Entity { id } => emit(json, &client.get_entity(id).await?, render::entity),
    Command::Report { id, history } => {
      let report = client.entity_report(id).await?;
      emit(json, &report, render::report)?;
      if history && !json {
        println!();
        print!("{}", render::history(&client.entity_history(id).await?));
      }
      Ok(())
    }
    Command::Search { name, limit } => {
      emit(json, &client.search(&name, limit).await?, |m| render::matches(m))
    }
    Command::Sources => emit(json, &client.list_sources().await?, |s| render::sources(s)),
    Command::Queue { unresolved, entity, since } => {
      let queue = client.review_queue(unresolved, entity, since).await?;
      emit(json, &queue, |q| render::queue(q))
    }
    Command::Triage { action, kind, value, reviewer, notes, resolution } => {
      let request = TriageRequest { reviewer, notes, resolution };
      let entry = client.triage(kind, &value, action, &request).await?;
      emit(json, &entry, render::queue_entry)
    }
  }
}

/// Accept either a bare JSON array of rows or a full batch object.
fn load_batch(raw: &str) -> Result<NewBatch> {
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum BatchFile {
    Rows(Vec<RawRow>),
    Batch(NewBatch),
  }

  Ok(match serde_json::from_str(raw)? {
    BatchFile::Rows(rows) => NewBatch::new(rows),
    BatchFile::Batch(batch) => batch,
  })
}

fn emit<T: Serialize + ?Sized>(json: bool, value: &T, text: impl Fn(&T) -> String) -> Result<()> {
  if json {
    print_json(value)
  } else {
    print!("{}", text(value));
    Ok(())
  }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}
