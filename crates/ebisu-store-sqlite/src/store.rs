//! [`SqliteStore`]: the SQLite implementation of [`RegistryStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension as _, TransactionBehavior};
use tracing::{debug, info};
use uuid::Uuid;

use ebisu_core::{
  batch::{Batch, BatchAudit, NewBatch, QuarantinedRow},
  collision::{CollisionRecord, CollisionType},
  entity::{
    CanonicalEntity, EntityMatch, EntityReport, EntitySource, HistoryRecord, InitialValues,
  },
  reference::{Country, builtin_countries},
  review::{self, QueueEntry, QueueFilter, ReviewAction, ReviewEntry, TriageRequest},
  search::{self, DEFAULT_LIMIT},
  source::{EntityProvenance, Source},
  store::{EntityQuery, RegistryStore},
};

use crate::{
  Error, Result,
  encode::{
    AUDIT_COLUMNS, BATCH_COLUMNS, COLLISION_COLUMNS, ENTITY_COLUMNS, HISTORY_COLUMNS,
    RawAudit, RawBatch, RawCollision, RawEntity, RawHistory, RawIdentifier, RawLink,
    RawQuarantined, RawReviewEntry, RawSource, REVIEW_COLUMNS, SOURCE_COLUMNS,
    country_from_row, decode_date, encode_dt, encode_enum, encode_uuid,
  },
  ingest::BatchRun,
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// An Ebisu registry backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. All calls
/// share one connection thread, so batch runs are serialized.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Create tables and seed the country reference data.
  async fn init_schema(&self) -> Result<()> {
    let countries = builtin_countries();
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(SCHEMA)?;
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO countries (alpha3, alpha2, numeric, name)
             VALUES (?1, ?2, ?3, ?4)",
          )?;
          for c in &countries {
            stmt.execute(rusqlite::params![c.alpha3, c.alpha2, c.numeric, c.name])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Every collision on record, in detection order.
  async fn load_collisions(&self) -> Result<Vec<CollisionRecord>> {
    let raws: Vec<RawCollision> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {COLLISION_COLUMNS} FROM collisions ORDER BY detected_at, rowid"
        ))?;
        let rows = stmt
          .query_map([], RawCollision::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawCollision::into_record).collect()
  }

  async fn load_review_entries(&self) -> Result<Vec<ReviewEntry>> {
    let raws: Vec<RawReviewEntry> = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare(&format!("SELECT {REVIEW_COLUMNS} FROM review_entries"))?;
        let rows = stmt
          .query_map([], RawReviewEntry::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawReviewEntry::into_entry).collect()
  }

  /// The values an entity was created with. Empty if it predates the
  /// origins table.
  async fn initial_values(&self, entity_id: Uuid) -> Result<InitialValues> {
    let id_str = encode_uuid(entity_id);

    let initial = self
      .conn
      .call(move |conn| {
        let initial = conn
          .query_row(
            "SELECT vessel_name, imo, mmsi FROM entity_origins WHERE entity_id = ?1",
            rusqlite::params![id_str],
            |row| {
              Ok(InitialValues {
                vessel_name: row.get(0)?,
                imo:         row.get(1)?,
                mmsi:        row.get(2)?,
              })
            },
          )
          .optional()?;
        Ok(initial)
      })
      .await?;

    Ok(initial.unwrap_or_default())
  }

  /// Sources linked to an entity, joined with their link dates.
  async fn entity_sources(&self, entity_id: Uuid) -> Result<Vec<EntitySource>> {
    let id_str = encode_uuid(entity_id);

    let raws: Vec<(RawSource, String, String, bool)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT s.source_id, s.short_name, s.full_name, s.type_tags, s.status,
                  l.first_seen_date, l.last_seen_date, l.is_active
           FROM source_links l
           JOIN sources s ON s.source_id = l.source_id
           WHERE l.entity_id = ?1
           ORDER BY l.first_seen_date, s.short_name",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok((RawSource::from_row(row)?, row.get(5)?, row.get(6)?, row.get(7)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|(source, first, last, is_active)| {
        Ok(EntitySource {
          source: source.into_source()?,
          first_seen_date: decode_date(&first)?,
          last_seen_date: decode_date(&last)?,
          is_active,
        })
      })
      .collect()
  }
}

#[cfg(test)]
impl SqliteStore {
  pub(crate) async fn execute_raw(&self, sql: &'static str) -> Result<()> {
    self.conn.call(move |conn| Ok(conn.execute_batch(sql)?)).await?;
    Ok(())
  }

  /// Row count of every table, in schema order.
  pub(crate) async fn table_counts(&self) -> Result<Vec<(&'static str, i64)>> {
    const TABLES: [&str; 11] = [
      "sources",
      "batches",
      "batch_audits",
      "quarantined_rows",
      "entities",
      "entity_origins",
      "entity_history",
      "source_links",
      "source_identifiers",
      "collisions",
      "review_entries",
    ];
    let counts = self
      .conn
      .call(|conn| {
        TABLES
          .iter()
          .map(|table| {
            let count: i64 =
              conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))?;
            Ok((*table, count))
          })
          .collect::<Result<Vec<_>, tokio_rusqlite::Error>>()
      })
      .await?;
    Ok(counts)
  }
}

// ─── RegistryStore impl ──────────────────────────────────────────────────────

impl RegistryStore for SqliteStore {
  type Error = Error;

  // ── Ingestion ─────────────────────────────────────────────────────────────

  async fn ingest_batch(&self, batch: NewBatch) -> Result<BatchAudit> {
    let checksum = batch.checksum()?;
    let batch_id = batch.batch_id.unwrap_or_else(Uuid::new_v4);
    let now = Utc::now();
    debug!(%batch_id, rows = batch.rows.len(), "processing batch");

    let outcome: Result<BatchAudit> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let run = BatchRun { batch_id, checksum, now, batch: &batch };
        // Dropping `tx` without committing rolls the batch back.
        match run.execute(&tx) {
          Ok(audit) => {
            tx.commit()?;
            Ok(Ok(audit))
          }
          Err(e) => Ok(Err(e)),
        }
      })
      .await?;

    let audit = outcome?;
    info!(
      %batch_id,
      rows = audit.row_count,
      inserted = audit.inserted_count,
      updated = audit.updated_count,
      history = audit.history_count,
      quarantined = audit.quarantined_count,
      collisions = audit.collision_count,
      "batch processed",
    );
    Ok(audit)
  }

  async fn get_batch(&self, batch_id: Uuid) -> Result<Option<Batch>> {
    let id_str = encode_uuid(batch_id);

    let raw: Option<RawBatch> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {BATCH_COLUMNS} FROM batches WHERE batch_id = ?1"),
            rusqlite::params![id_str],
            RawBatch::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawBatch::into_batch).transpose()
  }

  async fn list_batches(&self) -> Result<Vec<Batch>> {
    let raws: Vec<RawBatch> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {BATCH_COLUMNS} FROM batches ORDER BY loaded_at DESC, rowid DESC"
        ))?;
        let rows = stmt
          .query_map([], RawBatch::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawBatch::into_batch).collect()
  }

  async fn batch_audits(&self, batch_id: Uuid) -> Result<Vec<BatchAudit>> {
    let id_str = encode_uuid(batch_id);

    let raws: Vec<RawAudit> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {AUDIT_COLUMNS} FROM batch_audits WHERE batch_id = ?1 ORDER BY audit_id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawAudit::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAudit::into_audit).collect()
  }

  async fn quarantined_rows(&self, batch_id: Uuid) -> Result<Vec<QuarantinedRow>> {
    let id_str = encode_uuid(batch_id);

    let raws: Vec<RawQuarantined> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT batch_id, row_index, reason, row_json, quarantined_at
           FROM quarantined_rows WHERE batch_id = ?1 ORDER BY row_index",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok(RawQuarantined {
              batch_id:       row.get(0)?,
              row_index:      row.get(1)?,
              reason:         row.get(2)?,
              row_json:       row.get(3)?,
              quarantined_at: row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawQuarantined::into_row).collect()
  }

  // ── Entities ──────────────────────────────────────────────────────────────

  async fn get_entity(&self, entity_id: Uuid) -> Result<Option<CanonicalEntity>> {
    let id_str = encode_uuid(entity_id);

    let raw: Option<RawEntity> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {ENTITY_COLUMNS} FROM entities WHERE entity_id = ?1"),
            rusqlite::params![id_str],
            RawEntity::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawEntity::into_entity).transpose()
  }

  async fn search_entities(&self, query: &EntityQuery) -> Result<Vec<EntityMatch>> {
    let folded = search::fold(&query.name);
    if folded.is_empty() {
      return Ok(Vec::new());
    }
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);

    let raws: Vec<RawEntity> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ENTITY_COLUMNS} FROM entities WHERE vessel_name IS NOT NULL"
        ))?;
        let rows = stmt
          .query_map([], RawEntity::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let mut hits = Vec::new();
    for raw in raws {
      let Some(score) = raw.vessel_name.as_deref().and_then(|n| search::score(&folded, n))
      else {
        continue;
      };
      hits.push(EntityMatch { entity: raw.into_entity()?, score });
    }

    hits.sort_by(|a, b| {
      b.score
        .total_cmp(&a.score)
        .then_with(|| a.entity.vessel_name.cmp(&b.entity.vessel_name))
    });
    hits.truncate(limit);
    Ok(hits)
  }

  async fn entity_history(&self, entity_id: Uuid) -> Result<Vec<HistoryRecord>> {
    let id_str = encode_uuid(entity_id);

    let raws: Vec<RawHistory> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {HISTORY_COLUMNS} FROM entity_history
           WHERE entity_id = ?1 ORDER BY recorded_at, rowid"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawHistory::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawHistory::into_record).collect()
  }

  async fn entity_report(&self, entity_id: Uuid) -> Result<Option<EntityReport>> {
    let entity = match self.get_entity(entity_id).await? {
      Some(e) => e,
      None => return Ok(None),
    };

    let initial = self.initial_values(entity_id).await?;
    let history = self.entity_history(entity_id).await?;
    let sources = self.entity_sources(entity_id).await?;

    Ok(Some(EntityReport::build(entity, &initial, &history, sources)))
  }

  async fn entity_provenance(&self, entity_id: Uuid) -> Result<EntityProvenance> {
    let id_str = encode_uuid(entity_id);

    let (links, identifiers): (Vec<RawLink>, Vec<RawIdentifier>) = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT entity_id, source_id, first_seen_date, last_seen_date, is_active
           FROM source_links WHERE entity_id = ?1 ORDER BY first_seen_date, rowid",
        )?;
        let links = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok(RawLink {
              entity_id:       row.get(0)?,
              source_id:       row.get(1)?,
              first_seen_date: row.get(2)?,
              last_seen_date:  row.get(3)?,
              is_active:       row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare(
          "SELECT entity_id, source_id, identifier_type, identifier_value
           FROM source_identifiers WHERE entity_id = ?1 ORDER BY rowid",
        )?;
        let identifiers = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok(RawIdentifier {
              entity_id:        row.get(0)?,
              source_id:        row.get(1)?,
              identifier_type:  row.get(2)?,
              identifier_value: row.get(3)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((links, identifiers))
      })
      .await?;

    Ok(EntityProvenance {
      links:       links.into_iter().map(RawLink::into_link).collect::<Result<_>>()?,
      identifiers: identifiers
        .into_iter()
        .map(RawIdentifier::into_identifier)
        .collect::<Result<_>>()?,
    })
  }

  // ── Reference data ────────────────────────────────────────────────────────

  async fn list_sources(&self) -> Result<Vec<Source>> {
    let raws: Vec<RawSource> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SOURCE_COLUMNS} FROM sources ORDER BY short_name"
        ))?;
        let rows = stmt
          .query_map([], RawSource::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSource::into_source).collect()
  }

  async fn list_countries(&self) -> Result<Vec<Country>> {
    let countries = self
      .conn
      .call(|conn| {
        let mut stmt = conn
          .prepare("SELECT alpha3, alpha2, numeric, name FROM countries ORDER BY name")?;
        let rows = stmt
          .query_map([], country_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(countries)
  }

  // ── Review queue ──────────────────────────────────────────────────────────

  async fn review_queue(&self, filter: &QueueFilter) -> Result<Vec<QueueEntry>> {
    let collisions = self.load_collisions().await?;
    let entries = self.load_review_entries().await?;

    let mut queue = review::aggregate(&collisions, &entries);
    queue.retain(|entry| filter.matches(entry));
    Ok(queue)
  }

  async fn triage(
    &self,
    identifier_type: CollisionType,
    identifier_value: String,
    action: ReviewAction,
    request: TriageRequest,
  ) -> Result<QueueEntry> {
    let now = Utc::now();
    let type_str = encode_enum(identifier_type);

    let outcome: Result<QueueEntry> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let collisions = {
          let mut stmt = tx.prepare(&format!(
            "SELECT {COLLISION_COLUMNS} FROM collisions
             WHERE identifier_type = ?1 AND identifier_value = ?2
             ORDER BY detected_at, rowid"
          ))?;
          stmt
            .query_map(rusqlite::params![type_str, identifier_value], RawCollision::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        if collisions.is_empty() {
          return Ok(Err(Error::CollisionNotFound { identifier_type, identifier_value }));
        }

        let current = tx
          .query_row(
            &format!(
              "SELECT {REVIEW_COLUMNS} FROM review_entries
               WHERE identifier_type = ?1 AND identifier_value = ?2"
            ),
            rusqlite::params![type_str, identifier_value],
            RawReviewEntry::from_row,
          )
          .optional()?;

        let decided = record_decision(
          &tx,
          collisions,
          current,
          identifier_type,
          &identifier_value,
          action,
          request,
          now,
        );

        match decided {
          Ok(entry) => {
            tx.commit()?;
            Ok(Ok(entry))
          }
          Err(e) => Ok(Err(e)),
        }
      })
      .await?;

    let entry = outcome?;
    info!(
      %identifier_type,
      identifier_value = %entry.identifier_value,
      %action,
      status = %entry.status,
      "triage recorded",
    );
    Ok(entry)
  }
}

/// Apply a triage action to an identifier's current review entry and persist
/// the result. Returns the identifier's refreshed queue entry.
#[allow(clippy::too_many_arguments)]
fn record_decision(
  tx: &rusqlite::Transaction<'_>,
  collisions: Vec<RawCollision>,
  current: Option<RawReviewEntry>,
  identifier_type: CollisionType,
  identifier_value: &str,
  action: ReviewAction,
  request: TriageRequest,
  now: DateTime<Utc>,
) -> Result<QueueEntry> {
  let collisions = collisions
    .into_iter()
    .map(RawCollision::into_record)
    .collect::<Result<Vec<_>>>()?;
  let current = current.map(RawReviewEntry::into_entry).transpose()?;
  let entry = review::transition(
    identifier_type,
    identifier_value,
    current.as_ref(),
    action,
    request,
    now,
  )?;

  tx.execute(
    "INSERT OR REPLACE INTO review_entries
       (identifier_type, identifier_value, status, resolution, reviewer, notes, updated_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    rusqlite::params![
      encode_enum(identifier_type),
      entry.identifier_value,
      encode_enum(entry.status),
      entry.resolution.map(encode_enum),
      entry.reviewer,
      entry.notes,
      encode_dt(entry.updated_at),
    ],
  )?;

  review::aggregate(&collisions, std::slice::from_ref(&entry))
    .into_iter()
    .next()
    .ok_or_else(|| Error::CollisionNotFound {
      identifier_type,
      identifier_value: identifier_value.to_owned(),
    })
}
