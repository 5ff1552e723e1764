//! The batch pipeline, run synchronously inside one SQLite transaction.
//!
//! Rows are processed strictly in order: pre-filter, match or create, merge,
//! provenance, collision detection. Any error drops the transaction, which
//! rolls back every write made for the batch.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use ebisu_core::{
  batch::{BatchAudit, NewBatch, QuarantineReason, RawRow},
  collision::CollisionType,
  entity::{CanonicalEntity, InitialValues},
  merge::{FieldChange, plan_create, plan_update},
  prefilter::{ContendedIdentifiers, MaskedRow, MatchKey},
  reference::{Country, CountryResolver},
  source::{Source, reported_identifiers},
};
use rusqlite::{OptionalExtension as _, Transaction, params};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    ENTITY_COLUMNS, RawEntity, country_from_row, decode_uuid, encode_date, encode_dt,
    encode_enum, encode_uuid,
  },
};

/// One processing run of a batch.
pub struct BatchRun<'a> {
  pub batch_id: Uuid,
  pub checksum: String,
  pub now:      DateTime<Utc>,
  pub batch:    &'a NewBatch,
}

impl BatchRun<'_> {
  /// Process every row and append the run's audit. The caller commits.
  pub fn execute(self, tx: &Transaction<'_>) -> Result<BatchAudit> {
    let nominal_source = self.batch.source_label();
    self.record_batch(tx, nominal_source)?;

    let resolver = load_resolver(tx)?;
    let contended = ContendedIdentifiers::scan(&self.batch.rows);
    if !contended.is_empty() {
      warn!(
        batch_id = %self.batch_id,
        mmsi = ?contended.mmsi,
        ircs = ?contended.ircs,
        "masking weak identifiers shared by several IMOs",
      );
    }

    let mut audit = BatchAudit {
      batch_id: self.batch_id,
      run_at: self.now,
      row_count: self.batch.rows.len() as u64,
      ..Default::default()
    };
    let mut sources = SourceCache::default();

    for (index, row) in self.batch.rows.iter().enumerate() {
      let masked = contended.mask(row);
      audit.masked_mmsi_count += u64::from(masked.mmsi_masked);
      audit.masked_ircs_count += u64::from(masked.ircs_masked);

      let Some(key) = masked.match_key() else {
        self.quarantine(tx, index, row, &masked)?;
        audit.quarantined_count += 1;
        continue;
      };

      let flag = masked.flag_text.and_then(|text| {
        let resolved = resolver.resolve(text).map(Country::code);
        if resolved.is_none() {
          warn!(batch_id = %self.batch_id, row = index, flag = text, "unresolved flag text");
          audit.unresolved_flag_count += 1;
        }
        resolved
      });

      let source_id = sources.resolve(tx, row.source_label().unwrap_or(nominal_source))?;

      let entity = match find_entity(tx, key)? {
        Some(current) => {
          let written = self.update(tx, &current, &masked, flag, source_id)?;
          audit.history_count += written;
          audit.updated_count += 1;
          written_entity(tx, current.entity_id)?
        }
        None => match self.create(tx, &masked, flag)? {
          Created::Inserted(entity) => {
            audit.inserted_count += 1;
            entity
          }
          // Lost an insert race on the IMO: continue as an update.
          Created::Existing(current) => {
            let written = self.update(tx, &current, &masked, flag, source_id)?;
            audit.history_count += written;
            audit.updated_count += 1;
            written_entity(tx, current.entity_id)?
          }
        },
      };

      audit.source_record_count += self.record_provenance(tx, &entity, source_id, row)?;
      audit.collision_count += self.detect_collisions(tx, &entity)?;
    }

    insert_audit(tx, &audit)?;
    Ok(audit)
  }

  // ── Ledger ────────────────────────────────────────────────────────────────

  fn record_batch(&self, tx: &Transaction<'_>, source_label: &str) -> Result<()> {
    let id_str = encode_uuid(self.batch_id);
    let existing: Option<Option<String>> = tx
      .query_row(
        "SELECT checksum FROM batches WHERE batch_id = ?1",
        params![id_str],
        |r| r.get(0),
      )
      .optional()?;

    match existing {
      Some(Some(existing)) if existing != self.checksum => Err(Error::BatchConflict {
        batch_id: self.batch_id,
        existing,
        incoming: self.checksum.clone(),
      }),
      Some(_) => {
        debug!(batch_id = %self.batch_id, "re-running known batch");
        Ok(())
      }
      None => {
        tx.execute(
          "INSERT INTO batches (batch_id, loaded_at, source_label, checksum, notes)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          params![
            id_str,
            encode_dt(self.now),
            source_label,
            self.checksum,
            self.batch.notes,
          ],
        )?;
        Ok(())
      }
    }
  }

  fn quarantine(
    &self,
    tx: &Transaction<'_>,
    index: usize,
    row: &RawRow,
    masked: &MaskedRow<'_>,
  ) -> Result<()> {
    let reason = if masked.mmsi_masked {
      QuarantineReason::MaskedMmsiOnly
    } else {
      QuarantineReason::NoMatchKey
    };
    warn!(batch_id = %self.batch_id, row = index, %reason, "quarantining row");

    tx.execute(
      "INSERT OR IGNORE INTO quarantined_rows
         (batch_id, row_index, reason, row_json, quarantined_at)
       VALUES (?1, ?2, ?3, ?4, ?5)",
      params![
        encode_uuid(self.batch_id),
        index as i64,
        encode_enum(reason),
        serde_json::to_string(row)?,
        encode_dt(self.now),
      ],
    )?;
    Ok(())
  }

  // ── Match & merge ─────────────────────────────────────────────────────────

  /// Insert a new entity, or hand back the one that already owns its IMO.
  fn create(
    &self,
    tx: &Transaction<'_>,
    row: &MaskedRow<'_>,
    flag: Option<&str>,
  ) -> Result<Created> {
    let entity = plan_create(Uuid::new_v4(), row, flag, self.now);
    let inserted = tx.execute(
      &format!(
        "INSERT INTO entities ({ENTITY_COLUMNS})
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
         ON CONFLICT DO NOTHING"
      ),
      params![
        encode_uuid(entity.entity_id),
        entity.vessel_name,
        entity.imo,
        entity.mmsi,
        entity.ircs,
        entity.flag_country_id,
        entity.national_registry_id,
        entity.eu_registry_id,
        encode_dt(entity.created_at),
        encode_dt(entity.updated_at),
      ],
    )?;

    if inserted == 1 {
      let initial = InitialValues::of(&entity);
      tx.execute(
        "INSERT INTO entity_origins (entity_id, vessel_name, imo, mmsi)
         VALUES (?1, ?2, ?3, ?4)",
        params![encode_uuid(entity.entity_id), initial.vessel_name, initial.imo, initial.mmsi],
      )?;
      debug!(entity_id = %entity.entity_id, imo = ?entity.imo, "created entity");
      return Ok(Created::Inserted(entity));
    }

    // Only the IMO index can reject the insert.
    let imo = entity.imo.as_deref().unwrap_or_default();
    match find_entity(tx, MatchKey::Imo(imo))? {
      Some(existing) => Ok(Created::Existing(existing)),
      None => {
        warn!(imo, entity_id = %entity.entity_id, "entity insert rejected with no IMO holder");
        Err(Error::LostInsert { entity_id: entity.entity_id, imo: entity.imo.clone() })
      }
    }
  }

  /// Apply a merge plan and write its history. Returns the number of
  /// history records written.
  fn update(
    &self,
    tx: &Transaction<'_>,
    current: &CanonicalEntity,
    row: &MaskedRow<'_>,
    flag: Option<&str>,
    source_id: Uuid,
  ) -> Result<u64> {
    let plan = plan_update(current, row, flag, self.now);
    let e = &plan.entity;
    tx.execute(
      "UPDATE entities SET
         vessel_name = ?2, imo = ?3, mmsi = ?4, ircs = ?5, flag_country_id = ?6,
         national_registry_id = ?7, eu_registry_id = ?8, updated_at = ?9
       WHERE entity_id = ?1",
      params![
        encode_uuid(e.entity_id),
        e.vessel_name,
        e.imo,
        e.mmsi,
        e.ircs,
        e.flag_country_id,
        e.national_registry_id,
        e.eu_registry_id,
        encode_dt(e.updated_at),
      ],
    )?;

    for FieldChange { change_type, new_value } in &plan.changes {
      tx.execute(
        "INSERT INTO entity_history
           (history_id, entity_id, source_id, change_type, new_value, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
          encode_uuid(Uuid::new_v4()),
          encode_uuid(e.entity_id),
          encode_uuid(source_id),
          encode_enum(*change_type),
          new_value,
          encode_dt(self.now),
        ],
      )?;
    }
    Ok(plan.changes.len() as u64)
  }

  // ── Provenance ────────────────────────────────────────────────────────────

  /// Refresh the entity/source link and record every identifier the row
  /// reported. Returns the number of identifier tuples newly inserted.
  fn record_provenance(
    &self,
    tx: &Transaction<'_>,
    entity: &CanonicalEntity,
    source_id: Uuid,
    row: &RawRow,
  ) -> Result<u64> {
    let entity_str = encode_uuid(entity.entity_id);
    let source_str = encode_uuid(source_id);
    let today = encode_date(self.now.date_naive());

    tx.execute(
      "INSERT INTO source_links (entity_id, source_id, first_seen_date, last_seen_date, is_active)
       VALUES (?1, ?2, ?3, ?3, 1)
       ON CONFLICT (entity_id, source_id)
       DO UPDATE SET last_seen_date = excluded.last_seen_date, is_active = 1",
      params![entity_str, source_str, today],
    )?;

    let mut stmt = tx.prepare_cached(
      "INSERT OR IGNORE INTO source_identifiers
         (entity_id, source_id, identifier_type, identifier_value)
       VALUES (?1, ?2, ?3, ?4)",
    )?;
    let mut inserted = 0;
    for (kind, value) in reported_identifiers(row) {
      inserted += stmt.execute(params![entity_str, source_str, encode_enum(kind), value])? as u64;
    }
    Ok(inserted)
  }

  // ── Collisions ────────────────────────────────────────────────────────────

  /// Record every other entity sharing this entity's MMSI. Any other holder
  /// of its IMO is an integrity violation. Returns the number of collision
  /// records newly written.
  fn detect_collisions(&self, tx: &Transaction<'_>, entity: &CanonicalEntity) -> Result<u64> {
    let entity_str = encode_uuid(entity.entity_id);

    if let Some(imo) = entity.imo.as_deref() {
      let other: Option<String> = tx
        .query_row(
          "SELECT entity_id FROM entities WHERE imo = ?1 AND entity_id != ?2 LIMIT 1",
          params![imo, entity_str],
          |r| r.get(0),
        )
        .optional()?;
      if let Some(other) = other {
        let other_entity_id = decode_uuid(&other)?;
        warn!(imo, entity_id = %entity.entity_id, %other_entity_id, "IMO held by two entities");
        return Err(Error::IntegrityViolation {
          imo: imo.to_owned(),
          entity_id: entity.entity_id,
          other_entity_id,
        });
      }
    }

    let Some(mmsi) = entity.mmsi.as_deref() else {
      return Ok(0);
    };
    let others: Vec<String> = {
      let mut stmt = tx.prepare_cached(
        "SELECT entity_id FROM entities
         WHERE mmsi = ?1 AND entity_id != ?2
         ORDER BY created_at, entity_id",
      )?;
      stmt
        .query_map(params![mmsi, entity_str], |r| r.get(0))?
        .collect::<rusqlite::Result<_>>()?
    };

    let mut written = 0;
    for other in others {
      let n = tx.execute(
        "INSERT OR IGNORE INTO collisions
           (batch_id, identifier_type, identifier_value, entity_id, other_entity_id, detected_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
          encode_uuid(self.batch_id),
          encode_enum(CollisionType::Mmsi),
          mmsi,
          entity_str,
          other,
          encode_dt(self.now),
        ],
      )?;
      if n > 0 {
        debug!(mmsi, entity_id = %entity.entity_id, other_entity_id = %other, "MMSI collision");
      }
      written += n as u64;
    }
    Ok(written)
  }
}

enum Created {
  Inserted(CanonicalEntity),
  Existing(CanonicalEntity),
}

// ─── Lookups ─────────────────────────────────────────────────────────────────

/// Find the entity a row's key points at. Among several holders of an MMSI
/// the earliest-created wins.
pub fn find_entity(tx: &Transaction<'_>, key: MatchKey<'_>) -> Result<Option<CanonicalEntity>> {
  let (sql, value) = match key {
    MatchKey::Imo(imo) => (
      format!("SELECT {ENTITY_COLUMNS} FROM entities WHERE imo = ?1"),
      imo,
    ),
    MatchKey::Mmsi(mmsi) => (
      format!(
        "SELECT {ENTITY_COLUMNS} FROM entities WHERE mmsi = ?1
         ORDER BY created_at, entity_id LIMIT 1"
      ),
      mmsi,
    ),
  };
  tx.query_row(&sql, params![value], RawEntity::from_row)
    .optional()?
    .map(RawEntity::into_entity)
    .transpose()
}

fn written_entity(tx: &Transaction<'_>, entity_id: Uuid) -> Result<CanonicalEntity> {
  tx.query_row(
    &format!("SELECT {ENTITY_COLUMNS} FROM entities WHERE entity_id = ?1"),
    params![encode_uuid(entity_id)],
    RawEntity::from_row,
  )?
  .into_entity()
}

fn load_resolver(tx: &Transaction<'_>) -> Result<CountryResolver> {
  let mut stmt =
    tx.prepare_cached("SELECT alpha3, alpha2, numeric, name FROM countries ORDER BY rowid")?;
  let countries = stmt
    .query_map([], country_from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(CountryResolver::new(countries))
}

fn insert_audit(tx: &Transaction<'_>, audit: &BatchAudit) -> Result<()> {
  tx.execute(
    "INSERT INTO batch_audits (
       batch_id, run_at, row_count, inserted_count, updated_count, history_count,
       source_record_count, quarantined_count, masked_mmsi_count, masked_ircs_count,
       unresolved_flag_count, collision_count
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
    params![
      encode_uuid(audit.batch_id),
      encode_dt(audit.run_at),
      audit.row_count as i64,
      audit.inserted_count as i64,
      audit.updated_count as i64,
      audit.history_count as i64,
      audit.source_record_count as i64,
      audit.quarantined_count as i64,
      audit.masked_mmsi_count as i64,
      audit.masked_ircs_count as i64,
      audit.unresolved_flag_count as i64,
      audit.collision_count as i64,
    ],
  )?;
  Ok(())
}

// ─── Sources ─────────────────────────────────────────────────────────────────

/// Short name → source id, creating unknown sources on first sight.
#[derive(Default)]
struct SourceCache {
  ids: HashMap<String, Uuid>,
}

impl SourceCache {
  fn resolve(&mut self, tx: &Transaction<'_>, short_name: &str) -> Result<Uuid> {
    if let Some(id) = self.ids.get(short_name) {
      return Ok(*id);
    }

    let existing: Option<String> = tx
      .query_row(
        "SELECT source_id FROM sources WHERE short_name = ?1",
        params![short_name],
        |r| r.get(0),
      )
      .optional()?;

    let id = match existing {
      Some(id) => decode_uuid(&id)?,
      None => {
        let source = Source::discovered(short_name);
        tx.execute(
          "INSERT INTO sources (source_id, short_name, full_name, type_tags, status)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          params![
            encode_uuid(source.source_id),
            source.short_name,
            source.full_name,
            serde_json::to_string(&source.type_tags)?,
            encode_enum(source.status),
          ],
        )?;
        debug!(short_name, source_id = %source.source_id, "registered new source");
        source.source_id
      }
    };

    self.ids.insert(short_name.to_owned(), id);
    Ok(id)
  }
}
