//! Plain-text rendering of API responses.

use std::fmt::Write as _;

use ebisu_core::{
  batch::{Batch, BatchAudit, QuarantinedRow},
  entity::{CanonicalEntity, EntityMatch, EntityReport, HistoryRecord},
  review::QueueEntry,
  source::Source,
};

fn opt(value: &Option<String>) -> &str { value.as_deref().unwrap_or("-") }

pub fn audit(a: &BatchAudit) -> String {
  let mut out = String::new();
  let _ = writeln!(out, "batch      {}", a.batch_id);
  let _ = writeln!(out, "run at     {}", a.run_at.to_rfc3339());
  let _ = writeln!(out, "rows       {}", a.row_count);
  let _ = writeln!(out, "inserted   {}", a.inserted_count);
  let _ = writeln!(out, "updated    {}", a.updated_count);
  let _ = writeln!(out, "history    {}", a.history_count);
  let _ = writeln!(out, "provenance {}", a.source_record_count);
  let _ = writeln!(out, "quarantine {}", a.quarantined_count);
  let _ = writeln!(
    out,
    "masked     mmsi={} ircs={}",
    a.masked_mmsi_count, a.masked_ircs_count
  );
  let _ = writeln!(out, "bad flags  {}", a.unresolved_flag_count);
  let _ = writeln!(out, "collisions {}", a.collision_count);
  out
}

pub fn batches(batches: &[Batch]) -> String {
  let mut out = String::new();
  for b in batches {
    let _ = writeln!(
      out,
      "{}  {}  {:<12} {}",
      b.batch_id,
      b.loaded_at.format("%Y-%m-%d %H:%M"),
      b.source_label,
      opt(&b.notes),
    );
  }
  out
}

pub fn quarantine(rows: &[QuarantinedRow]) -> String {
  let mut out = String::new();
  for q in rows {
    let _ = writeln!(
      out,
      "#{:<5} {:<18} name={}",
      q.row_index,
      q.reason,
      opt(&q.row.vessel_name),
    );
  }
  out
}

pub fn entity(e: &CanonicalEntity) -> String {
  let mut out = String::new();
  let _ = writeln!(out, "entity   {}", e.entity_id);
  let _ = writeln!(out, "name     {}", opt(&e.vessel_name));
  let _ = writeln!(out, "imo      {}", opt(&e.imo));
  let _ = writeln!(out, "mmsi     {}", opt(&e.mmsi));
  let _ = writeln!(out, "ircs     {}", opt(&e.ircs));
  let _ = writeln!(out, "flag     {}", opt(&e.flag_country_id));
  let _ = writeln!(out, "national {}", opt(&e.national_registry_id));
  let _ = writeln!(out, "eu       {}", opt(&e.eu_registry_id));
  let _ = writeln!(out, "updated  {}", e.updated_at.to_rfc3339());
  out
}

pub fn report(r: &EntityReport) -> String {
  let mut out = entity(&r.entity);
  let conflict = |flag: bool| if flag { "  (conflict)" } else { "" };
  let _ = writeln!(out, "names    {}", r.names.join(", "));
  let _ = writeln!(out, "imos     {}{}", r.imos.join(", "), conflict(r.imo_conflict));
  let _ = writeln!(out, "mmsis    {}{}", r.mmsis.join(", "), conflict(r.mmsi_conflict));
  let _ = writeln!(out, "sources:");
  for s in &r.sources {
    let _ = writeln!(
      out,
      "  {:<12} {} .. {}{}",
      s.source.short_name,
      s.first_seen_date,
      s.last_seen_date,
      if s.is_active { "" } else { "  (inactive)" },
    );
  }
  out
}

pub fn history(records: &[HistoryRecord]) -> String {
  let mut out = String::new();
  for h in records {
    let _ = writeln!(
      out,
      "{}  {:<5} {}",
      h.recorded_at.format("%Y-%m-%d %H:%M"),
      h.change_type,
      h.new_value,
    );
  }
  out
}

pub fn matches(hits: &[EntityMatch]) -> String {
  let mut out = String::new();
  for m in hits {
    let _ = writeln!(
      out,
      "{:.2}  {}  {:<30} imo={}",
      m.score,
      m.entity.entity_id,
      opt(&m.entity.vessel_name),
      opt(&m.entity.imo),
    );
  }
  out
}

pub fn sources(sources: &[Source]) -> String {
  let mut out = String::new();
  for s in sources {
    let _ = writeln!(out, "{:<12} {:<8} {}", s.short_name, s.status, s.full_name);
  }
  out
}

pub fn queue_entry(q: &QueueEntry) -> String {
  let mut out = format!(
    "{} {:<12} {:<12} x{}  last {}",
    q.identifier_type,
    q.identifier_value,
    q.status,
    q.collision_count,
    q.last_detected_at.format("%Y-%m-%d %H:%M"),
  );
  if let Some(resolution) = q.resolution {
    let _ = write!(out, "  {resolution}");
  }
  if let Some(reviewer) = &q.reviewer {
    let _ = write!(out, "  by {reviewer}");
  }
  for id in &q.entity_ids {
    let _ = write!(out, "\n    {id}");
  }
  out.push('\n');
  out
}

pub fn queue(entries: &[QueueEntry]) -> String {
  entries.iter().map(queue_entry).collect()
}
