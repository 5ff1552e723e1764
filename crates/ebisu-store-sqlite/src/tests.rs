//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{Duration, Utc};
use ebisu_core::{
  batch::{NewBatch, QuarantineReason, RawRow, UNKNOWN_SOURCE},
  collision::CollisionType,
  entity::{CanonicalEntity, ChangeType},
  review::{QueueFilter, Resolution, ReviewAction, ReviewStatus, TriageRequest},
  source::{IdentifierType, SourceStatus},
  store::{EntityQuery, RegistryStore},
};
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn vessel(imo: Option<&str>, mmsi: Option<&str>, name: Option<&str>) -> RawRow {
  RawRow {
    imo: imo.map(str::to_owned),
    mmsi: mmsi.map(str::to_owned),
    vessel_name: name.map(str::to_owned),
    source_label: Some("ICCAT".into()),
    ..Default::default()
  }
}

fn batch(rows: Vec<RawRow>) -> NewBatch { NewBatch::new(rows) }

fn fixed_batch(batch_id: Uuid, rows: Vec<RawRow>) -> NewBatch {
  NewBatch { batch_id: Some(batch_id), ..NewBatch::new(rows) }
}

/// The best search hit for `name`.
async fn find(s: &SqliteStore, name: &str) -> CanonicalEntity {
  let hits = s
    .search_entities(&EntityQuery { name: name.into(), limit: None })
    .await
    .unwrap();
  hits.into_iter().next().expect("entity found by name").entity
}

fn triage_by(reviewer: &str, resolution: Option<Resolution>) -> TriageRequest {
  TriageRequest {
    reviewer: Some(reviewer.into()),
    notes: Some("checked against registry".into()),
    resolution,
  }
}

/// Two entities sharing MMSI 987654321, loaded in separate batches so the
/// pre-filter does not mask it.
async fn shared_mmsi(s: &SqliteStore) -> (CanonicalEntity, CanonicalEntity) {
  s.ingest_batch(batch(vec![vessel(Some("1111111"), Some("987654321"), Some("ALPHA"))]))
    .await
    .unwrap();
  let audit = s
    .ingest_batch(batch(vec![vessel(Some("2222222"), Some("987654321"), Some("BRAVO"))]))
    .await
    .unwrap();
  assert_eq!(audit.collision_count, 1);
  (find(s, "ALPHA").await, find(s, "BRAVO").await)
}

// ─── Matching & merging ──────────────────────────────────────────────────────

#[tokio::test]
async fn first_sighting_creates_entity() {
  let s = store().await;

  let mut row = vessel(Some("9074729"), Some("224123000"), Some("ALPHA"));
  row.flag_text = Some("spain".into());
  let audit = s.ingest_batch(batch(vec![row])).await.unwrap();

  assert_eq!(audit.row_count, 1);
  assert_eq!(audit.inserted_count, 1);
  assert_eq!(audit.updated_count, 0);
  assert_eq!(audit.history_count, 0);
  assert_eq!(audit.source_record_count, 3);

  let entity = find(&s, "ALPHA").await;
  assert_eq!(entity.imo.as_deref(), Some("9074729"));
  assert_eq!(entity.mmsi.as_deref(), Some("224123000"));
  assert_eq!(entity.flag_country_id.as_deref(), Some("ESP"));
  assert!(s.entity_history(entity.entity_id).await.unwrap().is_empty());

  let fetched = s.get_entity(entity.entity_id).await.unwrap().unwrap();
  assert_eq!(fetched, entity);
}

#[tokio::test]
async fn get_entity_missing_returns_none() {
  let s = store().await;
  assert!(s.get_entity(Uuid::new_v4()).await.unwrap().is_none());
  assert!(s.entity_report(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn imo_is_unique_across_batches() {
  let s = store().await;
  s.ingest_batch(batch(vec![vessel(Some("9074729"), None, Some("ALPHA"))]))
    .await
    .unwrap();
  let audit = s
    .ingest_batch(batch(vec![vessel(Some("9074729"), None, Some("ALPHA"))]))
    .await
    .unwrap();

  assert_eq!(audit.inserted_count, 0);
  assert_eq!(audit.updated_count, 1);

  let hits = s
    .search_entities(&EntityQuery { name: "ALPHA".into(), limit: None })
    .await
    .unwrap();
  assert_eq!(hits.len(), 1);
}

#[tokio::test]
async fn empty_incoming_name_keeps_current() {
  let s = store().await;
  s.ingest_batch(batch(vec![vessel(Some("9074729"), None, Some("ALPHA"))]))
    .await
    .unwrap();

  let mut row = vessel(Some("9074729"), Some("224123000"), Some(""));
  row.ircs = Some("  ".into());
  let audit = s.ingest_batch(batch(vec![row])).await.unwrap();
  assert_eq!(audit.history_count, 1);

  let entity = find(&s, "ALPHA").await;
  assert_eq!(entity.vessel_name.as_deref(), Some("ALPHA"));
  assert_eq!(entity.ircs, None);

  let history = s.entity_history(entity.entity_id).await.unwrap();
  assert_eq!(history.len(), 1);
  assert_eq!(history[0].change_type, ChangeType::Mmsi);
  assert_eq!(history[0].new_value, "224123000");
}

#[tokio::test]
async fn same_batch_rename_writes_history_for_second_row() {
  let s = store().await;
  let audit = s
    .ingest_batch(batch(vec![
      vessel(Some("1234567"), None, Some("ALPHA")),
      vessel(Some("1234567"), None, Some("BETA")),
    ]))
    .await
    .unwrap();

  assert_eq!(audit.inserted_count, 1);
  assert_eq!(audit.updated_count, 1);
  assert_eq!(audit.history_count, 1);

  let entity = find(&s, "BETA").await;
  assert_eq!(entity.vessel_name.as_deref(), Some("BETA"));

  let history = s.entity_history(entity.entity_id).await.unwrap();
  assert_eq!(history.len(), 1);
  assert_eq!(history[0].change_type, ChangeType::Name);
  assert_eq!(history[0].new_value, "BETA");
}

#[tokio::test]
async fn mmsi_matches_when_imo_absent() {
  let s = store().await;
  s.ingest_batch(batch(vec![vessel(Some("9074729"), Some("224123000"), Some("ALPHA"))]))
    .await
    .unwrap();

  let mut row = vessel(None, Some("224123000"), None);
  row.ircs = Some("EA1234".into());
  let audit = s.ingest_batch(batch(vec![row])).await.unwrap();
  assert_eq!(audit.inserted_count, 0);
  assert_eq!(audit.updated_count, 1);

  let entity = find(&s, "ALPHA").await;
  assert_eq!(entity.ircs.as_deref(), Some("EA1234"));
  let history = s.entity_history(entity.entity_id).await.unwrap();
  assert_eq!(history.len(), 1);
  assert_eq!(history[0].change_type, ChangeType::Ircs);
}

#[tokio::test]
async fn mmsi_only_rows_create_entities() {
  let s = store().await;
  let audit = s
    .ingest_batch(batch(vec![vessel(None, Some("224123000"), Some("NO IMO"))]))
    .await
    .unwrap();
  assert_eq!(audit.inserted_count, 1);

  let entity = find(&s, "NO IMO").await;
  assert_eq!(entity.imo, None);
  assert_eq!(entity.mmsi.as_deref(), Some("224123000"));
}

// ─── Flags ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn flag_change_is_resolved_and_recorded() {
  let s = store().await;
  let mut first = vessel(Some("9074729"), None, Some("ALPHA"));
  first.flag_text = Some("ES".into());
  let mut second = vessel(Some("9074729"), None, Some("ALPHA"));
  second.flag_text = Some("Norway".into());

  s.ingest_batch(batch(vec![first])).await.unwrap();
  let audit = s.ingest_batch(batch(vec![second])).await.unwrap();
  assert_eq!(audit.history_count, 1);
  assert_eq!(audit.unresolved_flag_count, 0);

  let entity = find(&s, "ALPHA").await;
  assert_eq!(entity.flag_country_id.as_deref(), Some("NOR"));
  let history = s.entity_history(entity.entity_id).await.unwrap();
  assert_eq!(history[0].change_type, ChangeType::Flag);
  assert_eq!(history[0].new_value, "NOR");
}

#[tokio::test]
async fn unresolved_flag_is_counted_and_ignored() {
  let s = store().await;
  let mut first = vessel(Some("9074729"), None, Some("ALPHA"));
  first.flag_text = Some("ESP".into());
  let mut second = vessel(Some("9074729"), None, Some("ALPHA"));
  second.flag_text = Some("Atlantis".into());

  s.ingest_batch(batch(vec![first])).await.unwrap();
  let audit = s.ingest_batch(batch(vec![second])).await.unwrap();
  assert_eq!(audit.unresolved_flag_count, 1);
  assert_eq!(audit.history_count, 0);

  let entity = find(&s, "ALPHA").await;
  assert_eq!(entity.flag_country_id.as_deref(), Some("ESP"));
}

// ─── Pre-filter & quarantine ─────────────────────────────────────────────────

#[tokio::test]
async fn contended_mmsi_is_masked() {
  let s = store().await;
  let audit = s
    .ingest_batch(batch(vec![
      vessel(Some("1111111"), Some("987654321"), Some("ALPHA")),
      vessel(Some("2222222"), Some("987654321"), Some("BRAVO")),
    ]))
    .await
    .unwrap();

  assert_eq!(audit.inserted_count, 2);
  assert_eq!(audit.masked_mmsi_count, 2);
  assert_eq!(audit.collision_count, 0);

  for name in ["ALPHA", "BRAVO"] {
    let entity = find(&s, name).await;
    assert_eq!(entity.mmsi, None, "{name}");
    let history = s.entity_history(entity.entity_id).await.unwrap();
    assert!(history.iter().all(|h| h.new_value != "987654321"), "{name}");

    // Provenance still records what the source reported.
    let provenance = s.entity_provenance(entity.entity_id).await.unwrap();
    assert!(provenance.identifiers.iter().any(|i| {
      i.identifier_type == IdentifierType::Mmsi && i.identifier_value == "987654321"
    }));
  }
}

#[tokio::test]
async fn rows_without_match_key_are_quarantined() {
  let s = store().await;
  let batch_id = Uuid::new_v4();
  let audit = s
    .ingest_batch(fixed_batch(batch_id, vec![
      vessel(None, None, Some("NAMELESS")),
      vessel(Some("1111111"), Some("987654321"), Some("ALPHA")),
      vessel(Some("2222222"), Some("987654321"), Some("BRAVO")),
      vessel(None, Some("987654321"), Some("GHOST")),
    ]))
    .await
    .unwrap();

  assert_eq!(audit.row_count, 4);
  assert_eq!(audit.inserted_count, 2);
  assert_eq!(audit.quarantined_count, 2);

  let quarantined = s.quarantined_rows(batch_id).await.unwrap();
  assert_eq!(quarantined.len(), 2);
  assert_eq!(quarantined[0].row_index, 0);
  assert_eq!(quarantined[0].reason, QuarantineReason::NoMatchKey);
  assert_eq!(quarantined[0].row.vessel_name.as_deref(), Some("NAMELESS"));
  assert_eq!(quarantined[1].row_index, 3);
  assert_eq!(quarantined[1].reason, QuarantineReason::MaskedMmsiOnly);

  let ghosts = s
    .search_entities(&EntityQuery { name: "GHOST".into(), limit: None })
    .await
    .unwrap();
  assert!(ghosts.is_empty());
}

// ─── Batches ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn rerunning_a_batch_changes_nothing() {
  let s = store().await;
  s.ingest_batch(batch(vec![vessel(Some("1111111"), Some("987654321"), Some("ALPHA"))]))
    .await
    .unwrap();

  let batch_id = Uuid::new_v4();
  let rows = vec![
    vessel(Some("2222222"), Some("987654321"), Some("BRAVO")),
    vessel(Some("3333333"), None, Some("CHARLIE")),
  ];
  let first = s.ingest_batch(fixed_batch(batch_id, rows.clone())).await.unwrap();
  assert_eq!(first.inserted_count, 2);
  assert_eq!(first.collision_count, 1);
  let before = find(&s, "BRAVO").await;

  let second = s.ingest_batch(fixed_batch(batch_id, rows)).await.unwrap();
  assert_eq!(second.batch_id, batch_id);
  assert_eq!(second.inserted_count, 0);
  assert_eq!(second.updated_count, 2);
  assert_eq!(second.history_count, 0);
  assert_eq!(second.source_record_count, 0);
  assert_eq!(second.collision_count, 0);

  let after = find(&s, "BRAVO").await;
  assert_eq!(after.entity_id, before.entity_id);
  assert_eq!(after.imo, before.imo);
  assert_eq!(after.mmsi, before.mmsi);
  assert_eq!(after.vessel_name, before.vessel_name);

  let audits = s.batch_audits(batch_id).await.unwrap();
  assert_eq!(audits.len(), 2);
  assert_eq!(audits[0], first);
  assert_eq!(audits[1], second);

  let queue = s.review_queue(&QueueFilter::default()).await.unwrap();
  assert_eq!(queue.len(), 1);
  assert_eq!(queue[0].collision_count, 1);
}

#[tokio::test]
async fn reused_batch_id_with_different_rows_is_rejected() {
  let s = store().await;
  let batch_id = Uuid::new_v4();
  s.ingest_batch(fixed_batch(batch_id, vec![vessel(Some("1111111"), None, Some("ALPHA"))]))
    .await
    .unwrap();

  let result = s
    .ingest_batch(fixed_batch(batch_id, vec![vessel(Some("2222222"), None, Some("BRAVO"))]))
    .await;
  assert!(matches!(result, Err(Error::BatchConflict { .. })));

  // The rejected run left nothing behind.
  let hits = s
    .search_entities(&EntityQuery { name: "BRAVO".into(), limit: None })
    .await
    .unwrap();
  assert!(hits.is_empty());
  assert_eq!(s.batch_audits(batch_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn batches_are_listed_newest_first() {
  let s = store().await;
  let first = s
    .ingest_batch(batch(vec![vessel(Some("1111111"), None, Some("ALPHA"))]))
    .await
    .unwrap();
  let mut row = vessel(Some("2222222"), None, Some("BRAVO"));
  row.source_label = Some("IOTC".into());
  let second = s
    .ingest_batch(NewBatch { notes: Some("monthly refresh".into()), ..batch(vec![row]) })
    .await
    .unwrap();

  let batches = s.list_batches().await.unwrap();
  assert_eq!(batches.len(), 2);
  assert_eq!(batches[0].batch_id, second.batch_id);
  assert_eq!(batches[1].batch_id, first.batch_id);

  let fetched = s.get_batch(second.batch_id).await.unwrap().unwrap();
  assert_eq!(fetched.source_label, "IOTC");
  assert_eq!(fetched.notes.as_deref(), Some("monthly refresh"));
  assert!(fetched.checksum.is_some());
  assert!(s.get_batch(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn unlabelled_rows_use_unknown_source() {
  let s = store().await;
  let mut row = vessel(Some("1111111"), None, Some("ALPHA"));
  row.source_label = None;
  let audit = s.ingest_batch(batch(vec![row])).await.unwrap();

  let fetched = s.get_batch(audit.batch_id).await.unwrap().unwrap();
  assert_eq!(fetched.source_label, UNKNOWN_SOURCE);

  let sources = s.list_sources().await.unwrap();
  assert_eq!(sources.len(), 1);
  assert_eq!(sources[0].short_name, UNKNOWN_SOURCE);
}

// ─── Provenance & reference data ─────────────────────────────────────────────

#[tokio::test]
async fn provenance_is_recorded_once_per_tuple() {
  let s = store().await;
  let row = vessel(Some("9074729"), Some("224123000"), Some("ALPHA"));
  s.ingest_batch(batch(vec![row.clone()])).await.unwrap();
  let again = s.ingest_batch(batch(vec![row])).await.unwrap();
  assert_eq!(again.source_record_count, 0);

  let entity = find(&s, "ALPHA").await;
  let provenance = s.entity_provenance(entity.entity_id).await.unwrap();
  assert_eq!(provenance.links.len(), 1);
  assert!(provenance.links[0].is_active);
  assert_eq!(provenance.links[0].last_seen_date, Utc::now().date_naive());
  assert_eq!(provenance.identifiers.len(), 3);
}

#[tokio::test]
async fn alternate_name_is_provenance_only() {
  let s = store().await;
  let mut row = vessel(Some("9074729"), None, Some("ALPHA"));
  row.vessel_name_alt = Some("EX BRAVO".into());
  let audit = s.ingest_batch(batch(vec![row])).await.unwrap();
  assert_eq!(audit.history_count, 0);

  let entity = find(&s, "ALPHA").await;
  assert_eq!(entity.vessel_name.as_deref(), Some("ALPHA"));
  let report = s.entity_report(entity.entity_id).await.unwrap().unwrap();
  assert_eq!(report.names, ["ALPHA"]);

  let provenance = s.entity_provenance(entity.entity_id).await.unwrap();
  assert!(provenance.identifiers.iter().any(|i| {
    i.identifier_type == IdentifierType::NameAlt && i.identifier_value == "EX BRAVO"
  }));
}

#[tokio::test]
async fn sources_are_created_on_first_sight() {
  let s = store().await;
  let mut iotc = vessel(Some("2222222"), None, Some("BRAVO"));
  iotc.source_label = Some("IOTC".into());
  s.ingest_batch(batch(vec![vessel(Some("1111111"), None, Some("ALPHA")), iotc]))
    .await
    .unwrap();

  let sources = s.list_sources().await.unwrap();
  let names: Vec<&str> = sources.iter().map(|s| s.short_name.as_str()).collect();
  assert_eq!(names, ["ICCAT", "IOTC"]);
  assert!(sources.iter().all(|s| s.status == SourceStatus::Active));
}

#[tokio::test]
async fn countries_are_seeded() {
  let s = store().await;
  let countries = s.list_countries().await.unwrap();
  assert!(countries.iter().any(|c| c.alpha3 == "ESP" && c.name == "Spain"));
}

// ─── Reports & search ────────────────────────────────────────────────────────

#[tokio::test]
async fn fresh_entity_report_has_no_conflicts() {
  let s = store().await;
  s.ingest_batch(batch(vec![vessel(Some("9074729"), Some("224123000"), Some("ALPHA"))]))
    .await
    .unwrap();

  let entity = find(&s, "ALPHA").await;
  let report = s.entity_report(entity.entity_id).await.unwrap().unwrap();
  assert_eq!(report.names, ["ALPHA"]);
  assert_eq!(report.imos, ["9074729"]);
  assert_eq!(report.mmsis, ["224123000"]);
  assert!(!report.imo_conflict);
  assert!(!report.mmsi_conflict);
  assert_eq!(report.sources.len(), 1);
}

#[tokio::test]
async fn report_keeps_creation_values_and_flags_conflicts() {
  let s = store().await;
  s.ingest_batch(batch(vec![vessel(Some("9074729"), Some("111111111"), Some("ALPHA"))]))
    .await
    .unwrap();
  let mut renamed = vessel(Some("9074729"), Some("222222222"), Some("BETA"));
  renamed.source_label = Some("IOTC".into());
  s.ingest_batch(batch(vec![renamed])).await.unwrap();

  let entity = find(&s, "BETA").await;
  assert_eq!(entity.mmsi.as_deref(), Some("222222222"));
  let report = s.entity_report(entity.entity_id).await.unwrap().unwrap();

  assert_eq!(report.names, ["ALPHA", "BETA"]);
  assert_eq!(report.imos, ["9074729"]);
  assert_eq!(report.mmsis, ["111111111", "222222222"]);
  assert!(report.mmsi_conflict);
  assert!(!report.imo_conflict);
  assert_eq!(report.sources.len(), 2);

  let mut back = vessel(Some("9074729"), Some("111111111"), Some("ALPHA"));
  back.source_label = Some("WCPFC".into());
  s.ingest_batch(batch(vec![back])).await.unwrap();

  let report = s.entity_report(entity.entity_id).await.unwrap().unwrap();
  assert_eq!(report.names, ["ALPHA", "BETA"]);
  assert_eq!(report.mmsis, ["111111111", "222222222"]);
  assert_eq!(report.sources.len(), 3);
}

#[tokio::test]
async fn masked_mmsi_stays_out_of_report() {
  let s = store().await;
  s.ingest_batch(batch(vec![
    vessel(Some("1111111"), Some("987654321"), Some("ALPHA")),
    vessel(Some("2222222"), Some("987654321"), Some("BRAVO")),
  ]))
  .await
  .unwrap();

  let entity = find(&s, "ALPHA").await;
  let report = s.entity_report(entity.entity_id).await.unwrap().unwrap();
  assert!(report.mmsis.is_empty());
  assert!(!report.mmsi_conflict);
}

#[tokio::test]
async fn search_is_accent_insensitive_and_ranked() {
  let s = store().await;
  s.ingest_batch(batch(vec![
    vessel(Some("1111111"), None, Some("NUESTRA SEÑORA DE BEGOÑA")),
    vessel(Some("2222222"), None, Some("SEÑORA")),
    vessel(Some("3333333"), None, Some("ALBATROS")),
  ]))
  .await
  .unwrap();

  let hits = s
    .search_entities(&EntityQuery { name: "senora".into(), limit: None })
    .await
    .unwrap();
  assert_eq!(hits.len(), 2);
  assert_eq!(hits[0].entity.vessel_name.as_deref(), Some("SEÑORA"));
  assert!(hits[0].score >= hits[1].score);

  let limited = s
    .search_entities(&EntityQuery { name: "senora".into(), limit: Some(1) })
    .await
    .unwrap();
  assert_eq!(limited.len(), 1);

  let empty = s
    .search_entities(&EntityQuery { name: "   ".into(), limit: None })
    .await
    .unwrap();
  assert!(empty.is_empty());
}

// ─── Review queue ────────────────────────────────────────────────────────────

#[tokio::test]
async fn shared_mmsi_appears_in_queue() {
  let s = store().await;
  let (alpha, bravo) = shared_mmsi(&s).await;

  let queue = s.review_queue(&QueueFilter::default()).await.unwrap();
  assert_eq!(queue.len(), 1);
  let entry = &queue[0];
  assert_eq!(entry.identifier_type, CollisionType::Mmsi);
  assert_eq!(entry.identifier_value, "987654321");
  assert!(entry.collision_count >= 1);
  assert!(entry.entity_ids.contains(&alpha.entity_id));
  assert!(entry.entity_ids.contains(&bravo.entity_id));
  assert_eq!(entry.status, ReviewStatus::New);
  assert_eq!(entry.resolution, None);
}

#[tokio::test]
async fn resolving_leaves_entities_untouched() {
  let s = store().await;
  let (alpha, bravo) = shared_mmsi(&s).await;

  let entry = s
    .triage(
      CollisionType::Mmsi,
      "987654321".into(),
      ReviewAction::Resolve,
      triage_by("ops", Some(Resolution::DataError)),
    )
    .await
    .unwrap();
  assert_eq!(entry.status, ReviewStatus::Resolved);
  assert_eq!(entry.resolution, Some(Resolution::DataError));
  assert_eq!(entry.reviewer.as_deref(), Some("ops"));
  assert!(entry.reviewed_at.is_some());

  for before in [alpha, bravo] {
    let after = s.get_entity(before.entity_id).await.unwrap().unwrap();
    assert_eq!(after, before);
    assert!(s.entity_history(before.entity_id).await.unwrap().is_empty());
  }

  let queue = s.review_queue(&QueueFilter::default()).await.unwrap();
  assert_eq!(queue[0].status, ReviewStatus::Resolved);
}

#[tokio::test]
async fn triage_lifecycle() {
  let s = store().await;
  shared_mmsi(&s).await;
  let triage = |action, request| s.triage(CollisionType::Mmsi, "987654321".into(), action, request);

  let acked = triage(ReviewAction::Acknowledge, triage_by("ops", None)).await.unwrap();
  assert_eq!(acked.status, ReviewStatus::Acknowledged);

  let dismissed = triage(ReviewAction::Dismiss, triage_by("ops", None)).await.unwrap();
  assert_eq!(dismissed.status, ReviewStatus::Dismissed);
  assert_eq!(dismissed.resolution, Some(Resolution::DataError));

  let result = triage(ReviewAction::Acknowledge, triage_by("ops", None)).await;
  assert!(matches!(
    result,
    Err(Error::Core(ebisu_core::Error::InvalidTransition { .. }))
  ));

  let reopened = triage(ReviewAction::Reopen, triage_by("lead", None)).await.unwrap();
  assert_eq!(reopened.status, ReviewStatus::New);
  assert_eq!(reopened.resolution, None);
  assert_eq!(reopened.reviewer.as_deref(), Some("lead"));
}

#[tokio::test]
async fn resolved_decision_is_kept_until_reopened() {
  let s = store().await;
  shared_mmsi(&s).await;
  let triage = |action, request| s.triage(CollisionType::Mmsi, "987654321".into(), action, request);

  let resolved = triage(ReviewAction::Resolve, triage_by("ops", Some(Resolution::DataError)))
    .await
    .unwrap();

  let result = triage(ReviewAction::Resolve, triage_by("bob", Some(Resolution::MergeEntities))).await;
  assert!(matches!(
    result,
    Err(Error::Core(ebisu_core::Error::InvalidTransition { .. }))
  ));

  let again = triage(ReviewAction::Resolve, triage_by("bob", Some(Resolution::DataError)))
    .await
    .unwrap();
  assert_eq!(again, resolved);
  assert_eq!(again.reviewer.as_deref(), Some("ops"));

  triage(ReviewAction::Reopen, triage_by("bob", None)).await.unwrap();
  let changed = triage(ReviewAction::Resolve, triage_by("bob", Some(Resolution::MergeEntities)))
    .await
    .unwrap();
  assert_eq!(changed.resolution, Some(Resolution::MergeEntities));
  assert_eq!(changed.reviewer.as_deref(), Some("bob"));
}

#[tokio::test]
async fn resolve_requires_a_resolution() {
  let s = store().await;
  shared_mmsi(&s).await;

  let result = s
    .triage(
      CollisionType::Mmsi,
      "987654321".into(),
      ReviewAction::Resolve,
      triage_by("ops", None),
    )
    .await;
  assert!(matches!(result, Err(Error::Core(ebisu_core::Error::MissingResolution))));

  // The failed action wrote nothing.
  let queue = s.review_queue(&QueueFilter::default()).await.unwrap();
  assert_eq!(queue[0].status, ReviewStatus::New);
  assert_eq!(queue[0].reviewer, None);
}

#[tokio::test]
async fn triage_unknown_identifier_is_not_found() {
  let s = store().await;
  let result = s
    .triage(
      CollisionType::Mmsi,
      "000000000".into(),
      ReviewAction::Acknowledge,
      TriageRequest::default(),
    )
    .await;
  assert!(matches!(result, Err(Error::CollisionNotFound { .. })));
}

#[tokio::test]
async fn queue_filters() {
  let s = store().await;
  let (alpha, _) = shared_mmsi(&s).await;
  let mut charlie = vessel(Some("3333333"), Some("224123000"), Some("CHARLIE"));
  charlie.source_label = Some("IOTC".into());
  s.ingest_batch(batch(vec![charlie])).await.unwrap();
  s.ingest_batch(batch(vec![vessel(Some("4444444"), Some("224123000"), Some("DELTA"))]))
    .await
    .unwrap();

  let all = s.review_queue(&QueueFilter::default()).await.unwrap();
  assert_eq!(all.len(), 2);
  // Most recently detected first.
  assert_eq!(all[0].identifier_value, "224123000");

  s.triage(
    CollisionType::Mmsi,
    "224123000".into(),
    ReviewAction::Dismiss,
    triage_by("ops", None),
  )
  .await
  .unwrap();

  let unresolved = s
    .review_queue(&QueueFilter { unresolved_only: true, ..Default::default() })
    .await
    .unwrap();
  assert_eq!(unresolved.len(), 1);
  assert_eq!(unresolved[0].identifier_value, "987654321");

  let for_alpha = s
    .review_queue(&QueueFilter { entity_id: Some(alpha.entity_id), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(for_alpha.len(), 1);
  assert_eq!(for_alpha[0].identifier_value, "987654321");

  let future = s
    .review_queue(&QueueFilter {
      detected_since: Some(Utc::now() + Duration::hours(1)),
      ..Default::default()
    })
    .await
    .unwrap();
  assert!(future.is_empty());
}

#[tokio::test]
async fn errors_are_classified() {
  use ebisu_core::{ErrorKind, store::StoreError};

  let s = store().await;
  let batch_id = Uuid::new_v4();
  s.ingest_batch(fixed_batch(batch_id, vec![vessel(Some("1111111"), None, Some("ALPHA"))]))
    .await
    .unwrap();
  let conflict = s
    .ingest_batch(fixed_batch(batch_id, vec![vessel(Some("2222222"), None, None)]))
    .await
    .unwrap_err();
  assert_eq!(conflict.kind(), ErrorKind::Conflict);

  let missing = s
    .triage(CollisionType::Mmsi, "1".into(), ReviewAction::Reopen, TriageRequest::default())
    .await
    .unwrap_err();
  assert_eq!(missing.kind(), ErrorKind::NotFound);
}

// ─── Atomicity ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn failed_batch_leaves_nothing_behind() {
  let s = store().await;
  s.ingest_batch(batch(vec![vessel(Some("1111111"), Some("987654321"), Some("ALPHA"))]))
    .await
    .unwrap();
  let before = s.table_counts().await.unwrap();
  let alpha = find(&s, "ALPHA").await;

  s.execute_raw(
    "CREATE TEMP TRIGGER reject_third BEFORE INSERT ON entities
     WHEN NEW.imo = '3333333'
     BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
  )
  .await
  .unwrap();

  let mut renamed = vessel(Some("1111111"), None, Some("ALPHA II"));
  renamed.source_label = Some("IOTC".into());
  let result = s
    .ingest_batch(batch(vec![
      vessel(None, None, Some("NO KEY")),
      renamed,
      vessel(Some("2222222"), Some("987654321"), Some("BRAVO")),
      vessel(Some("3333333"), None, Some("CHARLIE")),
    ]))
    .await;
  assert!(matches!(result, Err(Error::Sqlite(_))));

  assert_eq!(s.table_counts().await.unwrap(), before);
  assert_eq!(s.get_entity(alpha.entity_id).await.unwrap(), Some(alpha));
  assert_eq!(s.list_batches().await.unwrap().len(), 1);
  assert!(s.review_queue(&QueueFilter::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn concurrent_batches_share_one_new_entity() {
  let s = store().await;

  let (first, second) = tokio::join!(
    s.ingest_batch(batch(vec![vessel(Some("9074729"), None, Some("ALPHA"))])),
    s.ingest_batch(batch(vec![vessel(Some("9074729"), None, Some("ALPHA"))])),
  );
  let (first, second) = (first.unwrap(), second.unwrap());

  assert_eq!(first.inserted_count + second.inserted_count, 1);
  assert_eq!(first.updated_count + second.updated_count, 1);
  let counts = s.table_counts().await.unwrap();
  assert!(counts.contains(&("entities", 1)));
  assert!(counts.contains(&("entity_history", 0)));
}

#[tokio::test]
async fn silently_dropped_insert_is_an_integrity_error() {
  use ebisu_core::{ErrorKind, store::StoreError};

  let s = store().await;
  s.execute_raw(
    "CREATE TEMP TRIGGER drop_insert BEFORE INSERT ON entities
     WHEN NEW.imo = '9074729'
     BEGIN SELECT RAISE(IGNORE); END;",
  )
  .await
  .unwrap();
  let before = s.table_counts().await.unwrap();

  let err = s
    .ingest_batch(batch(vec![vessel(Some("9074729"), None, Some("ALPHA"))]))
    .await
    .unwrap_err();
  assert!(matches!(&err, Error::LostInsert { imo: Some(imo), .. } if imo == "9074729"));
  assert_eq!(err.kind(), ErrorKind::Integrity);
  assert_eq!(s.table_counts().await.unwrap(), before);
}
