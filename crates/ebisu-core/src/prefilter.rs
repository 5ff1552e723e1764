//! Batch-scoped masking of contended weak identifiers.
//!
//! Within one batch, an MMSI or IRCS value that appears alongside more than
//! one distinct IMO cannot be trusted to identify a single vessel. Such values
//! are *contended*: rows carrying them have the field treated as absent for
//! matching, history, and canonical state. Only the current batch is
//! consulted; persisted identifiers play no part.

use std::collections::{BTreeMap, BTreeSet};

use crate::batch::RawRow;

/// The contended MMSI and IRCS values of one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContendedIdentifiers {
  pub mmsi: BTreeSet<String>,
  pub ircs: BTreeSet<String>,
}

impl ContendedIdentifiers {
  /// Scan every row of a batch.
  pub fn scan(rows: &[RawRow]) -> Self {
    Self {
      mmsi: contended(rows, RawRow::mmsi),
      ircs: contended(rows, RawRow::ircs),
    }
  }

  pub fn is_empty(&self) -> bool { self.mmsi.is_empty() && self.ircs.is_empty() }

  /// The view of `row` that the matcher is allowed to use.
  pub fn mask<'a>(&self, row: &'a RawRow) -> MaskedRow<'a> {
    let (mmsi, mmsi_masked) = keep_unless(row.mmsi(), &self.mmsi);
    let (ircs, ircs_masked) = keep_unless(row.ircs(), &self.ircs);
    MaskedRow {
      imo: row.imo(),
      mmsi,
      ircs,
      vessel_name: row.vessel_name(),
      national_registry_id: row.national_registry_id(),
      eu_registry_id: row.eu_registry_id(),
      flag_text: row.flag_text(),
      mmsi_masked,
      ircs_masked,
    }
  }
}

fn contended<'a>(
  rows: &'a [RawRow],
  weak: impl Fn(&'a RawRow) -> Option<&'a str>,
) -> BTreeSet<String> {
  let mut imos_by_value: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
  for row in rows {
    if let (Some(imo), Some(value)) = (row.imo(), weak(row)) {
      imos_by_value.entry(value).or_default().insert(imo);
    }
  }
  imos_by_value
    .into_iter()
    .filter(|(_, imos)| imos.len() > 1)
    .map(|(value, _)| value.to_owned())
    .collect()
}

fn keep_unless<'a>(
  value: Option<&'a str>,
  contended: &BTreeSet<String>,
) -> (Option<&'a str>, bool) {
  match value {
    Some(v) if contended.contains(v) => (None, true),
    other => (other, false),
  }
}

// ─── MaskedRow ───────────────────────────────────────────────────────────────

/// How a row finds its entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKey<'a> {
  Imo(&'a str),
  Mmsi(&'a str),
}

/// A raw row after trimming and masking. Absent and masked fields are `None`.
///
/// `vessel_name_alt` is left out: it is not a canonical field and only
/// reaches the store as provenance, which reads the raw row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskedRow<'a> {
  pub imo:                  Option<&'a str>,
  pub mmsi:                 Option<&'a str>,
  pub ircs:                 Option<&'a str>,
  pub vessel_name:          Option<&'a str>,
  pub national_registry_id: Option<&'a str>,
  pub eu_registry_id:       Option<&'a str>,
  pub flag_text:            Option<&'a str>,
  pub mmsi_masked:          bool,
  pub ircs_masked:          bool,
}

impl<'a> MaskedRow<'a> {
  /// IMO when present, else an unmasked MMSI. IRCS and names never match.
  pub fn match_key(&self) -> Option<MatchKey<'a>> {
    self
      .imo
      .map(MatchKey::Imo)
      .or_else(|| self.mmsi.map(MatchKey::Mmsi))
  }
}
