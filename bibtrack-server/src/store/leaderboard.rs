//! Leaderboard store
//!
//! Owns the published result set and the roster-of-truth. All mutation
//! paths run under the caller's write lock; notification happens after the
//! lock is released, so a slow subscriber can never stall a finish merge.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use bibtrack_common::types::{ImportSummary, ResultEntry, RosterEntry};
use tracing::info;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::store::roster::{normalize_gender, RosterBatch};

/// A finish to merge into the leaderboard, from the tracking pipeline or
/// from manual entry.
#[derive(Debug, Clone)]
pub struct FinishRecord {
    pub bib_number: String,
    pub finish_time_ms: f64,
    pub racer_name: Option<String>,
    pub gender: Option<String>,
    pub team: Option<String>,
}

/// Fields an operator may change on an existing entry. Time strings are
/// validated at the transport boundary; by the time a patch reaches the
/// store it carries milliseconds.
#[derive(Debug, Clone, Default)]
pub struct EntryPatch {
    pub bib_number: Option<String>,
    pub racer_name: Option<String>,
    pub finish_time_ms: Option<f64>,
    pub rank: Option<u32>,
    pub gender: Option<String>,
    pub team: Option<String>,
}

/// Whether a finish merge created a new row or updated one in place.
/// Callers pick the notification shape from this.
#[derive(Debug, Clone)]
pub enum RecordOutcome {
    Added(ResultEntry),
    Updated(ResultEntry),
}

impl RecordOutcome {
    pub fn entry(&self) -> &ResultEntry {
        match self {
            RecordOutcome::Added(e) | RecordOutcome::Updated(e) => e,
        }
    }
}

#[derive(Debug, Default)]
pub struct LeaderboardStore {
    /// Insertion order is load-bearing: it is the tie-break for equal
    /// finish times when ranks are recomputed.
    entries: Vec<ResultEntry>,
    /// Immutable identity lookup, keyed by bib number. Excludes bibs that
    /// have already finished: it resolves future lookups, not settled ones.
    roster: HashMap<String, RosterEntry>,
}

impl LeaderboardStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[ResultEntry] {
        &self.entries
    }

    pub fn find_by_bib(&self, bib: &str) -> Option<&ResultEntry> {
        self.entries.iter().find(|e| e.bib_number == bib)
    }

    pub fn roster_entry(&self, bib: &str) -> Option<&RosterEntry> {
        self.roster.get(bib)
    }

    /// Merge a finish into the leaderboard.
    ///
    /// A bib already present gets its finish time overwritten (a later
    /// write is a correction, first-write-wins is deliberately not
    /// enforced) with every other field preserved. An unknown bib becomes a
    /// fresh entry, so the store works with or without a pre-loaded roster.
    pub fn record_finish(&mut self, rec: FinishRecord) -> RecordOutcome {
        if let Some(idx) = self.entries.iter().position(|e| e.bib_number == rec.bib_number) {
            self.entries[idx].finish_time_ms = Some(rec.finish_time_ms);
            self.recompute_ranks();
            let entry = self.entries[idx].clone();
            info!(
                "Updated finish time for bib #{} ({}): {:.0}ms",
                entry.bib_number, entry.racer_name, rec.finish_time_ms
            );
            RecordOutcome::Updated(entry)
        } else {
            let racer_name = rec
                .racer_name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(String::from)
                .unwrap_or_else(|| format!("Racer #{}", rec.bib_number));

            self.entries.push(ResultEntry {
                id: Uuid::new_v4(),
                bib_number: rec.bib_number.clone(),
                racer_name,
                finish_time_ms: Some(rec.finish_time_ms),
                rank: None,
                gender: rec.gender.as_deref().map(normalize_gender),
                team: trimmed(rec.team.as_deref()),
            });
            self.recompute_ranks();
            let entry = self.entries.last().expect("entry just pushed").clone();
            info!(
                "Added new finisher: bib #{} at {:.0}ms (rank {:?})",
                entry.bib_number, rec.finish_time_ms, entry.rank
            );
            RecordOutcome::Added(entry)
        }
    }

    /// Merge an uploaded roster batch into the result set.
    ///
    /// Per-row failures (missing fields, duplicate bib within the batch)
    /// are collected and returned; the rest of the batch still applies.
    /// Existing entries keep their finish time and rank and only pick up
    /// identity fields. Afterwards the roster-of-truth is rebuilt from the
    /// merged set's not-yet-finished entries.
    pub fn import_roster(&mut self, batch: RosterBatch) -> ImportSummary {
        let mut summary = ImportSummary {
            errors: batch.errors,
            ..Default::default()
        };
        let mut seen: HashSet<String> = HashSet::new();

        for (row_num, row) in batch.rows {
            let bib = row
                .bib_number
                .as_deref()
                .map(str::trim)
                .unwrap_or_default()
                .to_string();
            let name = row
                .racer_name
                .as_deref()
                .map(str::trim)
                .unwrap_or_default()
                .to_string();

            if bib.is_empty() || name.is_empty() {
                summary
                    .errors
                    .push(format!("Row {}: missing bibNumber or racerName", row_num));
                continue;
            }

            if !seen.insert(bib.clone()) {
                summary.errors.push(format!(
                    "Row {}: duplicate bib number {} in batch",
                    row_num, bib
                ));
                continue;
            }

            let gender = row
                .gender
                .as_deref()
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .map(normalize_gender);
            let team = trimmed(row.team.as_deref());

            if let Some(idx) = self.entries.iter().position(|e| e.bib_number == bib) {
                let entry = &mut self.entries[idx];
                entry.racer_name = name;
                if gender.is_some() {
                    entry.gender = gender;
                }
                if team.is_some() {
                    entry.team = team;
                }
                // finish_time_ms and rank intentionally untouched
                summary.updated += 1;
            } else {
                self.entries.push(ResultEntry {
                    id: Uuid::new_v4(),
                    bib_number: bib,
                    racer_name: name,
                    finish_time_ms: None,
                    rank: None,
                    gender,
                    team,
                });
                summary.created += 1;
            }
        }

        self.roster = self
            .entries
            .iter()
            .filter(|e| !e.has_finished())
            .map(|e| {
                (
                    e.bib_number.clone(),
                    RosterEntry {
                        bib_number: e.bib_number.clone(),
                        racer_name: e.racer_name.clone(),
                        gender: e.gender.clone(),
                        team: e.team.clone(),
                    },
                )
            })
            .collect();

        info!(
            "Roster merge completed: {} created, {} updated, {} errors; roster-of-truth holds {} bibs",
            summary.created,
            summary.updated,
            summary.errors.len(),
            self.roster.len()
        );
        summary
    }

    /// Apply an operator edit to an entry.
    ///
    /// A bib renumber re-derives identity fields from the roster-of-truth
    /// for the new bib — renumbering must not leave a stale name behind —
    /// while an explicitly supplied non-empty name still wins. Returns the
    /// updated entry and whether the bib changed (the caller publishes a
    /// reload in that case).
    pub fn update_entry(&mut self, id: Uuid, patch: EntryPatch) -> Result<(ResultEntry, bool)> {
        let idx = self
            .entries
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| Error::NotFound(format!("finisher {}", id)))?;

        let original_bib = self.entries[idx].bib_number.clone();
        let new_bib = patch
            .bib_number
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(String::from)
            .unwrap_or_else(|| original_bib.clone());
        let bib_changed = new_bib != original_bib;

        let roster_hit = self.roster.get(&new_bib).cloned();
        let patched_name = patch
            .racer_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(String::from);

        {
            let entry = &mut self.entries[idx];
            entry.bib_number = new_bib;

            if let Some(roster) = roster_hit {
                entry.racer_name = patched_name.unwrap_or(roster.racer_name);
                entry.gender = patch
                    .gender
                    .as_deref()
                    .map(normalize_gender)
                    .or(roster.gender);
                entry.team = trimmed(patch.team.as_deref()).or(roster.team);
            } else {
                if let Some(name) = patched_name {
                    entry.racer_name = name;
                }
                if let Some(gender) = patch.gender.as_deref() {
                    entry.gender = Some(normalize_gender(gender));
                }
                if let Some(team) = trimmed(patch.team.as_deref()) {
                    entry.team = Some(team);
                }
            }

            if let Some(rank) = patch.rank {
                entry.rank = Some(rank);
            }
            if let Some(ms) = patch.finish_time_ms {
                entry.finish_time_ms = Some(ms);
            }
        }

        if patch.finish_time_ms.is_some() {
            self.recompute_ranks();
        }

        Ok((self.entries[idx].clone(), bib_changed))
    }

    pub fn delete_entry(&mut self, id: Uuid) -> Result<ResultEntry> {
        let idx = self
            .entries
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| Error::NotFound(format!("finisher {}", id)))?;
        let removed = self.entries.remove(idx);
        self.recompute_ranks();
        info!("Deleted entry for bib #{}", removed.bib_number);
        Ok(removed)
    }

    /// Reassign ranks per the given (id, rank) pairs, in the order given.
    /// Entries not named in the request are dropped — only named entries
    /// survive a reorder.
    pub fn reorder(&mut self, order: &[(Uuid, u32)]) -> Vec<ResultEntry> {
        let mut reordered = Vec::with_capacity(order.len());
        for (id, rank) in order {
            if let Some(mut entry) = self.entries.iter().find(|e| e.id == *id).cloned() {
                entry.rank = Some(*rank);
                reordered.push(entry);
            }
        }
        self.entries = reordered.clone();
        reordered
    }

    /// Read-only projection: every finished entry, ascending by finish
    /// time (stable, so equal times keep insertion order).
    pub fn list_finished(&self) -> Vec<ResultEntry> {
        let mut finished: Vec<ResultEntry> = self
            .entries
            .iter()
            .filter(|e| e.has_finished())
            .cloned()
            .collect();
        finished.sort_by(|a, b| {
            a.finish_time_ms
                .partial_cmp(&b.finish_time_ms)
                .unwrap_or(Ordering::Equal)
        });
        finished
    }

    /// Ranks over the finished set: ascending finish time, ties broken by
    /// original insertion order, exactly 1..N.
    fn recompute_ranks(&mut self) {
        let mut finished: Vec<usize> = (0..self.entries.len())
            .filter(|&i| self.entries[i].has_finished())
            .collect();
        finished.sort_by(|&a, &b| {
            self.entries[a]
                .finish_time_ms
                .partial_cmp(&self.entries[b].finish_time_ms)
                .unwrap_or(Ordering::Equal)
        });

        for (pos, &idx) in finished.iter().enumerate() {
            self.entries[idx].rank = Some(pos as u32 + 1);
        }
        for entry in self.entries.iter_mut().filter(|e| !e.has_finished()) {
            entry.rank = None;
        }
    }
}

fn trimmed(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::roster::parse_roster_csv;

    fn finish(bib: &str, ms: f64) -> FinishRecord {
        FinishRecord {
            bib_number: bib.to_string(),
            finish_time_ms: ms,
            racer_name: None,
            gender: None,
            team: None,
        }
    }

    fn roster_batch(csv: &str) -> RosterBatch {
        parse_roster_csv(csv).unwrap()
    }

    /// After any mutation, finished entries sorted by rank must equal the
    /// same set sorted by finish time, with ranks exactly 1..N.
    fn assert_rank_invariant(store: &LeaderboardStore) {
        let finished = store.list_finished();
        for (i, entry) in finished.iter().enumerate() {
            assert_eq!(
                entry.rank,
                Some(i as u32 + 1),
                "bib {} out of rank order",
                entry.bib_number
            );
        }
        for entry in store.entries().iter().filter(|e| !e.has_finished()) {
            assert_eq!(entry.rank, None);
        }
    }

    #[test]
    fn test_record_finish_creates_unknown_bib() {
        let mut store = LeaderboardStore::new();
        let outcome = store.record_finish(finish("123", 61_000.0));

        match outcome {
            RecordOutcome::Added(entry) => {
                assert_eq!(entry.bib_number, "123");
                assert_eq!(entry.racer_name, "Racer #123");
                assert_eq!(entry.rank, Some(1));
            }
            other => panic!("expected Added, got {:?}", other),
        }
    }

    #[test]
    fn test_record_finish_overwrites_existing_time() {
        let mut store = LeaderboardStore::new();
        store.import_roster(roster_batch("bibNumber,racerName\n5,Grace Hopper\n"));
        store.record_finish(finish("5", 61_000.0));

        // a later write is a correction, not a conflict
        let outcome = store.record_finish(finish("5", 59_000.0));
        match outcome {
            RecordOutcome::Updated(entry) => {
                assert_eq!(entry.finish_time_ms, Some(59_000.0));
                assert_eq!(entry.racer_name, "Grace Hopper");
            }
            other => panic!("expected Updated, got {:?}", other),
        }
        assert_rank_invariant(&store);
    }

    #[test]
    fn test_ranks_follow_finish_times_not_arrival_order() {
        let mut store = LeaderboardStore::new();
        store.record_finish(finish("1", 90_000.0));
        store.record_finish(finish("2", 60_000.0));
        store.record_finish(finish("3", 75_000.0));

        let finished = store.list_finished();
        let bibs: Vec<&str> = finished.iter().map(|e| e.bib_number.as_str()).collect();
        assert_eq!(bibs, vec!["2", "3", "1"]);
        assert_rank_invariant(&store);
    }

    #[test]
    fn test_equal_finish_times_keep_insertion_order() {
        let mut store = LeaderboardStore::new();
        store.record_finish(finish("a", 60_000.0));
        store.record_finish(finish("b", 60_000.0));
        store.record_finish(finish("c", 60_000.0));

        let finished = store.list_finished();
        let bibs: Vec<&str> = finished.iter().map(|e| e.bib_number.as_str()).collect();
        assert_eq!(bibs, vec!["a", "b", "c"]);
        assert_rank_invariant(&store);
    }

    #[test]
    fn test_delete_closes_rank_gaps() {
        let mut store = LeaderboardStore::new();
        store.record_finish(finish("1", 60_000.0));
        store.record_finish(finish("2", 70_000.0));
        store.record_finish(finish("3", 80_000.0));

        let second = store.find_by_bib("2").unwrap().id;
        store.delete_entry(second).unwrap();

        assert_eq!(store.entries().len(), 2);
        assert_rank_invariant(&store);
        assert_eq!(store.find_by_bib("3").unwrap().rank, Some(2));
    }

    #[test]
    fn test_delete_unknown_id_is_not_found() {
        let mut store = LeaderboardStore::new();
        assert!(matches!(
            store.delete_entry(Uuid::new_v4()),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_import_creates_and_merges() {
        let mut store = LeaderboardStore::new();
        store.record_finish(finish("101", 65_000.0));

        let summary = store.import_roster(roster_batch(
            "bibNumber,racerName,gender,team\n\
             101,Ada Lovelace,F,Analytical\n\
             102,Alan Turing,male,Bletchley\n",
        ));

        assert_eq!(summary.created, 1);
        assert_eq!(summary.updated, 1);
        assert!(summary.errors.is_empty());

        // the pre-existing finisher keeps its time but picks up identity
        let ada = store.find_by_bib("101").unwrap();
        assert_eq!(ada.racer_name, "Ada Lovelace");
        assert_eq!(ada.gender.as_deref(), Some("W"));
        assert_eq!(ada.finish_time_ms, Some(65_000.0));
        assert_eq!(ada.rank, Some(1));

        // finished bibs are excluded from the roster-of-truth
        assert!(store.roster_entry("101").is_none());
        assert!(store.roster_entry("102").is_some());
    }

    #[test]
    fn test_import_rejects_duplicates_within_batch() {
        let mut store = LeaderboardStore::new();
        let summary = store.import_roster(roster_batch(
            "bibNumber,racerName\n7,First\n7,Second\n8,Third\n",
        ));

        assert_eq!(summary.created, 2);
        assert_eq!(summary.errors.len(), 1);
        assert!(summary.errors[0].contains("Row 3"));
        assert_eq!(store.find_by_bib("7").unwrap().racer_name, "First");
    }

    #[test]
    fn test_import_reports_missing_fields_per_row() {
        let mut store = LeaderboardStore::new();
        let summary = store.import_roster(roster_batch(
            "bibNumber,racerName\n,No Bib\n9,\n10,Fine\n",
        ));

        assert_eq!(summary.created, 1);
        assert_eq!(summary.errors.len(), 2);
    }

    #[test]
    fn test_import_twice_is_idempotent() {
        let csv = "bibNumber,racerName,team\n1,Ada,X\n2,Alan,Y\n3,Edsger,Z\n";

        let mut store = LeaderboardStore::new();
        let first = store.import_roster(roster_batch(csv));
        assert_eq!(first.created, 3);
        assert_eq!(first.updated, 0);
        let snapshot: Vec<(String, String)> = store
            .entries()
            .iter()
            .map(|e| (e.bib_number.clone(), e.racer_name.clone()))
            .collect();

        let second = store.import_roster(roster_batch(csv));
        assert_eq!(second.created, 0);
        assert_eq!(second.updated, 3);
        let after: Vec<(String, String)> = store
            .entries()
            .iter()
            .map(|e| (e.bib_number.clone(), e.racer_name.clone()))
            .collect();
        assert_eq!(snapshot, after, "no duplication on re-import");
    }

    #[test]
    fn test_bib_renumber_rederives_identity_from_roster() {
        let mut store = LeaderboardStore::new();
        store.import_roster(roster_batch(
            "bibNumber,racerName,gender\n200,Right Person,W\n",
        ));
        store.record_finish(finish("999", 70_000.0));
        let id = store.find_by_bib("999").unwrap().id;

        // operator fixes the bib but leaves the stale placeholder name
        let (entry, bib_changed) = store
            .update_entry(
                id,
                EntryPatch {
                    bib_number: Some("200".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert!(bib_changed);
        assert_eq!(entry.bib_number, "200");
        assert_eq!(entry.racer_name, "Right Person");
        assert_eq!(entry.gender.as_deref(), Some("W"));
        assert_eq!(entry.finish_time_ms, Some(70_000.0), "finish preserved");
    }

    #[test]
    fn test_explicit_name_overrides_roster_on_renumber() {
        let mut store = LeaderboardStore::new();
        store.import_roster(roster_batch("bibNumber,racerName\n200,Roster Name\n"));
        store.record_finish(finish("999", 70_000.0));
        let id = store.find_by_bib("999").unwrap().id;

        let (entry, _) = store
            .update_entry(
                id,
                EntryPatch {
                    bib_number: Some("200".to_string()),
                    racer_name: Some("Deliberate Override".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(entry.racer_name, "Deliberate Override");
    }

    #[test]
    fn test_update_finish_time_recomputes_ranks() {
        let mut store = LeaderboardStore::new();
        store.record_finish(finish("1", 60_000.0));
        store.record_finish(finish("2", 70_000.0));
        let id = store.find_by_bib("2").unwrap().id;

        let (entry, bib_changed) = store
            .update_entry(
                id,
                EntryPatch {
                    finish_time_ms: Some(50_000.0),
                    ..Default::default()
                },
            )
            .unwrap();

        assert!(!bib_changed);
        assert_eq!(entry.rank, Some(1));
        assert_rank_invariant(&store);
    }

    #[test]
    fn test_update_unknown_id_is_not_found() {
        let mut store = LeaderboardStore::new();
        assert!(matches!(
            store.update_entry(Uuid::new_v4(), EntryPatch::default()),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_reorder_prunes_unnamed_entries() {
        let mut store = LeaderboardStore::new();
        store.record_finish(finish("1", 60_000.0));
        store.record_finish(finish("2", 60_000.0));
        store.record_finish(finish("3", 80_000.0));

        let first = store.find_by_bib("1").unwrap().id;
        let second = store.find_by_bib("2").unwrap().id;

        // swap the tied pair, drop the third
        let reordered = store.reorder(&[(second, 1), (first, 2)]);

        assert_eq!(reordered.len(), 2);
        assert_eq!(reordered[0].bib_number, "2");
        assert_eq!(reordered[0].rank, Some(1));
        assert_eq!(store.entries().len(), 2);
        assert!(store.find_by_bib("3").is_none());
    }

    #[test]
    fn test_list_finished_excludes_registered_only_entries() {
        let mut store = LeaderboardStore::new();
        store.import_roster(roster_batch("bibNumber,racerName\n1,Ada\n2,Alan\n"));
        store.record_finish(finish("2", 61_000.0));

        let finished = store.list_finished();
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].bib_number, "2");
        assert_eq!(store.entries().len(), 2);
    }
}
