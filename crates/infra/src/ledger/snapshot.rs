//! In-memory record set shared by the file-backed and in-memory ledgers.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

use roster_core::{Lang, ListLimit, ParticipantRecord, Participation, UserId};

use super::r#trait::empty_lang_counts;

/// Complete record set in insertion order, indexed by user.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    records: Vec<ParticipantRecord>,
    index: HashMap<UserId, usize>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from stored rows.
    ///
    /// A repeated `user_id` replaces the earlier row but keeps its position,
    /// so a hand-edited file with duplicates still loads as one record per user.
    pub fn from_records(rows: impl IntoIterator<Item = ParticipantRecord>) -> Self {
        let mut snapshot = Self::new();
        for row in rows {
            match snapshot.index.get(&row.user_id) {
                Some(&pos) => snapshot.records[pos] = row,
                None => snapshot.push(row),
            }
        }
        snapshot
    }

    fn push(&mut self, record: ParticipantRecord) {
        self.index.insert(record.user_id, self.records.len());
        self.records.push(record);
    }

    pub fn records(&self) -> &[ParticipantRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<ParticipantRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, user_id: UserId) -> Option<&ParticipantRecord> {
        self.index.get(&user_id).map(|&pos| &self.records[pos])
    }

    fn get_mut(&mut self, user_id: UserId) -> Option<&mut ParticipantRecord> {
        let pos = *self.index.get(&user_id)?;
        self.records.get_mut(pos)
    }

    /// Apply a participation; returns `true` when a new record was created.
    pub fn upsert(&mut self, event: &Participation, now: DateTime<Utc>) -> bool {
        match self.get_mut(event.user_id) {
            Some(existing) => {
                existing.apply_participation(event, now);
                false
            }
            None => {
                self.push(ParticipantRecord::from_participation(event, now));
                true
            }
        }
    }

    /// Store a language preference; returns `true` when a new record was created.
    pub fn set_lang(&mut self, user_id: UserId, lang: Lang, now: DateTime<Utc>) -> bool {
        match self.get_mut(user_id) {
            Some(existing) => {
                existing.apply_lang(lang);
                false
            }
            None => {
                self.push(ParticipantRecord::from_lang_change(user_id, lang, now));
                true
            }
        }
    }

    pub fn lang_of(&self, user_id: UserId) -> Lang {
        self.get(user_id).map(|r| r.lang).unwrap_or_default()
    }

    pub fn count_by_lang(&self) -> BTreeMap<Lang, usize> {
        let mut counts = empty_lang_counts();
        for record in &self.records {
            *counts.entry(record.lang).or_insert(0) += 1;
        }
        counts
    }

    /// Newest first; the sort is stable so ties keep insertion order.
    pub fn recent(&self, limit: ListLimit) -> Vec<ParticipantRecord> {
        let mut sorted = self.records.clone();
        sorted.sort_by(|a, b| b.last_participated.cmp(&a.last_participated));
        sorted.truncate(limit.get());
        sorted
    }
}
