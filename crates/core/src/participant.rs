//! Participant record and its upsert rules.
//!
//! The ledger stores the latest known state per user, never a history. All
//! state transitions live here as pure functions over [`ParticipantRecord`]
//! so every storage backend applies exactly the same rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::UserId;
use crate::lang::Lang;

/// Label of the event that produced the latest mutation of a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceTag(String);

impl SourceTag {
    /// Tag used when a record is created by a language change.
    pub const LANG: &'static str = "lang";
    pub const START: &'static str = "/start";
    pub const BUTTON: &'static str = "button";

    /// Build a tag; surrounding whitespace is dropped and the result must be non-empty.
    pub fn new(tag: impl Into<String>) -> DomainResult<Self> {
        let tag = tag.into();
        let trimmed = tag.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("source tag must not be empty"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn start() -> Self {
        Self(Self::START.to_string())
    }

    pub fn button() -> Self {
        Self(Self::BUTTON.to_string())
    }

    pub fn lang_change() -> Self {
        Self(Self::LANG.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for SourceTag {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A participation event as handed over by the transport layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participation {
    pub user_id: UserId,
    pub username: String,
    pub full_name: String,
    pub source: SourceTag,
    /// Raw language hint; unsupported values are ignored.
    pub lang_hint: Option<String>,
}

impl Participation {
    pub fn new(user_id: UserId, source: SourceTag) -> Self {
        Self {
            user_id,
            username: String::new(),
            full_name: String::new(),
            source,
            lang_hint: None,
        }
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    pub fn full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = full_name.into();
        self
    }

    pub fn lang_hint(mut self, lang: impl Into<String>) -> Self {
        self.lang_hint = Some(lang.into());
        self
    }

    fn supported_lang(&self) -> Option<Lang> {
        self.lang_hint.as_deref().and_then(Lang::parse)
    }
}

/// Latest known state of one participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantRecord {
    pub user_id: UserId,
    pub username: String,
    pub full_name: String,
    pub first_seen: DateTime<Utc>,
    pub last_participated: DateTime<Utc>,
    pub source: SourceTag,
    pub lang: Lang,
}

impl ParticipantRecord {
    /// Record created by the first participation of a user.
    ///
    /// Names are stored trimmed, so stray whitespace from the transport never
    /// reaches the CSV artifact.
    pub fn from_participation(event: &Participation, now: DateTime<Utc>) -> Self {
        Self {
            user_id: event.user_id,
            username: event.username.trim().to_string(),
            full_name: event.full_name.trim().to_string(),
            first_seen: now,
            last_participated: now,
            source: event.source.clone(),
            lang: event.supported_lang().unwrap_or_default(),
        }
    }

    /// Record created by a language change for a user never seen before.
    pub fn from_lang_change(user_id: UserId, lang: Lang, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            username: String::new(),
            full_name: String::new(),
            first_seen: now,
            last_participated: now,
            source: SourceTag::lang_change(),
            lang,
        }
    }

    /// Apply a repeated participation in place.
    ///
    /// `first_seen` is never touched; `lang` only changes for a supported hint.
    pub fn apply_participation(&mut self, event: &Participation, now: DateTime<Utc>) {
        debug_assert_eq!(self.user_id, event.user_id);
        // Trimmed like on creation.
        self.username = event.username.trim().to_string();
        self.full_name = event.full_name.trim().to_string();
        self.source = event.source.clone();
        self.last_participated = now.max(self.first_seen);
        if let Some(lang) = event.supported_lang() {
            self.lang = lang;
        }
    }

    /// Preference-only update: recency and source are left as they are.
    pub fn apply_lang(&mut self, lang: Lang) {
        self.lang = lang;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn alice() -> Participation {
        Participation::new(UserId::new(1), SourceTag::start())
            .username("alice")
            .full_name("  Alice A ")
    }

    #[test]
    fn first_participation_uses_default_lang_and_equal_timestamps() {
        let rec = ParticipantRecord::from_participation(&alice(), t0());
        assert_eq!(rec.lang, Lang::Ru);
        assert_eq!(rec.first_seen, rec.last_participated);
        assert_eq!(rec.full_name, "Alice A");
        assert_eq!(rec.source.as_str(), "/start");
    }

    #[test]
    fn repeated_participation_overwrites_but_keeps_first_seen() {
        let mut rec = ParticipantRecord::from_participation(&alice(), t0());
        let later = t0() + Duration::minutes(5);
        let event = Participation::new(UserId::new(1), SourceTag::button())
            .username("alice2")
            .lang_hint("uz");
        rec.apply_participation(&event, later);

        assert_eq!(rec.first_seen, t0());
        assert_eq!(rec.last_participated, later);
        assert_eq!(rec.username, "alice2");
        assert_eq!(rec.full_name, "");
        assert_eq!(rec.source.as_str(), "button");
        assert_eq!(rec.lang, Lang::Uz);
    }

    #[test]
    fn invalid_hint_leaves_lang_untouched() {
        let mut rec = ParticipantRecord::from_participation(&alice().lang_hint("uz"), t0());
        rec.apply_participation(&alice().lang_hint("klingon"), t0() + Duration::seconds(1));
        assert_eq!(rec.lang, Lang::Uz);
        rec.apply_participation(&alice(), t0() + Duration::seconds(2));
        assert_eq!(rec.lang, Lang::Uz);
    }

    #[test]
    fn clock_stepping_backwards_never_precedes_first_seen() {
        let mut rec = ParticipantRecord::from_participation(&alice(), t0());
        rec.apply_participation(&alice(), t0() - Duration::hours(1));
        assert_eq!(rec.last_participated, t0());
    }

    #[test]
    fn lang_change_is_a_pure_preference_update() {
        let mut rec = ParticipantRecord::from_participation(&alice(), t0());
        rec.apply_lang(Lang::Uz);
        assert_eq!(rec.lang, Lang::Uz);
        assert_eq!(rec.last_participated, t0());
        assert_eq!(rec.source.as_str(), "/start");

        let fresh = ParticipantRecord::from_lang_change(UserId::new(7), Lang::Uz, t0());
        assert_eq!(fresh.source.as_str(), "lang");
        assert!(fresh.username.is_empty() && fresh.full_name.is_empty());
    }

    #[test]
    fn empty_source_tag_is_rejected() {
        assert!(SourceTag::new("   ").is_err());
        assert_eq!(SourceTag::new(" button ").unwrap().as_str(), "button");
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: for any sequence of participations (with arbitrary clock
        /// offsets and hints), first_seen is fixed and never exceeds last_participated.
        #[test]
        fn first_seen_is_immutable_and_bounded(
            steps in prop::collection::vec((-3600i64..3600i64, prop::option::of("[a-z]{0,3}")), 1..20)
        ) {
            let mut rec = ParticipantRecord::from_participation(&alice(), t0());
            for (offset, hint) in steps {
                let mut event = alice();
                event.lang_hint = hint.clone();
                let before = rec.lang;
                rec.apply_participation(&event, t0() + Duration::seconds(offset));

                prop_assert_eq!(rec.first_seen, t0());
                prop_assert!(rec.first_seen <= rec.last_participated);
                match hint.as_deref().and_then(Lang::parse) {
                    Some(lang) => prop_assert_eq!(rec.lang, lang),
                    None => prop_assert_eq!(rec.lang, before),
                }
            }
        }
    }
}
