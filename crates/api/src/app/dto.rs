use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use roster_core::{DomainResult, Lang, ParticipantRecord, Participation, SourceTag, UserId};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct ParticipateRequest {
    pub user_id: i64,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub source: String,
    pub lang: Option<String>,
}

impl ParticipateRequest {
    /// Validate into a ledger event; only an empty source tag is rejected.
    pub fn into_participation(self) -> DomainResult<Participation> {
        let mut event = Participation::new(UserId::new(self.user_id), SourceTag::new(self.source)?);
        if let Some(username) = self.username {
            event = event.username(username);
        }
        if let Some(full_name) = self.full_name {
            event = event.full_name(full_name);
        }
        if let Some(lang) = self.lang {
            event = event.lang_hint(lang);
        }
        Ok(event)
    }
}

#[derive(Debug, Deserialize)]
pub struct SetLangRequest {
    pub lang: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    pub format: Option<String>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct LangResponse {
    pub user_id: UserId,
    pub lang: Lang,
}

#[derive(Debug, Serialize)]
pub struct RecentResponse {
    pub limit: usize,
    pub items: Vec<ParticipantRecord>,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub count: usize,
    pub by_lang: BTreeMap<&'static str, usize>,
    pub summary: String,
}

impl StatsResponse {
    pub fn new(count: usize, by_lang: &BTreeMap<Lang, usize>) -> Self {
        Self {
            count,
            by_lang: by_lang.iter().map(|(lang, n)| (lang.as_str(), *n)).collect(),
            summary: stats_summary(by_lang),
        }
    }
}

/// `"ru: 3, uz: 1"`, skipping languages nobody uses.
pub fn stats_summary(by_lang: &BTreeMap<Lang, usize>) -> String {
    by_lang
        .iter()
        .filter(|(_, n)| **n > 0)
        .map(|(lang, n)| format!("{lang}: {n}"))
        .collect::<Vec<_>>()
        .join(", ")
}
