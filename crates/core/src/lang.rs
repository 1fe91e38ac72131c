//! Supported language preferences.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Language preference of a participant.
///
/// The set is closed: anything outside it is normalized to [`Lang::DEFAULT`]
/// at the ledger boundary, so a stored record always carries a member of it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    #[default]
    Ru,
    Uz,
}

impl Lang {
    /// Code used when none (or an unsupported one) is supplied.
    pub const DEFAULT: Lang = Lang::Ru;

    /// Every supported language, in display order.
    pub const ALL: [Lang; 2] = [Lang::Ru, Lang::Uz];

    pub fn as_str(&self) -> &'static str {
        match self {
            Lang::Ru => "ru",
            Lang::Uz => "uz",
        }
    }

    /// Parse a supported code (case-insensitive, surrounding whitespace ignored).
    ///
    /// `"UZ"` and `" uz"` both select `uz`; only unknown codes fall back to
    /// the default in [`Lang::or_default`].
    pub fn parse(code: &str) -> Option<Lang> {
        match code.trim().to_ascii_lowercase().as_str() {
            "ru" => Some(Lang::Ru),
            "uz" => Some(Lang::Uz),
            _ => None,
        }
    }

    /// Parse an optional hint, falling back to the default code.
    pub fn or_default(code: Option<&str>) -> Lang {
        code.and_then(Lang::parse).unwrap_or_default()
    }
}

impl core::fmt::Display for Lang {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Lang {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Lang::parse(s).ok_or_else(|| DomainError::validation(format!("unsupported language code: {s:?}")))
    }
}
