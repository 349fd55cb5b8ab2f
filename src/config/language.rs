//! Response language selection
//!
//! Maps whatever the caller asked for onto the small set of languages the
//! assistant answers in. Anything unrecognized silently becomes English.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    English,
    Malayalam,
    Arabic,
}

impl Language {
    /// Resolve a requested language tag. Matches the language name or its
    /// locale code, case-insensitively.
    pub fn resolve(requested: Option<&str>) -> Self {
        match requested.map(str::to_lowercase).as_deref() {
            Some("english") | Some("en") => Language::English,
            Some("malayalam") | Some("ml") => Language::Malayalam,
            Some("arabic") | Some("ar") => Language::Arabic,
            _ => Language::English,
        }
    }

    /// Resolve from an `Accept-Language` header value, using only the
    /// first (highest priority) tag's primary subtag.
    pub fn from_accept_language(header: &str) -> Self {
        let primary = header
            .split(',')
            .next()
            .and_then(|tag| tag.split(';').next())
            .and_then(|tag| tag.trim().split('-').next())
            .unwrap_or("");
        Self::resolve(Some(primary))
    }

    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Malayalam => "ml",
            Language::Arabic => "ar",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Malayalam => "Malayalam",
            Language::Arabic => "Arabic",
        }
    }

    /// Whether names must be written in the language's own script.
    pub fn uses_native_script(&self) -> bool {
        matches!(self, Language::Malayalam | Language::Arabic)
    }
}
