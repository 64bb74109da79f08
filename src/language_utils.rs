use isolang::Language as IsoLanguage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Language utilities for the poetry translation workflow
///
/// Translation targets are restricted to a finite set of languages. Input
/// strings may be display names ("Chinese") or ISO 639-1 / 639-2 codes
/// ("zh", "zho", "chi"); codes are resolved through isolang.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    English,
    Chinese,
    Japanese,
    Korean,
    French,
    German,
    Spanish,
    Italian,
    Portuguese,
    Russian,
    Polish,
    Arabic,
}

impl Language {
    /// Every supported language, in display order
    pub const ALL: [Language; 12] = [
        Language::English,
        Language::Chinese,
        Language::Japanese,
        Language::Korean,
        Language::French,
        Language::German,
        Language::Spanish,
        Language::Italian,
        Language::Portuguese,
        Language::Russian,
        Language::Polish,
        Language::Arabic,
    ];

    /// English display name, as used in prompts
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::English => "English",
            Self::Chinese => "Chinese",
            Self::Japanese => "Japanese",
            Self::Korean => "Korean",
            Self::French => "French",
            Self::German => "German",
            Self::Spanish => "Spanish",
            Self::Italian => "Italian",
            Self::Portuguese => "Portuguese",
            Self::Russian => "Russian",
            Self::Polish => "Polish",
            Self::Arabic => "Arabic",
        }
    }

    /// ISO 639-3 code (identical to 639-2/T for these languages)
    pub fn iso_639_3(&self) -> &'static str {
        match self {
            Self::English => "eng",
            Self::Chinese => "zho",
            Self::Japanese => "jpn",
            Self::Korean => "kor",
            Self::French => "fra",
            Self::German => "deu",
            Self::Spanish => "spa",
            Self::Italian => "ita",
            Self::Portuguese => "por",
            Self::Russian => "rus",
            Self::Polish => "pol",
            Self::Arabic => "ara",
        }
    }

    /// Native name of the language, when isolang knows one
    pub fn native_name(&self) -> Option<&'static str> {
        IsoLanguage::from_639_3(self.iso_639_3()).and_then(|lang| lang.to_autonym())
    }

    /// Resolve an ISO 639-1 or 639-2 (T or B) code to a supported language
    pub fn from_code(code: &str) -> Option<Self> {
        let normalized = code.trim().to_lowercase();

        let iso = match normalized.len() {
            2 => IsoLanguage::from_639_1(&normalized),
            3 => {
                // ISO 639-2/B codes that differ from 639-2/T
                let part2t = match normalized.as_str() {
                    "chi" => "zho",
                    "fre" => "fra",
                    "ger" => "deu",
                    _ => normalized.as_str(),
                };
                IsoLanguage::from_639_3(part2t)
            }
            _ => None,
        }?;

        Self::ALL
            .iter()
            .copied()
            .find(|lang| lang.iso_639_3() == iso.to_639_3())
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Error returned when a string names no supported language
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported language: {0}")]
pub struct UnsupportedLanguage(pub String);

impl FromStr for Language {
    type Err = UnsupportedLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();

        if let Some(lang) = Self::ALL
            .iter()
            .copied()
            .find(|lang| lang.display_name().eq_ignore_ascii_case(trimmed))
        {
            return Ok(lang);
        }

        // A few common aliases for Chinese
        if matches!(trimmed.to_lowercase().as_str(), "mandarin" | "simplified chinese") {
            return Ok(Self::Chinese);
        }

        Self::from_code(trimmed).ok_or_else(|| UnsupportedLanguage(s.to_string()))
    }
}

/// Check if two language strings name the same supported language
pub fn languages_match(first: &str, second: &str) -> bool {
    match (first.parse::<Language>(), second.parse::<Language>()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
