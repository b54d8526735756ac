//! Search request parameters.

use std::fmt;
use std::str::FromStr;

/// Largest page/offset index the API accepts.
pub const MAX_PAGE: u8 = 9;

/// Smallest per-page result count.
pub const MIN_COUNT: u8 = 1;

/// Largest per-page result count.
pub const MAX_COUNT: u8 = 20;

/// SafeSearch filtering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SafeSearch {
    /// No filtering.
    #[default]
    Off,
    /// Filter explicit content but keep borderline results.
    Moderate,
    /// Filter all adult content.
    Strict,
}

impl SafeSearch {
    /// Returns the API parameter value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Moderate => "moderate",
            Self::Strict => "strict",
        }
    }
}

impl fmt::Display for SafeSearch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SafeSearch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(Self::Off),
            "moderate" => Ok(Self::Moderate),
            "strict" => Ok(Self::Strict),
            other => Err(format!(
                "invalid safesearch value: {other:?} (allowed: off|moderate|strict)"
            )),
        }
    }
}

/// Parameters for fetching one page of results.
///
/// A request is immutable per attempt; the runner builds a fresh one with
/// [`PageRequest::next_page`] when it scrolls forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// The search string.
    pub query: String,
    /// Results per page (1..=20).
    pub count: u8,
    /// Page/offset index (0..=9).
    pub page: u8,
    /// SafeSearch mode.
    pub safe_search: SafeSearch,
    /// Opaque freshness token passed through to the API (`pd`, `pw`, date range, ...).
    pub freshness: Option<String>,
}

impl PageRequest {
    /// Creates a request for `query` with default count/page/filters.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            count: MAX_COUNT,
            page: 0,
            safe_search: SafeSearch::Off,
            freshness: None,
        }
    }

    /// Returns the same request advanced by one page.
    #[must_use]
    pub fn next_page(&self) -> Self {
        Self {
            page: self.page.saturating_add(1),
            ..self.clone()
        }
    }

    /// Returns true when no later page may be requested.
    #[must_use]
    pub fn is_last_page(&self) -> bool {
        self.page >= MAX_PAGE
    }

    /// Returns the freshness token if it is non-blank, trimmed.
    #[must_use]
    pub fn freshness_param(&self) -> Option<&str> {
        self.freshness
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
    }
}
