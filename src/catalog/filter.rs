//! Status and free-text filtering of catalog entries

use std::fmt;
use thiserror::Error;

use super::entry::{CatalogEntry, PlayState};
use super::fuzzy::FuzzyQuery;

/// Which listening states to show
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    /// Anything not finished: unplayed or in progress
    Unplayed,
    Played,
    InProgress,
}

impl StatusFilter {
    pub fn parse(raw: &str) -> Option<Self> {
        let key: String = raw
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect();

        match key.as_str() {
            "" | "all" | "any" => Some(Self::All),
            "unplayed" | "notplayed" => Some(Self::Unplayed),
            "played" => Some(Self::Played),
            "inprogress" => Some(Self::InProgress),
            _ => None,
        }
    }

    /// `All` admits every entry, including states the normalizer did not recognise
    pub fn matches(&self, state: &PlayState) -> bool {
        match self {
            Self::All => true,
            Self::Unplayed => matches!(state, PlayState::Unplayed | PlayState::InProgress),
            Self::Played => matches!(state, PlayState::Played),
            Self::InProgress => matches!(state, PlayState::InProgress),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Unplayed => "unplayed",
            Self::Played => "played",
            Self::InProgress => "inProgress",
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured filter options as given on the command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOptions {
    pub status: Option<String>,
    pub shows: Vec<String>,
    pub stations: Vec<String>,
}

/// Unvalidated filter input
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RawFilterInput {
    #[default]
    Unset,
    Status(String),
    Options(FilterOptions),
}

/// Validated filters ready to apply
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterConfig {
    pub status: StatusFilter,
    pub show_filters: Vec<String>,
    pub station_filters: Vec<String>,
    pub show_matchers: Vec<FuzzyQuery>,
    pub station_matchers: Vec<FuzzyQuery>,
}

/// Either raw input or an already validated config
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterInput {
    Raw(RawFilterInput),
    Config(FilterConfig),
}

impl From<RawFilterInput> for FilterInput {
    fn from(raw: RawFilterInput) -> Self {
        Self::Raw(raw)
    }
}

impl From<FilterConfig> for FilterInput {
    fn from(config: FilterConfig) -> Self {
        Self::Config(config)
    }
}

/// Every problem found in a filter input
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{}", .0.join("; "))]
pub struct FilterErrors(pub Vec<String>);

fn compile_queries(kind: &str, values: Vec<String>, errors: &mut Vec<String>) -> (Vec<String>, Vec<FuzzyQuery>) {
    let mut filters = Vec::new();
    let mut matchers = Vec::new();

    for value in values {
        let query = FuzzyQuery::new(&value);
        if query.is_empty() {
            errors.push(format!("{} filter '{}' has nothing to match on", kind, value));
            continue;
        }
        filters.push(value.trim().to_string());
        matchers.push(query);
    }

    (filters, matchers)
}

/// Validate filter input into a [`FilterConfig`]
///
/// A config passes through unchanged. Raw input is checked in full and all
/// problems are reported together.
pub fn build_filter_config(input: impl Into<FilterInput>) -> Result<FilterConfig, FilterErrors> {
    let options = match input.into() {
        FilterInput::Config(config) => return Ok(config),
        FilterInput::Raw(RawFilterInput::Unset) => FilterOptions::default(),
        FilterInput::Raw(RawFilterInput::Status(status)) => FilterOptions {
            status: Some(status),
            ..Default::default()
        },
        FilterInput::Raw(RawFilterInput::Options(options)) => options,
    };

    let mut errors = Vec::new();

    let status = match options.status.as_deref() {
        None => StatusFilter::All,
        Some(raw) => StatusFilter::parse(raw).unwrap_or_else(|| {
            errors.push(format!(
                "Unknown status '{}' (expected all, unplayed, played or inProgress)",
                raw
            ));
            StatusFilter::All
        }),
    };

    let (show_filters, show_matchers) = compile_queries("Show", options.shows, &mut errors);
    let (station_filters, station_matchers) = compile_queries("Station", options.stations, &mut errors);

    if !errors.is_empty() {
        return Err(FilterErrors(errors));
    }

    Ok(FilterConfig {
        status,
        show_filters,
        station_filters,
        show_matchers,
        station_matchers,
    })
}

fn any_matches(matchers: &[FuzzyQuery], candidates: &[Option<&str>]) -> bool {
    matchers.is_empty()
        || matchers.iter().any(|query| {
            candidates
                .iter()
                .flatten()
                .any(|candidate| query.matches(candidate))
        })
}

impl FilterConfig {
    /// Status, show and station must all match; values within one dimension are alternatives
    pub fn matches(&self, entry: &CatalogEntry) -> bool {
        self.status.matches(&entry.play_state)
            && any_matches(
                &self.show_matchers,
                &[Some(entry.show_title.as_str()), entry.show_slug.as_deref()],
            )
            && any_matches(
                &self.station_matchers,
                &[entry.publisher_title.as_deref(), entry.publisher_slug.as_deref()],
            )
    }

    pub fn is_unfiltered(&self) -> bool {
        self.status == StatusFilter::All && self.show_matchers.is_empty() && self.station_matchers.is_empty()
    }

    /// Human-readable description of the active filters
    pub fn summary(&self) -> String {
        let mut parts = vec![format!("status={}", self.status)];
        if !self.show_filters.is_empty() {
            parts.push(format!("show={}", self.show_filters.join("|")));
        }
        if !self.station_filters.is_empty() {
            parts.push(format!("station={}", self.station_filters.join("|")));
        }
        parts.join(", ")
    }
}

/// Keep the entries matching a filter, preserving order
pub fn filter_entries(entries: &[CatalogEntry], config: &FilterConfig) -> Vec<CatalogEntry> {
    entries.iter().filter(|e| config.matches(e)).cloned().collect()
}
