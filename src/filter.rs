//! Result extraction from raw job logs.
//!
//! Engines print a marker line before each result block. Everything between
//! one marker and the next (or the end of the log) is a block; anything
//! before the first marker is scheduler and runtime noise.

use std::collections::HashMap;

use gol_protocol::EngineKind;
use regex_lite::Regex;
use thiserror::Error;
use tracing::debug;

use crate::engine::EngineSettings;

/// Returned to the client when the log holds no result block.
pub const NO_RESULT: &str = "[no result found in job output]";

/// Separator between consecutive result blocks.
const BLOCK_SEPARATOR: &str = "\n\n";

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("invalid result marker '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex_lite::Error,
    },

    #[error("result marker '{0}' matches empty text")]
    MatchesEmpty(String),
}

/// Outcome of filtering one log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilteredResult {
    /// Result blocks in log order, each trimmed and non-empty.
    Blocks(Vec<String>),
    NoResult,
}

impl FilteredResult {
    /// Text sent to the client.
    pub fn text(&self) -> String {
        match self {
            FilteredResult::Blocks(blocks) => blocks.join(BLOCK_SEPARATOR),
            FilteredResult::NoResult => NO_RESULT.to_string(),
        }
    }

    pub fn block_count(&self) -> usize {
        match self {
            FilteredResult::Blocks(blocks) => blocks.len(),
            FilteredResult::NoResult => 0,
        }
    }
}

/// Extracts marker-delimited blocks from log text.
#[derive(Debug, Clone)]
pub struct ResultFilter {
    marker: Regex,
    keep_marker: bool,
}

impl ResultFilter {
    pub fn new(pattern: &str) -> Result<Self, FilterError> {
        let marker = Regex::new(pattern).map_err(|source| FilterError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        // An empty match would split the log at every position.
        if marker.is_match("") {
            return Err(FilterError::MatchesEmpty(pattern.to_string()));
        }
        Ok(Self {
            marker,
            keep_marker: false,
        })
    }

    /// Start each block at the marker itself rather than after it.
    ///
    /// For engines whose marker line carries part of the result, such as
    /// a per-size verdict header.
    pub fn keeping_marker(mut self) -> Self {
        self.keep_marker = true;
        self
    }

    pub fn pattern(&self) -> &str {
        self.marker.as_str()
    }

    pub fn filter(&self, raw: &str) -> FilteredResult {
        let markers: Vec<_> = self.marker.find_iter(raw).collect();

        let mut blocks = Vec::new();
        for (i, m) in markers.iter().enumerate() {
            let end = markers.get(i + 1).map_or(raw.len(), |next| next.start());
            let start = if self.keep_marker { m.start() } else { m.end() };
            let block = raw[start..end].trim();
            if !block.is_empty() {
                blocks.push(block.to_string());
            }
        }

        if blocks.is_empty() {
            FilteredResult::NoResult
        } else {
            FilteredResult::Blocks(blocks)
        }
    }
}

/// One compiled filter per engine.
#[derive(Debug, Clone)]
pub struct ResultFilters {
    filters: HashMap<EngineKind, ResultFilter>,
}

impl ResultFilters {
    pub fn from_settings(engines: &EngineSettings) -> Result<Self, FilterError> {
        let mut filters = HashMap::new();
        for template in engines.templates() {
            let mut filter = ResultFilter::new(template.result_marker())?;
            if template.keep_marker() {
                filter = filter.keeping_marker();
            }
            debug!(engine = %template.kind(), marker = filter.pattern(), "result filter compiled");
            filters.insert(template.kind(), filter);
        }
        Ok(Self { filters })
    }

    /// Filter `raw` with the marker of `engine`.
    pub fn filter(&self, engine: EngineKind, raw: &str) -> FilteredResult {
        match self.filters.get(&engine) {
            Some(filter) => filter.filter(raw),
            None => FilteredResult::NoResult,
        }
    }
}
