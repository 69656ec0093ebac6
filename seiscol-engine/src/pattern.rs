//! fnmatch-style code patterns (`HN?`, `C*`, `[BH]N?`)

use crate::error::{Error, Result};
use crate::stream::InstrumentStream;
use glob::{MatchOptions, Pattern};

const CASE_INSENSITIVE: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Compile `pattern`, reporting the offending text on failure
pub fn compile(pattern: &str) -> Result<Pattern> {
    Pattern::new(pattern).map_err(|e| Error::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.msg.to_string(),
    })
}

/// Optional selector: `None` matches everything, comparison ignores case
#[derive(Debug, Clone, Default)]
pub struct CodeMatcher {
    pattern: Option<Pattern>,
}

impl CodeMatcher {
    pub fn new(pattern: Option<&str>) -> Result<Self> {
        Ok(Self {
            pattern: pattern.map(compile).transpose()?,
        })
    }

    pub fn matches(&self, code: &str) -> bool {
        self.pattern
            .as_ref()
            .map_or(true, |p| p.matches_with(code, CASE_INSENSITIVE))
    }
}

/// Network/station/instrument selection shared by collections and arrays
#[derive(Debug, Clone, Default)]
pub struct StreamSelector {
    network: CodeMatcher,
    station: CodeMatcher,
    instrument: CodeMatcher,
}

impl StreamSelector {
    /// `None` leaves that code unconstrained
    pub fn new(network: Option<&str>, station: Option<&str>, instrument: Option<&str>) -> Result<Self> {
        Ok(Self {
            network: CodeMatcher::new(network)?,
            station: CodeMatcher::new(station)?,
            instrument: CodeMatcher::new(instrument)?,
        })
    }

    pub fn matches(&self, stream: &InstrumentStream) -> bool {
        self.network.matches(stream.network())
            && self.station.matches(stream.station())
            && self.instrument.matches(stream.instrument_code())
    }
}
