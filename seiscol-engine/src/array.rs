//! StreamArray: one single-record stream per channel
//!
//! Used when every channel is processed on its own (for example dense
//! arrays where the location code distinguishes sensors). Each stream's
//! identity is the full `network.station.location.channel` id.

use crate::error::Result;
use crate::pattern::StreamSelector;
use crate::stream::{GroupingMode, InstrumentStream};
use std::fmt;

const INDENT: &str = "  ";

#[derive(Debug, Clone, Default)]
pub struct StreamArray {
    streams: Vec<InstrumentStream>,
}

impl StreamArray {
    /// Split every input stream into one stream per record, carrying the
    /// source stream's parameters and tag to each piece
    pub fn new(streams: Vec<InstrumentStream>) -> Result<Self> {
        let mut split = Vec::new();
        for stream in streams {
            let (_, parameters, tag, records) = stream.into_parts();
            for record in records {
                let mut single = InstrumentStream::new(vec![record], GroupingMode::Array)?;
                single.set_metadata(parameters.clone(), tag.clone());
                split.push(single);
            }
        }
        Ok(Self { streams: split })
    }

    /// Rebuild with one more stream
    pub fn append(self, stream: InstrumentStream) -> Result<Self> {
        let mut streams = self.streams;
        streams.push(stream);
        Self::new(streams)
    }

    pub fn streams(&self) -> &[InstrumentStream] {
        &self.streams
    }

    pub fn iter(&self) -> std::slice::Iter<'_, InstrumentStream> {
        self.streams.iter()
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn select(
        &self,
        network: Option<&str>,
        station: Option<&str>,
        instrument: Option<&str>,
    ) -> Result<Vec<&InstrumentStream>> {
        let selector = StreamSelector::new(network, station, instrument)?;
        Ok(self.streams.iter().filter(|s| selector.matches(s)).collect())
    }

    pub fn n_passed(&self) -> usize {
        self.streams.iter().filter(|s| s.passed()).count()
    }

    pub fn n_failed(&self) -> usize {
        self.len() - self.n_passed()
    }

    pub fn describe(&self) -> String {
        let mut lines = vec![format!(
            "{} instrument stream(s) in stream array:",
            self.streams.len()
        )];
        for stream in &self.streams {
            for line in stream.to_string().lines() {
                lines.push(format!("{}{}", INDENT, line));
            }
        }
        lines.join("\n")
    }
}

impl<'a> IntoIterator for &'a StreamArray {
    type Item = &'a InstrumentStream;
    type IntoIter = std::slice::Iter<'a, InstrumentStream>;

    fn into_iter(self) -> Self::IntoIter {
        self.streams.iter()
    }
}

impl fmt::Display for StreamArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} instrument stream(s) in stream array ({} passed, {} failed)",
            self.len(),
            self.n_passed(),
            self.n_failed()
        )
    }
}
