//! Authentication headers and their two wire conventions.
//!
//! Playlist requests take a structured [`HeaderMap`]. Segment fetches take a
//! [`HeaderBlock`], the same headers pre-formatted as one CRLF-joined string,
//! which is what ffmpeg's `-headers` option expects.

use std::fmt;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::warn;

use crate::RecorderError;

/// Supplies the headers that authenticate every upstream request.
///
/// Invoked once per recording session.
#[async_trait]
pub trait HeaderProvider: Send + Sync {
    async fn authenticated_headers(&self) -> Result<HeaderMap, RecorderError>;
}

/// A provider that hands out a fixed header set.
#[derive(Debug, Clone, Default)]
pub struct StaticHeaders {
    headers: HeaderMap,
}

impl StaticHeaders {
    pub fn new(headers: HeaderMap) -> Self {
        Self { headers }
    }
}

#[async_trait]
impl HeaderProvider for StaticHeaders {
    async fn authenticated_headers(&self) -> Result<HeaderMap, RecorderError> {
        Ok(self.headers.clone())
    }
}

/// Parse a header line in format "Name: Value".
pub fn parse_header_line(line: &str) -> Result<(HeaderName, HeaderValue), RecorderError> {
    let Some(colon_pos) = line.find(':') else {
        return Err(RecorderError::HeaderError(format!(
            "'{line}', expected 'Name: Value'"
        )));
    };

    let name = line[..colon_pos].trim();
    let value = line[colon_pos + 1..].trim();

    let header_name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| RecorderError::HeaderError(format!("invalid header name '{name}'")))?;
    let header_value = HeaderValue::from_str(value)
        .map_err(|_| RecorderError::HeaderError(format!("invalid value for header '{name}'")))?;

    Ok((header_name, header_value))
}

/// Headers formatted as `Name: Value\r\n` lines.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct HeaderBlock(String);

impl HeaderBlock {
    /// Formats a header map. Values that are not visible ASCII are dropped.
    pub fn from_header_map(headers: &HeaderMap) -> Self {
        let mut block = String::new();
        for (name, value) in headers {
            match value.to_str() {
                Ok(value) => {
                    block.push_str(name.as_str());
                    block.push_str(": ");
                    block.push_str(value);
                    block.push_str("\r\n");
                }
                Err(_) => warn!(header = %name, "Skipping non-ASCII header value in header block"),
            }
        }
        Self(block)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parses the block back into a header map.
    pub fn to_header_map(&self) -> Result<HeaderMap, RecorderError> {
        let mut headers = HeaderMap::new();
        for line in self.0.split("\r\n").filter(|l| !l.trim().is_empty()) {
            let (name, value) = parse_header_line(line)?;
            headers.append(name, value);
        }
        Ok(headers)
    }
}

impl fmt::Debug for HeaderBlock {
    // Header values carry credentials.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self
            .0
            .split("\r\n")
            .filter_map(|line| line.split_once(':').map(|(name, _)| name))
            .collect();
        f.debug_tuple("HeaderBlock").field(&names).finish()
    }
}
