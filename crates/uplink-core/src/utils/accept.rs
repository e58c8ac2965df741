//! Accept filter for MIME types and filename extensions.

use std::fmt;
use std::str::FromStr;

/// One entry of an accept filter.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Pattern {
    /// `.pdf`: case-insensitive filename suffix.
    Extension(String),
    /// `image/*`: any subtype of a base type.
    BaseType(String),
    /// `image/png`: exact MIME type.
    Exact(String),
}

/// Parsed, comma-separated accept list.
///
/// ```text
/// "image/*, application/pdf, .psd"
/// ```
///
/// An empty filter accepts everything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AcceptFilter {
    patterns: Vec<Pattern>,
}

impl AcceptFilter {
    /// Parse a comma-separated list. Whitespace around entries is ignored.
    pub fn parse(filter: &str) -> Self {
        let patterns = filter
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                if entry.starts_with('.') {
                    Pattern::Extension(entry.to_lowercase())
                } else if let Some(base) = entry.strip_suffix("/*") {
                    Pattern::BaseType(base.to_lowercase())
                } else {
                    Pattern::Exact(entry.to_lowercase())
                }
            })
            .collect();
        Self { patterns }
    }

    /// Build from an optional list; `None` accepts everything.
    pub fn from_option(filter: Option<&str>) -> Self {
        filter.map(Self::parse).unwrap_or_default()
    }

    /// True when no patterns are configured.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Check a filename / MIME type pair against the filter. MIME types
    /// compare case-insensitively.
    pub fn matches(&self, filename: &str, mime_type: &str) -> bool {
        if self.patterns.is_empty() {
            return true;
        }

        let mime_type = mime_type.to_lowercase();
        let base_type = mime_type.split('/').next().unwrap_or_default();
        let lower_name = filename.to_lowercase();

        self.patterns.iter().any(|pattern| match pattern {
            Pattern::Extension(ext) => lower_name.ends_with(ext.as_str()),
            Pattern::BaseType(base) => base_type == base,
            Pattern::Exact(exact) => mime_type == *exact,
        })
    }
}

impl FromStr for AcceptFilter {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for AcceptFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .patterns
            .iter()
            .map(|p| match p {
                Pattern::Extension(ext) => ext.clone(),
                Pattern::BaseType(base) => format!("{base}/*"),
                Pattern::Exact(exact) => exact.clone(),
            })
            .collect();
        f.write_str(&rendered.join(","))
    }
}
