//! Path prefix matching.
//!
//! # Design Decisions
//! - Matching is case-sensitive and purely textual; decoding happens later,
//!   in the handler that owns the remainder
//! - A prefix ending in '/' matches whole segments, so "/static/" accepts
//!   "/static", "/static/" and "/static/a" but never "/staticfoo"
//! - A prefix without a trailing '/' is a plain string prefix
//! - "/" matches everything (the catch-all)

/// A compiled path prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPrefix {
    prefix: String,
    /// The prefix without its trailing '/', for segment-boundary matching.
    base: Option<String>,
}

impl PathPrefix {
    /// Compile a prefix as written in the configuration.
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let base = prefix
            .strip_suffix('/')
            .map(|base| base.to_string());
        Self { prefix, base }
    }

    /// The prefix as configured.
    pub fn as_str(&self) -> &str {
        &self.prefix
    }

    /// Number of bytes the prefix pins down; longer is more specific.
    pub fn specificity(&self) -> usize {
        self.prefix.len()
    }

    /// True if this is the "/" catch-all.
    pub fn is_catch_all(&self) -> bool {
        self.prefix == "/"
    }

    /// Match `path`, returning what follows the prefix.
    ///
    /// With segment matching the remainder is either empty or starts with '/'.
    pub fn strip<'a>(&self, path: &'a str) -> Option<&'a str> {
        match &self.base {
            Some(base) => {
                let rest = path.strip_prefix(base.as_str())?;
                if rest.is_empty() || rest.starts_with('/') {
                    Some(rest)
                } else {
                    None
                }
            }
            None => path.strip_prefix(self.prefix.as_str()),
        }
    }

    /// Returns true if `path` falls under this prefix.
    pub fn matches(&self, path: &str) -> bool {
        self.strip(path).is_some()
    }
}

impl std::fmt::Display for PathPrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.prefix)
    }
}
