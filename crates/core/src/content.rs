//! Source fragments and their canonical aggregation.

use std::fmt;

use crate::cache::hash::Fingerprint;

/// Where a fragment's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// A form or query parameter value.
    Inline,
    /// A file part of a multipart upload.
    Upload,
    /// The body of a dereferenced `http(s)://` parameter value.
    Remote,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Origin::Inline => "inline",
            Origin::Upload => "upload",
            Origin::Remote => "remote",
        })
    }
}

/// One piece of collected input text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    key: String,
    origin: Origin,
    text: String,
}

impl Fragment {
    pub fn new(key: impl Into<String>, origin: Origin, text: impl Into<String>) -> Self {
        Self { key: key.into(), origin, text: text.into() }
    }

    pub fn inline(key: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(key, Origin::Inline, text)
    }

    pub fn remote(key: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(key, Origin::Remote, text)
    }

    /// Upload parts have no meaningful name, so they are keyed by position.
    pub fn upload(index: usize, text: impl Into<String>) -> Self {
        Self::new(format!("upload-{index}"), Origin::Upload, text)
    }

    /// Ordering key: the parameter name, or `upload-<n>`.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// The trimmed concatenation of every fragment of a request.
///
/// Never empty: [`CanonicalContent::aggregate`] returns `None` instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalContent(String);

impl CanonicalContent {
    /// Concatenate fragments in the given order, each followed by a newline,
    /// and trim the result. Returns `None` when nothing but whitespace remains.
    pub fn aggregate(fragments: &[Fragment]) -> Option<Self> {
        let capacity = fragments.iter().map(|f| f.text.len() + 1).sum();
        let mut joined = String::with_capacity(capacity);
        for fragment in fragments {
            joined.push_str(&fragment.text);
            joined.push('\n');
        }

        let trimmed = joined.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(self.0.as_bytes())
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for CanonicalContent {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_joins_with_newlines_and_trims() {
        let fragments = vec![Fragment::inline("a", "one"), Fragment::inline("b", "two")];
        let content = CanonicalContent::aggregate(&fragments).unwrap();
        assert_eq!(content.as_str(), "one\ntwo");
    }

    #[test]
    fn test_aggregate_trims_outer_whitespace_only() {
        let fragments = vec![Fragment::inline("a", "  \n body { }  "), Fragment::upload(0, "\n\n p {}\n")];
        let content = CanonicalContent::aggregate(&fragments).unwrap();
        assert_eq!(content.as_str(), "body { }  \n\n\n p {}");
    }

    #[test]
    fn test_aggregate_empty() {
        assert!(CanonicalContent::aggregate(&[]).is_none());
        let blanks = vec![Fragment::inline("a", "   "), Fragment::inline("b", "\t\n")];
        assert!(CanonicalContent::aggregate(&blanks).is_none());
    }

    #[test]
    fn test_same_values_same_fingerprint() {
        let first = CanonicalContent::aggregate(&[Fragment::inline("a", "x"), Fragment::remote("b", "y")]).unwrap();
        let second = CanonicalContent::aggregate(&[Fragment::upload(0, "x"), Fragment::upload(1, "y")]).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.fingerprint(), second.fingerprint());
    }

    #[test]
    fn test_order_changes_fingerprint() {
        let ab = CanonicalContent::aggregate(&[Fragment::inline("a", "x"), Fragment::inline("b", "y")]).unwrap();
        let ba = CanonicalContent::aggregate(&[Fragment::inline("b", "y"), Fragment::inline("a", "x")]).unwrap();
        assert_ne!(ab.fingerprint(), ba.fingerprint());
    }

    #[test]
    fn test_upload_keys() {
        let fragment = Fragment::upload(3, "text");
        assert_eq!(fragment.key(), "upload-3");
        assert_eq!(fragment.origin(), Origin::Upload);
        assert_eq!(fragment.origin().to_string(), "upload");
    }
}
