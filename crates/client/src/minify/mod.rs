//! Source processors: the transformations run on a cache miss.
//!
//! Every processor is a pure function from canonical source text to either
//! minified output or a set of diagnostics. Only minified output may be
//! cached; diagnostics are rendered to the client as a plain-text report.
//!
//! - [`CssProcessor`]: `minifier::css`, wrapped at 80 columns
//! - [`JsProcessor`]: lexical validation, then `minifier::js`
//! - [`LessProcessor`]: LESS subset compiler feeding [`CssProcessor`]

use std::sync::Arc;

mod css;
mod diagnostics;
mod js;
mod less;

pub use css::{CssProcessor, MIME_TYPE_CSS};
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use js::{JsProcessor, MIME_TYPE_JAVASCRIPT};
pub use less::LessProcessor;

/// Outcome of a transformation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Processed {
    /// Transformed output, safe to cache.
    Minified(String),
    /// The source could not be transformed. Never cached.
    Rejected(Diagnostics),
}

impl Processed {
    pub fn is_cacheable(&self) -> bool {
        matches!(self, Processed::Minified(_))
    }
}

/// A pluggable source transformation.
pub trait Processor: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Media type of successful output.
    fn content_type(&self) -> &'static str;

    /// Transform canonical source text.
    fn process(&self, source: &str) -> Processed;
}

/// The built-in transformations, one per endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    Css,
    Js,
    Less,
}

impl Transform {
    pub const ALL: [Transform; 3] = [Transform::Css, Transform::Js, Transform::Less];

    /// The built-in processor for this transformation.
    pub fn processor(self) -> Arc<dyn Processor> {
        match self {
            Transform::Css => Arc::new(CssProcessor::new()),
            Transform::Js => Arc::new(JsProcessor),
            Transform::Less => Arc::new(LessProcessor::new()),
        }
    }

    /// Route path serving this transformation.
    pub fn path(self) -> &'static str {
        match self {
            Transform::Css => "/css",
            Transform::Js => "/js",
            Transform::Less => "/less",
        }
    }
}

impl std::str::FromStr for Transform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "css" => Ok(Transform::Css),
            "js" | "javascript" => Ok(Transform::Js),
            "less" => Ok(Transform::Less),
            other => Err(format!("unknown transform: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cacheability() {
        assert!(Processed::Minified("a{}".into()).is_cacheable());
        assert!(!Processed::Rejected(Diagnostics::from(Diagnostic::runtime("x"))).is_cacheable());
    }

    #[test]
    fn test_transform_lookup() {
        assert_eq!(Transform::Css.processor().name(), "css");
        assert_eq!(Transform::Js.processor().name(), "js");
        assert_eq!(Transform::Less.processor().name(), "less");
        assert_eq!(Transform::Less.processor().content_type(), Transform::Css.processor().content_type());
        assert_eq!("JS".parse::<Transform>(), Ok(Transform::Js));
        assert!("sass".parse::<Transform>().is_err());
    }

    #[test]
    fn test_paths_are_distinct() {
        let paths: Vec<_> = Transform::ALL.iter().map(|t| t.path()).collect();
        assert_eq!(paths, ["/css", "/js", "/less"]);
    }
}
