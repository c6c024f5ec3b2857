//! CSS minification.

use super::{Diagnostic, Diagnostics, Processed, Processor};

pub const MIME_TYPE_CSS: &str = "text/css; charset=utf-8";

/// Column after which a line break is inserted following the next `}`.
const WRAP_AT_COLUMN: usize = 80;

/// Minifies CSS with `minifier::css` and wraps long output lines.
#[derive(Debug, Clone, Copy)]
pub struct CssProcessor {
    wrap_at: Option<usize>,
}

impl CssProcessor {
    pub const fn new() -> Self {
        Self { wrap_at: Some(WRAP_AT_COLUMN) }
    }

    /// Minify, returning diagnostics when the minifier rejects the input.
    pub fn minify(&self, source: &str) -> Result<String, Diagnostics> {
        let minified = minifier::css::minify(source)
            .map_err(|e| Diagnostics::from(Diagnostic::runtime(format!("css: {e}"))))?
            .to_string();

        Ok(match self.wrap_at {
            Some(column) => wrap_after_blocks(&minified, column),
            None => minified,
        })
    }
}

impl Default for CssProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor for CssProcessor {
    fn name(&self) -> &'static str {
        "css"
    }

    fn content_type(&self) -> &'static str {
        MIME_TYPE_CSS
    }

    fn process(&self, source: &str) -> Processed {
        match self.minify(source) {
            Ok(css) => Processed::Minified(css),
            Err(diagnostics) => Processed::Rejected(diagnostics),
        }
    }
}

/// Insert a newline after any `}` that ends a line longer than `column`.
///
/// Braces inside quoted strings are left alone.
fn wrap_after_blocks(css: &str, column: usize) -> String {
    let mut out = String::with_capacity(css.len() + css.len() / column.max(1));
    let mut line_len = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in css.chars() {
        out.push(c);
        line_len += 1;

        if c == '\n' {
            line_len = 0;
            continue;
        }

        match quote {
            Some(_) if escaped => escaped = false,
            Some(_) if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == '}' && line_len > column => {
                out.push('\n');
                line_len = 0;
            }
            None => {}
        }
    }

    if out.ends_with('\n') && !css.ends_with('\n') {
        out.pop();
    }
    out
}
