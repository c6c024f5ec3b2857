//! JavaScript minification with a lexical pre-check.
//!
//! `minifier::js` never fails, so broken input would be cached as broken
//! output. A single-pass scanner first checks that strings, comments, regex
//! and template literals terminate and that brackets balance; only clean
//! input reaches the minifier.

use super::{Diagnostic, Diagnostics, Processed, Processor};

pub const MIME_TYPE_JAVASCRIPT: &str = "application/x-javascript; charset=utf-8";

/// Keywords after which a `/` starts a regular expression rather than a division.
const KEYWORDS_BEFORE_EXPRESSION: &[&str] = &[
    "return",
    "typeof",
    "instanceof",
    "in",
    "of",
    "new",
    "delete",
    "void",
    "throw",
    "case",
    "do",
    "else",
    "yield",
    "await",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct JsProcessor;

impl Processor for JsProcessor {
    fn name(&self) -> &'static str {
        "js"
    }

    fn content_type(&self) -> &'static str {
        MIME_TYPE_JAVASCRIPT
    }

    fn process(&self, source: &str) -> Processed {
        let diagnostics = check_syntax(source);
        if diagnostics.has_errors() {
            return Processed::Rejected(diagnostics);
        }
        Processed::Minified(minifier::js::minify(source).to_string())
    }
}

/// Scan `source` and report lexical and bracket-balance errors.
pub fn check_syntax(source: &str) -> Diagnostics {
    let mut scanner = Scanner::new(source);
    scanner.run();
    scanner.diagnostics
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenKind {
    Paren,
    Bracket,
    Brace,
    /// `${` inside a template literal; the position is the template's start.
    TemplateExpr,
}

impl OpenKind {
    fn closer(self) -> char {
        match self {
            OpenKind::Paren => ')',
            OpenKind::Bracket => ']',
            OpenKind::Brace | OpenKind::TemplateExpr => '}',
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Open {
    kind: OpenKind,
    line: usize,
    column: usize,
}

/// Scanning stops at the first structural error.
struct Stop;

struct Scanner {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    stack: Vec<Open>,
    regex_allowed: bool,
    diagnostics: Diagnostics,
}

impl Scanner {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            stack: Vec::new(),
            regex_allowed: true,
            diagnostics: Diagnostics::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn report(&mut self, line: usize, column: usize, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::error_at(line, column, message));
    }

    fn fail(&mut self, line: usize, column: usize, message: impl Into<String>) -> Stop {
        self.report(line, column, message);
        Stop
    }

    /// Scan to the end, or to the first structural error, recording diagnostics.
    fn run(&mut self) {
        if self.scan_tokens().is_ok() {
            self.check_unclosed();
        }
    }

    fn scan_tokens(&mut self) -> Result<(), Stop> {
        while let Some(c) = self.peek() {
            let (line, column) = (self.line, self.column);
            match c {
                c if c.is_whitespace() => {
                    self.advance();
                }
                '/' if self.peek_next() == Some('/') => self.skip_line_comment(),
                '/' if self.peek_next() == Some('*') => self.skip_block_comment()?,
                '/' if self.regex_allowed => {
                    self.scan_regex()?;
                    self.regex_allowed = false;
                }
                '"' | '\'' => {
                    self.scan_string(c)?;
                    self.regex_allowed = false;
                }
                '`' => {
                    self.advance();
                    self.scan_template(line, column)?;
                    self.regex_allowed = false;
                }
                '(' | '[' | '{' => {
                    let kind = match c {
                        '(' => OpenKind::Paren,
                        '[' => OpenKind::Bracket,
                        _ => OpenKind::Brace,
                    };
                    self.stack.push(Open { kind, line, column });
                    self.advance();
                    self.regex_allowed = true;
                }
                ')' | ']' | '}' => self.close(c)?,
                c if c.is_alphanumeric() || c == '_' || c == '$' => {
                    let word = self.read_word();
                    self.regex_allowed = KEYWORDS_BEFORE_EXPRESSION.contains(&word.as_str());
                }
                _ => {
                    self.advance();
                    self.regex_allowed = true;
                }
            }
        }
        Ok(())
    }

    /// Report the outermost bracket still open at end of input.
    fn check_unclosed(&mut self) {
        if let Some(open) = self.stack.first().copied() {
            let message = match open.kind {
                OpenKind::TemplateExpr => "unterminated template literal".to_string(),
                kind => format!("missing '{}'", kind.closer()),
            };
            self.report(open.line, open.column, message);
        }
    }

    fn close(&mut self, c: char) -> Result<(), Stop> {
        let (line, column) = (self.line, self.column);
        let Some(open) = self.stack.pop() else {
            return Err(self.fail(line, column, format!("unmatched '{c}'")));
        };
        if open.kind.closer() != c {
            return Err(self.fail(
                line,
                column,
                format!("expected '{}' to match {}:{} but found '{c}'", open.kind.closer(), open.line, open.column),
            ));
        }

        self.advance();
        if open.kind == OpenKind::TemplateExpr {
            self.scan_template(open.line, open.column)?;
            self.regex_allowed = false;
        } else {
            self.regex_allowed = c == '}';
        }
        Ok(())
    }

    fn read_word(&mut self) -> String {
        let mut word = String::new();
        while let Some(c) = self.peek() {
            if !(c.is_alphanumeric() || c == '_' || c == '$') {
                break;
            }
            word.push(c);
            self.advance();
        }
        word
    }

    fn skip_line_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.advance();
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), Stop> {
        let (line, column) = (self.line, self.column);
        self.advance();
        self.advance();
        loop {
            match self.advance() {
                None => return Err(self.fail(line, column, "unterminated comment")),
                Some('*') if self.peek() == Some('/') => {
                    self.advance();
                    return Ok(());
                }
                Some(_) => {}
            }
        }
    }

    fn scan_string(&mut self, quote: char) -> Result<(), Stop> {
        let (line, column) = (self.line, self.column);
        self.advance();
        loop {
            match self.advance() {
                None | Some('\n') => return Err(self.fail(line, column, "unterminated string literal")),
                Some('\\') => {
                    self.advance();
                }
                Some(c) if c == quote => return Ok(()),
                Some(_) => {}
            }
        }
    }

    fn scan_regex(&mut self) -> Result<(), Stop> {
        let (line, column) = (self.line, self.column);
        self.advance();
        let mut in_class = false;
        loop {
            match self.advance() {
                None | Some('\n') => {
                    return Err(self.fail(line, column, "unterminated regular expression literal"));
                }
                Some('\\') => {
                    self.advance();
                }
                Some('[') => in_class = true,
                Some(']') => in_class = false,
                Some('/') if !in_class => break,
                Some(_) => {}
            }
        }
        while self.peek().is_some_and(|c| c.is_alphanumeric()) {
            self.advance();
        }
        Ok(())
    }

    /// Scan template text up to its closing backtick or the next `${`.
    fn scan_template(&mut self, line: usize, column: usize) -> Result<(), Stop> {
        loop {
            match self.peek() {
                None => return Err(self.fail(line, column, "unterminated template literal")),
                Some('\\') => {
                    self.advance();
                    self.advance();
                }
                Some('`') => {
                    self.advance();
                    return Ok(());
                }
                Some('$') if self.peek_next() == Some('{') => {
                    self.advance();
                    self.advance();
                    self.stack.push(Open { kind: OpenKind::TemplateExpr, line, column });
                    self.regex_allowed = true;
                    return Ok(());
                }
                Some(_) => {
                    self.advance();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(source: &str) -> String {
        match JsProcessor.process(source) {
            Processed::Rejected(d) => d.report(),
            Processed::Minified(out) => panic!("expected diagnostics, got {out:?}"),
        }
    }

    #[test]
    fn test_minifies_valid_source() {
        let source = "function add(a, b) {\n    // sum\n    return a + b;\n}\n";
        match JsProcessor.process(source) {
            Processed::Minified(out) => {
                assert!(out.len() < source.len());
                assert!(out.contains("return"));
                assert!(!out.contains("// sum"));
            }
            Processed::Rejected(d) => panic!("unexpected diagnostics: {}", d.report()),
        }
    }

    #[test]
    fn test_unterminated_string() {
        assert_eq!(report("var s = 'abc;\nvar t = 1;"), "Errors:\n[ERROR] 1:9 unterminated string literal\n");
    }

    #[test]
    fn test_missing_brace() {
        assert_eq!(report("function f() {\n  return 1;\n"), "Errors:\n[ERROR] 1:14 missing '}'\n");
    }

    #[test]
    fn test_unmatched_closer() {
        assert_eq!(report("a = b);"), "Errors:\n[ERROR] 1:6 unmatched ')'\n");
    }

    #[test]
    fn test_mismatched_closer() {
        assert!(report("f(a];").contains("expected ')' to match 1:2 but found ']'"));
    }

    #[test]
    fn test_unterminated_comment_and_template() {
        assert!(report("a();\n/* open").contains("[ERROR] 2:1 unterminated comment"));
        assert!(report("var t = `abc ${x}").contains("unterminated template literal"));
    }

    #[test]
    fn test_first_error_stops_scanning() {
        assert_eq!(check_syntax("f({ 'abc").report(), "Errors:\n[ERROR] 1:5 unterminated string literal\n");
    }

    #[test]
    fn test_regex_and_division() {
        assert!(check_syntax("var r = /[/]+/g; var x = a / b / c;").is_empty());
        assert!(check_syntax("if (x) return /}/.test(y);").is_empty());
        assert!(check_syntax("var r = /abc\n/;").has_errors());
    }

    #[test]
    fn test_template_expressions() {
        assert!(check_syntax("const s = `a ${ {x: 1}.x } b ${`inner ${y}`}`;").is_empty());
    }

    #[test]
    fn test_strings_hide_brackets() {
        assert!(check_syntax("var s = \"}\" + '(' + \"\\\"\";").is_empty());
    }
}
