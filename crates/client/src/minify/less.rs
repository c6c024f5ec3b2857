//! LESS subset compiler feeding the CSS minifier.
//!
//! Supported: block-scoped variables (`@name: value;`, last definition in a
//! scope wins, usable before definition), nested rules with `&` parent
//! references, `//` line comments, and at-rules nested inside rules, which
//! bubble up around the parent selector. Mixins, operations and functions are
//! not supported and are reported as errors rather than passed through.

use std::collections::{HashMap, HashSet};

use super::css::{CssProcessor, MIME_TYPE_CSS};
use super::{Diagnostic, Diagnostics, Processed, Processor};

/// Deepest accepted block nesting.
const MAX_NESTING: usize = 256;

/// Longest accepted chain of variables referencing variables.
const MAX_VARIABLE_CHAIN: usize = 64;

/// Bytes that variable substitution and selector expansion may produce in total.
const EXPANSION_BUDGET: usize = 16 * 1024 * 1024;

/// Compiles LESS to CSS, then minifies it.
#[derive(Debug, Clone, Copy)]
pub struct LessProcessor {
    css: CssProcessor,
}

impl LessProcessor {
    pub const fn new() -> Self {
        Self { css: CssProcessor::new() }
    }
}

impl Default for LessProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor for LessProcessor {
    fn name(&self) -> &'static str {
        "less"
    }

    fn content_type(&self) -> &'static str {
        MIME_TYPE_CSS
    }

    fn process(&self, source: &str) -> Processed {
        match compile(source).and_then(|css| self.css.minify(&css)) {
            Ok(css) => Processed::Minified(css),
            Err(diagnostics) => Processed::Rejected(diagnostics),
        }
    }
}

/// Compile LESS source to unminified CSS.
pub fn compile(source: &str) -> Result<String, Diagnostics> {
    let mut parser = Parser::new(source);
    let nodes = match parser.parse_items(None) {
        Ok(nodes) => nodes,
        Err(Stop) => return Err(parser.diagnostics),
    };

    let mut emitter = Emitter::new();
    let css = emitter.emit_block(&nodes, None, true);
    if emitter.diagnostics.is_empty() { Ok(css) } else { Err(emitter.diagnostics) }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Variable { name: String, value: String },
    Declaration { property: String, value: String, line: usize, column: usize },
    /// Block-less at-rule such as `@import` or `@charset`.
    Statement(String),
    Block { prelude: String, children: Vec<Node>, line: usize, column: usize },
}

struct Stop;

struct Parser {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    depth: usize,
    diagnostics: Diagnostics,
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

impl Parser {
    fn new(source: &str) -> Self {
        Self { chars: source.chars().collect(), pos: 0, line: 1, column: 1, depth: 0, diagnostics: Diagnostics::new() }
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

    fn fail(&mut self, line: usize, column: usize, message: impl Into<String>) -> Stop {
        self.diagnostics.push(Diagnostic::error_at(line, column, message));
        Stop
    }

    /// Parse items until the matching `}` (when `open` is set) or end of input.
    fn parse_items(&mut self, open: Option<(usize, usize)>) -> Result<Vec<Node>, Stop> {
        let mut items = Vec::new();
        loop {
            self.skip_trivia()?;
            let (line, column) = (self.line, self.column);
            match self.peek() {
                None => {
                    return match open {
                        Some((open_line, open_column)) => Err(self.fail(open_line, open_column, "missing '}'")),
                        None => Ok(items),
                    };
                }
                Some('}') => {
                    if open.is_none() {
                        return Err(self.fail(line, column, "unmatched '}'"));
                    }
                    self.advance();
                    return Ok(items);
                }
                Some(';') => {
                    self.advance();
                }
                Some(_) => {
                    let (text, terminator) = self.read_until_terminator()?;
                    if terminator == Some('{') {
                        if self.depth >= MAX_NESTING {
                            return Err(self.fail(line, column, "nesting too deep"));
                        }
                        self.advance();
                        self.depth += 1;
                        let children = self.parse_items(Some((line, column)))?;
                        self.depth -= 1;
                        items.push(Node::Block { prelude: collapse_whitespace(&text), children, line, column });
                    } else {
                        if terminator == Some(';') {
                            self.advance();
                        }
                        let node = self.statement(&text, line, column)?;
                        items.push(node);
                    }
                }
            }
        }
    }

    fn skip_trivia(&mut self) -> Result<(), Stop> {
        loop {
            match (self.peek(), self.peek_next()) {
                (Some(c), _) if c.is_whitespace() => {
                    self.advance();
                }
                (Some('/'), Some('/')) => self.skip_line_comment(),
                (Some('/'), Some('*')) => self.skip_block_comment()?,
                _ => return Ok(()),
            }
        }
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

    /// Read raw text up to `;`, `{` or `}` at parenthesis depth 0, outside
    /// strings. The terminator is not consumed; `None` means end of input.
    fn read_until_terminator(&mut self) -> Result<(String, Option<char>), Stop> {
        let mut text = String::new();
        let mut depth = 0usize;
        loop {
            let Some(c) = self.peek() else {
                return Ok((text, None));
            };
            match c {
                ';' | '{' | '}' if depth == 0 => return Ok((text, Some(c))),
                '"' | '\'' => self.read_string(c, &mut text)?,
                '/' if depth == 0 && self.peek_next() == Some('/') => self.skip_line_comment(),
                '/' if self.peek_next() == Some('*') => {
                    self.skip_block_comment()?;
                    text.push(' ');
                }
                _ => {
                    match c {
                        '(' => depth += 1,
                        ')' => depth = depth.saturating_sub(1),
                        _ => {}
                    }
                    text.push(c);
                    self.advance();
                }
            }
        }
    }

    fn read_string(&mut self, quote: char, text: &mut String) -> Result<(), Stop> {
        let (line, column) = (self.line, self.column);
        text.push(quote);
        self.advance();
        loop {
            match self.advance() {
                None | Some('\n') => return Err(self.fail(line, column, "unterminated string")),
                Some('\\') => {
                    text.push('\\');
                    if let Some(escaped) = self.advance() {
                        text.push(escaped);
                    }
                }
                Some(c) => {
                    text.push(c);
                    if c == quote {
                        return Ok(());
                    }
                }
            }
        }
    }

    fn statement(&mut self, text: &str, line: usize, column: usize) -> Result<Node, Stop> {
        let text = text.trim();

        if let Some(rest) = text.strip_prefix('@') {
            let name_len = rest.chars().take_while(|&c| is_ident_char(c)).map(char::len_utf8).sum::<usize>();
            let after_name = rest[name_len..].trim_start();
            if name_len > 0
                && let Some(value) = after_name.strip_prefix(':')
            {
                return Ok(Node::Variable { name: rest[..name_len].to_string(), value: value.trim().to_string() });
            }
            return Ok(Node::Statement(collapse_whitespace(text)));
        }

        match text.split_once(':') {
            Some((property, value)) if !property.trim().is_empty() => Ok(Node::Declaration {
                property: property.trim().to_string(),
                value: value.trim().to_string(),
                line,
                column,
            }),
            _ if text.starts_with('.') || text.starts_with('#') => {
                Err(self.fail(line, column, format!("mixin calls are not supported: {text}")))
            }
            _ => Err(self.fail(line, column, format!("expected declaration, found `{text}`"))),
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split a selector list at top-level commas.
fn split_selectors(prelude: &str) -> Vec<String> {
    let mut selectors = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    for c in prelude.chars() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                selectors.push(current.trim().to_string());
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    selectors.push(current.trim().to_string());
    selectors.retain(|s| !s.is_empty());
    selectors
}

fn combine_selectors(parents: Option<&[String]>, children: &[String]) -> Vec<String> {
    match parents {
        None => children.iter().map(|c| c.replace('&', "").trim().to_string()).collect(),
        Some(parents) => parents
            .iter()
            .flat_map(|parent| {
                children.iter().map(move |child| {
                    if child.contains('&') { child.replace('&', parent) } else { format!("{parent} {child}") }
                })
            })
            .collect(),
    }
}

/// Variables defined directly in one block.
#[derive(Default)]
struct Scope {
    raw: HashMap<String, String>,
    resolved: HashMap<String, String>,
    resolving: HashSet<String>,
}

struct Emitter {
    scopes: Vec<Scope>,
    chain: usize,
    budget: usize,
    exhausted: bool,
    diagnostics: Diagnostics,
}

impl Emitter {
    fn new() -> Self {
        Self { scopes: Vec::new(), chain: 0, budget: EXPANSION_BUDGET, exhausted: false, diagnostics: Diagnostics::new() }
    }

    fn error(&mut self, line: usize, column: usize, message: impl Into<String>) -> Stop {
        self.diagnostics.push(Diagnostic::error_at(line, column, message));
        Stop
    }

    /// Account for `bytes` of expanded output. Exhaustion is reported once.
    fn charge(&mut self, bytes: usize, line: usize, column: usize, what: &str) -> Result<(), Stop> {
        if self.exhausted {
            return Err(Stop);
        }
        match self.budget.checked_sub(bytes) {
            Some(left) => {
                self.budget = left;
                Ok(())
            }
            None => {
                self.exhausted = true;
                Err(self.error(line, column, format!("{what} expansion too large")))
            }
        }
    }

    fn emit_block(&mut self, children: &[Node], parents: Option<&[String]>, at_root: bool) -> String {
        let raw = children
            .iter()
            .filter_map(|node| match node {
                Node::Variable { name, value } => Some((name.clone(), value.clone())),
                _ => None,
            })
            .collect();
        self.scopes.push(Scope { raw, ..Scope::default() });

        let mut own = String::new();
        let mut nested = String::new();

        for node in children {
            if self.exhausted {
                break;
            }
            match node {
                Node::Variable { .. } => {}
                Node::Declaration { property, value, line, column } => {
                    if at_root {
                        self.diagnostics.push(Diagnostic::error_at(
                            *line,
                            *column,
                            format!("declaration outside of a rule: {property}"),
                        ));
                        continue;
                    }
                    if let Ok(value) = self.resolve(value, self.scopes.len(), *line, *column) {
                        own.push_str(&format!("{property}:{value};"));
                    }
                }
                Node::Statement(statement) => {
                    nested.push_str(statement);
                    nested.push(';');
                }
                Node::Block { prelude, children, line, column } if prelude.starts_with('@') => {
                    let (keyword, condition) = prelude.split_once(' ').unwrap_or((prelude.as_str(), ""));
                    let Ok(condition) = self.resolve(condition, self.scopes.len(), *line, *column) else {
                        continue;
                    };
                    let inner = self.emit_block(children, parents, false);
                    let header = if condition.is_empty() { keyword.to_string() } else { format!("{keyword} {condition}") };
                    nested.push_str(&format!("{header}{{{inner}}}"));
                }
                Node::Block { prelude, children, line, column } => {
                    let own_selectors = split_selectors(prelude);
                    let expanded = match parents {
                        Some(parents) => {
                            let parent_bytes: usize = parents.iter().map(String::len).sum();
                            own_selectors.iter().fold(0usize, |total, child| {
                                let references = child.matches('&').count().max(1);
                                total
                                    .saturating_add(child.len().saturating_mul(parents.len()))
                                    .saturating_add(parent_bytes.saturating_mul(references))
                            })
                        }
                        None => prelude.len(),
                    };
                    if self.charge(expanded, *line, *column, "selector").is_err() {
                        break;
                    }
                    let selectors = combine_selectors(parents, &own_selectors);
                    let inner = self.emit_block(children, Some(&selectors), false);
                    nested.push_str(&inner);
                }
            }
        }

        self.scopes.pop();

        let mut css = match (own.is_empty(), parents) {
            (true, _) => String::new(),
            (false, Some(selectors)) => format!("{}{{{own}}}", selectors.join(",")),
            (false, None) => own,
        };
        css.push_str(&nested);
        css
    }

    /// Innermost of the first `visible` scopes that defines `name`.
    fn lookup(&self, name: &str, visible: usize) -> Option<usize> {
        self.scopes[..visible].iter().rposition(|scope| scope.raw.contains_key(name))
    }

    /// Substitute `@variable` references outside quoted strings, seeing only
    /// the first `visible` scopes.
    fn resolve(&mut self, value: &str, visible: usize, line: usize, column: usize) -> Result<String, Stop> {
        let mut out = String::with_capacity(value.len());
        let mut chars = value.chars().peekable();
        let mut quote: Option<char> = None;

        while let Some(c) = chars.next() {
            if let Some(q) = quote {
                out.push(c);
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                } else if c == q {
                    quote = None;
                }
                continue;
            }

            if c == '"' || c == '\'' {
                quote = Some(c);
                out.push(c);
                continue;
            }

            if c != '@' || !chars.peek().is_some_and(|&next| is_ident_char(next)) {
                out.push(c);
                continue;
            }

            let mut name = String::new();
            while let Some(&next) = chars.peek() {
                if !is_ident_char(next) {
                    break;
                }
                name.push(next);
                chars.next();
            }

            match self.lookup(&name, visible) {
                Some(frame) => {
                    let text = self.variable(frame, &name, line, column)?;
                    self.charge(text.len(), line, column, "variable")?;
                    out.push_str(&text);
                }
                None => {
                    self.diagnostics.push(Diagnostic::error_at(line, column, format!("undefined variable @{name}")));
                }
            }
        }
        Ok(out)
    }

    /// Resolved value of `name` as defined in scope `frame`, computed once per block.
    fn variable(&mut self, frame: usize, name: &str, line: usize, column: usize) -> Result<String, Stop> {
        if let Some(done) = self.scopes[frame].resolved.get(name) {
            return Ok(done.clone());
        }
        if !self.scopes[frame].resolving.insert(name.to_string()) {
            return Err(self.error(line, column, format!("recursive variable definition for @{name}")));
        }
        if self.chain >= MAX_VARIABLE_CHAIN {
            self.scopes[frame].resolving.remove(name);
            return Err(self.error(line, column, format!("variable chain too deep at @{name}")));
        }

        let raw = self.scopes[frame].raw.get(name).cloned().unwrap_or_default();
        self.chain += 1;
        let result = self.resolve(&raw, frame + 1, line, column);
        self.chain -= 1;
        self.scopes[frame].resolving.remove(name);

        let text = result?;
        self.scopes[frame].resolved.insert(name.to_string(), text.clone());
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn errors(source: &str) -> String {
        compile(source).expect_err("expected diagnostics").report()
    }

    #[test]
    fn test_variables_and_nesting() {
        let source = "@primary: #336699;\n// nav\n.nav {\n  color: @primary;\n  a { color: red; &:hover { color: blue; } }\n}\n";
        assert_eq!(compile(source).unwrap(), ".nav{color:#336699;}.nav a{color:red;}.nav a:hover{color:blue;}");
    }

    #[test]
    fn test_variable_scoping() {
        let source = "@c: red; .a { @c: blue; color: @c; } .b { color: @c; }";
        assert_eq!(compile(source).unwrap(), ".a{color:blue;}.b{color:red;}");
    }

    #[test]
    fn test_use_before_definition() {
        assert_eq!(compile(".a { width: @w; } @w: 10px;").unwrap(), ".a{width:10px;}");
    }

    #[test]
    fn test_selector_lists_multiply() {
        assert_eq!(compile(".a, .b { .c, .d { x: y } }").unwrap(), ".a .c,.a .d,.b .c,.b .d{x:y;}");
    }

    #[test]
    fn test_media_bubbles_around_parent() {
        let source = "@bp: 600px;\n.a { color: red; @media (max-width: @bp) { color: blue; } }";
        assert_eq!(compile(source).unwrap(), ".a{color:red;}@media (max-width: 600px){.a{color:blue;}}");
    }

    #[test]
    fn test_top_level_at_rules() {
        let source = "@import url(\"base.css\");\n@font-face { font-family: X; src: url(x.woff); }";
        assert_eq!(compile(source).unwrap(), "@import url(\"base.css\");@font-face{font-family:X;src:url(x.woff);}");
    }

    #[test]
    fn test_strings_and_urls_untouched() {
        let source = ".a { content: \"@home; {\"; background: url(//cdn.example.com/x.png); }";
        assert_eq!(
            compile(source).unwrap(),
            ".a{content:\"@home; {\";background:url(//cdn.example.com/x.png);}"
        );
    }

    #[test]
    fn test_undefined_variable() {
        assert_eq!(errors("a { color: @missing; }"), "Errors:\n[ERROR] 1:5 undefined variable @missing\n");
    }

    #[test]
    fn test_recursive_variable() {
        assert!(errors("@a: @b; @b: @a; .x { y: @a; }").contains("recursive variable definition"));
    }

    #[test]
    fn test_self_reference_fan_out_is_rejected() {
        assert!(errors("@a: @a @a @a @a @a @a; .x { y: @a; }").contains("recursive variable definition for @a"));
    }

    #[test]
    fn test_shared_variables_resolve_once() {
        let source = "@c: red; @b: @c @c; @a: @b @b; .x { y: @a; }";
        assert_eq!(compile(source).unwrap(), ".x{y:red red red red;}");
    }

    #[test]
    fn test_doubling_chain_exhausts_budget() {
        let mut source = String::from("@v0: xxxxxxxxxxxxxxxx;\n");
        for i in 1..=40 {
            source.push_str(&format!("@v{i}: @v{j} @v{j};\n", j = i - 1));
        }
        source.push_str(".x { y: @v40; }");
        assert!(errors(&source).contains("variable expansion too large"));
    }

    #[test]
    fn test_long_variable_chain_is_rejected() {
        let mut source = String::from("@v0: red;\n");
        for i in 1..=200 {
            source.push_str(&format!("@v{i}: @v{};\n", i - 1));
        }
        source.push_str(".x { y: @v200; }");
        assert!(errors(&source).contains("variable chain too deep"));
    }

    #[test]
    fn test_selector_products_exhaust_budget() {
        let list = (0..64).map(|i| format!(".s{i}")).collect::<Vec<_>>().join(",");
        let mut source = String::new();
        for _ in 0..6 {
            source.push_str(&list);
            source.push('{');
        }
        source.push_str("x:y;");
        source.push_str(&"}".repeat(6));
        assert!(errors(&source).contains("selector expansion too large"));
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let source = "a{".repeat(100_000) + &"}".repeat(100_000);
        let report = std::thread::Builder::new()
            .stack_size(2 * 1024 * 1024)
            .spawn(move || errors(&source))
            .unwrap()
            .join()
            .unwrap();
        assert!(report.contains("nesting too deep"));
    }

    #[test]
    fn test_moderate_nesting_compiles() {
        let source = "a{".repeat(200) + "x:y;" + &"}".repeat(200);
        assert!(compile(&source).unwrap().ends_with("{x:y;}"));
    }

    #[test]
    fn test_unbalanced_braces() {
        assert_eq!(errors(".a {\n  color: red;\n"), "Errors:\n[ERROR] 1:1 missing '}'\n");
        assert_eq!(errors(".a { }\n}"), "Errors:\n[ERROR] 2:1 unmatched '}'\n");
    }

    #[test]
    fn test_unsupported_constructs() {
        assert!(errors(".a { .mixin(); }").contains("mixin calls are not supported"));
        assert!(errors("color: red;").contains("declaration outside of a rule"));
    }

    #[test]
    fn test_processor_minifies_compiled_output() {
        match LessProcessor::new().process("@c: red;\n.nav {\n  a { &:hover { color: @c; } }\n}\n") {
            Processed::Minified(css) => {
                assert!(css.contains(".nav a:hover"));
                assert!(!css.contains('@'));
            }
            Processed::Rejected(d) => panic!("unexpected diagnostics: {}", d.report()),
        }
    }

    #[test]
    fn test_processor_rejects_with_diagnostics() {
        assert!(!LessProcessor::new().process(".a { color: @nope; }").is_cacheable());
    }
}
