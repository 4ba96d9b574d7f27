//! Line-oriented parser for textual Nebula scripts
//!
//! ```text
//! .namespace "Main"
//! .bundle Point ( int32 x , int32 y )
//! .func void Main ( ) ;autoexec
//! {
//!     .locals [ int32 ]
//!     0000 Ldc_i4 2
//!     0001 Call WriteLine
//!     0002 Ret
//! }
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::core::{
    BundleDefinition, Function, FunctionAttribute, Instruction, Opcode, Script, ScriptBuilder,
    ValueKind,
};
use crate::runtime::vm::generate_arguments_for_opcode;

use super::report::DiagnosticReport;

// ==================== tokens ====================

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Word(String),
    Quoted(String),
    Punct(char),
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Word(w) => format!("'{w}'"),
            Token::Quoted(q) => format!("\"{q}\""),
            Token::Punct(c) => format!("'{c}'"),
        }
    }

    /// Words and quoted strings both name things
    fn text(&self) -> Option<&str> {
        match self {
            Token::Word(s) | Token::Quoted(s) => Some(s),
            Token::Punct(_) => None,
        }
    }
}

const PUNCTUATION: [char; 8] = ['(', ')', '[', ']', ',', ';', '{', '}'];

/// Split one line; an unquoted `#` at a token boundary ends the line
fn tokenize(line: &str, punctuation: bool) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '#' {
            break;
        } else if c == '"' {
            chars.next();
            let mut text = String::new();
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '"' => {
                        closed = true;
                        break;
                    }
                    '\\' => match chars.next() {
                        Some('n') => text.push('\n'),
                        Some('t') => text.push('\t'),
                        Some(other) => text.push(other),
                        None => text.push('\\'),
                    },
                    other => text.push(other),
                }
            }
            if !closed {
                return Err("unterminated string literal".to_string());
            }
            tokens.push(Token::Quoted(text));
        } else if punctuation && PUNCTUATION.contains(&c) {
            chars.next();
            tokens.push(Token::Punct(c));
        } else {
            let mut word = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() || c == '"' || (punctuation && PUNCTUATION.contains(&c)) {
                    break;
                }
                word.push(c);
                chars.next();
            }
            tokens.push(Token::Word(word));
        }
    }
    Ok(tokens)
}

/// Cursor over the tokens of one line
struct Tokens {
    items: Vec<Token>,
    pos: usize,
}

impl Tokens {
    fn new(items: Vec<Token>) -> Self {
        Self { items, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.items.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.items.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn is_done(&self) -> bool {
        self.pos >= self.items.len()
    }

    fn eat(&mut self, punct: char) -> bool {
        if self.peek() == Some(&Token::Punct(punct)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, punct: char) -> Result<(), String> {
        match self.next() {
            Some(Token::Punct(c)) if c == punct => Ok(()),
            Some(other) => Err(format!("expected '{punct}', found {}", other.describe())),
            None => Err(format!("expected '{punct}' before end of line")),
        }
    }

    fn name(&mut self, what: &str) -> Result<String, String> {
        match self.next() {
            Some(token) => token
                .text()
                .map(str::to_string)
                .ok_or_else(|| format!("expected {what}, found {}", token.describe())),
            None => Err(format!("expected {what} before end of line")),
        }
    }

    fn expect_end(&self) -> Result<(), String> {
        match self.peek() {
            None => Ok(()),
            Some(token) => Err(format!("unexpected {} at end of line", token.describe())),
        }
    }
}

/// A value type; `void` is rejected here
fn value_kind(text: &str) -> Result<ValueKind, String> {
    ValueKind::from_type_name(text).ok_or_else(|| format!("unknown type '{text}'"))
}

/// Return type: a value type or `void`
fn return_kind(text: &str) -> Result<Option<ValueKind>, String> {
    if text.eq_ignore_ascii_case("void") {
        Ok(None)
    } else {
        value_kind(text).map(Some)
    }
}

// ==================== parser ====================

struct OpenFunction {
    function: Function,
    line: usize,
    locals_declared: bool,
}

enum State {
    TopLevel,
    /// Header parsed, `{` not seen yet
    AwaitingBody(OpenFunction),
    InBody(OpenFunction),
}

pub struct ScriptParser {
    builder: ScriptBuilder,
    has_namespace: bool,
    state: State,
    report: DiagnosticReport,
}

impl Default for ScriptParser {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ScriptParser {
    /// `source` is the file name reported in error call stacks
    pub fn new(source: Option<&str>) -> Self {
        let builder = match source {
            Some(name) => ScriptBuilder::new("").with_source(name),
            None => ScriptBuilder::new(""),
        };
        Self {
            builder,
            has_namespace: false,
            state: State::TopLevel,
            report: DiagnosticReport::new(),
        }
    }

    /// Parse the whole text; the script is withheld when any error was reported
    pub fn parse(mut self, text: &str) -> (Option<Arc<Script>>, DiagnosticReport) {
        for (index, line) in text.lines().enumerate() {
            self.parse_line(index + 1, line);
        }
        self.finish()
    }

    fn parse_line(&mut self, line_no: usize, line: &str) {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return;
        }

        let state = std::mem::replace(&mut self.state, State::TopLevel);
        self.state = match state {
            State::TopLevel => {
                self.top_level(line_no, trimmed);
                // a header may have moved us on
                std::mem::replace(&mut self.state, State::TopLevel)
            }
            State::AwaitingBody(open) => self.open_body(line_no, trimmed, open),
            State::InBody(open) => self.body_line(line_no, trimmed, open),
        };
    }

    fn finish(mut self) -> (Option<Arc<Script>>, DiagnosticReport) {
        match std::mem::replace(&mut self.state, State::TopLevel) {
            State::TopLevel => {}
            State::AwaitingBody(open) | State::InBody(open) => {
                self.report.error(
                    open.line,
                    format!(
                        "unbalanced braces: body of function '{}' is never closed",
                        open.function.name()
                    ),
                );
            }
        }
        if !self.has_namespace {
            self.report
                .push(super::report::Severity::Error, None, "missing .namespace directive");
        }

        if self.report.has_errors() {
            debug!(
                target: "nebula::loader",
                errors = self.report.errors.len(),
                "script rejected"
            );
            return (None, self.report);
        }
        let script = self.builder.build();
        self.report.info(
            None,
            format!(
                "loaded namespace '{}': {} function(s), {} bundle(s)",
                script.namespace(),
                script.functions().count(),
                script.bundles().count()
            ),
        );
        (Some(script), self.report)
    }

    // ==================== top level ====================

    fn top_level(&mut self, line_no: usize, text: &str) {
        let mut tokens = match tokenize(text, true) {
            Ok(tokens) => Tokens::new(tokens),
            Err(message) => return self.report.error(line_no, message),
        };
        let result = match tokens.next() {
            Some(Token::Word(directive)) => match directive.to_ascii_lowercase().as_str() {
                ".namespace" => self.namespace(&mut tokens),
                ".bundle" => self.bundle(&mut tokens),
                ".func" => self.function_header(line_no, &mut tokens),
                _ => Err(format!("unknown section '{directive}'")),
            },
            Some(Token::Punct('{')) => Err("'{' without a function header".to_string()),
            Some(Token::Punct('}')) => Err("unbalanced braces: unexpected '}'".to_string()),
            Some(other) => Err(format!("unexpected {}", other.describe())),
            None => Ok(()),
        };
        if let Err(message) = result {
            self.report.error(line_no, message);
        }
    }

    fn namespace(&mut self, tokens: &mut Tokens) -> Result<(), String> {
        if self.has_namespace {
            return Err(format!(
                "namespace already set to '{}'",
                self.builder.namespace()
            ));
        }
        let name = tokens.name("a namespace name")?;
        tokens.expect_end()?;
        if name.is_empty() {
            return Err("namespace must not be empty".to_string());
        }
        trace!(target: "nebula::loader", namespace = %name, "namespace");
        self.builder.set_namespace(name);
        self.has_namespace = true;
        Ok(())
    }

    fn bundle(&mut self, tokens: &mut Tokens) -> Result<(), String> {
        let name = tokens.name("a bundle name")?;
        tokens.expect('(')?;

        let mut fields: Vec<(String, ValueKind)> = Vec::new();
        let mut seen = HashSet::new();
        if !tokens.eat(')') {
            loop {
                let kind = value_kind(&tokens.name("a field type")?)?;
                let field = tokens.name("a field name")?;
                if !seen.insert(field.clone()) {
                    return Err(format!("bundle '{name}' declares field '{field}' twice"));
                }
                fields.push((field, kind));
                if tokens.eat(')') {
                    break;
                }
                tokens.expect(',')?;
            }
        }
        tokens.expect_end()?;

        trace!(target: "nebula::loader", bundle = %name, fields = fields.len(), "bundle");
        self.builder
            .add_bundle(BundleDefinition::new(name, fields))
            .map_err(|e| e.to_string())
    }

    /// `.func <ret> <Name> ( <type> [name], ... ) [;attr]* [{]`
    fn function_header(&mut self, line_no: usize, tokens: &mut Tokens) -> Result<(), String> {
        let ret = return_kind(&tokens.name("a return type")?)?;
        let name = tokens.name("a function name")?;
        tokens.expect('(')?;

        let mut parameters = Vec::new();
        if !tokens.eat(')') {
            loop {
                parameters.push(value_kind(&tokens.name("a parameter type")?)?);
                // parameter names are optional and unused
                if matches!(tokens.peek(), Some(Token::Word(_))) {
                    tokens.next();
                }
                if tokens.eat(')') {
                    break;
                }
                tokens.expect(',')?;
            }
        }

        let mut function = Function::new(name, ret).with_parameters(parameters);
        while tokens.eat(';') {
            let attribute = tokens.name("an attribute")?;
            let parsed = FunctionAttribute::from_name(&attribute)
                .ok_or_else(|| format!("unknown attribute '{attribute}'"))?;
            function = function.with_attribute(parsed);
        }

        let open = OpenFunction {
            function,
            line: line_no,
            locals_declared: false,
        };
        self.state = if tokens.eat('{') {
            State::InBody(open)
        } else {
            State::AwaitingBody(open)
        };
        tokens.expect_end()
    }

    // ==================== bodies ====================

    fn open_body(&mut self, line_no: usize, text: &str, open: OpenFunction) -> State {
        if text.starts_with('{') {
            if let Err(message) = Tokens::new(tokenize(&text[1..], true).unwrap_or_default()).expect_end() {
                self.report.error(line_no, message);
            }
            return State::InBody(open);
        }
        self.report.error(
            line_no,
            format!("expected '{{' to open body of function '{}'", open.function.name()),
        );
        self.top_level(line_no, text);
        std::mem::replace(&mut self.state, State::TopLevel)
    }

    fn body_line(&mut self, line_no: usize, text: &str, mut open: OpenFunction) -> State {
        if let Some(rest) = text.strip_prefix('}') {
            if !rest.trim().is_empty() && !rest.trim().starts_with('#') {
                self.report
                    .error(line_no, format!("unexpected '{}' after '}}'", rest.trim()));
            }
            self.close_function(open);
            return State::TopLevel;
        }

        let result = if text.starts_with('.') {
            self.special_data(text, &mut open)
        } else {
            self.instruction(line_no, text, &mut open)
        };
        if let Err(message) = result {
            self.report.error(line_no, message);
        }
        State::InBody(open)
    }

    /// `.locals [ int32 , bundle ]`
    fn special_data(&mut self, text: &str, open: &mut OpenFunction) -> Result<(), String> {
        let mut tokens = Tokens::new(tokenize(text, true)?);
        let marker = tokens.name("a section name")?;
        if !marker.eq_ignore_ascii_case(".locals") {
            return Err(format!("unknown special data '{marker}'"));
        }
        if open.locals_declared {
            return Err(format!(
                "locals of function '{}' are declared twice",
                open.function.name()
            ));
        }
        tokens.expect('[')?;
        let mut locals = Vec::new();
        if !tokens.eat(']') {
            loop {
                locals.push(value_kind(&tokens.name("a local type")?)?);
                // local names are optional too
                if matches!(tokens.peek(), Some(Token::Word(_))) {
                    tokens.next();
                }
                if tokens.eat(']') {
                    break;
                }
                tokens.expect(',')?;
            }
        }
        tokens.expect_end()?;
        open.function.set_locals(locals);
        open.locals_declared = true;
        Ok(())
    }

    /// `<hex label> <mnemonic> [operands...]`
    fn instruction(&mut self, line_no: usize, text: &str, open: &mut OpenFunction) -> Result<(), String> {
        let tokens = tokenize(text, false)?;
        let mut parts = tokens.iter().filter_map(Token::text);
        let (Some(label), Some(mnemonic)) = (parts.next(), parts.next()) else {
            return Err(format!("expected '<label> <opcode> [operands]', found '{text}'"));
        };
        let operands: Vec<&str> = parts.collect();

        let expected = open.function.body().len();
        match usize::from_str_radix(label, 16) {
            Ok(found) if found == expected => {}
            Ok(found) => self.report.warning(
                line_no,
                format!("label {found:04X} does not match instruction index {expected:04X}"),
            ),
            Err(_) => return Err(format!("'{label}' is not a hexadecimal label")),
        }

        let opcode = Opcode::from_mnemonic(mnemonic)
            .ok_or_else(|| format!("unknown opcode '{mnemonic}'"))?;
        let arguments =
            generate_arguments_for_opcode(opcode, &operands).map_err(|e| e.to_string())?;
        open.function
            .push_instruction(Instruction::new(opcode, arguments));
        Ok(())
    }

    fn close_function(&mut self, open: OpenFunction) {
        let OpenFunction { function, line, .. } = open;
        match function.body().last() {
            None => self
                .report
                .warning(line, format!("function '{}' has an empty body", function.name())),
            Some(last) if !last.opcode.ends_body() => self.report.warning(
                line,
                format!(
                    "function '{}' does not end in Ret or Br; execution would fall off the end",
                    function.name()
                ),
            ),
            Some(_) => {}
        }
        trace!(
            target: "nebula::loader",
            function = %function.name(),
            instructions = function.body().len(),
            "function"
        );
        if let Err(e) = self.builder.add_function(function) {
            self.report.error(line, e.to_string());
        }
    }
}

/// Parse `text` as one script
pub fn parse_script(text: &str, source: Option<&str>) -> (Option<Arc<Script>>, DiagnosticReport) {
    ScriptParser::new(source).parse(text)
}
