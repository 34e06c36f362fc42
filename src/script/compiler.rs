use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::debug;

use crate::script::ast::Program;
use crate::script::error::CompileError;
use crate::script::lexer::{Token, TokenKind, tokenize};
use crate::script::parser::parse_program;
use crate::trace::StatementRef;

/// Keywords that would let a script hide its own failures.
const SUPPRESSION_KEYWORDS: &[&str] = &["try", "except", "finally", "with"];

/// Script rewritten so every element reference is an explicit handle,
/// with line provenance back to the source.
#[derive(Debug, Clone, Serialize)]
pub struct CompiledScript {
    pub source: String,
    pub code: String,
    /// Raw element names, in header order.
    pub elements: Vec<String>,
    /// compiled line -> source line (both 1-based)
    pub line_map: BTreeMap<usize, usize>,
    /// raw element name -> first source line using it
    pub first_use: BTreeMap<String, usize>,
    #[serde(skip)]
    pub(crate) program: Program,
}

impl CompiledScript {
    pub fn header_len(&self) -> usize {
        self.elements.len()
    }

    pub fn source_line(&self, compiled_line: usize) -> Option<usize> {
        self.line_map.get(&compiled_line).copied()
    }

    pub fn compiled_text(&self, compiled_line: usize) -> Option<&str> {
        self.code.lines().nth(compiled_line.checked_sub(1)?)
    }

    pub fn source_text(&self, source_line: usize) -> Option<&str> {
        self.source.lines().nth(source_line.checked_sub(1)?)
    }

    /// Provenance of one compiled line. Header lines point at the first
    /// source line that uses their element.
    pub fn statement_ref(&self, compiled_line: usize) -> StatementRef {
        let source_line = self.source_line(compiled_line).or_else(|| {
            let element = self.elements.get(compiled_line.checked_sub(1)?)?;
            self.first_use.get(element).copied()
        });

        StatementRef {
            compiled_line,
            compiled_code: self
                .compiled_text(compiled_line)
                .unwrap_or_default()
                .trim()
                .to_string(),
            source_line,
            source_code: source_line
                .and_then(|l| self.source_text(l))
                .map(|s| s.trim().to_string()),
        }
    }
}

/// Identifier a raw element name is bound to: non-word characters become `_`
/// and a leading digit gets a `_` prefix.
pub fn sanitize(raw: &str) -> String {
    let mut out: String = raw
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// Bare identifiers of the form `screen__element` are element references.
fn is_bare_element(ident: &str) -> bool {
    ident
        .split_once("__")
        .is_some_and(|(screen, element)| {
            !screen.is_empty() && !element.is_empty() && !screen.chars().all(|c| c == '_')
        })
}

struct References {
    /// sanitized -> raw
    bindings: BTreeMap<String, String>,
    first_use: HashMap<String, usize>,
}

impl References {
    fn bind(&mut self, raw: &str, line: usize) -> Result<String, CompileError> {
        let sanitized = sanitize(raw);
        if sanitized.is_empty() {
            return Err(CompileError::InvalidReference {
                line,
                reference: raw.to_string(),
            });
        }
        match self.bindings.get(&sanitized) {
            Some(existing) if existing != raw => {
                return Err(CompileError::InvalidReference {
                    line,
                    reference: format!("{} (clashes with {})", raw, existing),
                });
            }
            Some(_) => {}
            None => {
                self.bindings.insert(sanitized.clone(), raw.to_string());
            }
        }
        self.first_use.entry(raw.to_string()).or_insert(line);
        Ok(sanitized)
    }
}

/// Rewrites element references on one line, leaving strings and comments alone.
fn rewrite_line(text: &str, line: usize, refs: &mut References) -> Result<String, CompileError> {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut prev: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '#' => {
                out.extend(&chars[i..]);
                break;
            }
            '\'' | '"' => {
                out.push(c);
                i += 1;
                while i < chars.len() {
                    out.push(chars[i]);
                    if chars[i] == '\\' && i + 1 < chars.len() {
                        out.push(chars[i + 1]);
                        i += 2;
                        continue;
                    }
                    i += 1;
                    if chars[i - 1] == c {
                        break;
                    }
                }
                prev = Some(c);
            }
            '$' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|ch| !(ch.is_alphanumeric() || *ch == '_' || *ch == '%'))
                    .map(|p| i + 1 + p)
                    .unwrap_or(chars.len());
                let raw: String = chars[i + 1..end].iter().collect();
                if raw.is_empty() {
                    return Err(CompileError::InvalidReference {
                        line,
                        reference: "$".to_string(),
                    });
                }
                out.push_str(&refs.bind(&raw, line)?);
                prev = Some('a');
                i = end;
            }
            c if c.is_alphabetic() || c == '_' => {
                let end = chars[i..]
                    .iter()
                    .position(|ch| !(ch.is_alphanumeric() || *ch == '_'))
                    .map(|p| i + p)
                    .unwrap_or(chars.len());
                let ident: String = chars[i..end].iter().collect();
                if prev != Some('.') && is_bare_element(&ident) {
                    out.push_str(&refs.bind(&ident, line)?);
                } else {
                    out.push_str(&ident);
                }
                prev = Some('a');
                i = end;
            }
            c if c.is_ascii_digit() => {
                let end = chars[i..]
                    .iter()
                    .position(|ch| !(ch.is_alphanumeric() || *ch == '_'))
                    .map(|p| i + p)
                    .unwrap_or(chars.len());
                out.extend(&chars[i..end]);
                prev = Some('0');
                i = end;
            }
            c => {
                out.push(c);
                if !c.is_whitespace() {
                    prev = Some(c);
                }
                i += 1;
            }
        }
    }
    Ok(out)
}

/// Rejects statements that would swallow errors: `try`/`except`/`finally`,
/// `with` blocks and calls to `suppress(...)`.
fn check_suppression(
    tokens: &[Token],
    line_map: &BTreeMap<usize, usize>,
) -> Result<(), CompileError> {
    let mut at_statement_start = true;
    for (index, token) in tokens.iter().enumerate() {
        let source_line = line_map.get(&token.line).copied().unwrap_or(token.line);
        if let TokenKind::Name(word) = &token.kind {
            let keyword = at_statement_start && SUPPRESSION_KEYWORDS.contains(&word.as_str());
            let suppress_call = word == "suppress"
                && matches!(tokens.get(index + 1).map(|t| &t.kind), Some(TokenKind::LParen));
            if keyword || suppress_call {
                return Err(CompileError::SuppressionSyntax {
                    line: source_line,
                    construct: word.clone(),
                });
            }
        }
        at_statement_start = matches!(
            token.kind,
            TokenKind::Newline | TokenKind::Indent | TokenKind::Dedent | TokenKind::Colon
        );
    }
    Ok(())
}

fn map_error(error: CompileError, line_map: &BTreeMap<usize, usize>) -> CompileError {
    match error {
        CompileError::Syntax { line, message } => CompileError::Syntax {
            line: line_map.get(&line).copied().unwrap_or(line),
            message,
        },
        other => other,
    }
}

/// Compiles script source. Element references (`$name` or bare
/// `screen__element`) become header statements `name = element("name")`, one
/// per distinct element in sorted order, followed by the rewritten body.
pub fn compile(source: &str) -> Result<CompiledScript, CompileError> {
    let mut refs = References {
        bindings: BTreeMap::new(),
        first_use: HashMap::new(),
    };

    let body = source
        .lines()
        .enumerate()
        .map(|(i, text)| rewrite_line(text, i + 1, &mut refs))
        .collect::<Result<Vec<_>, _>>()?;

    let mut elements: Vec<String> = refs.bindings.values().cloned().collect();
    elements.sort();

    let header: Vec<String> = elements
        .iter()
        .map(|raw| format!("{} = element(\"{}\")", sanitize(raw), raw))
        .collect();

    let line_map: BTreeMap<usize, usize> = (0..body.len())
        .map(|i| (header.len() + i + 1, i + 1))
        .collect();

    let code = header
        .iter()
        .chain(body.iter())
        .cloned()
        .collect::<Vec<_>>()
        .join("\n");

    let tokens = tokenize(&code).map_err(|e| map_error(e, &line_map))?;
    check_suppression(&tokens, &line_map)?;
    let program = parse_program(tokens).map_err(|e| map_error(e, &line_map))?;

    debug!(
        elements = elements.len(),
        statements = program.len(),
        "compiled script"
    );

    Ok(CompiledScript {
        source: source.to_string(),
        code,
        first_use: refs.first_use.into_iter().collect(),
        elements,
        line_map,
        program,
    })
}
