use crate::script::error::CompileError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Name(String),
    Int(i64),
    Str(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Dot,
    Assign,
    PlusAssign,
    MinusAssign,
    Plus,
    Minus,
    Star,
    Slash,
    DoubleSlash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Newline,
    Indent,
    Dedent,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// 1-based line in the text being lexed.
    pub line: usize,
}

fn syntax(line: usize, message: impl Into<String>) -> CompileError {
    CompileError::Syntax {
        line,
        message: message.into(),
    }
}

/// Splits script text into tokens with indentation turned into INDENT/DEDENT.
/// Lines inside open brackets continue the logical line.
pub fn tokenize(source: &str) -> Result<Vec<Token>, CompileError> {
    let mut tokens = Vec::new();
    let mut indents = vec![0usize];
    let mut depth = 0usize;
    let mut last_line = 0;

    for (index, raw_line) in source.lines().enumerate() {
        let line = index + 1;
        last_line = line;
        let content = raw_line.trim_start();

        if depth == 0 {
            if content.is_empty() || content.starts_with('#') {
                continue;
            }
            let width = raw_line[..raw_line.len() - content.len()]
                .chars()
                .map(|c| if c == '\t' { 4 } else { 1 })
                .sum::<usize>();
            let top = indents.last().copied().unwrap_or(0);
            if width > top {
                indents.push(width);
                tokens.push(Token {
                    kind: TokenKind::Indent,
                    line,
                });
            } else {
                while width < indents.last().copied().unwrap_or(0) {
                    indents.pop();
                    tokens.push(Token {
                        kind: TokenKind::Dedent,
                        line,
                    });
                }
                if width != indents.last().copied().unwrap_or(0) {
                    return Err(syntax(line, "unindent does not match any outer level"));
                }
            }
        }

        scan_line(content, line, &mut depth, &mut tokens)?;

        if depth == 0 && tokens.last().is_some_and(|t| t.line == line && t.kind != TokenKind::Newline) {
            tokens.push(Token {
                kind: TokenKind::Newline,
                line,
            });
        }
    }

    if depth > 0 {
        return Err(syntax(last_line, "unclosed bracket"));
    }
    let end = last_line.max(1);
    while indents.len() > 1 {
        indents.pop();
        tokens.push(Token {
            kind: TokenKind::Dedent,
            line: end,
        });
    }
    tokens.push(Token {
        kind: TokenKind::Eof,
        line: end,
    });
    Ok(tokens)
}

fn scan_line(
    content: &str,
    line: usize,
    depth: &mut usize,
    tokens: &mut Vec<Token>,
) -> Result<(), CompileError> {
    let chars: Vec<char> = content.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c == '#' {
            break;
        }

        let (kind, width) = match c {
            '\'' | '"' => {
                let (text, consumed) = scan_string(&chars[i..], line)?;
                (TokenKind::Str(text), consumed)
            }
            c if c.is_ascii_digit() => {
                let end = chars[i..]
                    .iter()
                    .position(|ch| !ch.is_ascii_digit())
                    .map(|p| i + p)
                    .unwrap_or(chars.len());
                let digits: String = chars[i..end].iter().collect();
                let value = digits
                    .parse()
                    .map_err(|_| syntax(line, format!("integer '{}' out of range", digits)))?;
                (TokenKind::Int(value), end - i)
            }
            c if c.is_alphabetic() || c == '_' => {
                let end = chars[i..]
                    .iter()
                    .position(|ch| !(ch.is_alphanumeric() || *ch == '_'))
                    .map(|p| i + p)
                    .unwrap_or(chars.len());
                (TokenKind::Name(chars[i..end].iter().collect()), end - i)
            }
            '(' | '[' | '{' => {
                *depth += 1;
                let kind = match c {
                    '(' => TokenKind::LParen,
                    '[' => TokenKind::LBracket,
                    _ => TokenKind::LBrace,
                };
                (kind, 1)
            }
            ')' | ']' | '}' => {
                *depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| syntax(line, format!("unmatched '{}'", c)))?;
                let kind = match c {
                    ')' => TokenKind::RParen,
                    ']' => TokenKind::RBracket,
                    _ => TokenKind::RBrace,
                };
                (kind, 1)
            }
            ',' => (TokenKind::Comma, 1),
            ':' => (TokenKind::Colon, 1),
            '.' => (TokenKind::Dot, 1),
            '+' if next == Some('=') => (TokenKind::PlusAssign, 2),
            '-' if next == Some('=') => (TokenKind::MinusAssign, 2),
            '=' if next == Some('=') => (TokenKind::EqEq, 2),
            '!' if next == Some('=') => (TokenKind::NotEq, 2),
            '<' if next == Some('=') => (TokenKind::Le, 2),
            '>' if next == Some('=') => (TokenKind::Ge, 2),
            '/' if next == Some('/') => (TokenKind::DoubleSlash, 2),
            '=' => (TokenKind::Assign, 1),
            '+' => (TokenKind::Plus, 1),
            '-' => (TokenKind::Minus, 1),
            '*' => (TokenKind::Star, 1),
            '/' => (TokenKind::Slash, 1),
            '%' => (TokenKind::Percent, 1),
            '<' => (TokenKind::Lt, 1),
            '>' => (TokenKind::Gt, 1),
            other => return Err(syntax(line, format!("unexpected character '{}'", other))),
        };

        tokens.push(Token { kind, line });
        i += width;
    }
    Ok(())
}

/// Scans a quoted literal starting at `chars[0]`; returns its value and width.
fn scan_string(chars: &[char], line: usize) -> Result<(String, usize), CompileError> {
    let quote = chars[0];
    let mut value = String::new();
    let mut i = 1;

    while i < chars.len() {
        match chars[i] {
            c if c == quote => return Ok((value, i + 1)),
            '\\' => {
                let escaped = chars
                    .get(i + 1)
                    .copied()
                    .ok_or_else(|| syntax(line, "unterminated string"))?;
                value.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    other => other,
                });
                i += 2;
            }
            c => {
                value.push(c);
                i += 1;
            }
        }
    }
    Err(syntax(line, "unterminated string"))
}
