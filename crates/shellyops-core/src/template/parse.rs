// ── Template parser ──
//
// Hand-rolled lexer and recursive-descent parser for the `{{ ... }}`
// action language. The grammar is a strict subset of Go's text/template:
//
//   pipeline := command ( '|' command )*
//   command  := operand+
//   operand  := term field*
//   term     := '.' | '$' | field | literal | function | '(' pipeline ')'
//
// Anything outside the subset (control structures, variable declarations,
// unknown functions) is rejected at parse time.

use serde_json::Number;

use super::{ErrorKind, Fault};

/// Functions callable from templates.
pub(crate) const FUNCTIONS: &[&str] = &["index", "len", "print"];

// ── AST ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Text(String),
    Action(Pipeline),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Pipeline {
    pub commands: Vec<Command>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Command {
    pub args: Vec<Operand>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Operand {
    pub term: Term,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Term {
    /// `.` — the current context.
    Dot,
    /// `$` — the root context.
    Root,
    Str(String),
    Number(Number),
    Bool(bool),
    Func(String),
    Sub(Box<Pipeline>),
}

// ── Tokens ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Dot,
    Field(String),
    Root,
    Ident(String),
    Str(String),
    Number(Number),
    LParen,
    RParen,
    Pipe,
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    tok: Tok,
    /// Whether whitespace separated this token from the previous one.
    spaced: bool,
}

fn syntax(message: impl Into<String>) -> Fault {
    Fault::new(ErrorKind::Syntax, message)
}

// ── Document level ──────────────────────────────────────────────────

/// Split a template into text and action nodes.
pub(crate) fn parse(src: &str) -> Result<Vec<Node>, Fault> {
    let mut nodes = Vec::new();
    let mut rest = src;
    let mut trim_next = false;

    while let Some(open) = rest.find("{{") {
        let mut text = &rest[..open];
        if trim_next {
            text = text.trim_start();
        }
        let after = &rest[open + 2..];
        let (trim_left, inner) = match after.strip_prefix('-') {
            Some(stripped) if stripped.starts_with(char::is_whitespace) => (true, stripped),
            _ => (false, after),
        };
        if trim_left {
            text = text.trim_end();
        }
        if !text.is_empty() {
            nodes.push(Node::Text(text.to_owned()));
        }

        let comment = inner.trim_start().strip_prefix("/*");
        let (action, consumed, trim_right) = if let Some(comment) = comment {
            let skipped = inner.len() - inner.trim_start().len();
            if skipped > 0 && !trim_left {
                return Err(syntax("comment must start immediately after '{{'"));
            }
            let end = comment
                .find("*/")
                .ok_or_else(|| syntax("unclosed comment"))?;
            let tail = &comment[end + 2..];
            let (trim_right, close_len) = close_delim(tail)
                .ok_or_else(|| syntax("comment ends before closing delimiter"))?;
            let consumed = skipped + 2 + end + 2 + close_len;
            (None, consumed, trim_right)
        } else {
            let (tokens, consumed, trim_right) = lex_action(inner)?;
            (Some(parse_action(tokens)?), consumed, trim_right)
        };

        if let Some(pipeline) = action {
            nodes.push(Node::Action(pipeline));
        }
        rest = &inner[consumed..];
        trim_next = trim_right;
    }

    let text = if trim_next { rest.trim_start() } else { rest };
    if !text.is_empty() {
        nodes.push(Node::Text(text.to_owned()));
    }
    Ok(nodes)
}

/// Match `}}` or ` -}}` at the start of `s`, returning the trim flag and
/// the number of bytes consumed.
fn close_delim(s: &str) -> Option<(bool, usize)> {
    if s.starts_with("}}") {
        return Some((false, 2));
    }
    let trimmed = s.trim_start();
    let ws = s.len() - trimmed.len();
    if ws > 0 && trimmed.starts_with("-}}") {
        return Some((true, ws + 3));
    }
    None
}

// ── Lexer ───────────────────────────────────────────────────────────

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Lex one action body, stopping at its closing delimiter.
fn lex_action(src: &str) -> Result<(Vec<Token>, usize, bool), Fault> {
    let mut tokens = Vec::new();
    let mut pos = 0;
    let mut spaced = true;

    loop {
        let rest = &src[pos..];
        if rest.is_empty() {
            return Err(syntax("unclosed action"));
        }
        if let Some((trim, len)) = close_delim(rest) {
            return Ok((tokens, pos + len, trim));
        }

        let mut chars = rest.chars();
        let Some(c) = chars.next() else {
            return Err(syntax("unclosed action"));
        };

        if c.is_whitespace() {
            pos += c.len_utf8();
            spaced = true;
            continue;
        }

        let (tok, len) = match c {
            '(' => (Tok::LParen, 1),
            ')' => (Tok::RParen, 1),
            '|' => (Tok::Pipe, 1),
            '.' => {
                let name: String = chars.take_while(|c| is_ident_char(*c)).collect();
                if name.is_empty() {
                    (Tok::Dot, 1)
                } else {
                    let len = 1 + name.len();
                    (Tok::Field(name), len)
                }
            }
            '$' => {
                let name: String = chars.take_while(|c| is_ident_char(*c)).collect();
                if !name.is_empty() {
                    return Err(syntax(format!("undefined variable \"${name}\"")));
                }
                (Tok::Root, 1)
            }
            '"' => lex_quoted(rest)?,
            '`' => {
                let end = rest[1..]
                    .find('`')
                    .ok_or_else(|| syntax("unterminated raw string"))?;
                (Tok::Str(rest[1..=end].to_owned()), end + 2)
            }
            c if c.is_ascii_digit() || ((c == '-' || c == '+') && starts_number(&rest[1..])) => {
                lex_number(rest)?
            }
            c if is_ident_char(c) => {
                let name: String = rest.chars().take_while(|c| is_ident_char(*c)).collect();
                let len = name.len();
                (Tok::Ident(name), len)
            }
            other => return Err(syntax(format!("unexpected {other:?} in action"))),
        };

        tokens.push(Token { tok, spaced });
        spaced = false;
        pos += len;
    }
}

fn starts_number(s: &str) -> bool {
    s.chars().next().is_some_and(|c| c.is_ascii_digit())
}

fn lex_quoted(src: &str) -> Result<(Tok, usize), Fault> {
    let mut out = String::new();
    let mut chars = src.char_indices().skip(1);
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Ok((Tok::Str(out), i + 1)),
            '\n' => break,
            '\\' => {
                let Some((_, esc)) = chars.next() else { break };
                match esc {
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    '\\' => out.push('\\'),
                    '"' => out.push('"'),
                    other => return Err(syntax(format!("unknown escape sequence \\{other}"))),
                }
            }
            c => out.push(c),
        }
    }
    Err(syntax("unterminated quoted string"))
}

fn lex_number(src: &str) -> Result<(Tok, usize), Fault> {
    let len = src
        .char_indices()
        .take_while(|(i, c)| {
            c.is_ascii_digit() || *c == '.' || *c == 'e' || *c == 'E' || (*i == 0 && (*c == '-' || *c == '+'))
        })
        .count();
    let text = &src[..len];

    let number = if let Ok(int) = text.parse::<i64>() {
        Number::from(int)
    } else {
        text.parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .ok_or_else(|| syntax(format!("bad number syntax: {text:?}")))?
    };
    Ok((Tok::Number(number), len))
}

// ── Parser ──────────────────────────────────────────────────────────

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

fn parse_action(tokens: Vec<Token>) -> Result<Pipeline, Fault> {
    if tokens.is_empty() {
        return Err(syntax("missing value for command"));
    }
    let mut parser = Parser { tokens, pos: 0 };
    let pipeline = parser.pipeline()?;
    if let Some(extra) = parser.peek() {
        return Err(syntax(format!("unexpected {:?} in action", extra.tok)));
    }
    Ok(pipeline)
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn pipeline(&mut self) -> Result<Pipeline, Fault> {
        let mut commands = vec![self.command()?];
        while matches!(self.peek(), Some(Token { tok: Tok::Pipe, .. })) {
            self.pos += 1;
            commands.push(self.command()?);
        }
        Ok(Pipeline { commands })
    }

    fn command(&mut self) -> Result<Command, Fault> {
        let mut args = Vec::new();
        while let Some(token) = self.peek() {
            if matches!(token.tok, Tok::Pipe | Tok::RParen) {
                break;
            }
            args.push(self.operand()?);
        }
        if args.is_empty() {
            return Err(syntax("missing value for command"));
        }
        Ok(Command { args })
    }

    fn operand(&mut self) -> Result<Operand, Fault> {
        let Some(token) = self.next() else {
            return Err(syntax("unexpected end of action"));
        };

        let mut fields = Vec::new();
        let term = match token.tok {
            Tok::Dot => Term::Dot,
            Tok::Root => Term::Root,
            Tok::Field(name) => {
                fields.push(name);
                Term::Dot
            }
            Tok::Str(s) => Term::Str(s),
            Tok::Number(n) => Term::Number(n),
            Tok::Ident(name) => match name.as_str() {
                "true" => Term::Bool(true),
                "false" => Term::Bool(false),
                "nil" => return Err(syntax("nil is not a command")),
                f if FUNCTIONS.contains(&f) => Term::Func(name),
                _ => return Err(syntax(format!("function \"{name}\" not defined"))),
            },
            Tok::LParen => {
                let inner = self.pipeline()?;
                match self.next() {
                    Some(Token { tok: Tok::RParen, .. }) => Term::Sub(Box::new(inner)),
                    _ => return Err(syntax("unclosed left paren")),
                }
            }
            Tok::RParen => return Err(syntax("unexpected right paren")),
            Tok::Pipe => return Err(syntax("missing value for command")),
        };

        // Field chains bind only when written without whitespace: `.a.b`,
        // `$.a`, `(index . "x").y`.
        while let Some(Token {
            tok: Tok::Field(name),
            spaced: false,
        }) = self.peek().cloned()
        {
            self.pos += 1;
            fields.push(name);
        }

        if !fields.is_empty() && matches!(term, Term::Func(_) | Term::Str(_) | Term::Number(_) | Term::Bool(_)) {
            return Err(syntax("unexpected field access on a non-value"));
        }
        Ok(Operand { term, fields })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn field(chain: &[&str]) -> Operand {
        Operand {
            term: Term::Dot,
            fields: chain.iter().map(|s| (*s).to_owned()).collect(),
        }
    }

    #[test]
    fn parses_text_and_field_chain() {
        let nodes = parse("host={{ .mqtt.server }}!").unwrap();
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[0], Node::Text("host=".into()));
        assert_eq!(
            nodes[1],
            Node::Action(Pipeline {
                commands: vec![Command {
                    args: vec![field(&["mqtt", "server"])]
                }]
            })
        );
        assert_eq!(nodes[2], Node::Text("!".into()));
    }

    #[test]
    fn trim_markers_eat_whitespace() {
        let nodes = parse("a  {{- .x -}}  b").unwrap();
        assert_eq!(nodes[0], Node::Text("a".into()));
        assert_eq!(nodes[2], Node::Text("b".into()));
    }

    #[test]
    fn comments_produce_nothing() {
        let nodes = parse("x{{/* note */}}y").unwrap();
        assert_eq!(nodes, vec![Node::Text("x".into()), Node::Text("y".into())]);
    }

    #[test]
    fn nested_index_parses() {
        let nodes = parse(r#"{{ index (index .devices "gw-1") "ip_address" }}"#).unwrap();
        let Node::Action(pipeline) = &nodes[0] else {
            panic!("expected action");
        };
        let args = &pipeline.commands[0].args;
        assert_eq!(args.len(), 3);
        assert_eq!(args[0].term, Term::Func("index".into()));
        assert!(matches!(args[1].term, Term::Sub(_)));
        assert_eq!(args[2].term, Term::Str("ip_address".into()));
    }

    #[test]
    fn dashed_key_in_field_chain_is_rejected() {
        let err = parse("{{ .devices.shelly1-abc.ip }}").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Syntax);
    }

    #[test]
    fn unknown_function_and_unclosed_action_are_rejected() {
        assert!(parse("{{ upper .x }}").is_err());
        assert!(parse("{{ .x ").is_err());
        assert!(parse("{{ if .x }}y{{ end }}").is_err());
        assert!(parse("{{ }}").is_err());
    }

    #[test]
    fn negative_numbers_are_not_trim_markers() {
        let nodes = parse("{{-3}}").unwrap();
        let Node::Action(pipeline) = &nodes[0] else {
            panic!("expected action");
        };
        assert_eq!(
            pipeline.commands[0].args[0].term,
            Term::Number(Number::from(-3))
        );
    }
}
