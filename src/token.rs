//! Script tokenizer (spec §6 "Script source syntax").
//!
//! This collaborator is explicitly named as out of scope for the engineering
//! focus of the tracer ("the script tokenizer ... is out of scope"), so it is
//! kept deliberately small: split on whitespace and the comment marker,
//! decode the four literal forms, and extract the five directive-comment
//! shapes. Everything downstream consumes [`ScriptToken`]s, never raw text.
//!
//! Grounded on `bin/prover.rs::load_selectors_csv`'s shape: split, strip
//! comments, typed error on malformed input, one token/row at a time.

#![forbid(unsafe_code)]

use thiserror::Error;

use crate::config::Settings;
use crate::value::ScriptNum;

/// A decoded literal push, prior to being interned into the value store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PushBytes(pub Vec<u8>);

/// The payload of one token: either a data push or an opcode word.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Push(PushBytes),
    /// `$name` — a user-declared placeholder.
    Placeholder(String),
    /// An opcode mnemonic, `OP_` prefix already stripped, upper-cased.
    Op(String),
}

/// A directive-comment attached to the token that precedes it on the line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Directive {
    /// `// =>name`
    DataRefBind(String),
    /// `// bsst-assert[-size]<(target)>: <expr>`
    Assert { size: bool, target: Option<String>, expr: String },
    /// `// bsst-assume[-size]($name): <expr>`
    Assume { size: bool, name: String, expr: String },
    /// `// bsst-name-alias(wit<N>): alias`
    NameAlias { witness: u32, alias: String },
    /// `// bsst-plugin(name): <raw>`
    Plugin { name: String, body: String },
}

/// One lexed unit: its program-counter index, its source line, the decoded
/// payload, and any directive-comments attached to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptToken {
    pub pc: usize,
    pub line: u32,
    pub kind: TokenKind,
    pub directives: Vec<Directive>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LexError {
    #[error("unterminated single-quoted string starting on line {0}")]
    UnterminatedString(u32),
    #[error("invalid hex literal {0:?} on line {1}")]
    InvalidHex(String, u32),
    #[error("invalid numeric literal {0:?} on line {1}")]
    InvalidNumber(String, u32),
    #[error("malformed directive comment {0:?} on line {1}")]
    InvalidDirective(String, u32),
}

/// Tokenize a full script source string.
pub fn tokenize(source: &str, settings: &Settings) -> Result<Vec<ScriptToken>, LexError> {
    let marker = settings.comment_marker.as_str();
    let mut tokens = Vec::new();
    let mut pc = 0usize;

    for (line_idx, raw_line) in source.lines().enumerate() {
        let line = (line_idx + 1) as u32;
        let (code, comment) = split_comment(raw_line, marker);
        let words = split_words(code, line)?;
        let mut pending_directives = Vec::new();
        if let Some(c) = comment {
            pending_directives = parse_directives(c, line)?;
        }
        for (i, word) in words.iter().enumerate() {
            let kind = decode_word(word, line)?;
            let directives = if i + 1 == words.len() { std::mem::take(&mut pending_directives) } else { Vec::new() };
            tokens.push(ScriptToken { pc, line, kind, directives });
            pc += 1;
        }
        // A comment-only line still carries directives; attach them to the
        // previous token rather than dropping them.
        if !pending_directives.is_empty() {
            if let Some(last) = tokens.last_mut() {
                last.directives.extend(pending_directives);
            }
        }
    }
    Ok(tokens)
}

fn split_comment<'a>(line: &'a str, marker: &str) -> (&'a str, Option<&'a str>) {
    match line.find(marker) {
        Some(idx) => (&line[..idx], Some(&line[idx + marker.len()..])),
        None => (line, None),
    }
}

/// Split a code fragment into whitespace-delimited words, keeping
/// single-quoted strings and `x('...')`/`le64(...)` groups intact.
fn split_words(code: &str, line: u32) -> Result<Vec<String>, LexError> {
    let mut words = Vec::new();
    let chars: Vec<char> = code.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i].is_whitespace() {
            i += 1;
            continue;
        }
        if chars[i] == '\'' {
            let start = i;
            i += 1;
            while i < chars.len() && chars[i] != '\'' {
                i += 1;
            }
            if i >= chars.len() {
                return Err(LexError::UnterminatedString(line));
            }
            i += 1;
            words.push(chars[start..i].iter().collect());
            continue;
        }
        // Angle-bracketed data is accepted and stripped per spec §6.
        if chars[i] == '<' {
            let start = i;
            i += 1;
            while i < chars.len() && chars[i] != '>' {
                i += 1;
            }
            if i < chars.len() {
                i += 1;
            }
            words.push(chars[start..i].iter().collect::<String>().trim_matches(|c| c == '<' || c == '>').to_string());
            continue;
        }
        let start = i;
        while i < chars.len() && !chars[i].is_whitespace() {
            i += 1;
        }
        words.push(chars[start..i].iter().collect());
    }
    Ok(words)
}

fn decode_word(word: &str, line: u32) -> Result<TokenKind, LexError> {
    if let Some(name) = word.strip_prefix('$') {
        return Ok(TokenKind::Placeholder(name.to_string()));
    }
    if word.starts_with('\'') && word.ends_with('\'') && word.len() >= 2 {
        return Ok(TokenKind::Push(PushBytes(word[1..word.len() - 1].as_bytes().to_vec())));
    }
    if let Some(inner) = word.strip_prefix("le64(").and_then(|s| s.strip_suffix(')')) {
        let n: i64 = inner.parse().map_err(|_| LexError::InvalidNumber(word.to_string(), line))?;
        return Ok(TokenKind::Push(PushBytes(n.to_le_bytes().to_vec())));
    }
    if let Some(inner) = word.strip_prefix("x('").and_then(|s| s.strip_suffix("')")) {
        let bytes = hex::decode(inner).map_err(|_| LexError::InvalidHex(word.to_string(), line))?;
        return Ok(TokenKind::Push(PushBytes(bytes)));
    }
    if let Some(inner) = word.strip_prefix("0x") {
        let bytes = hex::decode(inner).map_err(|_| LexError::InvalidHex(word.to_string(), line))?;
        return Ok(TokenKind::Push(PushBytes(bytes)));
    }
    if word.chars().next().map(|c| c == '-' || c.is_ascii_digit()).unwrap_or(false) {
        if let Ok(n) = word.parse::<i128>() {
            return Ok(TokenKind::Push(PushBytes(ScriptNum(n).encode())));
        }
    }
    let upper = word.to_ascii_uppercase();
    let name = upper.strip_prefix("OP_").unwrap_or(&upper);
    Ok(TokenKind::Op(name.to_string()))
}

fn parse_directives(comment: &str, line: u32) -> Result<Vec<Directive>, LexError> {
    let trimmed = comment.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    if let Some(name) = trimmed.strip_prefix("=>") {
        return Ok(vec![Directive::DataRefBind(name.trim().to_string())]);
    }
    if let Some(rest) = trimmed.strip_prefix("bsst-assert") {
        let (size, rest) = strip_size_suffix(rest);
        let (target, rest) = strip_paren_target(rest);
        let expr = rest
            .trim()
            .strip_prefix(':')
            .ok_or_else(|| LexError::InvalidDirective(trimmed.to_string(), line))?
            .trim()
            .to_string();
        return Ok(vec![Directive::Assert { size, target, expr }]);
    }
    if let Some(rest) = trimmed.strip_prefix("bsst-assume") {
        let (size, rest) = strip_size_suffix(rest);
        let rest = rest.trim().strip_prefix('(').ok_or_else(|| LexError::InvalidDirective(trimmed.to_string(), line))?;
        let close = rest.find(')').ok_or_else(|| LexError::InvalidDirective(trimmed.to_string(), line))?;
        let name = rest[..close].trim_start_matches('$').to_string();
        let expr = rest[close + 1..]
            .trim()
            .strip_prefix(':')
            .ok_or_else(|| LexError::InvalidDirective(trimmed.to_string(), line))?
            .trim()
            .to_string();
        return Ok(vec![Directive::Assume { size, name, expr }]);
    }
    if let Some(rest) = trimmed.strip_prefix("bsst-name-alias(") {
        let close = rest.find(')').ok_or_else(|| LexError::InvalidDirective(trimmed.to_string(), line))?;
        let wit_spec = rest[..close].trim().trim_start_matches("wit");
        let witness: u32 = wit_spec.parse().map_err(|_| LexError::InvalidDirective(trimmed.to_string(), line))?;
        let alias = rest[close + 1..]
            .trim()
            .strip_prefix(':')
            .ok_or_else(|| LexError::InvalidDirective(trimmed.to_string(), line))?
            .trim()
            .to_string();
        return Ok(vec![Directive::NameAlias { witness, alias }]);
    }
    if let Some(rest) = trimmed.strip_prefix("bsst-plugin(") {
        let close = rest.find(')').ok_or_else(|| LexError::InvalidDirective(trimmed.to_string(), line))?;
        let name = rest[..close].trim().to_string();
        let body = rest[close + 1..].trim_start_matches(':').trim().to_string();
        return Ok(vec![Directive::Plugin { name, body }]);
    }
    Ok(Vec::new())
}

fn strip_size_suffix(rest: &str) -> (bool, &str) {
    match rest.strip_prefix("-size") {
        Some(r) => (true, r),
        None => (false, rest),
    }
}

fn strip_paren_target(rest: &str) -> (Option<String>, &str) {
    let trimmed = rest.trim_start();
    if let Some(after_paren) = trimmed.strip_prefix('(') {
        if let Some(close) = after_paren.find(')') {
            return (Some(after_paren[..close].trim().to_string()), &after_paren[close + 1..]);
        }
    }
    (None, trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings::default()
    }

    #[test]
    fn decodes_decimal_hex_and_le64() {
        let toks = tokenize("1 0x0203 le64(5)", &settings()).unwrap();
        assert_eq!(toks[0].kind, TokenKind::Push(PushBytes(vec![1])));
        assert_eq!(toks[1].kind, TokenKind::Push(PushBytes(vec![0x02, 0x03])));
        assert_eq!(toks[2].kind, TokenKind::Push(PushBytes(5i64.to_le_bytes().to_vec())));
    }

    #[test]
    fn op_prefix_is_optional_and_case_insensitive() {
        let toks = tokenize("op_add ADD add", &settings()).unwrap();
        for t in &toks {
            assert_eq!(t.kind, TokenKind::Op("ADD".to_string()));
        }
    }

    #[test]
    fn placeholder_and_quoted_string() {
        let toks = tokenize("$a 'hello'", &settings()).unwrap();
        assert_eq!(toks[0].kind, TokenKind::Placeholder("a".to_string()));
        assert_eq!(toks[1].kind, TokenKind::Push(PushBytes(b"hello".to_vec())));
    }

    #[test]
    fn data_ref_bind_directive() {
        let toks = tokenize("dup // =>top", &settings()).unwrap();
        assert_eq!(toks[0].directives, vec![Directive::DataRefBind("top".to_string())]);
    }

    #[test]
    fn assert_directive_with_target_and_size() {
        let toks = tokenize("add // bsst-assert-size(&x): <= 32", &settings()).unwrap();
        match &toks[0].directives[0] {
            Directive::Assert { size, target, expr } => {
                assert!(size);
                assert_eq!(target.as_deref(), Some("&x"));
                assert_eq!(expr, "<= 32");
            }
            other => panic!("unexpected directive {other:?}"),
        }
    }

    #[test]
    fn unterminated_string_is_an_error() {
        assert!(tokenize("'abc", &settings()).is_err());
    }
}
