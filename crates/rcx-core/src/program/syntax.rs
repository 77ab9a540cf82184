//! Line-oriented rule syntax.
//!
//! ```text
//! # comment
//! @kernel.wrap [?x] -> rewrite([wrapped, ?x])
//! PING -> rewrite(PONG)
//! PONG -> ra
//! [null, _] -> ra
//! ```
//!
//! Terms: `[a, b]` sequences, bare tokens as symbols, `null`/`true`/`false`,
//! numbers, `"quoted"` strings, `{...}` JSON objects, `?name` variables and
//! `_` for the wildcard. Commas and `->` only split at bracket depth zero.
//! Parsing and rendering both run without recursion.

use crate::canonical::canonical_json;
use crate::classify::Bucket;
use crate::errors::{RcxError, Result};
use crate::value::{Value, WILDCARD};

const REWRITE: &str = "rewrite";
const ARROW: &str = "->";

#[derive(Debug, Clone, PartialEq)]
pub enum RuleAction {
    Route(Bucket),
    Rewrite(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleLine {
    pub id: Option<String>,
    pub pattern: Value,
    pub action: RuleAction,
}

#[derive(Debug)]
enum Token {
    Open,
    Close,
    Comma,
    Atom(Value),
}

/// Parse a standalone term.
///
/// # Errors
///
/// Returns `MalformedValue` describing the first syntax problem.
pub fn parse_term(text: &str) -> Result<Value> {
    parse_term_str(text).map_err(|reason| RcxError::malformed(format!("term: {}", reason)))
}

struct Frame {
    items: Vec<Value>,
    expect_item: bool,
}

fn parse_term_str(text: &str) -> std::result::Result<Value, String> {
    let mut stack: Vec<Frame> = Vec::new();
    let mut result: Option<Value> = None;

    for token in tokenize(text)? {
        match token {
            Token::Open => {
                check_slot(&stack, &result)?;
                stack.push(Frame {
                    items: Vec::new(),
                    expect_item: true,
                });
            }
            Token::Close => {
                let frame = stack.pop().ok_or("unbalanced ']'")?;
                if frame.expect_item && !frame.items.is_empty() {
                    return Err("trailing ',' before ']'".to_string());
                }
                place(&mut stack, &mut result, Value::Seq(frame.items));
            }
            Token::Comma => {
                let frame = stack.last_mut().ok_or("',' outside of brackets")?;
                if frame.expect_item {
                    return Err("unexpected ','".to_string());
                }
                frame.expect_item = true;
            }
            Token::Atom(value) => {
                check_slot(&stack, &result)?;
                place(&mut stack, &mut result, value);
            }
        }
    }

    if !stack.is_empty() {
        return Err("unclosed '['".to_string());
    }
    result.ok_or_else(|| "empty term".to_string())
}

/// A new item may only start where a value is expected.
fn check_slot(stack: &[Frame], result: &Option<Value>) -> std::result::Result<(), String> {
    match stack.last() {
        Some(frame) if !frame.expect_item => Err("missing ',' between items".to_string()),
        None if result.is_some() => Err("unexpected content after term".to_string()),
        _ => Ok(()),
    }
}

fn place(stack: &mut [Frame], result: &mut Option<Value>, value: Value) {
    match stack.last_mut() {
        Some(frame) => {
            frame.items.push(value);
            frame.expect_item = false;
        }
        None => *result = Some(value),
    }
}

fn tokenize(text: &str) -> std::result::Result<Vec<Token>, String> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b'[' => {
                tokens.push(Token::Open);
                i += 1;
            }
            b']' => {
                tokens.push(Token::Close);
                i += 1;
            }
            b',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            b'"' => {
                let end = string_end(bytes, i).ok_or("unterminated string")?;
                let s: String = serde_json::from_str(&text[i..=end]).map_err(|e| e.to_string())?;
                tokens.push(Token::Atom(Value::Str(s)));
                i = end + 1;
            }
            b'{' => {
                let end = object_end(bytes, i).ok_or("unterminated object")?;
                let value = Value::from_json_str(&text[i..=end]).map_err(|e| e.to_string())?;
                tokens.push(Token::Atom(value));
                i = end + 1;
            }
            b'}' => return Err("unbalanced '}'".to_string()),
            _ if b.is_ascii_whitespace() => i += 1,
            _ => {
                let start = i;
                while i < bytes.len() && !is_delimiter(bytes[i]) {
                    i += 1;
                }
                tokens.push(Token::Atom(bare_token(&text[start..i])?));
            }
        }
    }

    Ok(tokens)
}

fn is_delimiter(b: u8) -> bool {
    b.is_ascii_whitespace() || matches!(b, b'[' | b']' | b',' | b'{' | b'}' | b'"')
}

/// Index of the closing quote of the string starting at `start`.
fn string_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

/// Index of the brace closing the object starting at `start`.
fn object_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => i = string_end(bytes, i)?,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

fn bare_token(token: &str) -> std::result::Result<Value, String> {
    match token {
        "null" => return Ok(Value::Null),
        "true" => return Ok(Value::Bool(true)),
        "false" => return Ok(Value::Bool(false)),
        WILDCARD => return Ok(Value::wildcard()),
        _ => {}
    }
    if let Some(name) = token.strip_prefix('?') {
        if name.is_empty() {
            return Err("'?' needs a variable name".to_string());
        }
        return Ok(Value::var(name));
    }
    if let Ok(n) = serde_json::from_str::<serde_json::Number>(token) {
        return Ok(Value::Number(n));
    }
    Ok(Value::sym(token))
}

/// True if `s` reads back as the same symbol when written bare.
fn is_bare_symbol(s: &str) -> bool {
    !s.is_empty()
        && !s.bytes().any(|b| is_delimiter(b) || b == b'#')
        && !s.starts_with('?')
        && !s.starts_with('@')
        && !s.contains(ARROW)
        && matches!(bare_token(s), Ok(Value::Str(ref parsed)) if parsed == s)
}

/// Render a term in rule syntax. The output re-parses to the same value.
///
/// # Errors
///
/// Returns `Serialization` if an embedded string cannot be encoded.
pub fn render_term(value: &Value) -> Result<String> {
    enum Emit<'a> {
        Value(&'a Value),
        Raw(&'static str),
    }

    let mut out = String::new();
    let mut stack = vec![Emit::Value(value)];

    while let Some(item) = stack.pop() {
        let node = match item {
            Emit::Raw(text) => {
                out.push_str(text);
                continue;
            }
            Emit::Value(node) => node,
        };
        if let Some(name) = node.as_var() {
            if name == WILDCARD {
                out.push_str(WILDCARD);
            } else if is_bare_symbol(name) {
                out.push('?');
                out.push_str(name);
            } else {
                out.push_str(&canonical_json(node)?);
            }
            continue;
        }
        match node {
            Value::Null => out.push_str("null"),
            Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Value::Number(n) => out.push_str(&n.to_string()),
            Value::Str(s) if is_bare_symbol(s) => out.push_str(s),
            Value::Str(s) => out.push_str(&serde_json::to_string(s)?),
            Value::Seq(items) => {
                out.push('[');
                stack.push(Emit::Raw("]"));
                for (i, child) in items.iter().enumerate().rev() {
                    stack.push(Emit::Value(child));
                    if i > 0 {
                        stack.push(Emit::Raw(", "));
                    }
                }
            }
            Value::Map(_) => out.push_str(&canonical_json(node)?),
        }
    }

    Ok(out)
}

/// Byte offset of the first `->` outside brackets and strings.
fn split_arrow(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0i64;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => i = string_end(bytes, i)?,
            b'[' | b'{' => depth += 1,
            b']' | b'}' => depth -= 1,
            b'-' if depth == 0 && bytes.get(i + 1) == Some(&b'>') => return Some(i),
            _ => {}
        }
        i += 1;
    }
    None
}

/// Parse one line. Blank lines and `#` comments yield `None`.
///
/// # Errors
///
/// Returns `RuleSyntax` with the 1-based `line_no`.
pub fn parse_rule_line(line: &str, line_no: usize) -> Result<Option<RuleLine>> {
    let syntax = |reason: String| RcxError::RuleSyntax {
        line: line_no,
        reason,
    };

    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let (id, rule) = match trimmed.strip_prefix('@') {
        Some(labelled) => {
            let (id, rest) = split_label(labelled).map_err(syntax)?;
            (Some(id), rest)
        }
        None => (None, trimmed),
    };

    let arrow = split_arrow(rule).ok_or_else(|| syntax("missing '->'".to_string()))?;
    let pattern_text = &rule[..arrow];
    let action_text = rule[arrow + ARROW.len()..].trim();

    let pattern = parse_term_str(pattern_text).map_err(|e| syntax(format!("pattern: {}", e)))?;
    let action = parse_action(action_text).map_err(syntax)?;

    Ok(Some(RuleLine {
        id,
        pattern,
        action,
    }))
}

/// Split `label rest` after the `@`. A label starting with `"` is a JSON
/// string and may contain anything; otherwise it runs to the first space.
fn split_label(labelled: &str) -> std::result::Result<(String, &str), String> {
    let (id, rest) = if labelled.starts_with('"') {
        let end = string_end(labelled.as_bytes(), 0).ok_or("unterminated rule label")?;
        let id: String =
            serde_json::from_str(&labelled[..=end]).map_err(|e| format!("label: {}", e))?;
        let rest = &labelled[end + 1..];
        if !rest.starts_with(char::is_whitespace) {
            return Err("label without a rule".to_string());
        }
        (id, rest)
    } else {
        let (id, rest) = labelled
            .split_once(char::is_whitespace)
            .ok_or("label without a rule")?;
        (id.to_string(), rest)
    };
    if id.trim().is_empty() {
        return Err("empty rule label".to_string());
    }
    Ok((id, rest))
}

/// True if `id` reads back unchanged when written after a bare `@`.
fn is_bare_label(id: &str) -> bool {
    !id.is_empty()
        && !id.starts_with('"')
        && !id.chars().any(|c| c.is_whitespace() || c.is_control())
}

fn parse_action(text: &str) -> std::result::Result<RuleAction, String> {
    if let Some(bucket) = Bucket::parse(text) {
        return Ok(RuleAction::Route(bucket));
    }
    let Some(rest) = text
        .strip_prefix(REWRITE)
        .filter(|rest| rest.is_empty() || rest.starts_with('(') || rest.starts_with(char::is_whitespace))
    else {
        return Err(format!("unknown action '{}'", text));
    };
    let rest = rest.trim();
    let body = match rest.strip_prefix('(') {
        Some(inner) => inner
            .strip_suffix(')')
            .ok_or_else(|| "rewrite( needs a closing ')'".to_string())?,
        None if rest.is_empty() => return Err("rewrite needs a term".to_string()),
        None => rest,
    };
    parse_term_str(body)
        .map(RuleAction::Rewrite)
        .map_err(|e| format!("rewrite: {}", e))
}

/// Parse every rule in a document, in order.
///
/// # Errors
///
/// Returns the first `RuleSyntax` error.
pub fn parse_rules(text: &str) -> Result<Vec<RuleLine>> {
    let mut rules = Vec::new();
    for (index, line) in text.lines().enumerate() {
        if let Some(rule) = parse_rule_line(line, index + 1)? {
            rules.push(rule);
        }
    }
    Ok(rules)
}

/// Render a labelled rule line. Ids that would not survive a bare label are
/// written as a JSON string: `@"ping pong" PING -> rewrite(PONG)`.
///
/// # Errors
///
/// Returns `Serialization` if a term cannot be rendered.
pub fn render_rule(id: &str, pattern: &Value, action: &RuleAction) -> Result<String> {
    let action = match action {
        RuleAction::Route(bucket) => bucket.to_string(),
        RuleAction::Rewrite(body) => format!("{}({})", REWRITE, render_term(body)?),
    };
    let label = if is_bare_label(id) {
        id.to_string()
    } else {
        serde_json::to_string(id)?
    };
    Ok(format!("@{} {} {} {}", label, render_term(pattern)?, ARROW, action))
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = render_term(self).map_err(|_| std::fmt::Error)?;
        f.write_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn v(json: serde_json::Value) -> Value {
        Value::from_json(&json).unwrap()
    }

    #[test]
    fn test_parse_terms() {
        assert_eq!(parse_term("PING").unwrap(), Value::sym("PING"));
        assert_eq!(parse_term("[null, _]").unwrap(), v(json!([null, {"var": "_"}])));
        assert_eq!(parse_term("[]").unwrap(), Value::seq([]));
        assert_eq!(parse_term("?x").unwrap(), Value::var("x"));
        assert_eq!(parse_term("-3").unwrap(), Value::int(-3));
        assert_eq!(parse_term("\"two words\"").unwrap(), Value::sym("two words"));
        assert_eq!(
            parse_term("[a, [b, \"c,d\"], {\"k\": [1]}]").unwrap(),
            v(json!(["a", ["b", "c,d"], {"k": [1]}]))
        );
    }

    #[test]
    fn test_parse_term_errors() {
        for bad in ["", "[a", "a]", "[a b]", "[a,,b]", "[a,]", "a b", "?", "{\"k\": 1"] {
            assert!(parse_term(bad).is_err(), "expected error for {:?}", bad);
        }
    }

    #[test]
    fn test_render_reparses() {
        for text in [
            "PING",
            "[null, _]",
            "[?x, [?y, ?x]]",
            "\"needs quotes\"",
            "\"null\"",
            "\"42\"",
            "[]",
            "{\"head\":1,\"tail\":null}",
            "[2.5, true, false]",
        ] {
            let value = parse_term(text).unwrap();
            let rendered = render_term(&value).unwrap();
            assert_eq!(parse_term(&rendered).unwrap(), value, "for {:?}", text);
        }
    }

    #[test]
    fn test_parse_rule_lines() {
        let rules = parse_rules(
            "# demo\n\nPING -> rewrite(PONG)\n@done PONG -> ra\n[a, b] -> rewrite [b, a]\n",
        )
        .unwrap();
        assert_eq!(rules.len(), 3);
        assert_eq!(rules[0].id, None);
        assert_eq!(rules[0].action, RuleAction::Rewrite(Value::sym("PONG")));
        assert_eq!(rules[1].id.as_deref(), Some("done"));
        assert_eq!(rules[1].action, RuleAction::Route(Bucket::Ra));
        assert_eq!(
            rules[2].action,
            RuleAction::Rewrite(v(json!(["b", "a"])))
        );
    }

    #[test]
    fn test_arrow_inside_string_is_not_split() {
        let rule = parse_rule_line("\"a->b\" -> sink", 1).unwrap().unwrap();
        assert_eq!(rule.pattern, Value::sym("a->b"));
        assert_eq!(rule.action, RuleAction::Route(Bucket::Sink));
    }

    #[test]
    fn test_rule_errors_carry_line_number() {
        let err = parse_rules("PING -> ra\nPONG ra\n").unwrap_err();
        assert_eq!(
            err,
            RcxError::RuleSyntax {
                line: 2,
                reason: "missing '->'".to_string()
            }
        );
        assert!(parse_rule_line("X -> teleport", 1).is_err());
        assert!(parse_rule_line("X -> rewrite(Y", 1).is_err());
    }

    #[test]
    fn test_render_rule_reparses() {
        let action = RuleAction::Rewrite(v(json!(["wrapped", {"var": "x"}])));
        let pattern = v(json!([{"var": "x"}]));
        let line = render_rule("kernel.wrap", &pattern, &action).unwrap();
        assert_eq!(line, "@kernel.wrap [?x] -> rewrite([wrapped, ?x])");
        let parsed = parse_rule_line(&line, 1).unwrap().unwrap();
        assert_eq!(parsed.id.as_deref(), Some("kernel.wrap"));
        assert_eq!(parsed.pattern, pattern);
        assert_eq!(parsed.action, action);
    }

    #[test]
    fn test_any_label_survives_render() {
        let pattern = Value::sym("PING");
        let action = RuleAction::Rewrite(Value::sym("PONG"));
        for id in ["ping pong", "\"quoted\"", " padded ", "tab\there", "line\nbreak", "ünï"] {
            let line = render_rule(id, &pattern, &action).unwrap();
            assert!(!line.contains('\n'), "{:?}", line);
            let parsed = parse_rule_line(&line, 1).unwrap().unwrap();
            assert_eq!(parsed.id.as_deref(), Some(id), "{:?}", line);
            assert_eq!(parsed.pattern, pattern);
            assert_eq!(parsed.action, action);
        }
        assert_eq!(
            render_rule("ping pong", &pattern, &action).unwrap(),
            "@\"ping pong\" PING -> rewrite(PONG)"
        );
    }

    #[test]
    fn test_quoted_label_errors() {
        assert!(parse_rule_line("@\"open PING -> ra", 1).is_err());
        assert!(parse_rule_line("@\"a\"PING -> ra", 1).is_err());
        assert!(parse_rule_line("@\"  \" PING -> ra", 1).is_err());
    }

    #[test]
    fn test_value_display_uses_rule_syntax() {
        assert_eq!(v(json!(["PING", null])).to_string(), "[PING, null]");
    }
}
