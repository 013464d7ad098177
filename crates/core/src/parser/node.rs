//! Node values: trait arguments, metadata values and service/operation bodies.
//!
//! Node values are JSON-like, except that keys may be bare identifiers and
//! unquoted shape ids are read as strings.

use serde_json::{Map, Number, Value};

use super::cursor::Cursor;
use crate::error::ParseError;

pub(crate) fn value(cur: &mut Cursor) -> Result<Value, ParseError> {
    cur.skip_trivia();
    match cur.peek() {
        Some('"') => cur.string().map(Value::String),
        Some('[') => array(cur),
        Some('{') => {
            cur.bump();
            object_until(cur, '}').map(Value::Object)
        }
        Some(c) if c == '-' || c.is_ascii_digit() => number(cur),
        Some(_) => match cur.shape_id() {
            Some(word) => Ok(match word.as_str() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                "null" => Value::Null,
                _ => Value::String(word),
            }),
            None => Err(unexpected(cur, "a value")),
        },
        None => Err(cur.error("unexpected end of input, expected a value")),
    }
}

fn array(cur: &mut Cursor) -> Result<Value, ParseError> {
    cur.expect('[')?;
    let mut items = Vec::new();
    loop {
        cur.skip_trivia();
        if cur.eat(']') {
            return Ok(Value::Array(items));
        }
        if cur.at_end() {
            return Err(cur.error("unexpected end of input, expected `]`"));
        }
        items.push(value(cur)?);
    }
}

/// Parse `key: value` pairs up to and including `close`.
///
/// The opening delimiter must already be consumed. Used for `{...}` objects
/// and for the brace-less `@trait(key: value)` form.
pub(crate) fn object_until(cur: &mut Cursor, close: char) -> Result<Map<String, Value>, ParseError> {
    let mut map = Map::new();
    loop {
        cur.skip_trivia();
        if cur.eat(close) {
            return Ok(map);
        }
        let position = cur.position();
        let key = match cur.peek() {
            Some('"') => cur.string()?,
            Some(_) => cur.ident().ok_or_else(|| unexpected(cur, "a key"))?,
            None => return Err(cur.error(format!("unexpected end of input, expected `{close}`"))),
        };
        cur.skip_trivia();
        if cur.peek() == Some(':') && cur.peek_at(1) == Some('=') {
            return Err(cur.error("inline structure definitions (`:=`) are not supported"));
        }
        cur.expect(':')?;
        let value = value(cur)?;
        if map.insert(key.clone(), value).is_some() {
            return Err(cur.error_at(position, format!("duplicate key `{key}`")));
        }
    }
}

/// Whether the cursor sits on `key:` (used to tell `@t(a: 1)` from `@t("a")`).
pub(crate) fn at_key(cur: &mut Cursor) -> bool {
    let mark = cur.mark();
    let is_key = match cur.peek() {
        Some('"') => cur.string().is_ok(),
        _ => cur.ident().is_some(),
    } && {
        cur.skip_trivia();
        cur.peek() == Some(':')
    };
    cur.reset(mark);
    is_key
}

fn number(cur: &mut Cursor) -> Result<Value, ParseError> {
    let position = cur.position();
    let mut text = String::new();
    while let Some(c) = cur.peek() {
        if c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E') {
            text.push(c);
            cur.bump();
        } else {
            break;
        }
    }
    let parsed = if text.contains(['.', 'e', 'E']) {
        text.parse::<f64>().ok().and_then(Number::from_f64)
    } else {
        text.parse::<i64>().ok().map(Number::from)
    };
    parsed
        .map(Value::Number)
        .ok_or_else(|| cur.error_at(position, format!("invalid number `{text}`")))
}

fn unexpected(cur: &Cursor, expected: &str) -> ParseError {
    match cur.peek() {
        Some(found) => cur.error(format!("expected {expected}, found `{found}`")),
        None => cur.error(format!("unexpected end of input, expected {expected}")),
    }
}
