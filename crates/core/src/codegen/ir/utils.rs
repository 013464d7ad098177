//! Common utilities for Python code generation.
//!
//! Identifier conversion and literal escaping shared by the IR and emitters.

use std::collections::HashSet;
use std::sync::LazyLock;

/// Python keywords and soft keywords that cannot be used as attribute names.
pub static PY_RESERVED_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class", "continue", "def",
        "del", "elif", "else", "except", "finally", "for", "from", "global", "if", "import", "in", "is",
        "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try", "while", "with", "yield",
    ]
    .into_iter()
    .collect()
});

/// Names pydantic reserves on `BaseModel`; a field with one of these names
/// would shadow model behaviour.
static PYDANTIC_RESERVED: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    ["model_config", "model_fields", "model_dump", "model_validate", "json", "dict", "copy", "schema"]
        .into_iter()
        .collect()
});

/// Convert an identifier to snake_case.
///
/// Acronym runs stay together: `HTTPServer` becomes `http_server`,
/// `createdAt` becomes `created_at`.
pub fn to_snake_case(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c == '-' || c == ' ' || c == '.' {
            if !result.ends_with('_') {
                result.push('_');
            }
            continue;
        }
        if c.is_ascii_uppercase() {
            let prev = i.checked_sub(1).and_then(|p| chars.get(p)).copied();
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                Some(p) if p.is_ascii_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_ascii_uppercase() => next.is_some_and(|n| n.is_ascii_lowercase()),
                _ => false,
            };
            if boundary && !result.ends_with('_') {
                result.push('_');
            }
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}

/// Snake-case attribute name that is safe to declare on a pydantic model.
pub fn attribute_name(member: &str) -> String {
    let mut name = to_snake_case(member);
    if name.is_empty() {
        return "field".to_string();
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name = format!("_{name}");
    }
    if PY_RESERVED_WORDS.contains(name.as_str()) || PYDANTIC_RESERVED.contains(name.as_str()) {
        name.push('_');
    }
    name
}

/// Double-quoted Python string literal.
pub fn py_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Body of a triple-quoted docstring.
pub fn escape_docstring(s: &str) -> String {
    s.replace('\\', "\\\\").replace("\"\"\"", "\\\"\\\"\\\"")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_to_snake_case() {
        assert_eq!(to_snake_case("CreatePostInput"), "create_post_input");
        assert_eq!(to_snake_case("createdAt"), "created_at");
        assert_eq!(to_snake_case("HTTPServer"), "http_server");
        assert_eq!(to_snake_case("postId2Go"), "post_id2_go");
        assert_eq!(to_snake_case("already_snake"), "already_snake");
        assert_eq!(to_snake_case("X-Request-Id"), "x_request_id");
    }

    #[test]
    fn test_attribute_name_escapes_keywords() {
        assert_eq!(attribute_name("from"), "from_");
        assert_eq!(attribute_name("json"), "json_");
        assert_eq!(attribute_name("3d"), "_3d");
        assert_eq!(attribute_name("title"), "title");
    }

    #[test]
    fn test_py_string() {
        assert_eq!(py_string("hello"), "\"hello\"");
        assert_eq!(py_string("say \"hi\"\n"), "\"say \\\"hi\\\"\\n\"");
        assert_eq!(py_string(r"^\d+$"), r#""^\\d+$""#);
    }

    #[test]
    fn test_escape_docstring() {
        assert_eq!(escape_docstring(r#"Uses """quotes""""#), r#"Uses \"\"\"quotes\"\"\""#);
    }
}
