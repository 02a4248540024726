//! Text transforms that turn near-JSON into JSON.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref CODE_FENCE: Regex = Regex::new(r"(?i)```(?:json)?").unwrap();

    static ref TRAILING_COMMA_OBJECT: Regex = Regex::new(r",\s*\}").unwrap();

    static ref TRAILING_COMMA_ARRAY: Regex = Regex::new(r",\s*\]").unwrap();

    // A word token in key position: after `{` or `,`, followed by a colon
    static ref BARE_KEY: Regex = Regex::new(r"([{,]\s*)([A-Za-z_][A-Za-z0-9_]*)\s*:").unwrap();

    // A quoted key whose value is missing before the object closes
    static ref EMPTY_VALUE: Regex = Regex::new(r#"("[A-Za-z0-9_]+"\s*:)\s*\}"#).unwrap();
}

/// Remove Markdown code fences, tagged or bare, wherever they appear.
pub fn strip_code_fences(text: &str) -> String {
    CODE_FENCE.replace_all(text, "").into_owned()
}

/// Slice from the first `{` to the last `}`.
///
/// When no `}` follows the first `{` the slice runs to the end of the text,
/// which keeps truncated objects. Text without `{` is returned unchanged.
pub fn extract_braced(text: &str) -> &str {
    match text.find('{') {
        None => text,
        Some(start) => match text.rfind('}') {
            Some(end) if end > start => &text[start..=end],
            _ => &text[start..],
        },
    }
}

/// Turn single-quoted strings into double-quoted ones.
///
/// Characters inside double-quoted strings are left alone, so apostrophes
/// in valid JSON values survive.
pub fn normalize_quotes(text: &str) -> String {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Outside,
        Double,
        Single,
    }

    let mut out = String::with_capacity(text.len());
    let mut state = State::Outside;
    let mut escaped = false;

    for c in text.chars() {
        match state {
            State::Outside => match c {
                '"' => {
                    state = State::Double;
                    out.push(c);
                }
                '\'' => {
                    state = State::Single;
                    out.push('"');
                }
                _ => out.push(c),
            },
            State::Double => {
                out.push(c);
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == '"' {
                    state = State::Outside;
                }
            }
            State::Single => {
                if escaped {
                    escaped = false;
                    out.push(c);
                } else if c == '\\' {
                    escaped = true;
                    out.push(c);
                } else if c == '"' {
                    out.push_str("\\\"");
                } else if c == '\'' {
                    state = State::Outside;
                    out.push('"');
                } else {
                    out.push(c);
                }
            }
        }
    }

    out
}

/// Drop commas directly before a closing `}` or `]`.
pub fn remove_trailing_commas(text: &str) -> String {
    let objects = TRAILING_COMMA_OBJECT.replace_all(text, "}");
    TRAILING_COMMA_ARRAY.replace_all(&objects, "]").into_owned()
}

/// Close an unterminated string and every unclosed `{` or `[`.
///
/// Closers are appended innermost first. A closer that skips over open
/// delimiters (`[1, 2}`) gets the skipped closers inserted before it; a
/// closer with no matching opener is kept as is.
pub fn close_unbalanced(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut open: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            out.push(c);
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => open.push('}'),
            '[' => open.push(']'),
            '}' | ']' if open.contains(&c) => {
                while let Some(closer) = open.pop() {
                    if closer == c {
                        break;
                    }
                    out.push(closer);
                }
            }
            _ => {}
        }
        out.push(c);
    }

    if in_string {
        if escaped {
            out.pop();
        }
        out.push('"');
    }

    while let Some(closer) = open.pop() {
        out.push(closer);
    }

    out
}

/// Quote bare object keys: `{total: 1}` becomes `{"total": 1}`.
///
/// Can misfire on `, word:` sequences inside string values.
pub fn quote_bare_keys(text: &str) -> String {
    BARE_KEY.replace_all(text, r#"${1}"${2}":"#).into_owned()
}

/// Give keys left without a value an empty string: `{"a":}` becomes `{"a": ""}`.
pub fn fill_empty_values(text: &str) -> String {
    EMPTY_VALUE.replace_all(text, r#"${1} ""}"#).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{}\n```"), "\n{}\n");
        assert_eq!(strip_code_fences("```JSON{}```"), "{}");
    }

    #[test]
    fn test_extract_braced() {
        assert_eq!(extract_braced("Sure! {\"a\": {\"b\": 1}} Done."), "{\"a\": {\"b\": 1}}");
        assert_eq!(extract_braced("lead {\"a\": [1"), "{\"a\": [1");
        assert_eq!(extract_braced("no json here"), "no json here");
    }

    #[test]
    fn test_normalize_quotes() {
        assert_eq!(normalize_quotes("{'a': 'b'}"), "{\"a\": \"b\"}");
        assert_eq!(normalize_quotes("{\"shop\": \"Joe's\"}"), "{\"shop\": \"Joe's\"}");
        assert_eq!(normalize_quotes("{'q': 'say \"hi\"'}"), "{\"q\": \"say \\\"hi\\\"\"}");
    }

    #[test]
    fn test_remove_trailing_commas() {
        assert_eq!(remove_trailing_commas("{\"a\": [1, 2, ], }"), "{\"a\": [1, 2]}");
    }

    #[test]
    fn test_close_unbalanced() {
        assert_eq!(close_unbalanced("{\"a\": 1, \"b\": [1,2"), "{\"a\": 1, \"b\": [1,2]}");
        assert_eq!(close_unbalanced("{\"a\": \"unterminated"), "{\"a\": \"unterminated\"}");
        assert_eq!(close_unbalanced("{\"a\": [1, 2}"), "{\"a\": [1, 2]}");
        assert_eq!(close_unbalanced("{\"a\": \"}[\"}"), "{\"a\": \"}[\"}");
        assert_eq!(close_unbalanced("{\"a\": \"x\\"), "{\"a\": \"x\"}");
    }

    #[test]
    fn test_quote_bare_keys() {
        assert_eq!(
            quote_bare_keys("{invoice_number: \"A\", total : 5}"),
            "{\"invoice_number\": \"A\", \"total\": 5}"
        );
        assert_eq!(quote_bare_keys("{\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn test_fill_empty_values() {
        assert_eq!(fill_empty_values("{\"a\": 1, \"b\":}"), "{\"a\": 1, \"b\": \"\"}");
        assert_eq!(fill_empty_values("{\"a\": {\"b\":  }}"), "{\"a\": {\"b\": \"\"}}");
    }
}
