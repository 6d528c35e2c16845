//! Backslash escapes in search values.
//!
//! FHIR lets clients escape the separator characters inside a value:
//! `\,` (OR separator), `\|` (token and quantity separator), `\$` (composite
//! separator) and `\\` (a literal backslash).

/// Splits `input` on every `sep` that is not preceded by a backslash escape.
///
/// The pieces keep their escapes; call [`unescape`] on each one.
pub fn split_unescaped(input: &str, sep: char) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    for (i, c) in input.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == sep {
            out.push(&input[start..i]);
            start = i + c.len_utf8();
        }
    }
    out.push(&input[start..]);
    out
}

/// Removes backslash escapes.
///
/// Returns an error message for a dangling backslash or an escape of a
/// character that is not a separator.
pub fn unescape(input: &str) -> Result<String, String> {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(next @ ('\\' | ',' | '$' | '|')) => out.push(next),
            Some(other) => return Err(format!("invalid escape sequence '\\{}'", other)),
            None => return Err("value ends with an unescaped '\\'".to_string()),
        }
    }
    Ok(out)
}

/// Escapes backslashes, commas, and any of `extra` separators.
pub fn escape(input: &str, extra: &[char]) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if c == '\\' || c == ',' || extra.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
