//! `{Token}` substitution
//!
//! Tokens are property names in braces. In output templates unknown tokens
//! are left in place so literal braces in markup survive; in function
//! arguments they read as empty strings. Component templates are JSON, so
//! their values are escaped as JSON string content.

use pagemod_model::PropertyMap;

/// How substituted values are written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escape {
    None,
    /// Escape for a JSON string literal, without the surrounding quotes
    Json,
}

/// Replace `{Name}` tokens with property values
#[must_use]
pub fn substitute(template: &str, properties: &PropertyMap, escape: Escape) -> String {
    replace_tokens(template, properties, escape, true)
}

/// Like [`substitute`], but unknown tokens become empty
#[must_use]
pub fn substitute_arg(template: &str, properties: &PropertyMap) -> String {
    replace_tokens(template, properties, Escape::None, false)
}

fn replace_tokens(template: &str, properties: &PropertyMap, escape: Escape, keep_unknown: bool) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let name_len = after
            .find(|c: char| !is_token_char(c))
            .unwrap_or(after.len());

        let is_token = name_len > 0 && after[name_len..].starts_with('}');
        let value = is_token.then(|| lookup(properties, &after[..name_len])).flatten();
        match value {
            Some(value) => {
                push_escaped(&mut out, value, escape);
                rest = &after[name_len + 1..];
            }
            None if is_token && !keep_unknown => rest = &after[name_len + 1..],
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Names referenced by a template
#[must_use]
pub fn tokens(template: &str) -> Vec<&str> {
    let mut found = Vec::new();
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        let name_len = after
            .find(|c: char| !is_token_char(c))
            .unwrap_or(after.len());
        if name_len > 0 && after[name_len..].starts_with('}') {
            found.push(&after[..name_len]);
        }
        rest = after;
    }
    found
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')
}

/// Property lookup, exact key first then ignoring case
fn lookup<'a>(properties: &'a PropertyMap, name: &str) -> Option<&'a str> {
    properties
        .get(name)
        .or_else(|| {
            properties
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        })
        .map(String::as_str)
}

fn push_escaped(out: &mut String, value: &str, escape: Escape) {
    match escape {
        Escape::None => out.push_str(value),
        Escape::Json => {
            let quoted = serde_json::Value::String(value.to_string()).to_string();
            out.push_str(&quoted[1..quoted.len() - 1]);
        }
    }
}
