//! URL assembly: default-domain resolution, `{name}` path substitution, and
//! query-string encoding.
//!
//! Percent-encoding keeps only the RFC 3986 unreserved set literal. Values
//! flagged `encoded` are trusted and copied verbatim.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::error::BuildError;

/// Everything except `ALPHA / DIGIT / "-" / "." / "_" / "~"`.
pub const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Prefix `url` with `domain` unless it is already absolute.
pub fn resolve_domain(url: &str, domain: &str) -> String {
    if url.starts_with("http") {
        url.to_string()
    } else if let Some(rest) = url.strip_prefix('/') {
        if domain.ends_with('/') {
            format!("{domain}{rest}")
        } else {
            format!("{domain}{url}")
        }
    } else if domain.ends_with('/') {
        format!("{domain}{url}")
    } else {
        format!("{domain}/{url}")
    }
}

pub fn is_absolute(url: &str) -> bool {
    url.starts_with("http")
}

pub(crate) fn encode(value: &str, encoded: bool) -> String {
    if encoded {
        value.to_string()
    } else {
        utf8_percent_encode(value, UNRESERVED).to_string()
    }
}

/// A `{name}` substitution registered through `add_path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathParam {
    pub name: String,
    pub value: String,
    pub encoded: bool,
}

/// One query pair. `value == None` renders as a bare key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParam {
    pub key: String,
    pub value: Option<String>,
    pub encoded: bool,
}

impl QueryParam {
    fn render(&self) -> String {
        let key = encode(&self.key, self.encoded);
        match &self.value {
            Some(value) => format!("{key}={}", encode(value, self.encoded)),
            None => key,
        }
    }
}

/// Replace every `{name}` in `template`. The last registration of a name
/// wins. Unmatched braces are copied through untouched.
pub fn substitute_paths(template: &str, params: &[PathParam]) -> Result<String, BuildError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let Some(len) = rest[open..].find('}') else {
            break;
        };
        let name = &rest[open + 1..open + len];
        out.push_str(&rest[..open]);
        let param = params
            .iter()
            .rev()
            .find(|p| p.name == name)
            .ok_or_else(|| BuildError::MissingPathParam {
                name: name.to_string(),
            })?;
        out.push_str(&encode(&param.value, param.encoded));
        rest = &rest[open + len + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Append the encoded query string, respecting an existing `?`. A
/// `#fragment` stays at the end.
pub fn append_query(url: &str, query: &[QueryParam]) -> String {
    if query.is_empty() {
        return url.to_string();
    }
    let (base, fragment) = match url.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (url, None),
    };
    let rendered: Vec<String> = query.iter().map(QueryParam::render).collect();
    let separator = if !base.contains('?') {
        "?"
    } else if base.ends_with('?') || base.ends_with('&') {
        ""
    } else {
        "&"
    };
    let mut out = format!("{base}{separator}{}", rendered.join("&"));
    if let Some(fragment) = fragment {
        out.push('#');
        out.push_str(fragment);
    }
    out
}

/// URL with its query pairs sorted, so reordering `add_query` calls does not
/// change cache identity.
pub(crate) fn canonicalize(url: &str) -> String {
    match url.split_once('?') {
        Some((base, query)) => {
            let mut pairs: Vec<&str> = query.split('&').filter(|p| !p.is_empty()).collect();
            pairs.sort_unstable();
            format!("{base}?{}", pairs.join("&"))
        }
        None => url.to_string(),
    }
}
