//! `WWW-Authenticate` challenge parsing.

use reqwest::header::{HeaderMap, WWW_AUTHENTICATE};

/// Authentication scheme named by a challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthScheme {
    Basic,
    Digest,
    Bearer,
    Other(String),
}

impl AuthScheme {
    fn parse(token: &str) -> Self {
        if token.eq_ignore_ascii_case("basic") {
            AuthScheme::Basic
        } else if token.eq_ignore_ascii_case("digest") {
            AuthScheme::Digest
        } else if token.eq_ignore_ascii_case("bearer") {
            AuthScheme::Bearer
        } else {
            AuthScheme::Other(token.to_string())
        }
    }
}

/// One challenge issued by an upstream server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallenge {
    pub scheme: AuthScheme,
    pub realm: Option<String>,
}

impl AuthChallenge {
    /// Parse the first challenge of a header value, e.g. `Basic realm="api", charset="UTF-8"`.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        let (scheme, params) = match value.find(char::is_whitespace) {
            Some(i) => (&value[..i], &value[i..]),
            None => (value, ""),
        };
        if scheme.is_empty() {
            return None;
        }

        Some(Self {
            scheme: AuthScheme::parse(scheme),
            realm: param(params, "realm"),
        })
    }

    /// All challenges in a response, in header order.
    pub fn all(headers: &HeaderMap) -> Vec<Self> {
        headers
            .get_all(WWW_AUTHENTICATE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(Self::parse)
            .collect()
    }

    /// The challenge to answer: the first Basic one, else the first one.
    pub fn preferred(headers: &HeaderMap) -> Option<Self> {
        let all = Self::all(headers);
        let basic = all.iter().position(|c| c.scheme == AuthScheme::Basic);
        all.into_iter().nth(basic.unwrap_or(0))
    }
}

/// Extract `name=value` or `name="quoted value"` from a parameter list.
fn param(params: &str, name: &str) -> Option<String> {
    let mut rest = params;
    while !rest.is_empty() {
        rest = rest.trim_start_matches(|c: char| c == ',' || c.is_whitespace());
        let eq = rest.find('=')?;
        let key = rest[..eq].trim();
        rest = &rest[eq + 1..];

        let (value, remaining) = if let Some(quoted) = rest.strip_prefix('"') {
            let mut value = String::new();
            let mut escaped = false;
            let mut end = quoted.len();
            for (i, c) in quoted.char_indices() {
                if escaped {
                    value.push(c);
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == '"' {
                    end = i + 1;
                    break;
                } else {
                    value.push(c);
                }
            }
            (value, &quoted[end.min(quoted.len())..])
        } else {
            let end = rest.find(',').unwrap_or(rest.len());
            (rest[..end].trim().to_string(), &rest[end..])
        };

        if key.eq_ignore_ascii_case(name) {
            return Some(value);
        }
        rest = remaining;
    }
    None
}
