//! Transport-neutral view of an inbound request, as seen by the matcher.

use std::collections::HashMap;

/// An inbound request reduced to what stub matching needs.
///
/// Header names are stored lowercased. Query parameters are split and
/// URL-decoded once at construction; repeated keys keep every value.
#[derive(Debug, Clone, Default)]
pub struct MatchRequest {
    method: String,
    path: String,
    query: HashMap<String, Vec<String>>,
    headers: HashMap<String, Vec<String>>,
    body: String,
}

impl MatchRequest {
    /// Build a request from a method and a path that may carry a query string.
    pub fn new(method: impl AsRef<str>, url: &str) -> Self {
        let (path, query) = match url.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (url, None),
        };
        Self {
            method: method.as_ref().trim().to_ascii_uppercase(),
            path: path.to_string(),
            query: parse_query(query),
            headers: HashMap::new(),
            body: String::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.add_header(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn add_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.into());
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Path without query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// All values of a header, looked up case-insensitively.
    pub fn header_values(&self, name: &str) -> Option<&[String]> {
        if let Some(values) = self.headers.get(name) {
            return Some(values.as_slice());
        }
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(Vec::as_slice)
    }

    /// All decoded values of a query parameter.
    pub fn query_values(&self, name: &str) -> Option<&[String]> {
        self.query.get(name).map(Vec::as_slice)
    }
}

fn parse_query(query: Option<&str>) -> HashMap<String, Vec<String>> {
    let mut params: HashMap<String, Vec<String>> = HashMap::new();
    let Some(query) = query else {
        return params;
    };
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        params
            .entry(decode(key))
            .or_default()
            .push(decode(value));
    }
    params
}

fn decode(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .unwrap_or(spaced)
}
