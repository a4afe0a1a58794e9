//! Headless address bar: the current location and the history stack.

use reqwest::Url;
use serde::Serialize;

use crate::page::Query;

const QUERY_BASE: &str = "http://pagekit.local/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    pub pathname: String,
    /// Including the leading `?`, or empty.
    pub search: String,
    /// Including the leading `#`, or empty.
    pub hash: String,
}

impl Default for Location {
    fn default() -> Self {
        Self {
            pathname: "/".to_string(),
            search: String::new(),
            hash: String::new(),
        }
    }
}

impl Location {
    /// Split a relative URL (`/path?query#hash`) into its parts.
    pub fn parse(url: &str) -> Self {
        let (rest, hash) = match url.find('#') {
            Some(pos) => (&url[..pos], &url[pos..]),
            None => (url, ""),
        };
        let (pathname, search) = match rest.find('?') {
            Some(pos) => (&rest[..pos], &rest[pos..]),
            None => (rest, ""),
        };
        Self {
            pathname: if pathname.is_empty() {
                "/".to_string()
            } else {
                pathname.to_string()
            },
            search: if search == "?" { String::new() } else { search.to_string() },
            hash: if hash == "#" { String::new() } else { hash.to_string() },
        }
    }

    pub fn href(&self) -> String {
        format!("{}{}{}", self.pathname, self.search, self.hash)
    }
}

/// Decode `a=1&b=two` (leading `?` optional).
pub fn decode_query(raw: &str) -> Query {
    let raw = raw.trim_start_matches('?');
    if raw.is_empty() {
        return Query::new();
    }
    match Url::parse(&format!("{}?{}", QUERY_BASE, raw)) {
        Ok(url) => url.query_pairs().into_owned().collect(),
        Err(err) => {
            tracing::warn!(query = %raw, error = %err, "Unparseable query string");
            Query::new()
        }
    }
}

/// Encode pairs in order, without the leading `?`.
pub fn encode_query<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    let Ok(mut url) = Url::parse(QUERY_BASE) else {
        return String::new();
    };
    url.query_pairs_mut().extend_pairs(pairs);
    url.query().unwrap_or_default().to_string()
}

/// Split `"/path?query"` into its path (normalised to a leading `/`) and
/// decoded query.
pub fn split_target(target: &str) -> (String, Query) {
    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path, decode_query(query)),
        None => (target, Query::new()),
    };
    (normalize_path(path), query)
}

pub fn normalize_path(path: &str) -> String {
    let path = path.trim();
    if path.is_empty() {
        "/".to_string()
    } else if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

/// Linear history with a cursor; pushing drops forward entries.
#[derive(Debug, Clone)]
pub struct History {
    entries: Vec<Location>,
    index: usize,
}

impl History {
    pub fn new(initial: Location) -> Self {
        Self {
            entries: vec![initial],
            index: 0,
        }
    }

    pub fn current(&self) -> &Location {
        &self.entries[self.index]
    }

    pub fn push(&mut self, location: Location) {
        self.entries.truncate(self.index + 1);
        self.entries.push(location);
        self.index = self.entries.len() - 1;
    }

    pub fn replace(&mut self, location: Location) {
        self.entries[self.index] = location;
    }

    /// The entry before the cursor, without moving it.
    pub fn previous(&self) -> Option<&Location> {
        self.index.checked_sub(1).map(|i| &self.entries[i])
    }

    /// Step back one entry. `None` at the start of history.
    pub fn back(&mut self) -> Option<&Location> {
        if self.index == 0 {
            return None;
        }
        self.index -= 1;
        Some(&self.entries[self.index])
    }

    pub fn forward(&mut self) -> Option<&Location> {
        if self.index + 1 >= self.entries.len() {
            return None;
        }
        self.index += 1;
        Some(&self.entries[self.index])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
