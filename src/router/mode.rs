//! Addressing schemes: how a page path is carried in the location.

use crate::config::{RouterConfig, RouterModeKind};
use crate::page::Query;
use crate::router::location::{decode_query, encode_query, normalize_path, split_target, Location};

pub trait AddressMode: Send + Sync {
    fn kind(&self) -> RouterModeKind;

    /// The page path the location addresses.
    fn current_path(&self, location: &Location) -> String;

    /// Relative URL addressing `target` (`"/path?query"`).
    fn build_url(&self, target: &str) -> String;

    /// Every query pair carried by the location, reserved key included.
    fn parse_query(&self, location: &Location) -> Query;

    /// Query key the mode itself uses, stripped before params reach a page.
    fn reserved_key(&self) -> Option<&str> {
        None
    }
}

pub fn mode_for(config: &RouterConfig) -> Box<dyn AddressMode> {
    match config.mode {
        RouterModeKind::Param => Box::new(ParamMode::new(config.query_key.clone())),
        RouterModeKind::Hash => Box::new(HashMode),
        RouterModeKind::History => Box::new(HistoryMode),
    }
}

/// Path carried in one query key (`/?page=/about`); the root is the key's
/// absence.
#[derive(Debug, Clone)]
pub struct ParamMode {
    key: String,
}

impl ParamMode {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl Default for ParamMode {
    fn default() -> Self {
        Self::new("page")
    }
}

impl AddressMode for ParamMode {
    fn kind(&self) -> RouterModeKind {
        RouterModeKind::Param
    }

    fn current_path(&self, location: &Location) -> String {
        decode_query(&location.search)
            .get(&self.key)
            .map(|path| normalize_path(path))
            .unwrap_or_else(|| "/".to_string())
    }

    fn build_url(&self, target: &str) -> String {
        let (path, query) = split_target(target);
        let mut pairs: Vec<(&str, &str)> = Vec::with_capacity(query.len() + 1);
        if path != "/" {
            pairs.push((self.key.as_str(), path.as_str()));
        }
        pairs.extend(
            query
                .iter()
                .filter(|(k, _)| **k != self.key)
                .map(|(k, v)| (k.as_str(), v.as_str())),
        );
        if pairs.is_empty() {
            "/".to_string()
        } else {
            format!("/?{}", encode_query(pairs))
        }
    }

    fn parse_query(&self, location: &Location) -> Query {
        decode_query(&location.search)
    }

    fn reserved_key(&self) -> Option<&str> {
        Some(&self.key)
    }
}

/// Path carried in the fragment (`/#/about?tab=1`).
#[derive(Debug, Clone, Default)]
pub struct HashMode;

impl HashMode {
    fn fragment(location: &Location) -> &str {
        location.hash.trim_start_matches('#')
    }
}

impl AddressMode for HashMode {
    fn kind(&self) -> RouterModeKind {
        RouterModeKind::Hash
    }

    fn current_path(&self, location: &Location) -> String {
        let fragment = Self::fragment(location);
        let path = fragment.split_once('?').map_or(fragment, |(path, _)| path);
        normalize_path(path)
    }

    fn build_url(&self, target: &str) -> String {
        let (path, query) = split_target(target);
        if query.is_empty() {
            format!("/#{}", path)
        } else {
            let encoded = encode_query(query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
            format!("/#{}?{}", path, encoded)
        }
    }

    fn parse_query(&self, location: &Location) -> Query {
        Self::fragment(location)
            .split_once('?')
            .map(|(_, query)| decode_query(query))
            .unwrap_or_default()
    }
}

/// Path carried as the raw pathname.
#[derive(Debug, Clone, Default)]
pub struct HistoryMode;

impl AddressMode for HistoryMode {
    fn kind(&self) -> RouterModeKind {
        RouterModeKind::History
    }

    fn current_path(&self, location: &Location) -> String {
        normalize_path(&location.pathname)
    }

    fn build_url(&self, target: &str) -> String {
        let (path, query) = split_target(target);
        if query.is_empty() {
            path
        } else {
            let encoded = encode_query(query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
            format!("{}?{}", path, encoded)
        }
    }

    fn parse_query(&self, location: &Location) -> Query {
        decode_query(&location.search)
    }
}
