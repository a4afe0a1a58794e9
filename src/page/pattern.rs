//! Path templates with `:name` segments.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// Named params bound by a match.
pub type Params = BTreeMap<String, String>;
/// Query-string pairs delivered to a page.
pub type Query = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("Invalid route pattern '{pattern}': {reason}")]
    Invalid { pattern: String, reason: String },

    #[error("Missing parameter '{param}' for pattern '{pattern}'")]
    MissingParam { pattern: String, param: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutePattern {
    raw: String,
    segments: Vec<Segment>,
}

fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

impl RoutePattern {
    pub fn parse(raw: &str) -> Result<Self, PatternError> {
        let mut segments = Vec::new();
        for segment in split_segments(raw) {
            match segment.strip_prefix(':') {
                Some("") => {
                    return Err(PatternError::Invalid {
                        pattern: raw.to_string(),
                        reason: "empty parameter name".to_string(),
                    })
                }
                Some(name) => {
                    if segments.contains(&Segment::Param(name.to_string())) {
                        return Err(PatternError::Invalid {
                            pattern: raw.to_string(),
                            reason: format!("parameter '{}' bound twice", name),
                        });
                    }
                    segments.push(Segment::Param(name.to_string()));
                }
                None => segments.push(Segment::Literal(segment.to_string())),
            }
        }
        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn param_names(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Param(name) => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// Bind `:name` segments positionally. Segment count and literals must
    /// match exactly; a mismatch is `None`, not an error.
    pub fn match_path(&self, path: &str) -> Option<Params> {
        let parts: Vec<&str> = split_segments(path).collect();
        if parts.len() != self.segments.len() {
            return None;
        }
        let mut params = Params::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(literal) if literal == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => {
                    params.insert(name.clone(), part.to_string());
                }
            }
        }
        Some(params)
    }

    /// Generate a path from `params`.
    pub fn build(&self, params: &Params) -> Result<String, PatternError> {
        let mut path = String::new();
        for segment in &self.segments {
            path.push('/');
            match segment {
                Segment::Literal(literal) => path.push_str(literal),
                Segment::Param(name) => match params.get(name) {
                    Some(value) => path.push_str(value),
                    None => {
                        return Err(PatternError::MissingParam {
                            pattern: self.raw.clone(),
                            param: name.clone(),
                        })
                    }
                },
            }
        }
        if path.is_empty() {
            path.push('/');
        }
        Ok(path)
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
