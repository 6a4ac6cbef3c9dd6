//! Resource URI templates such as `sonic://{network}/address/{address}/balance`.

use std::fmt;

use serde_json::{Map, Value};

use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A `scheme://a/{b}/c` template where each `{name}` spans one whole segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriTemplate {
    raw: String,
    scheme: String,
    segments: Vec<Segment>,
}

impl UriTemplate {
    /// Parses a template.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] when the scheme is missing, a segment is empty,
    /// a placeholder is malformed or a parameter name repeats.
    pub fn parse(template: &str) -> Result<Self, Error> {
        let invalid = |why: &str| Error::invalid_input(format!("URI template '{template}': {why}"));
        let (scheme, path) = template
            .split_once("://")
            .filter(|(scheme, _)| !scheme.is_empty())
            .ok_or_else(|| invalid("missing scheme"))?;

        let mut segments = Vec::new();
        for part in path.split('/') {
            if part.is_empty() {
                return Err(invalid("empty segment"));
            }
            let segment = match part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                Some(name) if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') => {
                    if segments.contains(&Segment::Param(name.to_owned())) {
                        return Err(invalid("repeated parameter"));
                    }
                    Segment::Param(name.to_owned())
                }
                Some(_) => return Err(invalid("malformed placeholder")),
                None if part.contains(['{', '}']) => return Err(invalid("placeholder must span a segment")),
                None => Segment::Literal(part.to_owned()),
            };
            segments.push(segment);
        }

        Ok(Self {
            raw: template.to_owned(),
            scheme: scheme.to_owned(),
            segments,
        })
    }

    /// Parameter names in template order.
    pub fn params(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Number of literal segments; more literals means a more specific match.
    pub fn specificity(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count()
    }

    /// Matches `uri`, returning the extracted parameters as a JSON object of
    /// strings.
    pub fn matches(&self, uri: &str) -> Option<Map<String, Value>> {
        let (scheme, path) = uri.split_once("://")?;
        if scheme != self.scheme {
            return None;
        }
        let parts: Vec<&str> = path.split('/').collect();
        if parts.len() != self.segments.len() {
            return None;
        }
        let mut params = Map::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(literal) if literal == part => {}
                Segment::Param(name) if !part.is_empty() => {
                    params.insert(name.clone(), Value::String(part.to_owned()));
                }
                _ => return None,
            }
        }
        Some(params)
    }
}

impl fmt::Display for UriTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
