use std::{fmt, str::FromStr};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TopicError {
    #[error("topic pattern must contain exactly one '+' segment, got {0:?}")]
    Wildcards(String),
    #[error("topic pattern must not use '#': {0:?}")]
    MultiLevel(String),
}

/// A subscription filter whose single `+` segment carries the site id,
/// e.g. `greenhouses/+/heartbeat`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicPattern {
    raw: String,
    segments: Vec<String>,
    site_index: usize,
}

impl FromStr for TopicPattern {
    type Err = TopicError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let segments: Vec<String> = raw.split('/').map(str::to_owned).collect();
        if segments.iter().any(|s| s.contains('#')) {
            return Err(TopicError::MultiLevel(raw.to_owned()));
        }

        let mut wildcards = segments
            .iter()
            .enumerate()
            .filter(|(_, s)| s.contains('+'));
        let site_index = match (wildcards.next(), wildcards.next()) {
            (Some((i, s)), None) if s == "+" => i,
            _ => return Err(TopicError::Wildcards(raw.to_owned())),
        };

        Ok(Self {
            raw: raw.to_owned(),
            segments,
            site_index,
        })
    }
}

impl TopicPattern {
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The site id carried by `topic`, or `None` if it does not match.
    pub fn site_id<'a>(&self, topic: &'a str) -> Option<&'a str> {
        let parts: Vec<&str> = topic.split('/').collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let literals_match = self
            .segments
            .iter()
            .zip(&parts)
            .enumerate()
            .all(|(i, (pattern, part))| i == self.site_index || pattern == part);

        let site = parts[self.site_index];
        (literals_match && !site.is_empty()).then_some(site)
    }
}

impl fmt::Display for TopicPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
