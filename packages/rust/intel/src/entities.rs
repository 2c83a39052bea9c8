//! Entity detection: spot an IP literal, URL, or bare domain in chat text.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Dotted-quad syntax only; octet ranges are not checked.
static IP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:[0-9]{1,3}\.){3}[0-9]{1,3}\b").expect("valid regex")
});

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("valid regex"));

static DOMAIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:[a-zA-Z0-9-]+\.)+[a-zA-Z]{2,}\b").expect("valid regex")
});

/// Kind of thing a reputation backend can be asked about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Ip,
    Url,
    Domain,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ip => "ip",
            Self::Url => "url",
            Self::Domain => "domain",
        }
    }
}

/// A single entity to look up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub kind: EntityKind,
    pub value: String,
}

impl Entity {
    pub fn ip(value: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::Ip,
            value: value.into(),
        }
    }

    pub fn url(value: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::Url,
            value: value.into(),
        }
    }

    pub fn domain(value: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::Domain,
            value: value.into(),
        }
    }
}

/// At most one of each entity kind found in one message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DetectedEntities {
    pub ip: Option<String>,
    pub url: Option<String>,
    pub domain: Option<String>,
}

impl DetectedEntities {
    pub fn is_empty(&self) -> bool {
        self.ip.is_none() && self.url.is_none() && self.domain.is_none()
    }
}

/// Find the first IP, URL, and domain in `text`.
///
/// A domain whose text already appears inside the matched URL is dropped,
/// so `https://evil.example.com/x` yields a URL and no domain.
pub fn detect_entities(text: &str) -> DetectedEntities {
    let ip = IP_RE.find(text).map(|m| m.as_str().to_string());
    let url = URL_RE.find(text).map(|m| m.as_str().to_string());
    let mut domain = DOMAIN_RE.find(text).map(|m| m.as_str().to_string());

    if let (Some(u), Some(d)) = (&url, &domain) {
        if u.contains(d.as_str()) {
            domain = None;
        }
    }

    DetectedEntities { ip, url, domain }
}
