//! Request and response snapshots.
//!
//! These are the values that cross the worker boundary: the host hands the
//! worker a [`Request`], the worker answers with a [`Response`]. Responses are
//! fully buffered so they can be cloned into a cache partition and returned
//! to the caller at the same time.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

/// Ordered, case-insensitive header list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// First value for `name`, compared case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Replace every value for `name` with a single value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.0.retain(|(k, _)| !k.eq_ignore_ascii_case(&name));
        self.0.push((name, value.into()));
    }

    /// Add a value without touching existing ones.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Request mode as reported by the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    /// Top-level document load.
    Navigate,
    SameOrigin,
    NoCors,
    #[default]
    Cors,
}

impl std::str::FromStr for RequestMode {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "navigate" => Ok(Self::Navigate),
            "same-origin" => Ok(Self::SameOrigin),
            "no-cors" => Ok(Self::NoCors),
            "cors" => Ok(Self::Cors),
            other => Err(crate::Error::InvalidInput(format!("unknown request mode: {other}"))),
        }
    }
}

/// What the requester intends to do with the response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    Document,
    Image,
    Font,
    Script,
    Style,
    Manifest,
    #[default]
    Empty,
}

impl std::str::FromStr for Destination {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "document" => Ok(Self::Document),
            "image" => Ok(Self::Image),
            "font" => Ok(Self::Font),
            "script" => Ok(Self::Script),
            "style" => Ok(Self::Style),
            "manifest" => Ok(Self::Manifest),
            "" | "empty" => Ok(Self::Empty),
            other => Err(crate::Error::InvalidInput(format!("unknown destination: {other}"))),
        }
    }
}

/// An intercepted request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Upper-case HTTP method.
    pub method: String,
    pub url: Url,
    pub mode: RequestMode,
    pub destination: Destination,
    pub headers: Headers,
}

impl Request {
    /// Build a request with an arbitrary method.
    pub fn new(method: &str, url: Url) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            url,
            mode: RequestMode::default(),
            destination: Destination::default(),
            headers: Headers::new(),
        }
    }

    /// Build a plain GET request.
    pub fn get(url: Url) -> Self {
        Self::new("GET", url)
    }

    /// Build a top-level document navigation.
    pub fn navigate(url: Url) -> Self {
        Self::get(url)
            .with_mode(RequestMode::Navigate)
            .with_destination(Destination::Document)
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    /// True when the `Accept` header asks for HTML.
    pub fn accepts_html(&self) -> bool {
        self.headers.get("accept").is_some_and(|accept| accept.contains("text/html"))
    }
}

/// Response tainting as classified by the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Same-origin response.
    #[default]
    Basic,
    /// Cross-origin response that passed CORS.
    Cors,
    /// Cross-origin `no-cors` response; status and body are hidden.
    Opaque,
    /// Network error placeholder.
    Error,
}

impl ResponseType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Cors => "cors",
            Self::Opaque => "opaque",
            Self::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "basic" => Some(Self::Basic),
            "cors" => Some(Self::Cors),
            "opaque" => Some(Self::Opaque),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// A fully buffered response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    pub status_text: String,
    pub headers: Headers,
    pub body: Bytes,
    pub response_type: ResponseType,
    /// URL the response was served from, if known.
    pub url: Option<Url>,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            status_text: String::new(),
            headers: Headers::new(),
            body: body.into(),
            response_type: ResponseType::Basic,
            url: None,
        }
    }

    pub fn with_status_text(mut self, text: &str) -> Self {
        self.status_text = text.to_string();
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    pub fn with_url(mut self, url: Url) -> Self {
        self.url = Some(url);
        self
    }

    /// Status in the 2xx range.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type")
    }
}
