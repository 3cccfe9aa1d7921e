use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentEncoding {
    Identity,
    Gzip,
    Deflate,
    Brotli,
    Other(String),
}

impl ContentEncoding {
    /// Parses a `Content-Encoding` header value. Missing or empty means identity.
    pub fn from_header(value: Option<&str>) -> Self {
        let Some(value) = value else {
            return Self::Identity;
        };
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "identity" => Self::Identity,
            "gzip" | "x-gzip" => Self::Gzip,
            "deflate" => Self::Deflate,
            "br" => Self::Brotli,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl fmt::Display for ContentEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identity => f.write_str("identity"),
            Self::Gzip => f.write_str("gzip"),
            Self::Deflate => f.write_str("deflate"),
            Self::Brotli => f.write_str("br"),
            Self::Other(other) => f.write_str(other),
        }
    }
}

/// One HTTP request/response pair observed during a page load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedExchange {
    pub method: String,
    pub url: String,
    pub path: String,
    pub status: Option<u16>,
    pub body: Vec<u8>,
    pub encoding: ContentEncoding,
}

impl CapturedExchange {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        let url = url.into();
        let path = Url::parse(&url)
            .map(|parsed| parsed.path().to_owned())
            .unwrap_or_default();
        Self {
            method: method.into(),
            url,
            path,
            status: None,
            body: Vec::new(),
            encoding: ContentEncoding::Identity,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>, encoding: ContentEncoding) -> Self {
        self.body = body.into();
        self.encoding = encoding;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct PageCapture {
    pub html: String,
    pub exchanges: Vec<CapturedExchange>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BookManifest {
    pub title: String,
    pub author: String,
    pub items: Vec<ManifestItem>,
    pub stream_url: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ManifestItem {
    pub title: String,
    #[serde(deserialize_with = "seconds")]
    pub time_from_start: f64,
    #[serde(deserialize_with = "seconds")]
    pub time_finish: f64,
}

/// Book-data payload as the site returns it. `items` is usually a JSON
/// document encoded inside a string.
#[derive(Debug, Clone, Deserialize)]
pub struct RawBookData {
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default, rename = "sTextAuthor")]
    pub text_author: Option<String>,
    pub items: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChapterSpec {
    pub title: String,
    pub start: f64,
    pub end: f64,
}

impl ChapterSpec {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

fn seconds<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(f64),
        String(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(value) => Ok(value),
        NumberOrString::String(value) => value
            .trim()
            .parse::<f64>()
            .map_err(|err| serde::de::Error::custom(format!("invalid seconds {value:?}: {err}"))),
    }
}
