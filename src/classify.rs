use std::io::Read as _;

use crate::error::{DownloadError, Result};
use crate::formats::{BookManifest, CapturedExchange, ContentEncoding, ManifestItem, RawBookData};

pub const MANIFEST_METHOD: &str = "POST";
pub const MANIFEST_PATH_PREFIX: &str = "/ajax/b/";
pub const PLAYLIST_MARKER: &str = "m3u8";

#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub manifest_method: String,
    pub manifest_path_prefix: String,
    pub playlist_marker: String,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            manifest_method: MANIFEST_METHOD.to_owned(),
            manifest_path_prefix: MANIFEST_PATH_PREFIX.to_owned(),
            playlist_marker: PLAYLIST_MARKER.to_owned(),
        }
    }
}

impl ClassifierConfig {
    pub fn is_manifest(&self, exchange: &CapturedExchange) -> bool {
        exchange.method.eq_ignore_ascii_case(&self.manifest_method)
            && exchange.path.starts_with(&self.manifest_path_prefix)
    }

    pub fn is_stream(&self, exchange: &CapturedExchange) -> bool {
        exchange.url.contains(&self.playlist_marker)
    }

    /// The single book-data exchange. Several candidates are as fatal as none.
    pub fn select_manifest<'a>(
        &self,
        exchanges: &'a [CapturedExchange],
    ) -> Result<&'a CapturedExchange> {
        let matches = exchanges
            .iter()
            .filter(|exchange| self.is_manifest(exchange))
            .collect::<Vec<_>>();
        match matches.as_slice() {
            [single] => Ok(single),
            _ => Err(DownloadError::ManifestNotFound {
                matches: matches.len(),
            }),
        }
    }

    pub fn select_stream<'a>(
        &self,
        exchanges: &'a [CapturedExchange],
    ) -> Result<&'a CapturedExchange> {
        let matches = exchanges
            .iter()
            .filter(|exchange| self.is_stream(exchange))
            .collect::<Vec<_>>();
        match matches.as_slice() {
            [single] => Ok(single),
            _ => Err(DownloadError::StreamNotFound {
                matches: matches.len(),
            }),
        }
    }

    pub fn classify(&self, exchanges: &[CapturedExchange]) -> Result<BookManifest> {
        tracing::info!(exchanges = exchanges.len(), "analysing book requests");

        let manifest = self.select_manifest(exchanges)?;
        tracing::info!(url = %manifest.url, encoding = %manifest.encoding, "book data found");

        let stream = self.select_stream(exchanges)?;
        tracing::info!(url = %stream.url, "stream playlist found");

        let body = decode_body(manifest)?;
        parse_manifest(&body, &stream.url)
    }
}

pub fn classify(exchanges: &[CapturedExchange]) -> Result<BookManifest> {
    ClassifierConfig::default().classify(exchanges)
}

pub fn decode_body(exchange: &CapturedExchange) -> Result<Vec<u8>> {
    let body = exchange.body.as_slice();
    let mut out = Vec::new();
    let decoded = match &exchange.encoding {
        ContentEncoding::Identity => return Ok(body.to_vec()),
        ContentEncoding::Brotli => {
            brotli::Decompressor::new(body, 4096).read_to_end(&mut out)
        }
        ContentEncoding::Gzip => flate2::read::GzDecoder::new(body).read_to_end(&mut out),
        ContentEncoding::Deflate => {
            match flate2::read::ZlibDecoder::new(body).read_to_end(&mut out) {
                Ok(n) => Ok(n),
                Err(_) => {
                    // Some servers send raw deflate without the zlib wrapper.
                    out.clear();
                    flate2::read::DeflateDecoder::new(body).read_to_end(&mut out)
                }
            }
        }
        ContentEncoding::Other(other) => {
            return Err(DownloadError::ManifestParse(format!(
                "unsupported content encoding: {other}"
            )));
        }
    };

    decoded.map_err(|err| {
        DownloadError::ManifestParse(format!(
            "decompress {} body of {}: {err}",
            exchange.encoding, exchange.url
        ))
    })?;
    Ok(out)
}

pub fn parse_manifest(body: &[u8], stream_url: &str) -> Result<BookManifest> {
    let raw: RawBookData = serde_json::from_slice(body)
        .map_err(|err| DownloadError::ManifestParse(format!("book data json: {err}")))?;

    let items: Vec<ManifestItem> = match raw.items {
        serde_json::Value::String(encoded) => serde_json::from_str(&encoded),
        value @ serde_json::Value::Array(_) => serde_json::from_value(value),
        serde_json::Value::Null => Ok(Vec::new()),
        other => {
            return Err(DownloadError::ManifestParse(format!(
                "items must be a list or an encoded list, got {other}"
            )));
        }
    }
    .map_err(|err| DownloadError::ManifestParse(format!("chapter items: {err}")))?;

    let author = raw
        .author
        .filter(|author| !author.trim().is_empty())
        .or(raw.text_author)
        .unwrap_or_default();

    Ok(BookManifest {
        title: raw.title,
        author,
        items,
        stream_url: stream_url.to_owned(),
    })
}
