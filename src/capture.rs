use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use headless_chrome::protocol::cdp::Network::GetResponseBodyReturnObject;
use headless_chrome::protocol::cdp::Network::events::ResponseReceivedEventParams;
use headless_chrome::protocol::cdp::types::Event;
use headless_chrome::{Browser, LaunchOptions};

use crate::error::{DownloadError, Result};
use crate::formats::{CapturedExchange, ContentEncoding, PageCapture};

/// Loads a page and reports everything the page requested while loading.
#[async_trait]
pub trait TrafficCapture: Send + Sync {
    async fn capture(&self, url: &str) -> Result<PageCapture>;
}

#[derive(Debug, Clone)]
pub struct CaptureOptions {
    pub headless: bool,
    pub page_timeout: Duration,
    /// Extra wait after navigation so late XHRs (book data, playlist) land.
    pub settle: Duration,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            headless: true,
            page_timeout: Duration::from_secs(60),
            settle: Duration::from_millis(3000),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChromeCapture {
    options: CaptureOptions,
}

impl ChromeCapture {
    pub fn new(options: CaptureOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl TrafficCapture for ChromeCapture {
    async fn capture(&self, url: &str) -> Result<PageCapture> {
        let options = self.options.clone();
        let url = url.to_owned();
        tokio::task::spawn_blocking(move || capture_blocking(&options, &url))
            .await
            .map_err(|err| DownloadError::Capture(format!("browser task failed: {err}")))?
    }
}

#[derive(Debug, Default)]
struct Recorder {
    exchanges: Vec<CapturedExchange>,
    by_request_id: HashMap<String, usize>,
}

impl Recorder {
    fn on_request(&mut self, request_id: &str, method: &str, url: &str) {
        self.exchanges.push(CapturedExchange::new(method, url));
        self.by_request_id
            .insert(request_id.to_owned(), self.exchanges.len() - 1);
    }

    fn on_response(&mut self, request_id: &str, url: &str, status: Option<u16>, body: Vec<u8>) {
        let index = match self.by_request_id.get(request_id) {
            Some(index) => *index,
            None => {
                self.exchanges.push(CapturedExchange::new("", url));
                self.exchanges.len() - 1
            }
        };
        let exchange = &mut self.exchanges[index];
        exchange.status = status;
        // DevTools hands out bodies after content decoding.
        exchange.body = body;
        exchange.encoding = ContentEncoding::Identity;
    }
}

fn capture_blocking(options: &CaptureOptions, url: &str) -> Result<PageCapture> {
    tracing::info!(url, headless = options.headless, "getting book requests");

    let launch_options = LaunchOptions::default_builder()
        .headless(options.headless)
        .idle_browser_timeout(options.page_timeout + options.settle)
        .build()
        .map_err(|err| DownloadError::Capture(format!("build launch options: {err}")))?;
    let browser = Browser::new(launch_options).map_err(capture_error("launch browser"))?;
    let tab = browser.new_tab().map_err(capture_error("open tab"))?;
    tab.set_default_timeout(options.page_timeout);

    let recorder = Arc::new(Mutex::new(Recorder::default()));

    let response_recorder = Arc::clone(&recorder);
    tab.register_response_handling(
        "akniga-dl",
        Box::new(
            move |params: ResponseReceivedEventParams,
                  fetch_body: &dyn Fn() -> anyhow::Result<GetResponseBodyReturnObject>| {
                let body = if should_fetch_body(&params.response.mime_type) {
                    match fetch_body() {
                        Ok(body) => match decode_devtools_body(body.body, body.base_64_encoded) {
                            Ok(body) => body,
                            Err(err) => {
                                tracing::warn!(url = %params.response.url, %err, "response body is not valid base64");
                                Vec::new()
                            }
                        },
                        Err(err) => {
                            tracing::debug!(url = %params.response.url, ?err, "response body unavailable");
                            Vec::new()
                        }
                    }
                } else {
                    Vec::new()
                };
                let status = u16::try_from(params.response.status).ok();
                if let Ok(mut recorder) = response_recorder.lock() {
                    recorder.on_response(&params.request_id, &params.response.url, status, body);
                }
            },
        ),
    )
    .map_err(capture_error("register response handler"))?;

    let request_recorder = Arc::clone(&recorder);
    tab.add_event_listener(Arc::new(move |event: &Event| {
        if let Event::NetworkRequestWillBeSent(sent) = event
            && let Ok(mut recorder) = request_recorder.lock()
        {
            recorder.on_request(
                &sent.params.request_id,
                &sent.params.request.method,
                &sent.params.request.url,
            );
        }
    }))
    .map_err(capture_error("register request listener"))?;

    tab.navigate_to(url)
        .map_err(capture_error("navigate"))?
        .wait_until_navigated()
        .map_err(capture_error("wait for page load"))?;
    std::thread::sleep(options.settle);

    let html = tab.get_content().map_err(capture_error("read page content"))?;
    let exchanges = recorder
        .lock()
        .map(|recorder| recorder.exchanges.clone())
        .map_err(|_| DownloadError::Capture("request recorder poisoned".to_owned()))?;

    tracing::info!(exchanges = exchanges.len(), "page traffic captured");
    Ok(PageCapture { html, exchanges })
}

fn capture_error(action: &'static str) -> impl Fn(anyhow::Error) -> DownloadError {
    move |err| DownloadError::Capture(format!("{action}: {err:#}"))
}

fn should_fetch_body(mime_type: &str) -> bool {
    let mime_type = mime_type.to_ascii_lowercase();
    mime_type.starts_with("text/")
        || mime_type.contains("json")
        || mime_type.contains("mpegurl")
}

fn decode_devtools_body(
    body: String,
    base_64_encoded: bool,
) -> std::result::Result<Vec<u8>, base64::DecodeError> {
    if !base_64_encoded {
        return Ok(body.into_bytes());
    }
    base64::engine::general_purpose::STANDARD.decode(body.as_bytes())
}
