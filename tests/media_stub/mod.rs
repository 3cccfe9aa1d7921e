use std::io::Write as _;
use std::sync::Mutex;

use akniga_dl::capture::TrafficCapture;
use akniga_dl::error::{DownloadError, Result};
use akniga_dl::ffmpeg::{MediaJob, MediaTool, ToolOutput};
use akniga_dl::formats::{CapturedExchange, ContentEncoding, PageCapture};
use async_trait::async_trait;

pub const PLAYLIST_URL: &str = "https://s1.akniga.club/b/4242/master.m3u8";

/// Stands in for ffmpeg: records every job and writes a small placeholder
/// file to the job's destination.
#[derive(Default)]
pub struct RecordingTool {
    fail_fetch: bool,
    fail_trim_containing: Option<&'static str>,
    time_out_trim_containing: Option<&'static str>,
    jobs: Mutex<Vec<MediaJob>>,
}

#[allow(dead_code)]
impl RecordingTool {
    pub fn failing_fetch() -> Self {
        Self {
            fail_fetch: true,
            ..Self::default()
        }
    }

    /// Trims whose destination contains `needle` exit non-zero.
    pub fn failing_trim(needle: &'static str) -> Self {
        Self {
            fail_trim_containing: Some(needle),
            ..Self::default()
        }
    }

    /// Trims whose destination contains `needle` error out like a tool timeout.
    pub fn timing_out_trim(needle: &'static str) -> Self {
        Self {
            time_out_trim_containing: Some(needle),
            ..Self::default()
        }
    }

    pub fn jobs(&self) -> Vec<MediaJob> {
        self.jobs.lock().expect("lock jobs").clone()
    }

    pub fn fetches(&self) -> Vec<MediaJob> {
        self.jobs()
            .into_iter()
            .filter(|job| matches!(job, MediaJob::Fetch { .. }))
            .collect()
    }

    pub fn trims(&self) -> Vec<MediaJob> {
        self.jobs()
            .into_iter()
            .filter(|job| matches!(job, MediaJob::Trim { .. }))
            .collect()
    }
}

#[async_trait]
impl MediaTool for RecordingTool {
    async fn run(&self, job: &MediaJob) -> Result<ToolOutput> {
        self.jobs.lock().expect("lock jobs").push(job.clone());

        if let MediaJob::Trim { dest, .. } = job
            && self
                .time_out_trim_containing
                .is_some_and(|needle| dest.to_string_lossy().contains(needle))
        {
            return Err(DownloadError::Tool {
                tool: "ffmpeg".to_owned(),
                message: "timed out after 30s".to_owned(),
            });
        }

        let fails = match job {
            MediaJob::Fetch { .. } => self.fail_fetch,
            MediaJob::Trim { dest, .. } => self
                .fail_trim_containing
                .is_some_and(|needle| dest.to_string_lossy().contains(needle)),
        };
        if fails {
            return Ok(ToolOutput {
                success: false,
                status: "exit status: 1".to_owned(),
                diagnostics: "stub failure".to_owned(),
            });
        }

        std::fs::write(job.dest(), b"ID3 stub audio").expect("write stub output");
        Ok(ToolOutput::ok())
    }
}

/// Replays a fixed page load.
pub struct StaticCapture {
    pub page: PageCapture,
    pub requested: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl StaticCapture {
    pub fn new(page: PageCapture) -> Self {
        Self {
            page,
            requested: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl TrafficCapture for StaticCapture {
    async fn capture(&self, url: &str) -> Result<PageCapture> {
        self.requested
            .lock()
            .expect("lock requested")
            .push(url.to_owned());
        Ok(self.page.clone())
    }
}

#[allow(dead_code)]
pub fn brotli_compress(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    {
        let mut writer = brotli::CompressorWriter::new(&mut out, 4096, 5, 22);
        writer.write_all(input).expect("brotli write");
    }
    out
}

/// Book-data JSON in the site's shape: chapter items encoded as a string.
#[allow(dead_code)]
pub fn book_json(title: &str, chapters: &[(&str, f64, f64)]) -> String {
    let items = chapters
        .iter()
        .map(|(title, start, end)| {
            serde_json::json!({
                "title": title,
                "time_from_start": start,
                "time_finish": end,
                "duration": end - start,
            })
        })
        .collect::<Vec<_>>();
    serde_json::json!({
        "title": title,
        "author": "Булгаков Михаил",
        "sTextAuthor": "Булгаков Михаил",
        "bookurl": "https://akniga.org/bulgakov-master-i-margarita",
        "items": serde_json::to_string(&items).expect("encode items"),
    })
    .to_string()
}

#[allow(dead_code)]
pub fn book_page_traffic(json: &str) -> Vec<CapturedExchange> {
    vec![
        CapturedExchange::new("GET", "https://akniga.org/bulgakov-master-i-margarita")
            .with_status(200),
        CapturedExchange::new("GET", "https://akniga.org/templates/skin/app.js").with_status(200),
        CapturedExchange::new("POST", "https://akniga.org/ajax/b/4242")
            .with_status(200)
            .with_body(brotli_compress(json.as_bytes()), ContentEncoding::Brotli),
        CapturedExchange::new("POST", "https://akniga.org/ajax/stats").with_status(200),
        CapturedExchange::new("GET", PLAYLIST_URL).with_status(200),
    ]
}
