use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use serde::Serialize;
use url::Url;

use crate::capture::{CaptureOptions, ChromeCapture, TrafficCapture};
use crate::classify::ClassifierConfig;
use crate::cli::{ChapterSourceKind, DownloadArgs};
use crate::error::DownloadError;
use crate::fetch::fetch_stream;
use crate::ffmpeg::{Ffmpeg, MediaTool};
use crate::formats::{ChapterSpec, PageCapture};
use crate::layout::OutputLayout;
use crate::plan::{ChapterSource, markup_audio_src, markup_title, write_track_list};
use crate::split::split_chapters;

#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub output_dir: PathBuf,
    /// Cut multi-chapter books into one file per chapter.
    pub split_chapters: bool,
    /// Remove the full-book folder once every chapter was cut.
    pub delete_intermediate: bool,
    pub extension: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            split_chapters: true,
            delete_intermediate: false,
            extension: "mp3".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum DownloadMode {
    NoChapters,
    SingleChapter,
    Combined,
    Split { delete_intermediate: bool },
}

impl DownloadMode {
    pub fn select(chapter_count: usize, config: &DownloadConfig) -> Self {
        match chapter_count {
            0 => Self::NoChapters,
            1 => Self::SingleChapter,
            _ if !config.split_chapters => Self::Combined,
            _ => Self::Split {
                delete_intermediate: config.delete_intermediate,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Book {
    pub title: String,
    pub author: String,
    pub stream_url: String,
    pub chapters: Vec<ChapterSpec>,
}

#[derive(Debug)]
pub struct DownloadReport {
    pub mode: DownloadMode,
    pub book_dir: PathBuf,
    pub files: Vec<PathBuf>,
    pub failures: Vec<DownloadError>,
    pub intermediate_kept: bool,
}

impl DownloadReport {
    fn empty(mode: DownloadMode, book_dir: PathBuf) -> Self {
        Self {
            mode,
            book_dir,
            files: Vec::new(),
            failures: Vec::new(),
            intermediate_kept: false,
        }
    }
}

pub struct Orchestrator {
    config: DownloadConfig,
    tool: Arc<dyn MediaTool>,
}

impl Orchestrator {
    pub fn new(config: DownloadConfig, tool: Arc<dyn MediaTool>) -> Self {
        Self { config, tool }
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    pub async fn run(&self, book: &Book) -> anyhow::Result<DownloadReport> {
        let layout = OutputLayout::new(&self.config.output_dir, &book.title, &self.config.extension);
        let mode = DownloadMode::select(book.chapters.len(), &self.config);
        let mut report = DownloadReport::empty(mode, layout.book_dir().to_path_buf());

        tracing::info!(title = %book.title, chapters = book.chapters.len(), ?mode, "download mode selected");

        let target = match mode {
            DownloadMode::NoChapters => {
                tracing::warn!("no chapters found; nothing to download");
                return Ok(report);
            }
            DownloadMode::SingleChapter => layout.single_chapter_file(&book.chapters[0].title),
            DownloadMode::Combined => layout.combined_file(),
            DownloadMode::Split { .. } => layout.intermediate_file(),
        };

        tokio::fs::create_dir_all(layout.book_dir())
            .await
            .with_context(|| format!("create book dir: {}", layout.book_dir().display()))?;

        fetch_stream(self.tool.as_ref(), &book.stream_url, &target)
            .await
            .context("fetch stream")?;

        let DownloadMode::Split {
            delete_intermediate,
        } = mode
        else {
            report.files.push(target);
            return Ok(report);
        };

        write_track_list(&layout.track_list_file(), &book.chapters).context("write track list")?;

        let chapters_dir = layout.chapters_dir();
        tokio::fs::create_dir_all(&chapters_dir)
            .await
            .with_context(|| format!("create chapters dir: {}", chapters_dir.display()))?;

        let split = split_chapters(self.tool.as_ref(), &target, &book.chapters, |name| {
            layout.chapter_file(name)
        })
        .await
        .context("split chapters")?;
        report.files = split.written;
        report.failures = split.failures;

        let intermediate_dir = layout.intermediate_dir();
        if delete_intermediate && report.failures.is_empty() {
            tracing::info!(dir = %intermediate_dir.display(), "deleting full book folder");
            tokio::fs::remove_dir_all(&intermediate_dir)
                .await
                .with_context(|| format!("delete full book dir: {}", intermediate_dir.display()))?;
        } else {
            if delete_intermediate {
                tracing::warn!(
                    dir = %intermediate_dir.display(),
                    "keeping full book folder because some chapters failed"
                );
            }
            report.intermediate_kept = true;
        }

        Ok(report)
    }
}

/// Turns one captured page load into a book: title, stream and chapter plan.
pub fn resolve_book(
    source: ChapterSourceKind,
    page: PageCapture,
    classifier: &ClassifierConfig,
) -> anyhow::Result<Book> {
    match source {
        ChapterSourceKind::Manifest => {
            let manifest = classifier
                .classify(&page.exchanges)
                .context("classify book requests")?;
            let chapters = ChapterSource::Manifest(manifest.clone())
                .plan()
                .context("plan chapters from book data")?;
            Ok(Book {
                title: manifest.title,
                author: manifest.author,
                stream_url: manifest.stream_url,
                chapters,
            })
        }
        ChapterSourceKind::Markup => {
            let title = markup_title(&page.html)
                .ok_or_else(|| DownloadError::MarkupParse("book title not found".to_owned()))?;
            let stream_url = match classifier.select_stream(&page.exchanges) {
                Ok(stream) => stream.url.clone(),
                Err(DownloadError::StreamNotFound { matches: 0 }) => markup_audio_src(&page.html)
                    .ok_or(DownloadError::StreamNotFound { matches: 0 })?,
                Err(err) => return Err(err).context("classify book requests"),
            };
            let chapters = ChapterSource::Markup { html: page.html }
                .plan()
                .context("plan chapters from page markup")?;
            Ok(Book {
                title,
                author: String::new(),
                stream_url,
                chapters,
            })
        }
    }
}

pub async fn download_book(
    capture: &dyn TrafficCapture,
    orchestrator: &Orchestrator,
    url: &str,
    source: ChapterSourceKind,
    classifier: &ClassifierConfig,
) -> anyhow::Result<DownloadReport> {
    let page = capture.capture(url).await.context("capture book page")?;
    let book = resolve_book(source, page, classifier)?;
    orchestrator.run(&book).await
}

#[derive(Debug, Serialize)]
struct DryRunPlan<'a> {
    #[serde(flatten)]
    mode: DownloadMode,
    book_dir: PathBuf,
    #[serde(flatten)]
    book: &'a Book,
}

pub async fn run(args: DownloadArgs) -> anyhow::Result<()> {
    let url = Url::parse(&args.url)
        .map_err(|err| DownloadError::Argument(format!("book url {:?}: {err}", args.url)))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(DownloadError::Argument(format!("book url must be http/https: {url}")).into());
    }
    if args.format.is_empty() || args.format.contains(['.', '/', '\\']) {
        return Err(DownloadError::Argument(format!(
            "format must be a bare extension such as mp3, got {:?}",
            args.format
        ))
        .into());
    }

    let config = DownloadConfig {
        output_dir: PathBuf::from(&args.out),
        split_chapters: !args.full,
        delete_intermediate: args.delete,
        extension: args.format.clone(),
    };
    let tool = Ffmpeg::new(
        args.ffmpeg.clone(),
        args.tool_timeout_secs.map(Duration::from_secs),
    );
    let capture = ChromeCapture::new(CaptureOptions {
        headless: !args.show_browser,
        page_timeout: Duration::from_secs(args.page_timeout_secs),
        settle: Duration::from_millis(args.settle_ms),
    });
    let classifier = ClassifierConfig::default();
    let orchestrator = Orchestrator::new(config, Arc::new(tool));

    if args.dry_run {
        let page = capture
            .capture(url.as_str())
            .await
            .context("capture book page")?;
        let book = resolve_book(args.source, page, &classifier)?;
        let config = orchestrator.config();
        let plan = DryRunPlan {
            mode: DownloadMode::select(book.chapters.len(), config),
            book_dir: OutputLayout::new(&config.output_dir, &book.title, &config.extension)
                .book_dir()
                .to_path_buf(),
            book: &book,
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&plan).context("serialize plan")?
        );
        return Ok(());
    }

    let report = download_book(&capture, &orchestrator, url.as_str(), args.source, &classifier)
        .await?;

    if report.failures.is_empty() {
        tracing::info!(
            book_dir = %report.book_dir.display(),
            files = report.files.len(),
            "done"
        );
        return Ok(());
    }

    for failure in &report.failures {
        tracing::error!(%failure, "chapter failed");
    }
    anyhow::bail!(
        "{} of {} chapters failed; full book kept in {}",
        report.failures.len(),
        report.failures.len() + report.files.len(),
        report.book_dir.join(crate::layout::INTERMEDIATE_DIR).display()
    );
}
