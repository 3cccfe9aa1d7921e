use clap::{Args, Parser, ValueEnum};
use url::Url;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Download an audiobook from akniga.org and split it into chapters"
)]
pub struct Cli {
    #[command(flatten)]
    pub download: DownloadArgs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ChapterSourceKind {
    /// Chapter offsets from the book-data request.
    Manifest,
    /// Chapter blocks scraped from the book page.
    Markup,
}

#[derive(Debug, Args)]
pub struct DownloadArgs {
    /// Book page URL (must be http/https).
    #[arg(value_parser = parse_book_url)]
    pub url: String,

    /// Output directory; the book folder is created inside it.
    pub out: String,

    /// Do not separate the book into chapters, download one file.
    #[arg(short, long)]
    pub full: bool,

    /// Delete the full book folder after chapter separation is done.
    #[arg(short, long, conflicts_with = "full")]
    pub delete: bool,

    /// Where chapter boundaries come from.
    #[arg(long, value_enum, default_value_t = ChapterSourceKind::Manifest)]
    pub source: ChapterSourceKind,

    /// Audio container/extension of the written files.
    #[arg(long, default_value = "mp3")]
    pub format: String,

    /// ffmpeg executable.
    #[arg(long, default_value = "ffmpeg")]
    pub ffmpeg: String,

    /// Show the browser window instead of running headless.
    #[arg(long)]
    pub show_browser: bool,

    /// Page load timeout.
    #[arg(long, default_value_t = 60)]
    pub page_timeout_secs: u64,

    /// Wait after page load for late requests.
    #[arg(long, default_value_t = 3000)]
    pub settle_ms: u64,

    /// Kill an ffmpeg run that takes longer than this.
    #[arg(long)]
    pub tool_timeout_secs: Option<u64>,

    /// Print the chapter plan as JSON and exit without downloading.
    #[arg(long)]
    pub dry_run: bool,
}

/// Accepts only absolute http/https URLs.
pub fn parse_book_url(value: &str) -> Result<String, String> {
    let url = Url::parse(value).map_err(|err| format!("not a URL: {err}"))?;
    match url.scheme() {
        "http" | "https" => Ok(value.to_owned()),
        scheme => Err(format!("book url must be http/https, got {scheme}")),
    }
}
