use std::fs::OpenOptions;
use std::io::{BufWriter, Write as _};
use std::path::Path;

use scraper::{ElementRef, Html, Selector};

use crate::error::{DownloadError, Result};
use crate::formats::{BookManifest, ChapterSpec};
use crate::sanitize::sanitize_file_name;

const CHAPTER_LIST_SELECTOR: &str = "div.bookpage--chapters";
const CHAPTER_BLOCK_SELECTOR: &str = "div.chapter__default";
const CHAPTER_POSITION_ATTR: &str = "data-pos";
const BOOK_TITLE_SELECTOR: &str = "h1.caption__article-main";
const AUDIO_SELECTOR: &str = "audio[src]";

/// Where the chapter boundaries come from.
#[derive(Debug, Clone)]
pub enum ChapterSource {
    /// Offsets embedded in the book-data manifest.
    Manifest(BookManifest),
    /// Chapter blocks scraped from the rendered book page.
    Markup { html: String },
}

impl ChapterSource {
    pub fn plan(&self) -> Result<Vec<ChapterSpec>> {
        let chapters = match self {
            Self::Manifest(manifest) => plan_from_manifest(manifest)?,
            Self::Markup { html } => plan_from_markup(html)?,
        };
        tracing::info!(chapters = chapters.len(), "chapter plan ready");
        Ok(chapters)
    }
}

pub fn plan_from_manifest(manifest: &BookManifest) -> Result<Vec<ChapterSpec>> {
    manifest
        .items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let chapter = ChapterSpec {
                title: sanitize_file_name(&item.title),
                start: item.time_from_start,
                end: item.time_finish,
            };
            if !(chapter.start < chapter.end) {
                return Err(DownloadError::ManifestParse(format!(
                    "chapter {index} ({:?}) has start {} not before end {}",
                    item.title, chapter.start, chapter.end
                )));
            }
            Ok(chapter)
        })
        .collect()
}

pub fn plan_from_markup(html: &str) -> Result<Vec<ChapterSpec>> {
    let document = Html::parse_document(html);
    let list_selector = selector(CHAPTER_LIST_SELECTOR)?;
    let block_selector = selector(CHAPTER_BLOCK_SELECTOR)?;

    let Some(list) = document.select(&list_selector).next() else {
        tracing::warn!(selector = CHAPTER_LIST_SELECTOR, "no chapter list in page markup");
        return Ok(Vec::new());
    };
    let blocks = list.select(&block_selector).collect::<Vec<_>>();
    let Some((last, rest)) = blocks.split_last() else {
        return Ok(Vec::new());
    };

    let mut chapters = Vec::with_capacity(blocks.len());
    let mut cursor = 0.0_f64;

    for (index, block) in rest.iter().enumerate() {
        let (_, title) = block_fields(block, index)?;
        let next = blocks[index + 1];
        let end = position_attr(&next, index + 1)?;
        chapters.push(checked_chapter(index, title, cursor, end)?);
        cursor = end;
    }

    let last_index = blocks.len() - 1;
    let (display, title) = block_fields(last, last_index)?;
    let duration = parse_display_duration(&display)?;
    chapters.push(checked_chapter(last_index, title, cursor, cursor + duration)?);

    Ok(chapters)
}

pub fn markup_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let title_selector = Selector::parse(BOOK_TITLE_SELECTOR).ok()?;
    document
        .select(&title_selector)
        .next()
        .map(|element| element_text(&element))
        .filter(|title| !title.is_empty())
}

/// Direct audio source of the page's player, if the page exposes one.
pub fn markup_audio_src(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let audio_selector = Selector::parse(AUDIO_SELECTOR).ok()?;
    document
        .select(&audio_selector)
        .filter_map(|element| element.value().attr("src"))
        .map(str::trim)
        .filter(|src| !src.is_empty() && !src.starts_with("blob:"))
        .last()
        .map(str::to_owned)
}

/// Parses `MM:SS` or `H:MM:SS` into seconds.
pub fn parse_display_duration(display: &str) -> Result<f64> {
    let parts = display
        .trim()
        .split(':')
        .map(|part| part.trim().parse::<u64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|err| DownloadError::MarkupParse(format!("duration {display:?}: {err}")))?;

    let (hours, minutes, seconds) = match parts.as_slice() {
        [minutes, seconds] => (0, *minutes, *seconds),
        [hours, minutes, seconds] => (*hours, *minutes, *seconds),
        _ => {
            return Err(DownloadError::MarkupParse(format!(
                "duration {display:?}: expected MM:SS or H:MM:SS"
            )));
        }
    };
    let total = hours
        .checked_mul(3600)
        .zip(minutes.checked_mul(60))
        .and_then(|(h, m)| h.checked_add(m))
        .and_then(|hm| hm.checked_add(seconds))
        .ok_or_else(|| DownloadError::MarkupParse(format!("duration {display:?}: out of range")))?;
    Ok(total as f64)
}

/// Writes one `start,end,title` line per chapter. The title is last so it
/// may itself contain commas.
pub fn write_track_list(path: &Path, chapters: &[ChapterSpec]) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .map_err(|err| DownloadError::io(format!("create track list: {}", path.display()), err))?;
    let mut out = BufWriter::new(file);
    for chapter in chapters {
        writeln!(out, "{},{},{}", chapter.start, chapter.end, chapter.title)
            .map_err(|err| DownloadError::io("write track list", err))?;
    }
    out.flush()
        .map_err(|err| DownloadError::io("flush track list", err))?;
    Ok(())
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|err| DownloadError::MarkupParse(format!("selector {css:?}: {err}")))
}

/// The duration display and the title of a chapter block: its first and
/// second child elements.
fn block_fields(block: &ElementRef<'_>, index: usize) -> Result<(String, String)> {
    let mut children = block.children().filter_map(ElementRef::wrap);
    match (children.next(), children.next()) {
        (Some(display), Some(title)) => Ok((element_text(&display), element_text(&title))),
        _ => Err(DownloadError::MarkupParse(format!(
            "chapter block {index} must hold a duration and a title"
        ))),
    }
}

fn position_attr(block: &ElementRef<'_>, index: usize) -> Result<f64> {
    let raw = block
        .value()
        .attr(CHAPTER_POSITION_ATTR)
        .ok_or_else(|| {
            DownloadError::MarkupParse(format!(
                "chapter block {index} has no {CHAPTER_POSITION_ATTR} attribute"
            ))
        })?;
    raw.trim().parse::<f64>().map_err(|err| {
        DownloadError::MarkupParse(format!(
            "chapter block {index} {CHAPTER_POSITION_ATTR}={raw:?}: {err}"
        ))
    })
}

fn checked_chapter(index: usize, title: String, start: f64, end: f64) -> Result<ChapterSpec> {
    if !(start < end) {
        return Err(DownloadError::MarkupParse(format!(
            "chapter {index} ({title:?}) has start {start} not before end {end}"
        )));
    }
    Ok(ChapterSpec {
        title: sanitize_file_name(&title),
        start,
        end,
    })
}

fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
