use std::path::{Path, PathBuf};

use crate::sanitize::sanitize_file_name;

pub const INTERMEDIATE_DIR: &str = "full_book";
pub const CHAPTERS_DIR: &str = "chapters";
pub const TRACK_LIST_FILE: &str = "track_list.txt";

/// Where a book's files go under the output folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    book_dir: PathBuf,
    book_name: String,
    extension: String,
}

impl OutputLayout {
    pub fn new(output_dir: &Path, book_title: &str, extension: &str) -> Self {
        let book_name = sanitize_file_name(book_title);
        Self {
            book_dir: output_dir.join(&book_name),
            book_name,
            extension: extension.trim_start_matches('.').to_owned(),
        }
    }

    pub fn book_dir(&self) -> &Path {
        &self.book_dir
    }

    /// The only file of a single-chapter book, named after that chapter.
    pub fn single_chapter_file(&self, chapter_title: &str) -> PathBuf {
        self.book_dir
            .join(self.file_name(&sanitize_file_name(chapter_title)))
    }

    pub fn combined_file(&self) -> PathBuf {
        self.book_dir.join(self.file_name(&self.book_name))
    }

    pub fn intermediate_dir(&self) -> PathBuf {
        self.book_dir.join(INTERMEDIATE_DIR)
    }

    pub fn intermediate_file(&self) -> PathBuf {
        self.intermediate_dir().join(self.file_name(&self.book_name))
    }

    pub fn track_list_file(&self) -> PathBuf {
        self.intermediate_dir().join(TRACK_LIST_FILE)
    }

    pub fn chapters_dir(&self) -> PathBuf {
        self.book_dir.join(CHAPTERS_DIR)
    }

    /// `name` must already be sanitized and unique among siblings.
    pub fn chapter_file(&self, name: &str) -> PathBuf {
        self.chapters_dir().join(self.file_name(name))
    }

    fn file_name(&self, stem: &str) -> String {
        format!("{stem}.{}", self.extension)
    }
}
