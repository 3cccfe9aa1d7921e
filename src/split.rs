use std::path::{Path, PathBuf};

use crate::error::{DownloadError, Result};
use crate::ffmpeg::{MediaJob, MediaTool};
use crate::formats::ChapterSpec;
use crate::sanitize::unique_file_names;

#[derive(Debug, Default)]
pub struct SplitReport {
    pub written: Vec<PathBuf>,
    pub failures: Vec<DownloadError>,
}

impl SplitReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Cuts `source` into one file per chapter. `dest_for` maps a unique,
/// sanitized chapter name to its output path.
///
/// A failing chapter is recorded and the remaining chapters still run. That
/// includes a run that errors out (a timeout, say). Only a missing tool binary
/// aborts the loop.
pub async fn split_chapters(
    tool: &dyn MediaTool,
    source: &Path,
    chapters: &[ChapterSpec],
    dest_for: impl Fn(&str) -> PathBuf,
) -> Result<SplitReport> {
    tracing::info!(chapters = chapters.len(), source = %source.display(), "separating chapters");

    let names = unique_file_names(
        &chapters
            .iter()
            .map(|chapter| chapter.title.as_str())
            .collect::<Vec<_>>(),
    );

    let mut report = SplitReport::default();
    for (chapter, name) in chapters.iter().zip(names) {
        let dest = dest_for(&name);
        let job = MediaJob::Trim {
            input: source.to_path_buf(),
            start: chapter.start,
            end: chapter.end,
            dest: dest.clone(),
        };

        let output = match tool.run(&job).await {
            Ok(output) => output,
            Err(err @ DownloadError::ToolMissing { .. }) => return Err(err),
            Err(err) => {
                tracing::warn!(chapter = %name, error = %err, "chapter extraction failed");
                report.failures.push(DownloadError::Split {
                    chapter: name,
                    dest,
                    status: "not completed".to_owned(),
                    stderr: err.to_string(),
                });
                continue;
            }
        };
        if output.success {
            tracing::debug!(chapter = %name, dest = %dest.display(), "chapter written");
            report.written.push(dest);
            continue;
        }

        tracing::warn!(
            chapter = %name,
            status = %output.status,
            diagnostics = %output.diagnostics,
            "chapter extraction failed"
        );
        report.failures.push(DownloadError::Split {
            chapter: name,
            dest,
            status: output.status,
            stderr: output.diagnostics,
        });
    }

    tracing::info!(
        written = report.written.len(),
        failed = report.failures.len(),
        "chapter separation finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::ffmpeg::ToolOutput;

    #[derive(Default)]
    struct FailingOn {
        fail_dest_containing: Option<&'static str>,
        error_dest_containing: Option<&'static str>,
        missing: bool,
        jobs: Mutex<Vec<MediaJob>>,
    }

    #[async_trait]
    impl MediaTool for FailingOn {
        async fn run(&self, job: &MediaJob) -> Result<ToolOutput> {
            self.jobs.lock().expect("lock jobs").push(job.clone());
            if self.missing {
                return Err(DownloadError::ToolMissing {
                    tool: "ffmpeg".to_owned(),
                });
            }
            let dest = job.dest().to_string_lossy();
            if self
                .error_dest_containing
                .is_some_and(|needle| dest.contains(needle))
            {
                return Err(DownloadError::Tool {
                    tool: "ffmpeg".to_owned(),
                    message: "timed out after 30s".to_owned(),
                });
            }
            let fails = self
                .fail_dest_containing
                .is_some_and(|needle| job.dest().to_string_lossy().contains(needle));
            if fails {
                return Ok(ToolOutput {
                    success: false,
                    status: "exit status: 1".to_owned(),
                    diagnostics: "Invalid data found when processing input".to_owned(),
                });
            }
            Ok(ToolOutput::ok())
        }
    }

    fn chapter(title: &str, start: f64, end: f64) -> ChapterSpec {
        ChapterSpec {
            title: title.to_owned(),
            start,
            end,
        }
    }

    #[tokio::test]
    async fn trims_match_chapter_bounds() -> anyhow::Result<()> {
        let tool = FailingOn::default();
        let chapters = vec![
            chapter("A", 0.0, 200.0),
            chapter("B", 200.0, 450.0),
            chapter("C", 450.0, 600.0),
        ];

        let report = split_chapters(&tool, Path::new("full.mp3"), &chapters, |name| {
            PathBuf::from(format!("out/{name}.mp3"))
        })
        .await?;

        assert!(report.is_complete());
        assert_eq!(report.written.len(), 3);

        let jobs = tool.jobs.lock().expect("lock jobs");
        let mut ranges = jobs
            .iter()
            .map(|job| match job {
                MediaJob::Trim {
                    start, end, dest, ..
                } => (dest.to_string_lossy().into_owned(), *start, *end),
                MediaJob::Fetch { .. } => panic!("unexpected fetch"),
            })
            .collect::<Vec<_>>();
        ranges.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(
            ranges,
            vec![
                ("out/A.mp3".to_owned(), 0.0, 200.0),
                ("out/B.mp3".to_owned(), 200.0, 450.0),
                ("out/C.mp3".to_owned(), 450.0, 600.0),
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn one_failure_does_not_stop_the_rest() -> anyhow::Result<()> {
        let tool = FailingOn {
            fail_dest_containing: Some("B.mp3"),
            ..FailingOn::default()
        };
        let chapters = vec![
            chapter("A", 0.0, 10.0),
            chapter("B", 10.0, 20.0),
            chapter("C", 20.0, 30.0),
        ];

        let report = split_chapters(&tool, Path::new("full.mp3"), &chapters, |name| {
            PathBuf::from(format!("{name}.mp3"))
        })
        .await?;

        assert_eq!(tool.jobs.lock().expect("lock jobs").len(), 3);
        assert_eq!(
            report.written,
            vec![PathBuf::from("A.mp3"), PathBuf::from("C.mp3")]
        );
        assert_eq!(report.failures.len(), 1);
        let message = report.failures[0].to_string();
        assert!(message.contains("\"B\""), "{message}");
        assert!(message.contains("Invalid data"), "{message}");
        Ok(())
    }

    #[tokio::test]
    async fn timed_out_chapter_does_not_stop_the_rest() -> anyhow::Result<()> {
        let tool = FailingOn {
            error_dest_containing: Some("B.mp3"),
            ..FailingOn::default()
        };
        let chapters = vec![
            chapter("A", 0.0, 10.0),
            chapter("B", 10.0, 20.0),
            chapter("C", 20.0, 30.0),
        ];

        let report = split_chapters(&tool, Path::new("full.mp3"), &chapters, |name| {
            PathBuf::from(format!("{name}.mp3"))
        })
        .await?;

        assert_eq!(tool.jobs.lock().expect("lock jobs").len(), 3);
        assert_eq!(
            report.written,
            vec![PathBuf::from("A.mp3"), PathBuf::from("C.mp3")]
        );
        assert_eq!(report.failures.len(), 1);
        let message = report.failures[0].to_string();
        assert!(message.contains("\"B\""), "{message}");
        assert!(message.contains("timed out"), "{message}");
        Ok(())
    }

    #[tokio::test]
    async fn missing_tool_stops_after_first_chapter() {
        let tool = FailingOn {
            missing: true,
            ..FailingOn::default()
        };
        let chapters = vec![chapter("A", 0.0, 10.0), chapter("B", 10.0, 20.0)];

        let err = split_chapters(&tool, Path::new("full.mp3"), &chapters, |name| {
            PathBuf::from(format!("{name}.mp3"))
        })
        .await
        .unwrap_err();

        assert!(matches!(err, DownloadError::ToolMissing { .. }), "{err}");
        assert_eq!(tool.jobs.lock().expect("lock jobs").len(), 1);
    }

    #[tokio::test]
    async fn duplicate_titles_do_not_overwrite_each_other() -> anyhow::Result<()> {
        let tool = FailingOn::default();
        let chapters = vec![chapter("Part", 0.0, 10.0), chapter("Part", 10.0, 20.0)];

        let report = split_chapters(&tool, Path::new("full.mp3"), &chapters, |name| {
            PathBuf::from(format!("{name}.mp3"))
        })
        .await?;

        assert_eq!(
            report.written,
            vec![PathBuf::from("Part.mp3"), PathBuf::from("Part (2).mp3")]
        );
        Ok(())
    }
}
