use std::path::Path;

use crate::error::{DownloadError, Result};
use crate::ffmpeg::{MediaJob, MediaTool};

/// Downloads the whole stream into `dest`. A failed run may leave a
/// truncated file behind; only `Ok` means the file is complete.
pub async fn fetch_stream(tool: &dyn MediaTool, source_url: &str, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await.map_err(|err| {
            DownloadError::io(format!("create download dir: {}", parent.display()), err)
        })?;
    }

    tracing::info!(source = source_url, dest = %dest.display(), "downloading book");
    let job = MediaJob::Fetch {
        source: source_url.to_owned(),
        dest: dest.to_path_buf(),
    };
    let output = tool.run(&job).await?;

    let fetch_error = |status: String, stderr: String| DownloadError::Fetch {
        source_url: source_url.to_owned(),
        dest: dest.to_path_buf(),
        status,
        stderr,
    };

    if !output.success {
        return Err(fetch_error(output.status, output.diagnostics));
    }

    let written = tokio::fs::metadata(dest)
        .await
        .map(|meta| meta.len())
        .unwrap_or(0);
    if written == 0 {
        return Err(fetch_error(
            output.status,
            "tool reported success but wrote no output".to_owned(),
        ));
    }

    tracing::info!(dest = %dest.display(), bytes = written, "download finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::ffmpeg::ToolOutput;

    struct ScriptedTool {
        output: ToolOutput,
        write: bool,
        jobs: Mutex<Vec<MediaJob>>,
    }

    #[async_trait]
    impl MediaTool for ScriptedTool {
        async fn run(&self, job: &MediaJob) -> Result<ToolOutput> {
            self.jobs.lock().expect("lock jobs").push(job.clone());
            if self.write {
                std::fs::write(job.dest(), b"ID3").expect("write fake output");
            }
            Ok(self.output.clone())
        }
    }

    #[tokio::test]
    async fn creates_parent_and_reports_success() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let dest = temp.path().join("nested/full_book/Book.mp3");
        let tool = ScriptedTool {
            output: ToolOutput::ok(),
            write: true,
            jobs: Mutex::new(Vec::new()),
        };

        fetch_stream(&tool, "https://cdn.example.com/a.m3u8", &dest).await?;

        assert!(dest.exists());
        let jobs = tool.jobs.lock().expect("lock jobs");
        assert_eq!(
            *jobs,
            vec![MediaJob::Fetch {
                source: "https://cdn.example.com/a.m3u8".to_owned(),
                dest: dest.clone(),
            }]
        );
        Ok(())
    }

    #[tokio::test]
    async fn nonzero_exit_surfaces_diagnostics() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let dest = temp.path().join("Book.mp3");
        let tool = ScriptedTool {
            output: ToolOutput {
                success: false,
                status: "exit status: 1".to_owned(),
                diagnostics: "Server returned 403 Forbidden".to_owned(),
            },
            write: true,
            jobs: Mutex::new(Vec::new()),
        };

        let err = fetch_stream(&tool, "https://cdn.example.com/a.m3u8", &dest)
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::Fetch { .. }));
        assert!(err.to_string().contains("403 Forbidden"), "{err}");
        Ok(())
    }

    #[tokio::test]
    async fn success_without_output_is_an_error() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let tool = ScriptedTool {
            output: ToolOutput::ok(),
            write: false,
            jobs: Mutex::new(Vec::new()),
        };

        let err = fetch_stream(&tool, "x.m3u8", &temp.path().join("Book.mp3"))
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::Fetch { .. }));
        Ok(())
    }
}
