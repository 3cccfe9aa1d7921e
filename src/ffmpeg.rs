use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{DownloadError, Result};

/// One run of the external media tool.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaJob {
    /// Read `source` (playlist or direct URL) to completion into `dest`.
    Fetch { source: String, dest: PathBuf },
    /// Copy `[start, end)` seconds of `input` into `dest` without re-encoding.
    Trim {
        input: PathBuf,
        start: f64,
        end: f64,
        dest: PathBuf,
    },
}

impl MediaJob {
    pub fn dest(&self) -> &PathBuf {
        match self {
            Self::Fetch { dest, .. } | Self::Trim { dest, .. } => dest,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub success: bool,
    pub status: String,
    /// Diagnostic output (stderr, or stdout when stderr is empty).
    pub diagnostics: String,
}

impl ToolOutput {
    pub fn ok() -> Self {
        Self {
            success: true,
            status: "exit status: 0".to_owned(),
            diagnostics: String::new(),
        }
    }
}

/// Seam for the media conversion tool. `Err` means the tool could not be run
/// at all; a tool that ran and failed reports `success: false`.
#[async_trait]
pub trait MediaTool: Send + Sync {
    async fn run(&self, job: &MediaJob) -> Result<ToolOutput>;
}

#[derive(Debug, Clone)]
pub struct Ffmpeg {
    pub bin: String,
    pub timeout: Option<Duration>,
}

impl Default for Ffmpeg {
    fn default() -> Self {
        Self {
            bin: "ffmpeg".to_owned(),
            timeout: None,
        }
    }
}

impl Ffmpeg {
    pub fn new(bin: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            bin: bin.into(),
            timeout,
        }
    }
}

#[async_trait]
impl MediaTool for Ffmpeg {
    async fn run(&self, job: &MediaJob) -> Result<ToolOutput> {
        let args = build_ffmpeg_args(job);
        tracing::debug!(bin = %self.bin, ?args, "ffmpeg");

        let mut cmd = Command::new(&self.bin);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, cmd.output())
                .await
                .map_err(|_| DownloadError::Tool {
                    tool: self.bin.clone(),
                    message: format!("timed out after {}s", limit.as_secs()),
                })?,
            None => cmd.output().await,
        };
        let output = match output {
            Ok(output) => output,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(DownloadError::ToolMissing {
                    tool: self.bin.clone(),
                });
            }
            Err(err) => {
                return Err(DownloadError::Tool {
                    tool: self.bin.clone(),
                    message: err.to_string(),
                });
            }
        };

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
        let diagnostics = if stderr.is_empty() {
            String::from_utf8_lossy(&output.stdout).trim().to_owned()
        } else {
            stderr
        };

        Ok(ToolOutput {
            success: output.status.success(),
            status: output.status.to_string(),
            diagnostics,
        })
    }
}

pub fn build_ffmpeg_args(job: &MediaJob) -> Vec<OsString> {
    let mut args = ["-hide_banner", "-nostdin", "-loglevel", "error", "-y"]
        .into_iter()
        .map(OsString::from)
        .collect::<Vec<_>>();

    match job {
        MediaJob::Fetch { source, dest } => {
            args.push(OsString::from("-i"));
            args.push(OsString::from(source));
            args.push(dest.as_os_str().to_owned());
        }
        MediaJob::Trim {
            input,
            start,
            end,
            dest,
        } => {
            args.push(OsString::from("-i"));
            args.push(input.as_os_str().to_owned());
            args.push(OsString::from("-acodec"));
            args.push(OsString::from("copy"));
            args.push(OsString::from("-ss"));
            args.push(OsString::from(format_seconds(*start)));
            args.push(OsString::from("-to"));
            args.push(OsString::from(format_seconds(*end)));
            args.push(dest.as_os_str().to_owned());
        }
    }

    args
}

pub fn format_seconds(seconds: f64) -> String {
    format!("{seconds}")
}
