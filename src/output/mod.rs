use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::cli::OutputFormat;
use crate::engine::TranscriptLine;
use crate::parsers::field;
use crate::utils::sanitize_filename;
use crate::TranscriptError;

const UNKNOWN: &str = "N/A";

const SEPARATOR_WIDTH: usize = 40;

/// Clipboard helpers tried in order, with their arguments
const CLIPBOARD_COMMANDS: &[(&str, &[&str])] = &[
    ("wl-copy", &[]),
    ("xclip", &["-selection", "clipboard"]),
    ("pbcopy", &[]),
    ("clip", &[]),
];

/// Descriptive fields written above the transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub title: String,
    pub author: String,
    pub published: Option<String>,
    pub link: String,
}

impl VideoMetadata {
    /// Read title, author and publish date from the player configuration.
    /// Missing title or author become `N/A`.
    pub fn from_player_response(player_response: Option<&Value>, link: &str) -> Self {
        let text = |path: &[&str]| {
            player_response
                .and_then(|player| field(player, path))
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        Self {
            title: text(&["videoDetails", "title"]).unwrap_or_else(|| UNKNOWN.to_string()),
            author: text(&["videoDetails", "author"]).unwrap_or_else(|| UNKNOWN.to_string()),
            published: text(&["microformat", "playerMicroformatRenderer", "publishDate"]),
            link: link.to_string(),
        }
    }

    /// Download file name, e.g. `my-video-some-channel.txt`
    pub fn file_name(&self) -> String {
        format!(
            "{}-{}.txt",
            sanitize_filename(&self.title),
            sanitize_filename(&self.author)
        )
    }
}

/// Everything written by the JSON output format
#[derive(Debug, Serialize)]
pub struct TranscriptExport<'a> {
    pub video_id: &'a str,
    pub metadata: &'a VideoMetadata,
    pub fetched_at: DateTime<Utc>,
    pub lines: &'a [TranscriptLine],
}

/// Lines joined one per row
pub fn render_lines(lines: &[TranscriptLine]) -> String {
    lines
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Metadata header followed by the transcript lines
pub fn render_document(lines: &[TranscriptLine], metadata: &VideoMetadata) -> String {
    let mut header = vec![
        format!("video-title=\"{}\"", metadata.title),
        format!("video-author=\"{}\"", metadata.author),
    ];
    if let Some(published) = metadata.published.as_deref().filter(|p| !p.is_empty()) {
        header.push(format!("video-published=\"{}\"", published));
    }
    header.push(format!("video-link=\"{}\"", metadata.link));
    header.push("-".repeat(SEPARATOR_WIDTH));

    format!("{}\n{}", header.join("\n"), render_lines(lines))
}

/// Render a resolved transcript in the requested format
pub fn render(
    format: &OutputFormat,
    video_id: &str,
    lines: &[TranscriptLine],
    metadata: &VideoMetadata,
    include_header: bool,
) -> Result<String> {
    match format {
        OutputFormat::Text if include_header => Ok(render_document(lines, metadata)),
        OutputFormat::Text => Ok(render_lines(lines)),
        OutputFormat::Json => {
            let export = TranscriptExport {
                video_id,
                metadata,
                fetched_at: Utc::now(),
                lines,
            };
            serde_json::to_string_pretty(&export).context("Failed to serialize transcript")
        }
    }
}

/// Save rendered output to file
pub async fn save_to_file(content: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs_err::create_dir_all(parent)?;
    }
    fs_err::write(path, content)?;
    Ok(())
}

/// Print rendered output to console
pub fn print_to_console(content: &str) {
    println!("{}", content);
}

/// Hand `content` to the first clipboard helper that accepts it
pub async fn copy_to_clipboard(content: &str) -> Result<()> {
    for (program, args) in CLIPBOARD_COMMANDS {
        match pipe_to_command(program, args, content).await {
            Ok(()) => {
                tracing::debug!("Copied transcript with {}", program);
                return Ok(());
            }
            Err(e) => tracing::debug!("Clipboard helper {} failed: {}", program, e),
        }
    }

    Err(TranscriptError::ClipboardUnavailable.into())
}

async fn pipe_to_command(program: &str, args: &[&str], content: &str) -> Result<()> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(content.as_bytes()).await?;
    }

    let status = child.wait().await?;
    if !status.success() {
        anyhow::bail!("{} exited with {}", program, status);
    }
    Ok(())
}
