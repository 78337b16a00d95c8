//! Append-only, date-partitioned chat logs.
//!
//! One logger per channel (plus one reserved for normal chat). Appends are
//! fire-and-forget: lines are handed to a single writer task per logger, so
//! callers never block on disk and per-logger write order is preserved.
//! Write failures are traced and swallowed; they must never reach the chat
//! delivery path.

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use crate::keyword::strip_color_code;

enum WriterCommand {
    Append { dir: PathBuf, line: String },
    Flush { done: oneshot::Sender<()> },
}

/// Append-only log writer/reader for one channel.
pub struct ChatLogger {
    name: String,
    base_dir: PathBuf,
    tx: mpsc::UnboundedSender<WriterCommand>,
}

impl ChatLogger {
    /// Create a logger named `name` under `base_dir`. Spawns the writer
    /// task; requires a tokio runtime.
    pub fn new(name: impl Into<String>, base_dir: impl Into<PathBuf>) -> Self {
        let name = name.into();
        let base_dir = base_dir.into();
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(writer_task(name.clone(), rx));
        Self { name, base_dir, tx }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a log record. Returns immediately; the write happens on the
    /// writer task. Commas in the message are escaped with a full-width
    /// comma to keep the 3-field line format intact, and color markup is
    /// stripped.
    pub fn log(&self, message: &str, speaker: &str) {
        let now = Local::now();
        let msg = strip_color_code(message).replace(',', "，");
        let line = format!("{},{},{}\r\n", now.format("%Y-%m-%d %H:%M:%S"), msg, speaker);
        let dir = self.dir_for(now.date_naive());

        // Send can only fail after runtime shutdown; nothing to do then.
        let _ = self.tx.send(WriterCommand::Append { dir, line });
    }

    /// Wait until every append issued so far has hit the file. Retrieval in
    /// the same task as a just-issued append needs this; steady-state chat
    /// does not.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.tx.send(WriterCommand::Flush { done }).is_ok() {
            let _ = wait.await;
        }
    }

    /// Read the log for `date` (default: today), filtered and optionally
    /// reversed.
    ///
    /// `date` accepts an 8-digit `YYYYMMDD` or a 4-digit `MMDD` interpreted
    /// against the current year; any other shape yields an empty result, as
    /// does a missing date bucket.
    pub fn get_log(
        &self,
        speaker_filter: Option<&str>,
        text_filter: Option<&str>,
        date: Option<&str>,
        reverse: bool,
    ) -> Vec<String> {
        let Some(file) = self.log_file(date) else {
            return Vec::new();
        };

        let mut lines = read_lines(&file);

        if let Some(speaker) = speaker_filter {
            lines.retain(|line| {
                line.splitn(3, ',')
                    .nth(2)
                    .is_some_and(|field| field.contains(speaker))
            });
        }

        if let Some(text) = text_filter {
            lines.retain(|line| {
                line.splitn(3, ',')
                    .nth(1)
                    .is_some_and(|field| field.contains(text))
            });
        }

        if reverse {
            lines.reverse();
        }

        lines
    }

    fn dir_for(&self, date: NaiveDate) -> PathBuf {
        self.base_dir
            .join("logs")
            .join(date.format("%Y-%m-%d").to_string())
    }

    fn log_file(&self, date: Option<&str>) -> Option<PathBuf> {
        let date = match date {
            None => Local::now().date_naive(),
            Some(s) => parse_log_date(s)?,
        };
        let file = self.dir_for(date).join(format!("{}.log", self.name));
        file.is_file().then_some(file)
    }
}

/// Parse an 8-digit absolute date or a 4-digit month-day against the
/// current year. Anything else is rejected.
fn parse_log_date(date: &str) -> Option<NaiveDate> {
    let full = if date.len() == 4 && date.bytes().all(|b| b.is_ascii_digit()) {
        format!("{}{}", Local::now().format("%Y"), date)
    } else {
        date.to_string()
    };

    if full.len() != 8 || !full.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(&full, "%Y%m%d").ok()
}

fn read_lines(file: &Path) -> Vec<String> {
    match std::fs::read_to_string(file) {
        Ok(content) => content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect(),
        Err(e) => {
            warn!(file = %file.display(), error = %e, "failed to read chat log");
            Vec::new()
        }
    }
}

async fn writer_task(name: String, mut rx: mpsc::UnboundedReceiver<WriterCommand>) {
    while let Some(command) = rx.recv().await {
        match command {
            WriterCommand::Append { dir, line } => {
                if let Err(e) = append_line(&dir, &name, &line).await {
                    warn!(logger = %name, error = %e, "chat log append failed");
                }
            }
            WriterCommand::Flush { done } => {
                let _ = done.send(());
            }
        }
    }
}

async fn append_line(dir: &Path, name: &str, line: &str) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    let mut file = tokio::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(dir.join(format!("{name}.log")))
        .await?;
    file.write_all(line.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}
