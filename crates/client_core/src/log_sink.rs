//! Append-only chat log.

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::{fs::OpenOptions, io::AsyncWriteExt};

#[async_trait]
pub trait LogSink: Send + Sync {
    /// Appends `line` plus a newline to the file at `path`, creating it when
    /// missing.
    async fn append_line(&self, path: &Path, line: &str) -> Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FileLogSink;

#[async_trait]
impl LogSink for FileLogSink {
    async fn append_line(&self, path: &Path, line: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .with_context(|| format!("failed to open chat log {}", path.display()))?;
        let mut record = String::with_capacity(line.len() + 1);
        record.push_str(line);
        record.push('\n');
        file.write_all(record.as_bytes())
            .await
            .with_context(|| format!("failed to write chat log {}", path.display()))?;
        file.flush().await?;
        Ok(())
    }
}

/// Discards every line.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLogSink;

#[async_trait]
impl LogSink for NullLogSink {
    async fn append_line(&self, _path: &Path, _line: &str) -> Result<()> {
        Ok(())
    }
}
