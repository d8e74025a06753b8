//! Durable per-session conversation history
//!
//! One JSON file per session holding an array of `{role, content}` objects.
//! Writes go to a hidden sibling temp file which is then renamed over the
//! target, so a reader sees either the previous or the new document. Each
//! path has a single writer; there is no cross-process locking.

use crate::config::HistoryConfig;
use crate::context::models::{ConversationLog, Message};
use crate::error::{ChatError, Result};
use crate::metrics::METRICS;
use chrono::{DateTime, Local};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Flat-file history store
#[derive(Debug, Clone)]
pub struct HistoryStore {
    pretty: bool,
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self { pretty: true }
    }
}

impl HistoryStore {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    pub fn from_config(config: &HistoryConfig) -> Self {
        Self::new(config.pretty)
    }

    /// Resolve the history file for a session started at `started`
    pub fn session_path(config: &HistoryConfig, started: DateTime<Local>) -> PathBuf {
        match &config.file {
            Some(file) => config.directory.join(file),
            None => config.directory.join(format!(
                "conversation_history_{}.json",
                started.format("%Y%m%d_%H%M%S")
            )),
        }
    }

    /// Load a log, falling back to a single system message when the file is
    /// absent or does not hold a valid history document.
    pub fn load(&self, path: &Path, system_prompt: &str) -> ConversationLog {
        match Self::read(path) {
            Ok(Some(log)) => {
                info!(path = %path.display(), messages = log.len(), "Loaded conversation history");
                log
            }
            Ok(None) => {
                debug!(path = %path.display(), "No history file, starting fresh");
                ConversationLog::seeded(system_prompt)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Error reading the conversation history file, starting with an empty history");
                METRICS.record_history_load_fallback();
                ConversationLog::seeded(system_prompt)
            }
        }
    }

    fn read(path: &Path) -> Result<Option<ConversationLog>> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ChatError::Storage(e.to_string())),
        };

        let messages: Vec<Message> =
            serde_json::from_str(&content).map_err(|e| ChatError::Storage(e.to_string()))?;
        if messages.is_empty() {
            return Err(ChatError::Storage("history document is empty".into()));
        }

        ConversationLog::from_messages(messages)
            .map(Some)
            .map_err(ChatError::Storage)
    }

    /// Write the full log, replacing the file atomically
    pub fn save(&self, path: &Path, log: &ConversationLog) -> Result<()> {
        let body = if self.pretty {
            serde_json::to_vec_pretty(log)
        } else {
            serde_json::to_vec(log)
        }
        .map_err(|e| ChatError::Storage(e.to_string()))?;

        let tmp_path = Self::temp_path(path)?;
        if let Some(parent) = tmp_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| ChatError::Storage(e.to_string()))?;
            }
        }

        let write = || -> std::io::Result<()> {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&body)?;
            file.sync_all()?;
            fs::rename(&tmp_path, path)
        };

        if let Err(e) = write() {
            let _ = fs::remove_file(&tmp_path);
            return Err(ChatError::Storage(format!(
                "An I/O error occurred while saving {}: {}",
                path.display(),
                e
            )));
        }

        debug!(path = %path.display(), messages = log.len(), "Saved conversation history");
        Ok(())
    }

    fn temp_path(path: &Path) -> Result<PathBuf> {
        let file_name = path
            .file_name()
            .ok_or_else(|| ChatError::Storage(format!("{} has no file name", path.display())))?;
        let tmp_name = format!(".{}.tmp", file_name.to_string_lossy());
        Ok(match path.parent() {
            Some(parent) => parent.join(tmp_name),
            None => PathBuf::from(tmp_name),
        })
    }
}
