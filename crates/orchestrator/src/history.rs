//! Run history: the shared message log, saved as one JSON batch after
//! a run so a later run can resume from it.

use std::path::{Path, PathBuf};

use stagegate_core::Message;
use tokio::fs;
use tracing::debug;

use crate::error::Result;

const HISTORY_FILE: &str = "history.json";

pub fn history_path(project_dir: &Path) -> PathBuf {
    project_dir.join(HISTORY_FILE)
}

pub async fn save_history(project_dir: &Path, messages: &[Message]) -> Result<()> {
    fs::create_dir_all(project_dir).await?;
    let path = history_path(project_dir);
    fs::write(&path, serde_json::to_string_pretty(messages)?).await?;
    debug!(path = %path.display(), count = messages.len(), "history saved");
    Ok(())
}

/// The saved history, or `None` when this project has never run.
pub async fn load_history(project_dir: &Path) -> Result<Option<Vec<Message>>> {
    let path = history_path(project_dir);
    let raw = match fs::read_to_string(&path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_str(&raw)?))
}
