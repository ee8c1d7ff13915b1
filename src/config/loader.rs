use anyhow::{Context, Result};
use schemars::{Schema, schema_for};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::models::ConfigDraft;

/// Parse a config draft from a string slice.
///
/// The result is still a draft: the scheduler validates it on start.
pub fn load_from_str(s: &str) -> Result<ConfigDraft> {
    serde_json::from_str(s).context("Failed to parse JSON config string into ConfigDraft")
}

/// Parse a config draft from any reader (e.g., a file).
pub fn load_from_reader<R: Read>(reader: R) -> Result<ConfigDraft> {
    serde_json::from_reader(reader).context("Failed to parse JSON config from reader")
}

/// Load a config draft from a file path asynchronously (Tokio).
pub async fn load_from_path_async<P: AsRef<Path>>(path: P) -> Result<ConfigDraft> {
    use tokio::fs;
    let path_ref = path.as_ref();
    let bytes = fs::read(path_ref)
        .await
        .with_context(|| format!("Failed to read config file {}", path_ref.display()))?;
    let draft: ConfigDraft = serde_json::from_slice(&bytes)
        .with_context(|| format!("Failed to parse JSON config from {}", path_ref.display()))?;
    debug!(target: "lupin::store", "Loaded config from {}", path_ref.display());
    Ok(draft)
}

/// Generate the JSON Schema for the config draft (for settings UIs and tooling).
pub fn generate_schema() -> Schema {
    schema_for!(ConfigDraft)
}

/// Write the JSON Schema for the config draft to any writer (pretty-printed).
pub fn write_schema_to_writer<W: Write>(mut writer: W) -> Result<()> {
    let schema = generate_schema();
    let json = serde_json::to_string_pretty(&schema).context("Failed to serialize schema")?;
    writer
        .write_all(json.as_bytes())
        .context("Failed to write schema to writer")?;
    Ok(())
}

/// File-backed store for the last-used config.
///
/// The engine never reads this; only the controlling process does, so that a
/// restart can pick up where the previous run left off.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted draft. A missing file is not an error: it yields `None`.
    pub async fn load(&self) -> Result<Option<ConfigDraft>> {
        match tokio::fs::try_exists(&self.path).await {
            Ok(true) => load_from_path_async(&self.path).await.map(Some),
            Ok(false) => {
                debug!(
                    target: "lupin::store",
                    path = %self.path.display(),
                    "No persisted config"
                );
                Ok(None)
            }
            Err(e) => Err(e).with_context(|| {
                format!("Failed to check config file {}", self.path.display())
            }),
        }
    }

    /// Persist `draft`, creating parent directories as needed.
    ///
    /// Writes to a sibling temp file first and renames it over the target so a
    /// crash mid-write never leaves a truncated config behind.
    pub async fn save(&self, draft: &ConfigDraft) -> Result<()> {
        use tokio::fs;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        let json = serde_json::to_vec_pretty(draft).context("Failed to serialize config")?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &json)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        info!(
            target: "lupin::store",
            path = %self.path.display(),
            enabled = draft.enabled,
            "Persisted config"
        );
        Ok(())
    }

    /// Rewrite the persisted draft with `enabled` set, if there is a draft.
    /// The file is rewritten even when the flag already matches.
    pub async fn set_enabled(&self, enabled: bool) -> Result<()> {
        if let Some(draft) = self.load().await? {
            self.save(&ConfigDraft { enabled, ..draft }).await?;
        }
        Ok(())
    }

    /// Delete the persisted draft. A missing file is not an error.
    pub async fn remove(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(target: "lupin::store", path = %self.path.display(), "Removed config");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to remove {}", self.path.display()))
            }
        }
    }

    /// Put back what [`load`](Self::load) returned earlier: the draft, or no file.
    pub async fn restore(&self, previous: Option<&ConfigDraft>) -> Result<()> {
        match previous {
            Some(draft) => self.save(draft).await,
            None => self.remove().await,
        }
    }
}
